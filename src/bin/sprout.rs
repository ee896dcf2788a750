//! The `sprout` CLI: `run <file>` executes a script through the runtime,
//! `repl` starts the interactive shell, `pm ...` forwards to the package
//! manager. Grounded on the teacher's `repl/src/main.rs` entry point and
//! `package-manager/src/cli.rs`'s `Args`/`Subcommand` (spec.md §6's
//! `createRuntime` surface plus §4.2's install commands).

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};

use sprout::{create_runtime, CreateRuntimeOptions};
use sprout_pm::{Args as PmArgs, Subcommand as PmSubcommand};
use sprout_vfs::Vfs;

#[derive(Parser, Debug)]
#[command(name = "sprout", author, version, about = "In-browser, Node-compatible JavaScript runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run a JavaScript file through the sprout runtime
    Run {
        path: String,
        #[arg(long, default_value = "/")]
        cwd: String,
        /// Allow same-origin (unsandboxed) execution instead of the sandbox default
        #[arg(long)]
        dangerously_allow_same_origin: bool,
    },
    /// Start the interactive REPL
    Repl,
    /// Package manager commands (install/add/remove/update/upgrade/why/clean)
    Pm {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn read_host_file(path: &str) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {path}"))
}

async fn run(path: &str, cwd: &str, dangerously_allow_same_origin: bool) -> Result<()> {
    let source = read_host_file(path)?;
    let vfs = Vfs::new();
    vfs.mkdir(cwd, true).wrap_err("creating the VFS working directory")?;
    let vfs_path = format!("{}/{}", cwd.trim_end_matches('/'), path.rsplit('/').next().unwrap_or(path));
    vfs.write(&vfs_path, source.as_bytes()).wrap_err("writing script into the VFS")?;

    let opts = CreateRuntimeOptions {
        sandbox: !dangerously_allow_same_origin,
        dangerously_allow_same_origin,
        cwd: Some(cwd.to_string()),
        ..Default::default()
    };
    let handle = create_runtime(vfs, opts).wrap_err("creating the sprout runtime")?;
    handle.execute(&source, &vfs_path).map_err(|e| color_eyre::eyre::eyre!("{e:?}")).wrap_err("executing the script")?;
    Ok(())
}

async fn pm(args: &[String]) -> Result<()> {
    let cmd = PmSubcommand::try_parse_from(std::iter::once("pm".to_string()).chain(args.iter().cloned())).wrap_err("invalid package manager command")?;
    let pm_args = PmArgs { verbose: true, immutable: false, working_dir: Some("/".into()), cmd };
    let vfs = Vfs::new();
    sprout_pm::package_manager(&vfs, "/", &pm_args).await
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { path, cwd, dangerously_allow_same_origin } => run(&path, &cwd, dangerously_allow_same_origin).await,
        Command::Repl => color_eyre::eyre::bail!("run the `sprout-repl` binary directly for an interactive session (e.g. `cargo run -p sprout-repl`)"),
        Command::Pm { args } => pm(&args).await,
    }
}
