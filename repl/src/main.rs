use std::sync::Arc;

use clap::Parser;
use colored::*;
use rustyline::completion::FilenameCompleter;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::HistoryHinter;
use rustyline::validate::MatchingBracketValidator;
use rustyline::{CompletionType, Config, EditMode, Editor};
use rustyline::{Completer, Helper, Hinter, Validator};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use sprout_modules::runtime::RuntimeOptions;
use sprout_pm::{Args as PmArgs, Subcommand as PmSubcommand};
use sprout_repl::Repl;
use sprout_vfs::Vsys;

#[derive(Helper, Completer, Hinter, Validator)]
struct JsHelper {
    #[rustyline(Completer)]
    completer: FilenameCompleter,
    #[rustyline(Validator)]
    validator: MatchingBracketValidator,
    #[rustyline(Hinter)]
    hinter: HistoryHinter,

    syntaxes: SyntaxSet,
    theme: Theme,
}

impl Highlighter for JsHelper {
    fn highlight<'l>(&self, line: &'l str, _: usize) -> std::borrow::Cow<'l, str> {
        let Some(syntax) = self.syntaxes.find_syntax_by_extension("js") else {
            return std::borrow::Cow::Borrowed(line);
        };
        let mut h = HighlightLines::new(syntax, &self.theme);
        let mut out = String::new();
        for segment in LinesWithEndings::from(line) {
            let Ok(ranges) = h.highlight_line(segment, &self.syntaxes) else {
                out.push_str(segment);
                continue;
            };
            out += &syntect::util::as_24_bit_terminal_escaped(&ranges[..], false);
        }
        std::borrow::Cow::Owned(out)
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, _: bool) -> std::borrow::Cow<'b, str> {
        std::borrow::Cow::Owned(prompt.green().bold().to_string())
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> std::borrow::Cow<'h, str> {
        std::borrow::Cow::Owned(hint.bright_black().to_string())
    }

    fn highlight_candidate<'c>(&self, candidate: &'c str, _: rustyline::CompletionType) -> std::borrow::Cow<'c, str> {
        std::borrow::Cow::Owned(candidate.bright_cyan().to_string())
    }
}

fn print_banner() {
    println!("{} {}", "sprout".bold().green(), env!("CARGO_PKG_VERSION").italic());
    println!("{} for help, {} to exit", "/help".cyan().bold(), "CTRL+D".cyan().bold());
}

fn print_help() {
    println!("\n{}", "Available commands:".bold());
    println!("  {} - show this help message", "/help".cyan().bold());
    println!("  {} - show version information", "/version".cyan().bold());
    println!("  {} - clear the console", "/clear".cyan().bold());
    println!("  {} <args> - run a package manager command", "/pm".cyan().bold());
}

async fn run_pm_command(vfs: &sprout_vfs::Vfs, cwd: &str, rest: &str) {
    let tokens: Vec<&str> = rest.split_ascii_whitespace().collect();
    let parsed = PmSubcommand::try_parse_from(std::iter::once("pm").chain(tokens.iter().copied()));
    match parsed {
        Ok(cmd) => {
            let args = PmArgs { verbose: true, immutable: false, working_dir: Some(cwd.into()), cmd };
            if let Err(e) = sprout_pm::package_manager(vfs, cwd, &args).await {
                eprintln!("{}: {e}", "Error".red().bold());
            }
        }
        Err(e) => eprintln!("{}: {e}", "Error".red().bold()),
    }
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let config = Config::builder().history_ignore_space(true).completion_type(CompletionType::List).edit_mode(EditMode::Emacs).build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(JsHelper {
        completer: FilenameCompleter::new(),
        validator: MatchingBracketValidator::new(),
        hinter: HistoryHinter::new(),
        syntaxes: SyntaxSet::load_defaults_newlines(),
        theme: ThemeSet::load_defaults().themes["base16-ocean.dark"].clone(),
    }));
    let _ = rl.load_history("history.js");

    print_banner();

    let vsys = Arc::new(Vsys::builder().permissions(sprout_vfs::Permissions::allow_all()).build());
    let vfs = vsys.vfs.clone();
    let repl = Repl::new(vsys, RuntimeOptions::default())?;

    loop {
        match rl.readline("sprout> ") {
            Ok(line) => {
                if let Some(rest) = line.strip_prefix('/') {
                    if !line.starts_with("//") {
                        match rest.trim() {
                            "help" => print_help(),
                            "version" => print_banner(),
                            "clear" => print!("\x1B[2J\x1B[1;1H"),
                            other if other.starts_with("pm") => run_pm_command(&vfs, "/", other.trim_start_matches("pm").trim()).await,
                            other => eprintln!("{}: unknown command '{other}'", "Error".red().bold()),
                        }
                        continue;
                    }
                }

                let _ = rl.add_history_entry(line.as_str());
                match repl.eval(&line) {
                    Ok(persisted) => {
                        let result = repl.runtime().context.with(|ctx| -> rsquickjs::Result<()> {
                            let value: rsquickjs::Value<'_> = persisted.restore(&ctx)?;
                            let args = rsquickjs::function::Rest(vec![value]);
                            sprout_modules::console::write_log(std::io::stdout(), &ctx, args)
                        });
                        if let Err(e) = result {
                            eprintln!("{}: {e}", "Error".red().bold());
                        }
                    }
                    Err(e) => eprintln!("{}: {e}", "Error".red().bold()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C received, exiting...".cyan());
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D received, saving history and exiting...".cyan());
                let _ = rl.save_history("history.js");
                break;
            }
            Err(e) => {
                eprintln!("{}: {e:?}", "Error".red().bold());
                break;
            }
        }
    }

    Ok(())
}
