//! Semver evaluator (spec.md §4.2): thin wrapper over the `node-semver`
//! crate the teacher already depended on, exposing exactly the operations
//! spec.md names so the boundary behaviors in spec.md §8 are testable
//! without reaching into `node_semver`'s own internals.

use node_semver::{Range, Version};

/// Parse a single `MAJOR.MINOR.PATCH[-PRERELEASE]` version string.
pub fn parse_version(raw: &str) -> Option<Version> {
    raw.parse().ok()
}

/// Parse a range expression (`^1.2.3`, `~0.2`, `>=1 <2`, `1.x`, `a || b`, ...).
pub fn parse_range(raw: &str) -> Option<Range> {
    raw.parse().ok()
}

/// True if `version` satisfies `range`.
///
/// Pre-release versions are excluded unless the range literal itself
/// contains a `-`, matching spec.md §4.2 and §8's boundary behavior —
/// `node-semver`'s `Range::satisfies` already implements this rule for
/// the standard grammar.
pub fn satisfies(version: &Version, range: &Range) -> bool {
    range.satisfies(version)
}

/// Find the numerically largest version in `candidates` that satisfies
/// `range`. Ties are impossible given full 3-tuple + pre-release keys.
pub fn find_best_version<'a>(candidates: &'a [Version], range: &Range) -> Option<&'a Version> {
    candidates
        .iter()
        .filter(|v| satisfies(v, range))
        .max()
}

/// Split `@scope/name@version` / `name@range` into `(name, version)`.
///
/// Scoped packages (`@types/node@18.0.0`) have their leading `@` stripped
/// from consideration when locating the separating `@`: the name keeps its
/// own leading `@`.
pub fn parse_package_spec(spec: &str) -> (String, Option<String>) {
    let (scope_prefix, rest) = if let Some(stripped) = spec.strip_prefix('@') {
        ("@", stripped)
    } else {
        ("", spec)
    };

    match rest.rsplit_once('@') {
        Some((name, version)) if !name.is_empty() => {
            (format!("{scope_prefix}{name}"), Some(version.to_string()))
        }
        _ => (spec.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_range_picks_highest_minor() {
        let candidates: Vec<Version> = ["1.0.0", "1.1.0", "1.2.0", "2.0.0"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let range: Range = "^1.0.0".parse().unwrap();
        let best = find_best_version(&candidates, &range).unwrap();
        assert_eq!(best.to_string(), "1.2.0");
    }

    #[test]
    fn parses_scoped_package_spec() {
        let (name, version) = parse_package_spec("@types/node@18.0.0");
        assert_eq!(name, "@types/node");
        assert_eq!(version.as_deref(), Some("18.0.0"));
    }

    #[test]
    fn parses_unscoped_package_spec_without_version() {
        let (name, version) = parse_package_spec("lodash");
        assert_eq!(name, "lodash");
        assert_eq!(version, None);
    }

    #[test]
    fn tilde_and_caret_narrow_around_zero_minor() {
        let v29: Version = "0.2.9".parse().unwrap();
        let v30: Version = "0.3.0".parse().unwrap();
        let caret: Range = "^0.2.3".parse().unwrap();
        let tilde: Range = "~0.2.3".parse().unwrap();
        assert!(satisfies(&v29, &caret));
        assert!(!satisfies(&v30, &caret));
        assert!(satisfies(&v29, &tilde));
        assert!(!satisfies(&v30, &tilde));
    }
}
