//! Repository list parsing and validation.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StowageError};

/// Placeholder in the base URL replaced by the repository owner.
pub const OWNER_PLACEHOLDER: &str = "{owner}";

/// A repository to check out and build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSpec {
    /// Repository name, `[A-Za-z0-9._-]+`.
    pub name: String,
    /// Clone URL, `{base_url}/{name}.git`.
    pub clone_url: String,
}

fn repo_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid repo name pattern"))
}

/// Letters, digits, `.`, `_` and `-`; `.` and `..` are rejected since names
/// become directory names in the workspace.
pub fn is_valid_repo_name(name: &str) -> bool {
    name != "." && name != ".." && repo_name_pattern().is_match(name)
}

/// Substitute `{owner}` in a base URL template.
pub fn expand_base_url(template: &str, owner: &str) -> String {
    template.replace(OWNER_PLACEHOLDER, owner)
}

/// Parse a comma-delimited repository list.
///
/// Entries are trimmed, empty entries dropped, and duplicates removed keeping
/// the first occurrence. Every invalid name is reported at once. An empty
/// result is an error: there would be nothing to build.
pub fn parse_repo_list(raw: &str, base_url: &str) -> Result<Vec<RepoSpec>> {
    let mut seen = HashSet::new();
    let names: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(*name))
        .collect();

    let invalid: Vec<String> = names
        .iter()
        .filter(|name| !is_valid_repo_name(name))
        .map(|name| name.to_string())
        .collect();
    if !invalid.is_empty() {
        return Err(StowageError::InvalidRepoNames { names: invalid });
    }

    if names.is_empty() {
        return Err(StowageError::EmptyRepoList);
    }

    let base = base_url.trim_end_matches('/');
    Ok(names
        .into_iter()
        .map(|name| RepoSpec {
            name: name.to_string(),
            clone_url: format!("{base}/{name}.git"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://git.example.com/acme";

    fn names(specs: &[RepoSpec]) -> Vec<&str> {
        specs.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn dedups_trims_and_preserves_order() {
        let specs = parse_repo_list("a, a ,b,,b", BASE).unwrap();
        assert_eq!(names(&specs), vec!["a", "b"]);
    }

    #[test]
    fn parsing_is_idempotent() {
        let first = parse_repo_list("svc-b, svc-a, svc-b", BASE).unwrap();
        let rejoined = names(&first).join(",");
        let second = parse_repo_list(&rejoined, BASE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn builds_clone_urls() {
        let specs = parse_repo_list("svcA", "https://git.example.com/acme/").unwrap();
        assert_eq!(specs[0].clone_url, "https://git.example.com/acme/svcA.git");
    }

    #[test]
    fn reports_all_invalid_names() {
        let err = parse_repo_list("good, bad name, also/bad, ok.repo, $x", BASE).unwrap_err();
        match err {
            StowageError::InvalidRepoNames { names } => {
                assert_eq!(names, vec!["bad name", "also/bad", "$x"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(matches!(
            parse_repo_list(" , ,", BASE),
            Err(StowageError::EmptyRepoList)
        ));
    }

    #[test]
    fn accepts_dots_underscores_dashes() {
        for name in ["a.b", "a_b", "a-b", "A9"] {
            assert!(is_valid_repo_name(name), "{name}");
        }
        assert!(!is_valid_repo_name(""));
        assert!(!is_valid_repo_name("a b"));
        assert!(!is_valid_repo_name(".."));
    }

    #[test]
    fn expands_owner_placeholder() {
        assert_eq!(
            expand_base_url("https://github.com/{owner}", "acme"),
            "https://github.com/acme"
        );
        assert_eq!(
            expand_base_url("https://git.internal/team", "acme"),
            "https://git.internal/team"
        );
    }
}
