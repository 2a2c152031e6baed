//! Link Extractor: finds GitHub repository URLs in free text.
//!
//! Matches `https?://github.com/<owner>/<repo>` where owner and repo are
//! non-empty runs of `[A-Za-z0-9_.-]`. The iterator is `Clone`, so a sequence
//! can be restarted.

use std::sync::OnceLock;

use regex::Regex;

use crate::originality::models::RepositoryLink;

const LINK_PATTERN: &str = r"https?://github\.com/[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+";

/// Compiled once. `None` only if the pattern is invalid, which a test rules out.
fn link_regex() -> Option<&'static Regex> {
    static LINK_RE: OnceLock<Option<Regex>> = OnceLock::new();
    LINK_RE.get_or_init(|| Regex::new(LINK_PATTERN).ok()).as_ref()
}

/// Returns a lazy iterator over repository links in first-seen order, duplicates retained.
pub fn extract_links(text: &str) -> RepositoryLinks<'_> {
    RepositoryLinks { text, pos: 0 }
}

#[derive(Debug, Clone)]
pub struct RepositoryLinks<'a> {
    text: &'a str,
    pos: usize,
}

impl Iterator for RepositoryLinks<'_> {
    type Item = RepositoryLink;

    fn next(&mut self) -> Option<Self::Item> {
        let found = link_regex()?.find_at(self.text, self.pos)?;
        self.pos = found.end();
        Some(RepositoryLink::new(found.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(text: &str) -> Vec<String> {
        extract_links(text).map(|l| l.url).collect()
    }

    #[test]
    fn test_link_pattern_compiles() {
        assert!(link_regex().is_some());
    }

    #[test]
    fn test_no_links_yields_empty() {
        assert!(urls("Experienced engineer, see my portfolio.").is_empty());
        assert!(urls("").is_empty());
    }

    #[test]
    fn test_extracts_in_first_seen_order_with_duplicates() {
        let text = "Projects: https://github.com/alice/foo and http://github.com/bob/bar.\n\
                    Again: https://github.com/alice/foo";
        assert_eq!(
            urls(text),
            vec![
                "https://github.com/alice/foo",
                "http://github.com/bob/bar.",
                "https://github.com/alice/foo",
            ]
        );
    }

    #[test]
    fn test_stops_at_path_separator_after_repo() {
        assert_eq!(
            urls("https://github.com/alice/foo/tree/main/src"),
            vec!["https://github.com/alice/foo"]
        );
    }

    #[test]
    fn test_rejects_profile_only_and_other_hosts() {
        assert!(urls("https://github.com/alice").is_empty());
        assert!(urls("https://github.com/alice/").is_empty());
        assert!(urls("https://gitlab.com/alice/foo").is_empty());
        assert!(urls("ftp://github.com/alice/foo").is_empty());
    }

    #[test]
    fn test_handles_text_around_and_unicode() {
        let text = "Repo→https://github.com/al_ice/my-repo.rs⟵ ok";
        assert_eq!(urls(text), vec!["https://github.com/al_ice/my-repo.rs"]);
    }

    #[test]
    fn test_broken_prefix_does_not_hide_following_link() {
        let text = "httphttps://github.com/a/b";
        assert_eq!(urls(text), vec!["https://github.com/a/b"]);
    }

    #[test]
    fn test_iterator_is_restartable() {
        let links = extract_links("https://github.com/a/b https://github.com/c/d");
        let first: Vec<_> = links.clone().collect();
        let second: Vec<_> = links.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
