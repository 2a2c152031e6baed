//! Similarity Scorer: fuzzy token-set similarity in [0, 1].
//!
//! Tokens are whitespace-separated. The score is the best normalized Indel
//! ratio among the sorted intersection and the two "intersection + remainder"
//! strings, so token order and repetition do not matter. When one token set
//! contains the other the score is 1.0.

use std::collections::BTreeSet;

use crate::originality::models::{clamp_unit, Evidence, SearchMatch};

/// Upper bound on candidate characters fed to the comparison.
pub const MAX_COMPARE_CHARS: usize = 4000;

/// Scores a search match against the query snippet. A match without
/// retrieved content carries no evidence of similarity and scores 0.0.
/// Both sides are capped at `MAX_COMPARE_CHARS` to bound the LCS cost.
pub fn score_match(snippet: &str, candidate: &SearchMatch) -> Evidence {
    let snippet = truncate_chars(snippet, MAX_COMPARE_CHARS);
    let similarity = candidate
        .content
        .as_deref()
        .map(|content| token_set_ratio(snippet, truncate_chars(content, MAX_COMPARE_CHARS)))
        .unwrap_or(0.0);
    Evidence::new(candidate.url.clone(), similarity)
}

pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !intersection.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 1.0;
    }

    let sect = intersection.join(" ");
    let combined_ab = join_nonempty(&sect, &diff_ab.join(" "));
    let combined_ba = join_nonempty(&sect, &diff_ba.join(" "));

    let mut best = indel_ratio(&combined_ab, &combined_ba);
    if !sect.is_empty() {
        best = best
            .max(indel_ratio(&sect, &combined_ab))
            .max(indel_ratio(&sect, &combined_ba));
    }
    clamp_unit(best)
}

fn join_nonempty(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}

/// Normalized Indel similarity: `2 * LCS / (len(a) + len(b))`, over chars.
pub fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(content: Option<&str>) -> SearchMatch {
        SearchMatch {
            url: "https://github.com/x/y/blob/main/a.py".to_string(),
            content: content.map(String::from),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_identical_text_scores_one() {
        assert_eq!(token_set_ratio("def foo(): return 1", "def foo(): return 1"), 1.0);
    }

    #[test]
    fn test_reordered_tokens_score_one() {
        assert_eq!(token_set_ratio("a b c", "c a b b"), 1.0);
    }

    #[test]
    fn test_disjoint_text_scores_low() {
        let score = token_set_ratio("alpha beta gamma", "xyz qqq www");
        assert!(score < 0.3, "score was {score}");
    }

    #[test]
    fn test_partial_overlap_is_between_bounds() {
        let score = token_set_ratio("import os import sys def main", "import os def helper");
        assert!(score > 0.5 && score < 1.0, "score was {score}");
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        assert_eq!(token_set_ratio("", "abc"), 0.0);
        assert_eq!(token_set_ratio("abc", "   "), 0.0);
    }

    #[test]
    fn test_indel_ratio_known_value() {
        // LCS("abcd", "abed") = 3 → 6 / 8
        assert!((indel_ratio("abcd", "abed") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_score_match_uses_candidate_content_not_snippet() {
        let evidence = score_match("fn main() {}", &candidate(Some("completely different words")));
        assert!(evidence.similarity < 1.0);
    }

    #[test]
    fn test_score_match_without_content_is_zero() {
        let evidence = score_match("fn main() {}", &candidate(None));
        assert_eq!(evidence.similarity, 0.0);
        assert_eq!(evidence.url, "https://github.com/x/y/blob/main/a.py");
    }

    #[test]
    fn test_score_match_ignores_snippet_beyond_budget() {
        let mut snippet = "a ".repeat(MAX_COMPARE_CHARS);
        snippet.push_str("qqq");
        let evidence = score_match(&snippet, &candidate(Some("a www")));
        // Only the leading `a` tokens fit the budget, so they are a subset of the candidate.
        assert_eq!(evidence.similarity, 1.0);
        assert!(token_set_ratio(&snippet, "a www") < 1.0);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
