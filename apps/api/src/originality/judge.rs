//! Verdict Judge: asks the generative model for a structured originality verdict.
//!
//! Model output is untrusted text. `parse_verdict` never fails: anything that is
//! not a usable JSON object becomes an `Unknown` verdict carrying the raw text.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{strip_json_fences, LlmClient};
use crate::originality::models::{Evidence, Verdict, VerdictKind};
use crate::originality::prompts::JUDGE_PROMPT_TEMPLATE;

/// Character budget for the snippet embedded in the prompt.
pub const MAX_PROMPT_SNIPPET_CHARS: usize = 2000;

/// Produces a verdict for a snippet and its scored candidates. Never fails.
///
/// Carried by the pipeline as `Arc<dyn Judge>`.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, snippet: &str, candidates: &[Evidence]) -> Verdict;
}

/// Judge backed by the shared `LlmClient`.
pub struct LlmJudge {
    llm: LlmClient,
}

impl LlmJudge {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(&self, snippet: &str, candidates: &[Evidence]) -> Verdict {
        let prompt = build_judge_prompt(snippet, candidates);
        match self.llm.call_text(&prompt, Some(JSON_ONLY_SYSTEM)).await {
            Ok(text) => parse_verdict(&text),
            Err(e) => {
                warn!("Judge call failed: {e}");
                Verdict::unknown(format!("Judge unavailable: {e}"))
            }
        }
    }
}

pub fn build_judge_prompt(snippet: &str, candidates: &[Evidence]) -> String {
    let snippet = truncate_chars(snippet, MAX_PROMPT_SNIPPET_CHARS);
    let matches = serde_json::to_string_pretty(candidates).unwrap_or_else(|_| "[]".to_string());
    JUDGE_PROMPT_TEMPLATE
        .replace("{matches}", &matches)
        .replace("{snippet}", snippet)
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default = "unknown_kind")]
    verdict: VerdictKind,
    #[serde(default, deserialize_with = "lenient_f64")]
    confidence: f64,
    #[serde(default, deserialize_with = "lenient_evidence")]
    top_evidence: Vec<Evidence>,
    #[serde(default, deserialize_with = "lenient_string")]
    reasoning: String,
}

fn unknown_kind() -> VerdictKind {
    VerdictKind::Unknown
}

/// Parses model output into a verdict, falling back to `Unknown` with the raw text.
pub fn parse_verdict(text: &str) -> Verdict {
    let stripped = strip_json_fences(text);
    let raw = parse_object(stripped).or_else(|| outermost_object(stripped).and_then(parse_object));

    match raw {
        Some(raw) => Verdict::new(raw.verdict, raw.confidence, raw.top_evidence, raw.reasoning),
        None => {
            warn!("Judge returned unparseable output; falling back to Unknown");
            Verdict::unknown(text)
        }
    }
}

/// Only a JSON object is accepted; arrays and scalars are rejected.
fn parse_object(text: &str) -> Option<RawVerdict> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn value_to_f64(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_f64(&value))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Keeps evidence entries that carry a string `url`; similarity is clamped.
fn lenient_evidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Evidence>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let Some(items) = value.as_array() else {
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .filter_map(|item| {
            let url = item.get("url")?.as_str()?;
            let similarity = item.get("similarity").map(value_to_f64).unwrap_or(0.0);
            Some(Evidence::new(url, similarity))
        })
        .collect())
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

    #[test]
    fn test_parse_well_formed_verdict() {
        let text = r#"{
            "verdict": "Possibly Copied",
            "confidence": 0.7,
            "top_evidence": [{"url": "https://github.com/o/r/blob/main/a.py", "similarity": 0.82}],
            "reasoning": "Same structure and names."
        }"#;
        let verdict = parse_verdict(text);
        assert_eq!(verdict.verdict, VerdictKind::PossiblyCopied);
        assert!((verdict.confidence - 0.7).abs() < 1e-9);
        assert_eq!(verdict.top_evidence.len(), 1);
        assert!((verdict.top_evidence[0].similarity - 0.82).abs() < 1e-9);
        assert_eq!(verdict.reasoning, "Same structure and names.");
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"verdict\": \"Copied\", \"confidence\": 0.95, \"top_evidence\": [], \"reasoning\": \"identical\"}\n```";
        let verdict = parse_verdict(text);
        assert_eq!(verdict.verdict, VerdictKind::Copied);
        assert!((verdict.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_parse_json_embedded_in_prose() {
        let text = "Here is my analysis:\n{\"verdict\": \"No Match\", \"confidence\": 0.9, \"top_evidence\": [], \"reasoning\": \"different\"}\nThanks!";
        let verdict = parse_verdict(text);
        assert_eq!(verdict.verdict, VerdictKind::NoMatch);
    }

    #[test]
    fn test_malformed_output_falls_back_to_unknown() {
        let text = "I think this code is probably original.";
        let verdict = parse_verdict(text);
        assert_eq!(verdict.verdict, VerdictKind::Unknown);
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.top_evidence.is_empty());
        assert_eq!(verdict.reasoning, text);
    }

    #[test]
    fn test_non_object_json_falls_back_to_unknown() {
        for text in ["[1, 2, 3]", "42", "\"Copied\"", "", "{ not json }"] {
            let verdict = parse_verdict(text);
            assert_eq!(verdict.verdict, VerdictKind::Unknown, "input {text:?}");
            assert_eq!(verdict.confidence, 0.0);
            assert!(verdict.top_evidence.is_empty());
        }
    }

    #[test]
    fn test_confidence_is_clamped_and_coerced() {
        let high = parse_verdict(r#"{"verdict": "Copied", "confidence": 7.5}"#);
        assert_eq!(high.confidence, 1.0);

        let negative = parse_verdict(r#"{"verdict": "Copied", "confidence": -1}"#);
        assert_eq!(negative.confidence, 0.0);

        let textual = parse_verdict(r#"{"verdict": "Copied", "confidence": "0.4"}"#);
        assert!((textual.confidence - 0.4).abs() < 1e-9);

        let garbage = parse_verdict(r#"{"verdict": "Copied", "confidence": {"x": 1}}"#);
        assert_eq!(garbage.confidence, 0.0);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let verdict = parse_verdict("{}");
        assert_eq!(verdict.verdict, VerdictKind::Unknown);
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.top_evidence.is_empty());
        assert_eq!(verdict.reasoning, "");
    }

    #[test]
    fn test_evidence_without_url_is_dropped_and_similarity_clamped() {
        let verdict = parse_verdict(
            r#"{"verdict": "Copied", "confidence": 0.5, "top_evidence": [
                {"similarity": 0.9},
                {"url": "https://github.com/a/b", "similarity": 1.5},
                "nonsense"
            ]}"#,
        );
        assert_eq!(verdict.top_evidence, vec![Evidence::new("https://github.com/a/b", 1.0)]);
    }

    #[test]
    fn test_prompt_truncates_snippet_and_lists_matches() {
        let snippet = "x".repeat(MAX_PROMPT_SNIPPET_CHARS + 500);
        let candidates = vec![Evidence::new("https://github.com/o/r/blob/main/a.py", 0.5)];
        let prompt = build_judge_prompt(&snippet, &candidates);

        assert!(prompt.contains(&"x".repeat(MAX_PROMPT_SNIPPET_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_PROMPT_SNIPPET_CHARS + 1)));
        assert!(prompt.contains("https://github.com/o/r/blob/main/a.py"));
        assert!(prompt.contains("\"similarity\": 0.5"));
    }

    #[test]
    fn test_prompt_snippet_placeholder_in_snippet_is_not_expanded() {
        let prompt = build_judge_prompt("let s = \"{matches}\";", &[]);
        assert!(prompt.contains("let s = \"{matches}\";"));
    }
}
