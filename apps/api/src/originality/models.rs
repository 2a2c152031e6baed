//! Data model for the code-originality pipeline.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A repository reference found in resume text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RepositoryLink {
    pub url: String,
}

impl RepositoryLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Source languages eligible for analysis, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Cpp,
    Go,
    Rust,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Some(Language::Python),
            "js" => Some(Language::JavaScript),
            "ts" => Some(Language::TypeScript),
            "java" => Some(Language::Java),
            "cpp" => Some(Language::Cpp),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Value for the code-search `language:` qualifier.
    pub fn search_qualifier(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::Go => "go",
            Language::Rust => "rust",
        }
    }
}

/// A file inside a cloned repository eligible for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the repository root, `/`-separated.
    pub relative_path: String,
    pub language: Language,
}

/// A normalized text fragment representing one source file.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub file: SourceFile,
    pub raw: String,
    pub normalized: String,
}

/// One candidate result returned by the code-search service.
#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub url: String,
    /// Content of the candidate used for similarity scoring, when it could be obtained.
    pub content: Option<String>,
    pub metadata: serde_json::Value,
}

impl SearchMatch {
    /// `owner/name` of the repository holding the match, when the service reported it.
    pub fn repository(&self) -> Option<&str> {
        self.metadata.get("repository")?.get("full_name")?.as_str()
    }
}

/// Originality verdict kinds. Wire labels follow the judge prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictKind {
    Copied,
    PossiblyCopied,
    NoMatch,
    Unknown,
}

impl VerdictKind {
    pub fn label(&self) -> &'static str {
        match self {
            VerdictKind::Copied => "Copied",
            VerdictKind::PossiblyCopied => "Possibly Copied",
            VerdictKind::NoMatch => "No Match",
            VerdictKind::Unknown => "Unknown",
        }
    }

    /// Lenient parse: ignores case, whitespace, `_` and `-`. Anything unrecognized is `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "copied" => VerdictKind::Copied,
            "possiblycopied" => VerdictKind::PossiblyCopied,
            "nomatch" => VerdictKind::NoMatch,
            _ => VerdictKind::Unknown,
        }
    }
}

impl Serialize for VerdictKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for VerdictKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(VerdictKind::parse_lenient)
            .unwrap_or(VerdictKind::Unknown))
    }
}

/// One piece of evidence: a candidate URL and its similarity to the snippet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence {
    pub url: String,
    pub similarity: f64,
}

impl Evidence {
    pub fn new(url: impl Into<String>, similarity: f64) -> Self {
        Self {
            url: url.into(),
            similarity: clamp_unit(similarity),
        }
    }
}

/// Structured originality judgment for one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub verdict: VerdictKind,
    pub confidence: f64,
    pub top_evidence: Vec<Evidence>,
    pub reasoning: String,
}

impl Verdict {
    pub fn new(
        verdict: VerdictKind,
        confidence: f64,
        top_evidence: Vec<Evidence>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            verdict,
            confidence: clamp_unit(confidence),
            top_evidence,
            reasoning: reasoning.into(),
        }
    }

    /// Deterministic verdict used when the search service found nothing.
    pub fn no_match() -> Self {
        Self::new(VerdictKind::NoMatch, 1.0, Vec::new(), "No similar code found")
    }

    /// Fallback verdict: nothing could be concluded.
    pub fn unknown(reasoning: impl Into<String>) -> Self {
        Self::new(VerdictKind::Unknown, 0.0, Vec::new(), reasoning)
    }
}

/// Outcome for one analyzed file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAnalysisRecord {
    pub file: SourceFile,
    pub verdict: Verdict,
}

/// Outcome for one repository link: file records or a single error, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum RepoAnalysisResult {
    Analyzed {
        repo_url: String,
        files: Vec<FileAnalysisRecord>,
    },
    Failed {
        repo_url: String,
        error: String,
    },
}

impl RepoAnalysisResult {
    pub fn repo_url(&self) -> &str {
        match self {
            RepoAnalysisResult::Analyzed { repo_url, .. } => repo_url,
            RepoAnalysisResult::Failed { repo_url, .. } => repo_url,
        }
    }
}

/// Outcome for one uploaded resume.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeAnalysisResult {
    pub filename: String,
    pub resume_analysis: String,
    #[serde(serialize_with = "serialize_flat_analysis")]
    pub github_analysis: Vec<RepoAnalysisResult>,
    pub github_links: Vec<RepositoryLink>,
}

/// One element of the flat `github_analysis` list on the wire.
#[derive(Serialize)]
#[serde(untagged)]
enum AnalysisEntry<'a> {
    File {
        repo_url: &'a str,
        file: &'a str,
        language: Language,
        #[serde(flatten)]
        verdict: &'a Verdict,
    },
    Error {
        repo_url: &'a str,
        error: &'a str,
    },
}

fn serialize_flat_analysis<S: Serializer>(
    results: &[RepoAnalysisResult],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let entries = results.iter().flat_map(|result| {
        match result {
            RepoAnalysisResult::Analyzed { repo_url, files } => files
                .iter()
                .map(|record| AnalysisEntry::File {
                    repo_url,
                    file: &record.file.relative_path,
                    language: record.file.language,
                    verdict: &record.verdict,
                })
                .collect(),
            RepoAnalysisResult::Failed { repo_url, error } => {
                vec![AnalysisEntry::Error { repo_url, error }]
            }
        }
    });
    serializer.collect_seq(entries)
}

/// Clamps to [0, 1]; NaN becomes 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_kind_parse_lenient() {
        assert_eq!(VerdictKind::parse_lenient("Copied"), VerdictKind::Copied);
        assert_eq!(
            VerdictKind::parse_lenient("Possibly Copied"),
            VerdictKind::PossiblyCopied
        );
        assert_eq!(
            VerdictKind::parse_lenient("possibly_copied"),
            VerdictKind::PossiblyCopied
        );
        assert_eq!(VerdictKind::parse_lenient("NO-MATCH"), VerdictKind::NoMatch);
        assert_eq!(VerdictKind::parse_lenient("plagiarised"), VerdictKind::Unknown);
    }

    #[test]
    fn test_verdict_kind_deserializes_non_string_as_unknown() {
        let kind: VerdictKind = serde_json::from_str("42").unwrap();
        assert_eq!(kind, VerdictKind::Unknown);
    }

    #[test]
    fn test_verdict_new_clamps_confidence() {
        assert_eq!(Verdict::new(VerdictKind::Copied, 1.7, vec![], "").confidence, 1.0);
        assert_eq!(Verdict::new(VerdictKind::Copied, -0.2, vec![], "").confidence, 0.0);
        assert_eq!(Verdict::new(VerdictKind::Copied, f64::NAN, vec![], "").confidence, 0.0);
    }

    #[test]
    fn test_search_match_repository_from_metadata() {
        let mut m = SearchMatch {
            url: "https://github.com/o/r/blob/main/a.py".to_string(),
            content: None,
            metadata: serde_json::json!({"repository": {"full_name": "o/r"}}),
        };
        assert_eq!(m.repository(), Some("o/r"));
        m.metadata = serde_json::Value::Null;
        assert_eq!(m.repository(), None);
    }

    #[test]
    fn test_evidence_similarity_clamped() {
        assert_eq!(Evidence::new("u", 3.0).similarity, 1.0);
    }

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("PY"), Some(Language::Python));
        assert_eq!(Language::from_extension("cpp"), Some(Language::Cpp));
        assert_eq!(Language::from_extension("md"), None);
        assert_eq!(
            Language::from_path(Path::new("src/app.ts")),
            Some(Language::TypeScript)
        );
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_resume_result_serializes_flat_analysis() {
        let result = ResumeAnalysisResult {
            filename: "cv.pdf".to_string(),
            resume_analysis: "8/10".to_string(),
            github_analysis: vec![
                RepoAnalysisResult::Analyzed {
                    repo_url: "https://github.com/a/b".to_string(),
                    files: vec![FileAnalysisRecord {
                        file: SourceFile {
                            relative_path: "src/main.py".to_string(),
                            language: Language::Python,
                        },
                        verdict: Verdict::no_match(),
                    }],
                },
                RepoAnalysisResult::Failed {
                    repo_url: "https://github.com/a/missing".to_string(),
                    error: "not found".to_string(),
                },
            ],
            github_links: vec![
                RepositoryLink::new("https://github.com/a/b"),
                RepositoryLink::new("https://github.com/a/missing"),
            ],
        };

        let value = serde_json::to_value(&result).unwrap();
        let analysis = value["github_analysis"].as_array().unwrap();
        assert_eq!(analysis.len(), 2);
        assert_eq!(analysis[0]["file"], "src/main.py");
        assert_eq!(analysis[0]["language"], "python");
        assert_eq!(analysis[0]["verdict"], "No Match");
        assert_eq!(analysis[0]["confidence"], 1.0);
        assert_eq!(analysis[0]["reasoning"], "No similar code found");
        assert!(analysis[0].get("error").is_none());
        assert_eq!(analysis[1]["repo_url"], "https://github.com/a/missing");
        assert_eq!(analysis[1]["error"], "not found");
        assert!(analysis[1].get("verdict").is_none());
        assert_eq!(value["github_links"][0], "https://github.com/a/b");
    }
}
