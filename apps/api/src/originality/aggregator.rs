//! Aggregator: merges per-file and per-repository outcomes back into order.
//!
//! Concurrent stages finish in any order; these helpers restore file order
//! within a repository and link order within a resume. A slot whose task never
//! reported back (panic, deadline) is filled with a fallback instead of being dropped.

use std::collections::HashMap;

use crate::originality::models::{
    FileAnalysisRecord, RepoAnalysisResult, RepositoryLink, ResumeAnalysisResult, SourceFile,
    Verdict,
};

/// Orders `(index, record)` outcomes by the position of their file in `files`.
/// Files without an outcome get an `Unknown` verdict with `missing_reason`.
pub fn collect_file_records(
    files: &[SourceFile],
    outcomes: Vec<(usize, FileAnalysisRecord)>,
    missing_reason: &str,
) -> Vec<FileAnalysisRecord> {
    let mut slots: Vec<Option<FileAnalysisRecord>> = vec![None; files.len()];
    for (idx, record) in outcomes {
        if let Some(slot) = slots.get_mut(idx) {
            *slot = Some(record);
        }
    }
    slots
        .into_iter()
        .zip(files)
        .map(|(slot, file)| {
            slot.unwrap_or_else(|| FileAnalysisRecord {
                file: file.clone(),
                verdict: Verdict::unknown(missing_reason),
            })
        })
        .collect()
}

/// One result per link, in link order. Duplicate links share the result of their URL.
pub fn results_in_link_order(
    links: &[RepositoryLink],
    mut by_url: HashMap<String, RepoAnalysisResult>,
) -> Vec<RepoAnalysisResult> {
    let mut remaining: HashMap<&str, usize> = HashMap::new();
    for link in links {
        *remaining.entry(link.url.as_str()).or_default() += 1;
    }

    links
        .iter()
        .map(|link| {
            let left = remaining.get_mut(link.url.as_str()).map(|n| {
                *n -= 1;
                *n
            });
            // The last occurrence takes ownership instead of cloning.
            let result = if left == Some(0) {
                by_url.remove(&link.url)
            } else {
                by_url.get(&link.url).cloned()
            };
            result.unwrap_or_else(|| RepoAnalysisResult::Failed {
                repo_url: link.url.clone(),
                error: "Repository analysis did not complete".to_string(),
            })
        })
        .collect()
}

/// Builds the per-resume result returned to the caller.
pub fn assemble_resume_result(
    filename: impl Into<String>,
    resume_analysis: impl Into<String>,
    github_links: Vec<RepositoryLink>,
    github_analysis: Vec<RepoAnalysisResult>,
) -> ResumeAnalysisResult {
    ResumeAnalysisResult {
        filename: filename.into(),
        resume_analysis: resume_analysis.into(),
        github_analysis,
        github_links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::originality::models::{Language, VerdictKind};

    fn file(path: &str) -> SourceFile {
        SourceFile {
            relative_path: path.to_string(),
            language: Language::Python,
        }
    }

    fn record(path: &str) -> FileAnalysisRecord {
        FileAnalysisRecord {
            file: file(path),
            verdict: Verdict::no_match(),
        }
    }

    #[test]
    fn test_collect_file_records_restores_order_and_fills_gaps() {
        let files = vec![file("a.py"), file("b.py"), file("c.py")];
        let outcomes = vec![(2, record("c.py")), (0, record("a.py"))];

        let records = collect_file_records(&files, outcomes, "File analysis timed out");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].file.relative_path, "a.py");
        assert_eq!(records[1].file.relative_path, "b.py");
        assert_eq!(records[1].verdict.verdict, VerdictKind::Unknown);
        assert_eq!(records[1].verdict.reasoning, "File analysis timed out");
        assert_eq!(records[2].file.relative_path, "c.py");
        assert_eq!(records[2].verdict.verdict, VerdictKind::NoMatch);
    }

    #[test]
    fn test_results_in_link_order_duplicates_and_missing() {
        let links = vec![
            RepositoryLink::new("https://github.com/a/one"),
            RepositoryLink::new("https://github.com/a/two"),
            RepositoryLink::new("https://github.com/a/one"),
        ];
        let mut by_url = HashMap::new();
        by_url.insert(
            "https://github.com/a/one".to_string(),
            RepoAnalysisResult::Failed {
                repo_url: "https://github.com/a/one".to_string(),
                error: "boom".to_string(),
            },
        );

        let results = results_in_link_order(&links, by_url);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0], results[2]);
        assert_eq!(results[1].repo_url(), "https://github.com/a/two");
        assert!(matches!(
            &results[1],
            RepoAnalysisResult::Failed { error, .. } if error.contains("did not complete")
        ));
    }

    #[test]
    fn test_assemble_without_links_is_empty_analysis() {
        let result = assemble_resume_result("cv.docx", "Score: 7/10", vec![], vec![]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "filename": "cv.docx",
                "resume_analysis": "Score: 7/10",
                "github_analysis": [],
                "github_links": []
            })
        );
    }
}
