//! Snippet Selector: picks eligible source files in a cloned tree and derives
//! one normalized snippet per file.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::originality::models::{Language, Snippet, SourceFile};

/// Number of non-blank lines taken from the top of each file.
pub const SNIPPET_LINES: usize = 10;

/// Walks `root` and returns eligible files in deterministic (name-sorted) order.
/// `.git` is never descended into. Unreadable directory entries are skipped.
pub fn select_source_files(root: &Path, max_files: usize) -> Vec<(PathBuf, SourceFile)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_git_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.into_path();
            let language = Language::from_path(&path)?;
            let relative = path.strip_prefix(root).ok()?;
            let relative_path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some((
                path,
                SourceFile {
                    relative_path,
                    language,
                },
            ))
        })
        .take(max_files)
        .collect()
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git"
}

/// Reads a file (undecodable bytes replaced) and builds its snippet.
pub async fn read_snippet(path: &Path, file: SourceFile) -> std::io::Result<Snippet> {
    let bytes = tokio::fs::read(path).await?;
    let code = String::from_utf8_lossy(&bytes);
    Ok(build_snippet(file, &code))
}

pub fn build_snippet(file: SourceFile, code: &str) -> Snippet {
    let raw = first_non_blank_lines(code, SNIPPET_LINES);
    let normalized = normalize(&raw);
    Snippet {
        file,
        raw,
        normalized,
    }
}

/// The first `n` lines containing non-whitespace, joined with `\n`.
pub fn first_non_blank_lines(code: &str, n: usize) -> String {
    code.lines()
        .filter(|l| !l.trim().is_empty())
        .take(n)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapses whitespace runs to single spaces and trims. Idempotent.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
