//! Originality pipeline: per resume → per link → per file.
//!
//! Flow per repository: fetch (scoped clone) → select files → read snippets →
//! release the clone → search → score → judge. Repositories and files run
//! concurrently under semaphores; results are merged back into input order.
//! Dropping the returned future aborts every spawned task, which kills
//! in-flight `git` processes and removes their temporary directories.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::originality::aggregator::{
    assemble_resume_result, collect_file_records, results_in_link_order,
};
use crate::originality::judge::Judge;
use crate::originality::links::extract_links;
use crate::originality::materializer::RepoFetcher;
use crate::originality::models::{
    FileAnalysisRecord, RepoAnalysisResult, RepositoryLink, ResumeAnalysisResult, Snippet,
    SourceFile, Verdict,
};
use crate::originality::search::CodeSearch;
use crate::originality::similarity::score_match;
use crate::originality::snippet::{read_snippet, select_source_files};

#[derive(Debug, Clone)]
pub struct PipelineLimits {
    pub max_concurrent_repos: usize,
    pub max_concurrent_files: usize,
    pub max_files_per_repo: usize,
    pub repo_timeout: Duration,
}

impl PipelineLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_repos: config.max_concurrent_repos,
            max_concurrent_files: config.max_concurrent_files,
            max_files_per_repo: config.max_files_per_repo,
            repo_timeout: config.repo_timeout,
        }
    }
}

/// A snippet ready for analysis, or the file that could not be read and why.
type PreparedFile = Result<Snippet, (SourceFile, String)>;

pub struct OriginalityPipeline {
    fetcher: Arc<dyn RepoFetcher>,
    search: Arc<dyn CodeSearch>,
    judge: Arc<dyn Judge>,
    limits: PipelineLimits,
}

impl OriginalityPipeline {
    pub fn new(
        fetcher: Arc<dyn RepoFetcher>,
        search: Arc<dyn CodeSearch>,
        judge: Arc<dyn Judge>,
        limits: PipelineLimits,
    ) -> Self {
        Self {
            fetcher,
            search,
            judge,
            limits,
        }
    }

    /// Extracts links from resume text, analyzes them and assembles the result.
    pub async fn analyze_resume(
        self: &Arc<Self>,
        filename: &str,
        resume_text: &str,
        resume_analysis: String,
    ) -> ResumeAnalysisResult {
        let links: Vec<RepositoryLink> = extract_links(resume_text).collect();
        info!("{}: found {} repository links", filename, links.len());
        let github_analysis = self.analyze_links(&links).await;
        assemble_resume_result(filename, resume_analysis, links, github_analysis)
    }

    /// One result per link, in link order. Each distinct URL is analyzed once.
    pub async fn analyze_links(self: &Arc<Self>, links: &[RepositoryLink]) -> Vec<RepoAnalysisResult> {
        if links.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let unique: Vec<RepositoryLink> = links
            .iter()
            .filter(|link| seen.insert(link.url.as_str()))
            .cloned()
            .collect();
        if unique.len() < links.len() {
            debug!(
                "{} duplicate repository links will reuse earlier results",
                links.len() - unique.len()
            );
        }

        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrent_repos));
        let mut tasks = JoinSet::new();
        for link in unique {
            let pipeline = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                pipeline.analyze_repository(&link).await
            });
        }

        let mut by_url = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    by_url.insert(result.repo_url().to_string(), result);
                }
                Err(e) => warn!("Repository analysis task failed: {e}"),
            }
        }

        results_in_link_order(links, by_url)
    }

    /// Clone, walk and read run under the repository deadline; a miss there is a
    /// repository error. The file stage shares the same deadline, but files that
    /// finished before it are kept and only the unfinished ones become `Unknown`.
    async fn analyze_repository(&self, link: &RepositoryLink) -> RepoAnalysisResult {
        let timeout = self.limits.repo_timeout;
        let deadline = Instant::now() + timeout;

        let prepared = match tokio::time::timeout_at(deadline, self.prepare_repository(link)).await {
            Ok(Ok(prepared)) => prepared,
            Ok(Err(error)) => {
                return RepoAnalysisResult::Failed {
                    repo_url: link.url.clone(),
                    error,
                }
            }
            Err(_) => {
                warn!("Preparing {} timed out", link.url);
                return RepoAnalysisResult::Failed {
                    repo_url: link.url.clone(),
                    error: format!("Repository analysis timed out after {}s", timeout.as_secs()),
                };
            }
        };

        info!("Analyzing {} files from {}", prepared.len(), link.url);
        let files = self.analyze_files(prepared, deadline).await;
        RepoAnalysisResult::Analyzed {
            repo_url: link.url.clone(),
            files,
        }
    }

    /// Fetches the repository and reads one snippet per eligible file.
    /// The clone is released before returning.
    async fn prepare_repository(&self, link: &RepositoryLink) -> Result<Vec<PreparedFile>, String> {
        let repo = self.fetcher.fetch(link).await.map_err(|e| {
            warn!("Could not clone {}: {}", link.url, e);
            e.to_string()
        })?;

        let root = repo.root().to_path_buf();
        let max_files = self.limits.max_files_per_repo;
        let files = tokio::task::spawn_blocking(move || select_source_files(&root, max_files))
            .await
            .map_err(|e| format!("Failed to walk repository: {e}"))?;

        let mut prepared: Vec<PreparedFile> = Vec::with_capacity(files.len());
        for (path, file) in files {
            match read_snippet(&path, file.clone()).await {
                Ok(snippet) => prepared.push(Ok(snippet)),
                Err(e) => {
                    warn!("Could not read {} in {}: {}", file.relative_path, link.url, e);
                    prepared.push(Err((file, e.to_string())));
                }
            }
        }

        // Snippets are owned; the clone is no longer needed for the network stages.
        debug!("Releasing clone scope {}", repo.scope().display());
        drop(repo);
        Ok(prepared)
    }

    /// Analyzes files concurrently until `deadline`. Each file succeeds or fails on its own.
    async fn analyze_files(
        &self,
        prepared: Vec<PreparedFile>,
        deadline: Instant,
    ) -> Vec<FileAnalysisRecord> {
        let files: Vec<SourceFile> = prepared
            .iter()
            .map(|p| match p {
                Ok(snippet) => snippet.file.clone(),
                Err((file, _)) => file.clone(),
            })
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrent_files));
        let mut tasks = JoinSet::new();
        for (idx, item) in prepared.into_iter().enumerate() {
            let search = Arc::clone(&self.search);
            let judge = Arc::clone(&self.judge);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let record = match item {
                    Ok(snippet) => {
                        let _permit = semaphore.acquire_owned().await.ok();
                        let verdict = analyze_snippet(search.as_ref(), judge.as_ref(), &snippet).await;
                        FileAnalysisRecord {
                            file: snippet.file,
                            verdict,
                        }
                    }
                    Err((file, reason)) => FileAnalysisRecord {
                        file,
                        verdict: Verdict::unknown(format!("Could not read file: {reason}")),
                    },
                };
                (idx, record)
            });
        }

        let mut outcomes = Vec::with_capacity(files.len());
        let mut missing_reason = "File analysis did not complete";
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(outcome))) => outcomes.push(outcome),
                Ok(Some(Err(e))) => warn!("File analysis task failed: {e}"),
                Ok(None) => break,
                Err(_) => {
                    warn!("{} file analyses still running at the deadline", tasks.len());
                    tasks.abort_all();
                    missing_reason = "File analysis timed out";
                    break;
                }
            }
        }

        collect_file_records(&files, outcomes, missing_reason)
    }
}

/// Search → score → judge for one snippet.
/// Zero matches short-circuits to a deterministic `NoMatch` without calling the judge.
async fn analyze_snippet(search: &dyn CodeSearch, judge: &dyn Judge, snippet: &Snippet) -> Verdict {
    if snippet.normalized.is_empty() {
        return Verdict::no_match();
    }

    let matches = match search
        .search(&snippet.normalized, Some(snippet.file.language))
        .await
    {
        Ok(matches) => matches,
        Err(e) => {
            warn!("Code search failed for {}: {}", snippet.file.relative_path, e);
            Vec::new()
        }
    };

    if matches.is_empty() {
        return Verdict::no_match();
    }
    debug!(
        "{}: {} snippet lines, candidates from {:?}",
        snippet.file.relative_path,
        snippet.raw.lines().count(),
        matches.iter().map(|m| m.repository().unwrap_or("?")).collect::<Vec<_>>()
    );

    let candidates: Vec<_> = matches
        .iter()
        .map(|m| score_match(&snippet.normalized, m))
        .collect();
    judge.judge(&snippet.normalized, &candidates).await
}
