use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Application configuration loaded from environment variables.
/// Read once at startup; components receive the pieces they need at construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: String,
    pub gemini_api_url: String,
    pub gemini_model: String,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub search_timeout: Duration,
    pub judge_timeout: Duration,
    pub clone_timeout: Duration,
    pub repo_timeout: Duration,
    pub max_concurrent_repos: usize,
    pub max_concurrent_files: usize,
    pub max_files_per_repo: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            google_api_key: require_env("GOOGLE_API_KEY")?,
            gemini_api_url: env_or("GEMINI_API_URL", DEFAULT_GEMINI_API_URL),
            gemini_model: env_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            github_token: optional_env("GITHUB_TOKEN"),
            github_api_url: env_or("GITHUB_API_URL", DEFAULT_GITHUB_API_URL),
            port: parse_env("PORT", 5000)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 15 * 1024 * 1024)?,
            search_timeout: Duration::from_secs(parse_env("SEARCH_TIMEOUT_SECS", 10)?),
            judge_timeout: Duration::from_secs(parse_env("JUDGE_TIMEOUT_SECS", 60)?),
            clone_timeout: Duration::from_secs(parse_env("CLONE_TIMEOUT_SECS", 120)?),
            repo_timeout: Duration::from_secs(parse_env("REPO_TIMEOUT_SECS", 300)?),
            max_concurrent_repos: parse_env("MAX_CONCURRENT_REPOS", 4)?,
            max_concurrent_files: parse_env("MAX_CONCURRENT_FILES", 4)?,
            max_files_per_repo: parse_env("MAX_FILES_PER_REPO", 50)?,
            rust_log: env_or("RUST_LOG", "info"),
        };

        if config.max_concurrent_repos == 0 || config.max_concurrent_files == 0 {
            bail!("MAX_CONCURRENT_REPOS and MAX_CONCURRENT_FILES must be at least 1");
        }

        Ok(config)
    }
}

#[cfg(test)]
impl Config {
    /// Defaults with dead endpoints; nothing built from it reaches the network.
    pub fn for_tests() -> Self {
        Config {
            google_api_key: "test-key".to_string(),
            gemini_api_url: "http://127.0.0.1:9".to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            github_token: None,
            github_api_url: "http://127.0.0.1:9".to_string(),
            port: 0,
            max_upload_bytes: 1024 * 1024,
            search_timeout: Duration::from_secs(1),
            judge_timeout: Duration::from_secs(1),
            clone_timeout: Duration::from_secs(1),
            repo_timeout: Duration::from_secs(5),
            max_concurrent_repos: 2,
            max_concurrent_files: 2,
            max_files_per_repo: 10,
            rust_log: "info".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u64 = parse_env("SCREENER_TEST_UNSET_NUMBER", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("SCREENER_TEST_BAD_NUMBER", "ten");
        let result: Result<u16> = parse_env("SCREENER_TEST_BAD_NUMBER", 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_optional_env_treats_blank_as_missing() {
        std::env::set_var("SCREENER_TEST_BLANK_TOKEN", "   ");
        assert_eq!(optional_env("SCREENER_TEST_BLANK_TOKEN"), None);
    }
}
