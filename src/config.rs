//! Resolver configuration loaded from `~/.config/mashahid/config.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Tunables for fetching and fan-out.
///
/// Every field has a default, so an empty or missing file is valid.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound for resolving one server reference, fetches included.
    pub task_timeout_secs: u64,
    /// Maximum number of server references resolved at the same time.
    pub max_concurrency: usize,
    /// TCP/TLS connect timeout for the HTTP fetcher.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout for the HTTP fetcher.
    pub request_timeout_secs: u64,
    /// Redirects followed per request.
    pub max_redirects: usize,
    /// Fixed User-Agent instead of a rotated browser profile.
    pub user_agent: Option<String>,
    /// Extra host fragments per extractor name, e.g. `vidbom = ["vdbtm.shop"]`.
    pub extra_domains: BTreeMap<String, Vec<String>>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: 15,
            max_concurrency: 16,
            connect_timeout_secs: 10,
            request_timeout_secs: 20,
            max_redirects: 10,
            user_agent: None,
            extra_domains: BTreeMap::new(),
        }
    }
}

impl ResolverConfig {
    /// Load from the default location.
    ///
    /// Returns defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    #[must_use]
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_secs = timeout.as_secs().max(1);
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Return the path to the config file.
fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mashahid")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config: ResolverConfig = toml::from_str("").unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.task_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn parse_partial_config() {
        let toml_str = r#"
task_timeout_secs = 8
user_agent = "Mozilla/5.0 (X11; Linux x86_64)"

[extra_domains]
vidbom = ["vdbtm.shop", "vedbom.org"]
"#;
        let config: ResolverConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.task_timeout_secs, 8);
        assert_eq!(config.max_concurrency, 16);
        assert_eq!(
            config.user_agent.as_deref(),
            Some("Mozilla/5.0 (X11; Linux x86_64)")
        );
        assert_eq!(config.extra_domains["vidbom"], vec!["vdbtm.shop", "vedbom.org"]);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = ResolverConfig::load_from(Path::new("/nonexistent/mashahid.toml")).unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn invalid_toml_is_reported() {
        let dir = std::env::temp_dir().join(format!("mashahid-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "task_timeout_secs = \"soon\"").unwrap();

        let err = ResolverConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("invalid TOML"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn builder_clamps_timeout_to_one_second() {
        let config = ResolverConfig::default().with_task_timeout(Duration::from_millis(10));
        assert_eq!(config.task_timeout_secs, 1);
    }
}
