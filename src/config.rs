//! Configuration for pruning, rewriting and the activity data sources

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{MaintainersError, Result};

/// Main configuration for the maintainers tooling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintainersConfig {
    /// Network configuration
    pub network: NetworkConfig,
    /// Thresholds below which a maintainer counts as inactive
    pub thresholds: ActivityThresholds,
    /// How ownership files are rewritten
    pub rewrite: RewriteConfig,
    /// Which users and files a prune run considers
    pub prune: PruneOptions,
}

/// Network configuration for API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum number of retries for failed requests
    pub max_retries: u32,
    /// Delay between GitHub search requests (milliseconds)
    pub request_delay_ms: u64,
    /// Pause after GitHub reports a rate limit (seconds)
    pub rate_limit_backoff_secs: u64,
    /// How many rate-limit pauses to sit through for one user before giving up
    pub rate_limit_max_waits: u32,
    /// GitHub API token (optional, for higher rate limits)
    #[serde(skip_serializing)]
    pub github_token: Option<String>,
    /// Base URL of the GitHub REST API
    pub github_api_url: String,
    /// Grafana datasource query endpoint of devstats
    pub devstats_url: String,
}

/// Activity below (or at) both limits marks a maintainer for pruning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityThresholds {
    /// Maximum devstats contributions in the period
    pub max_contributions: u64,
    /// Maximum merged PRs commented on in the last year
    pub max_pr_comments: u64,
}

/// How the batch rewriter writes files back
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Indentation width of the serialized YAML
    pub indent: usize,
    /// Report what would change without touching any file
    pub dry_run: bool,
}

/// Inputs of a prune run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneOptions {
    /// Repository name as known to devstats
    pub devstats_repository: String,
    /// `owner/name` of the GitHub repository searched for PR comments
    pub github_repository: String,
    /// Branch whose OWNERS files `validate --check-github` compares against
    pub github_branch: String,
    /// Period of the devstats contribution counts
    pub period: Period,
    /// Skip the GitHub PR comment lookups
    pub skip_github: bool,
    /// Skip the devstats contribution lookup
    pub skip_devstats: bool,
    /// Users to prune regardless of their activity
    pub include: BTreeSet<String>,
    /// Users never to prune
    pub exclude: BTreeSet<String>,
    /// Files (relative to the repository root) never to rewrite
    pub exclude_files: BTreeSet<String>,
}

/// Devstats reporting period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Year,
    Quarter,
    Month,
}

impl Period {
    /// Single-letter code devstats uses in series names
    pub fn code(&self) -> &'static str {
        match self {
            Self::Year => "y",
            Self::Quarter => "q",
            Self::Month => "m",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year => write!(f, "year"),
            Self::Quarter => write!(f, "quarter"),
            Self::Month => write!(f, "month"),
        }
    }
}

impl FromStr for Period {
    type Err = MaintainersError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "y" | "year" => Ok(Self::Year),
            "q" | "quarter" => Ok(Self::Quarter),
            "m" | "month" => Ok(Self::Month),
            other => Err(MaintainersError::config(format!(
                "unknown period '{}', expected year, quarter or month",
                other
            ))),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            request_delay_ms: 2000,
            rate_limit_backoff_secs: 5,
            rate_limit_max_waits: 60,
            github_token: std::env::var("GITHUB_TOKEN").ok(),
            github_api_url: "https://api.github.com".to_string(),
            devstats_url: "https://k8s.devstats.cncf.io/api/ds/query".to_string(),
        }
    }
}

impl NetworkConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get request delay as Duration
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Get rate limit backoff as Duration
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }
}

impl Default for ActivityThresholds {
    fn default() -> Self {
        Self {
            max_contributions: 20,
            max_pr_comments: 10,
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            indent: 2,
            dry_run: true,
        }
    }
}

impl RewriteConfig {
    /// Check the indent against what the serializer accepts
    pub fn validate(&self) -> Result<()> {
        if !(crate::yaml::MIN_INDENT..=crate::yaml::MAX_INDENT).contains(&self.indent) {
            return Err(MaintainersError::config(format!(
                "indent must be between {} and {}, got {}",
                crate::yaml::MIN_INDENT,
                crate::yaml::MAX_INDENT,
                self.indent
            )));
        }
        Ok(())
    }
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self {
            devstats_repository: "kubernetes/kubernetes".to_string(),
            github_repository: "kubernetes/kubernetes".to_string(),
            github_branch: "master".to_string(),
            period: Period::default(),
            skip_github: false,
            skip_devstats: false,
            include: BTreeSet::new(),
            exclude: BTreeSet::new(),
            exclude_files: BTreeSet::new(),
        }
    }
}

impl MaintainersConfig {
    /// Create a new builder for MaintainersConfig
    pub fn builder() -> MaintainersConfigBuilder {
        MaintainersConfigBuilder::default()
    }

    /// Load a configuration from a TOML file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        if config.network.github_token.is_none() {
            config.network.github_token = std::env::var("GITHUB_TOKEN").ok();
        }
        config.rewrite.validate()?;
        Ok(config)
    }
}

/// Builder for MaintainersConfig
#[derive(Default)]
pub struct MaintainersConfigBuilder {
    network: Option<NetworkConfig>,
    thresholds: Option<ActivityThresholds>,
    rewrite: Option<RewriteConfig>,
    prune: Option<PruneOptions>,
}

impl MaintainersConfigBuilder {
    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn thresholds(mut self, thresholds: ActivityThresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn rewrite(mut self, rewrite: RewriteConfig) -> Self {
        self.rewrite = Some(rewrite);
        self
    }

    pub fn prune(mut self, prune: PruneOptions) -> Self {
        self.prune = Some(prune);
        self
    }

    pub fn build(self) -> MaintainersConfig {
        MaintainersConfig {
            network: self.network.unwrap_or_default(),
            thresholds: self.thresholds.unwrap_or_default(),
            rewrite: self.rewrite.unwrap_or_default(),
            prune: self.prune.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MaintainersConfig::default();
        assert_eq!(config.thresholds.max_contributions, 20);
        assert_eq!(config.thresholds.max_pr_comments, 10);
        assert_eq!(config.rewrite.indent, 2);
        assert!(config.rewrite.dry_run);
        assert_eq!(config.network.timeout(), Duration::from_secs(30));
        assert_eq!(config.network.request_delay(), Duration::from_millis(2000));
        assert_eq!(config.prune.period, Period::Year);
    }

    #[test]
    fn test_partial_toml() {
        let config: MaintainersConfig = toml::from_str(
            "[thresholds]\nmax_contributions = 5\n\n[prune]\nperiod = \"quarter\"\nexclude = [\"alice\"]\n",
        )
        .unwrap();
        assert_eq!(config.thresholds.max_contributions, 5);
        assert_eq!(config.thresholds.max_pr_comments, 10);
        assert_eq!(config.prune.period, Period::Quarter);
        assert!(config.prune.exclude.contains("alice"));
        assert_eq!(config.network.max_retries, 3);
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("q".parse::<Period>().unwrap(), Period::Quarter);
        assert_eq!("Month".parse::<Period>().unwrap(), Period::Month);
        assert_eq!(Period::Year.code(), "y");
        assert!("decade".parse::<Period>().is_err());
    }

    #[test]
    fn test_builder() {
        let config = MaintainersConfig::builder()
            .rewrite(RewriteConfig {
                indent: 4,
                dry_run: false,
            })
            .build();
        assert_eq!(config.rewrite.indent, 4);
        assert!(config.rewrite.validate().is_ok());
        assert!(RewriteConfig { indent: 12, dry_run: false }.validate().is_err());
    }
}
