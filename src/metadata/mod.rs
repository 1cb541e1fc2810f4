//! Activity data fetchers for devstats and GitHub

pub mod devstats;
pub mod github;

pub use devstats::fetch_contributions;
pub use github::{fetch_pr_comment_count, fetch_repo_owners_files};

use reqwest::Client;

use crate::config::NetworkConfig;
use crate::error::{MaintainersError, Result};

pub(crate) const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Build a plain HTTP client with the configured timeout
pub(crate) fn build_client(config: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .build()
        .map_err(|e| MaintainersError::network(format!("Failed to build HTTP client: {}", e)))
}
