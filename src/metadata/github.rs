//! GitHub lookups: PR comment activity and the OWNERS files of a repository

use chrono::{Months, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::USER_AGENT;
use crate::config::NetworkConfig;
use crate::error::{MaintainersError, Result};

const SERVICE: &str = "GitHub";

#[derive(Debug, Deserialize)]
struct SearchResult {
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct Tree {
    #[serde(default)]
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
}

/// Build HTTP client with GitHub authentication if available
fn build_client(config: &NetworkConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));

    if let Some(token) = &config.github_token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| MaintainersError::config(format!("Invalid GitHub token: {}", e)))?;
        headers.insert(AUTHORIZATION, value);
    }

    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .default_headers(headers)
        .build()
        .map_err(|e| MaintainersError::network(format!("Failed to build HTTP client: {}", e)))
}

/// Issue-search query for merged PRs the user commented on since `since`
pub fn pr_comment_query(user: &str, repository: &str, since: NaiveDate) -> String {
    let terms = [
        "is:pr".to_string(),
        format!("involves:{}", user),
        "is:merged".to_string(),
        format!("updated:>={}", since.format("%Y-%m-%d")),
        format!("commenter:{}", user),
        format!("repo:{}", repository),
        format!("user:{}", user),
    ];
    terms
        .iter()
        .map(|term| urlencoding::encode(term).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

/// Count the merged PRs in `repository` the user commented on in the last year
///
/// Returns `Ok(None)` when GitHub answers 403, which it does once the search
/// rate limit is exhausted; callers back off and ask again.
pub async fn fetch_pr_comment_count(
    user: &str,
    repository: &str,
    config: &NetworkConfig,
) -> Result<Option<u64>> {
    let today = Utc::now().date_naive();
    let since = today.checked_sub_months(Months::new(12)).unwrap_or(today);
    let url = format!(
        "{}/search/issues?q={}",
        config.github_api_url.trim_end_matches('/'),
        pr_comment_query(user, repository, since)
    );
    debug!("Counting PR comments of {} in {}", user, repository);

    let client = build_client(config)?;
    let response = get_with_retry(&client, &url, config).await?;

    if response.status() == StatusCode::FORBIDDEN {
        debug!("GitHub search rate limited for {}", user);
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(MaintainersError::api(SERVICE, format!("HTTP {}", response.status())));
    }

    let result: SearchResult = response.json().await?;
    Ok(Some(result.total_count))
}

/// Paths of the OWNERS files of `repository` at `branch`, vendored ones excluded
///
/// The repository root OWNERS file is not listed.
pub async fn fetch_repo_owners_files(
    repository: &str,
    branch: &str,
    config: &NetworkConfig,
) -> Result<Vec<String>> {
    let url = format!(
        "{}/repos/{}/git/trees/{}?recursive=1",
        config.github_api_url.trim_end_matches('/'),
        repository,
        branch
    );
    debug!("Listing OWNERS files of {}@{}", repository, branch);

    let client = build_client(config)?;
    let response = get_with_retry(&client, &url, config).await?;

    if response.status() == StatusCode::FORBIDDEN {
        return Err(MaintainersError::RateLimitExceeded {
            service: SERVICE.to_string(),
            retry_after: None,
        });
    }
    if response.status() == StatusCode::NOT_FOUND {
        return Err(MaintainersError::api(SERVICE, format!("{}@{} not found", repository, branch)));
    }
    if !response.status().is_success() {
        return Err(MaintainersError::api(SERVICE, format!("HTTP {}", response.status())));
    }

    let tree: Tree = response.json().await?;
    Ok(tree
        .tree
        .into_iter()
        .map(|entry| entry.path)
        .filter(|path| path.ends_with("/OWNERS") && !path.starts_with("vendor/"))
        .collect())
}

/// GET with retries on transport errors
async fn get_with_retry(client: &Client, url: &str, config: &NetworkConfig) -> Result<reqwest::Response> {
    let mut attempts = 0;
    let mut delay = config.request_delay();

    loop {
        match client.get(url).send().await {
            Ok(response) => return Ok(response),
            Err(e) => {
                if attempts >= config.max_retries {
                    return Err(MaintainersError::network(format!("GitHub request failed: {}", e)));
                }
                warn!("GitHub request failed, retrying: {}", e);
                tokio::time::sleep(delay).await;
                attempts += 1;
                delay *= 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn test_config(url: String) -> NetworkConfig {
        NetworkConfig {
            github_api_url: url,
            github_token: None,
            request_delay_ms: 1,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_pr_comment_query() {
        let since = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let query = pr_comment_query("alice", "kubernetes/kubernetes", since);
        assert_eq!(
            query,
            "is%3Apr+involves%3Aalice+is%3Amerged+updated%3A%3E%3D2024-03-01+commenter%3Aalice+repo%3Akubernetes%2Fkubernetes+user%3Aalice"
        );
    }

    #[tokio::test]
    async fn test_fetch_pr_comment_count() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search/issues")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"total_count": 42, "incomplete_results": false, "items": []}"#)
            .create_async()
            .await;

        let config = test_config(server.url());
        let count = fetch_pr_comment_count("alice", "kubernetes/kubernetes", &config)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(count, Some(42));
    }

    #[tokio::test]
    async fn test_fetch_pr_comment_count_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search/issues")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let config = test_config(server.url());
        let count = fetch_pr_comment_count("alice", "kubernetes/kubernetes", &config)
            .await
            .unwrap();
        assert_eq!(count, None);
    }

    #[tokio::test]
    async fn test_fetch_repo_owners_files() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/kubernetes/kubernetes/git/trees/master")
            .match_query(Matcher::UrlEncoded("recursive".into(), "1".into()))
            .with_status(200)
            .with_body(
                r#"{"tree":[{"path":"OWNERS"},{"path":"pkg/kubelet/OWNERS"},{"path":"pkg/kubelet/kubelet.go"},{"path":"vendor/k8s.io/api/OWNERS"},{"path":"cmd/OWNERS_ALIASES"}]}"#,
            )
            .create_async()
            .await;

        let config = test_config(server.url());
        let files = fetch_repo_owners_files("kubernetes/kubernetes", "master", &config)
            .await
            .unwrap();
        assert_eq!(files, vec!["pkg/kubelet/OWNERS"]);
    }
}
