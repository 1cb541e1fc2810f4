//! Fetch contribution counts from devstats

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::build_client;
use crate::config::{NetworkConfig, Period};
use crate::error::{MaintainersError, Result};
use crate::types::Contribution;

const SERVICE: &str = "devstats";

/// Response of the Grafana datasource query endpoint
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: HashMap<String, QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    frames: Vec<Frame>,
}

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(default)]
    data: FrameData,
}

#[derive(Debug, Default, Deserialize)]
struct FrameData {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Series name devstats uses for a repository, e.g. `hdev_contributionskuberneteskubernetesall`
pub fn series_name(repository: &str) -> String {
    let repository: String = repository
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '.'))
        .collect();
    format!("hdev_contributions{}all", repository)
}

fn query_body(repository: &str, period: Period) -> serde_json::Value {
    let sql = format!(
        "select sub.name as name, sub.value from (select row_number() over (order by sum(value) desc) as \"Rank\", \
         split_part(name, '$$$', 1) as name, sum(value) as value from shdev_repos \
         where series = '{}' and period = '{}' group by split_part(name, '$$$', 1)) sub",
        series_name(repository),
        period.code()
    );
    json!({
        "queries": [{
            "refId": "A",
            "datasourceId": 1,
            "rawSql": sql,
            "format": "table",
        }]
    })
}

/// Fetch the contribution count of every contributor to `repository` in `period`
pub async fn fetch_contributions(
    repository: &str,
    period: Period,
    config: &NetworkConfig,
) -> Result<Vec<Contribution>> {
    debug!("Fetching devstats contributions for {} ({})", repository, period);

    let client = build_client(config)?;
    let body = query_body(repository, period);
    let response = post_with_retry(&client, &config.devstats_url, &body, config).await?;

    if response.status() != StatusCode::OK {
        return Err(MaintainersError::api(
            SERVICE,
            format!("bad status code from devstats: {}", response.status()),
        ));
    }

    let parsed: QueryResponse = response
        .json()
        .await
        .map_err(|e| MaintainersError::api(SERVICE, format!("unable to parse json from devstats: {}", e)))?;
    decode_frames(parsed)
}

fn decode_frames(parsed: QueryResponse) -> Result<Vec<Contribution>> {
    let values = parsed
        .results
        .get("A")
        .and_then(|result| result.frames.first())
        .map(|frame| &frame.data.values)
        .ok_or_else(|| MaintainersError::api(SERVICE, "response has no frames for query A"))?;

    let (names, counts) = match values.as_slice() {
        [names, counts, ..] => (names, counts),
        _ => return Err(MaintainersError::api(SERVICE, "frame does not hold name and value columns")),
    };
    if names.len() != counts.len() {
        return Err(MaintainersError::api(
            SERVICE,
            format!("{} names but {} values", names.len(), counts.len()),
        ));
    }

    names
        .iter()
        .zip(counts)
        .map(|(name, count)| {
            let name = name
                .as_str()
                .ok_or_else(|| MaintainersError::api(SERVICE, format!("unexpected name {}", name)))?;
            let count = count
                .as_f64()
                .ok_or_else(|| MaintainersError::api(SERVICE, format!("unexpected value {}", count)))?;
            Ok(Contribution::new(name, "", Some(count.max(0.0) as u64)))
        })
        .collect()
}

/// POST with exponential backoff on transport errors and 429s
async fn post_with_retry(
    client: &Client,
    url: &str,
    body: &serde_json::Value,
    config: &NetworkConfig,
) -> Result<reqwest::Response> {
    let mut attempts = 0;
    let mut delay = config.request_delay();

    loop {
        match client.post(url).json(body).send().await {
            Ok(response) => {
                if response.status() == StatusCode::TOO_MANY_REQUESTS {
                    if attempts >= config.max_retries {
                        return Err(MaintainersError::RateLimitExceeded {
                            service: SERVICE.to_string(),
                            retry_after: Some(delay),
                        });
                    }
                    warn!("Rate limited by devstats, retrying after {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempts += 1;
                    delay *= 2;
                    continue;
                }
                return Ok(response);
            }
            Err(e) => {
                if attempts >= config.max_retries {
                    return Err(MaintainersError::network(format!("devstats request failed: {}", e)));
                }
                warn!("devstats request failed, retrying: {}", e);
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

    fn test_config(url: String) -> NetworkConfig {
        NetworkConfig {
            devstats_url: url,
            request_delay_ms: 1,
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_series_name() {
        assert_eq!(
            series_name("kubernetes/kubernetes"),
            "hdev_contributionskuberneteskubernetesall"
        );
        assert_eq!(series_name("kubernetes-sigs/kind.io"), "hdev_contributionskubernetessigskindioall");
    }

    #[test]
    fn test_query_body_mentions_series_and_period() {
        let body = query_body("kubernetes/kubernetes", Period::Quarter);
        let sql = body["queries"][0]["rawSql"].as_str().unwrap();
        assert!(sql.contains("series = 'hdev_contributionskuberneteskubernetesall'"));
        assert!(sql.contains("period = 'q'"));
        assert_eq!(body["queries"][0]["refId"], "A");
    }

    #[tokio::test]
    async fn test_fetch_contributions() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/ds/query")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results":{"A":{"frames":[{"schema":{},"data":{"values":[["alice","Bob"],[120,3.0]]}}]}}}"#,
            )
            .create_async()
            .await;

        let config = test_config(format!("{}/api/ds/query", server.url()));
        let contribs = fetch_contributions("kubernetes/kubernetes", Period::Year, &config)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(contribs.len(), 2);
        assert_eq!(contribs[0].id, "alice");
        assert_eq!(contribs[0].contributions, Some(120));
        assert_eq!(contribs[1].id, "Bob");
        assert_eq!(contribs[1].contributions, Some(3));
    }

    #[tokio::test]
    async fn test_fetch_contributions_bad_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/ds/query")
            .with_status(500)
            .create_async()
            .await;

        let config = test_config(format!("{}/api/ds/query", server.url()));
        let err = fetch_contributions("kubernetes/kubernetes", Period::Year, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, MaintainersError::ApiError { .. }));
    }

    #[tokio::test]
    async fn test_fetch_contributions_malformed_frames() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/ds/query")
            .with_status(200)
            .with_body(r#"{"results":{"A":{"frames":[]}}}"#)
            .create_async()
            .await;

        let config = test_config(format!("{}/api/ds/query", server.url()));
        let err = fetch_contributions("kubernetes/kubernetes", Period::Year, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, MaintainersError::ApiError { .. }));
    }
}
