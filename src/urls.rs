//! Reachability check for every URL a YAML document mentions

use reqwest::StatusCode;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::config::NetworkConfig;
use crate::error::Result;
use crate::metadata::build_client;
use crate::yaml::{self, Node, Tag};

/// A URL that did not answer a HEAD request with 200
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlFailure {
    pub url: String,
    /// Status code, when the server answered at all
    pub status: Option<u16>,
    /// Transport error, when it did not
    pub error: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for UrlFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "found invalid url: {}", self.url)?;
        if let Some(status) = self.status {
            write!(f, " (http code: {})", status)?;
        }
        write!(f, " at ({},{})", self.line, self.column)?;
        if let Some(error) = &self.error {
            write!(f, " {}", error)?;
        }
        Ok(())
    }
}

/// String scalars that start with `http://` or `https://`, keys included,
/// in document order with their source position
pub fn collect_urls(root: &Node) -> Vec<(String, usize, usize)> {
    let mut urls = Vec::new();
    root.walk_scalars(&mut |scalar| {
        if scalar.tag == Tag::Str && (scalar.value.starts_with("https://") || scalar.value.starts_with("http://")) {
            let (line, column) = scalar.mark.map(|m| (m.line, m.column)).unwrap_or((0, 0));
            urls.push((scalar.value.clone(), line, column));
        }
    });
    urls
}

/// HEAD every URL of the YAML file at `path` and return the ones that failed
pub async fn check_urls(path: &Path, network: &NetworkConfig) -> Result<Vec<UrlFailure>> {
    info!("Checking urls in {}", path.display());
    let root = yaml::read_file(path)?;
    let client = build_client(network)?;
    let mut failures = Vec::new();

    for (url, line, column) in collect_urls(&root) {
        debug!("HEAD {}", url);
        let failure = match client.head(&url).send().await {
            Ok(response) if response.status() == StatusCode::OK => None,
            Ok(response) => Some(UrlFailure {
                url,
                status: Some(response.status().as_u16()),
                error: None,
                line,
                column,
            }),
            Err(e) => Some(UrlFailure {
                url,
                status: None,
                error: Some(e.to_string()),
                line,
                column,
            }),
        };
        failures.extend(failure);
    }

    Ok(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_urls() {
        let root = yaml::parse(
            "contact:\n  mailing_list: https://groups.google.com/g/dev\n  slack: sig-node\n  quoted: 'http://example.com'\n  number: 42\n",
        )
        .unwrap();
        let urls = collect_urls(&root);
        assert_eq!(
            urls,
            vec![
                ("https://groups.google.com/g/dev".to_string(), 2, 17),
                ("http://example.com".to_string(), 4, 11),
            ]
        );
    }

    #[test]
    fn test_failure_display() {
        let failure = UrlFailure {
            url: "https://example.com/x".to_string(),
            status: Some(404),
            error: None,
            line: 3,
            column: 7,
        };
        assert_eq!(failure.to_string(), "found invalid url: https://example.com/x (http code: 404) at (3,7)");
    }

    #[tokio::test]
    async fn test_check_urls() {
        let mut server = mockito::Server::new_async().await;
        server.mock("HEAD", "/ok").with_status(200).create_async().await;
        server.mock("HEAD", "/gone").with_status(404).create_async().await;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sigs.yaml");
        fs::write(
            &path,
            format!("links:\n  - {}/ok\n  - {}/gone\n", server.url(), server.url()),
        )
        .unwrap();

        let network = NetworkConfig {
            request_delay_ms: 1,
            ..NetworkConfig::default()
        };
        let failures = check_urls(&path, &network).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].url.ends_with("/gone"));
        assert_eq!(failures[0].status, Some(404));
        assert_eq!((failures[0].line, failures[0].column), (3, 5));
    }
}
