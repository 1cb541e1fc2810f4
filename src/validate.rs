//! Structural validation of OWNERS, OWNERS_ALIASES and sigs.yaml

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::config::MaintainersConfig;
use crate::error::Result;
use crate::metadata::fetch_repo_owners_files;
use crate::owners::{find_aliases_file, find_owner_files, find_sigs_yaml, read_aliases, read_owners};
use crate::sigs::{read_sigs_yaml, Context};
use crate::types::{AuditReport, Finding};

/// Strictly decode every ownership file below `root`, then cross-check the
/// subproject owner links of sigs.yaml
///
/// With `check_github`, the OWNERS files of the configured GitHub repository
/// are compared against the links as well.
pub async fn validate(root: &Path, config: &MaintainersConfig, check_github: bool) -> Result<AuditReport> {
    info!("Validating ownership files under: {}", root.display());
    let mut report = AuditReport::new(format!("validation of {}", root.display()));

    if let Some(path) = find_aliases_file(root) {
        if let Err(e) = read_aliases(&path) {
            report.push(Finding::error(path.display().to_string(), e.to_string()));
        }
    }

    let context = match find_sigs_yaml(root) {
        Some(path) => match read_sigs_yaml(&path) {
            Ok(context) => Some(context),
            Err(e) => {
                report.push(Finding::error(path.display().to_string(), e.to_string()));
                None
            }
        },
        None => None,
    };

    let files = find_owner_files(root)?;
    debug!("Decoding {} OWNERS files", files.len());
    for path in &files {
        if let Err(e) = read_owners(path) {
            report.push(Finding::error(path.display().to_string(), e.to_string()));
        }
    }

    if let Some(context) = &context {
        let (sections, duplicates) = owner_link_sections(context);
        for finding in duplicates {
            report.push(finding);
        }

        if check_github {
            let repository = &config.prune.github_repository;
            let branch = &config.prune.github_branch;
            let upstream = fetch_repo_owners_files(repository, branch, &config.network).await?;
            for finding in upstream_mismatches(&sections, &upstream, repository) {
                report.push(finding);
            }
        }
    }

    report.compute_summary();
    Ok(report)
}

/// Map every subproject owner link to the section listing it; links listed
/// twice are reported
pub fn owner_link_sections(context: &Context) -> (BTreeMap<String, String>, Vec<Finding>) {
    let mut sections: BTreeMap<String, String> = BTreeMap::new();
    let mut findings = Vec::new();

    for (kind, group) in context.groups() {
        for subproject in &group.subprojects {
            let section = format!("'{}/{}/{}'", kind, group.dir, subproject.name);
            for url in &subproject.owners {
                match sections.get(url) {
                    Some(first) => findings.push(Finding::warning(
                        "sigs.yaml",
                        format!("{} is duplicated in {} and {}", url, first, section),
                    )),
                    None => {
                        sections.insert(url.clone(), section.clone());
                    }
                }
            }
        }
    }
    (sections, findings)
}

/// Links into `repository` without an upstream OWNERS file, and upstream
/// OWNERS files no link points to
pub fn upstream_mismatches(sections: &BTreeMap<String, String>, upstream: &[String], repository: &str) -> Vec<Finding> {
    let marker = format!("/{}/", repository);
    let mut findings = Vec::new();

    for (url, section) in sections {
        if !url.contains(&marker) {
            continue;
        }
        let present = upstream
            .iter()
            .filter(|file| !file.is_empty())
            .any(|file| url.ends_with(&format!("/{}", file)));
        if !present {
            findings.push(Finding::warning(
                "sigs.yaml",
                format!("file [{}] in section {} is not present in {}", url, section, repository),
            ));
        }
    }

    for file in upstream.iter().filter(|file| !file.is_empty()) {
        let suffix = format!("/{}", file);
        let listed = sections
            .keys()
            .any(|url| url.contains(&marker) && url.ends_with(&suffix));
        if !listed {
            findings.push(Finding::warning(
                "sigs.yaml",
                format!("file [{}] is not in sigs.yaml", file),
            ));
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owners::decode_strict;
    use crate::types::Severity;
    use mockito::Matcher;
    use std::fs;
    use tempfile::TempDir;

    const SIGS: &str = r#"
sigs:
  - dir: sig-node
    name: Node
    subprojects:
      - name: kubelet
        owners:
          - https://raw.githubusercontent.com/kubernetes/kubernetes/master/pkg/kubelet/OWNERS
          - https://raw.githubusercontent.com/kubernetes/kubernetes/master/cmd/gone/OWNERS
  - dir: sig-apps
    name: Apps
    subprojects:
      - name: workloads
        owners:
          - https://raw.githubusercontent.com/kubernetes/kubernetes/master/pkg/kubelet/OWNERS
          - https://raw.githubusercontent.com/kubernetes-sigs/kind/main/OWNERS
"#;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_duplicate_owner_links() {
        let context: Context = decode_strict(Path::new("sigs.yaml"), SIGS).unwrap();
        let (sections, duplicates) = owner_link_sections(&context);

        assert_eq!(sections.len(), 3);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(
            duplicates[0].message,
            "https://raw.githubusercontent.com/kubernetes/kubernetes/master/pkg/kubelet/OWNERS is duplicated in 'sig/sig-node/kubelet' and 'sig/sig-apps/workloads'"
        );
    }

    #[test]
    fn test_upstream_mismatches() {
        let context: Context = decode_strict(Path::new("sigs.yaml"), SIGS).unwrap();
        let (sections, _) = owner_link_sections(&context);
        let upstream = vec!["pkg/kubelet/OWNERS".to_string(), "pkg/proxy/OWNERS".to_string()];

        let findings = upstream_mismatches(&sections, &upstream, "kubernetes/kubernetes");
        let messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "file [https://raw.githubusercontent.com/kubernetes/kubernetes/master/cmd/gone/OWNERS] in section 'sig/sig-node/kubelet' is not present in kubernetes/kubernetes",
                "file [pkg/proxy/OWNERS] is not in sigs.yaml",
            ]
        );
    }

    #[tokio::test]
    async fn test_validate_reports_bad_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "OWNERS", "approvers:\n  - alice\n");
        write(dir.path(), "pkg/OWNERS", "aprovers:\n  - bob\n");
        write(dir.path(), "OWNERS_ALIASES", "aliases:\n  team:\n    - alice\n");
        write(dir.path(), "sigs.yaml", SIGS);

        let report = validate(dir.path(), &MaintainersConfig::default(), false).await.unwrap();
        assert_eq!(report.count(Severity::Error), 1);
        assert!(report.findings[0].subject.ends_with("pkg/OWNERS"));
        assert_eq!(report.count(Severity::Warning), 1);
    }

    #[tokio::test]
    async fn test_validate_against_github() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sigs.yaml", SIGS);

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/kubernetes/kubernetes/git/trees/master")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"tree":[{"path":"pkg/kubelet/OWNERS"},{"path":"cmd/gone/OWNERS"}]}"#)
            .create_async()
            .await;

        let mut config = MaintainersConfig::default();
        config.network.github_api_url = server.url();
        config.network.github_token = None;

        let report = validate(dir.path(), &config, true).await.unwrap();
        assert_eq!(report.count(Severity::Warning), 1);
        assert!(!report.has_errors());
    }
}
