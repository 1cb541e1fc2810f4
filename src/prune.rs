//! Prune orchestration: find inactive maintainers and move them to emeritus

use std::path::{Path, PathBuf};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::activity::{
    is_low_activity, match_contributions, select_users_to_prune, sort_by_activity, unknown_contributions,
};
use crate::config::{MaintainersConfig, NetworkConfig};
use crate::emeritus::remove_users_from_files;
use crate::error::{MaintainersError, Result};
use crate::metadata::{fetch_contributions, fetch_pr_comment_count};
use crate::owners::collect_owners;
use crate::types::{Contribution, PruneReport};

/// Collect the owners below `root`, look up their activity and, unless this
/// is a dry run, migrate the inactive ones to `emeritus_approvers`
pub async fn prune(root: &Path, config: &MaintainersConfig) -> Result<PruneReport> {
    info!("Starting prune of ownership files under: {}", root.display());
    let options = &config.prune;
    config.rewrite.validate()?;

    let inventory = collect_owners(root)?;

    let mut report = PruneReport {
        timestamp: chrono::Utc::now(),
        devstats_repository: options.devstats_repository.clone(),
        github_repository: options.github_repository.clone(),
        files: inventory.files.clone(),
        alias_count: inventory.aliases.len(),
        unique_users: inventory.users.len(),
        contributions: Vec::new(),
        missing: Vec::new(),
        low_activity: Vec::new(),
        to_prune: Vec::new(),
        rewritten: Vec::new(),
        dry_run: config.rewrite.dry_run,
    };

    if options.skip_devstats {
        report.contributions = unknown_contributions(&inventory.users);
    } else {
        let devstats = fetch_contributions(&options.devstats_repository, options.period, &config.network).await?;
        if devstats.is_empty() {
            return Err(MaintainersError::api(
                "devstats",
                format!("unable to find any contributions in repository {}", options.devstats_repository),
            ));
        }
        let (matched, missing) = match_contributions(&inventory.users, &devstats);
        report.contributions = matched;
        report.missing = missing;
    }

    if !options.skip_github {
        fill_pr_comment_counts(&mut report.contributions, &options.github_repository, &config.network).await;
        report.low_activity = report
            .contributions
            .iter()
            .filter(|c| is_low_activity(c, &config.thresholds))
            .map(|c| c.id.clone())
            .collect();
    }

    sort_by_activity(&mut report.contributions);
    report.to_prune = select_users_to_prune(&report.missing, &report.low_activity, &options.include, &options.exclude);

    info!(
        "Prune candidates: {} missing from devstats, {} with low activity, {} selected",
        report.missing.len(),
        report.low_activity.len(),
        report.to_prune.len()
    );

    if config.rewrite.dry_run {
        debug!("Dry run, leaving ownership files untouched");
        return Ok(report);
    }

    let files = files_to_rewrite(root, &report.files, &options.exclude_files);
    remove_users_from_files(&files, &report.to_prune, &config.rewrite)?;
    report.rewritten = files;

    Ok(report)
}

/// Ownership files minus the excluded ones; exclusions are relative to `root`
/// or given as the same path the file was found under
pub fn files_to_rewrite<'a, I>(root: &Path, files: &[PathBuf], excluded: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = &'a String>,
{
    let excluded: Vec<&'a String> = excluded.into_iter().collect();
    files
        .iter()
        .filter(|path| {
            let skip = excluded
                .iter()
                .any(|ex| root.join(ex.as_str()) == **path || Path::new(ex.as_str()) == path.as_path());
            if skip {
                debug!("Excluding {}", path.display());
            }
            !skip
        })
        .cloned()
        .collect()
}

/// Look up the PR comment count of every user, one request at a time
async fn fill_pr_comment_counts(contributions: &mut [Contribution], repository: &str, network: &NetworkConfig) {
    for contribution in contributions.iter_mut() {
        contribution.pr_comments = pr_comment_count_with_backoff(&contribution.id, repository, network).await;
        sleep(network.request_delay()).await;
    }
}

/// Ask GitHub until it stops rate limiting us, up to `rate_limit_max_waits` pauses
async fn pr_comment_count_with_backoff(user: &str, repository: &str, network: &NetworkConfig) -> Option<u64> {
    let mut waits = 0;
    loop {
        match fetch_pr_comment_count(user, repository, network).await {
            Ok(Some(count)) => return Some(count),
            Ok(None) if waits < network.rate_limit_max_waits => {
                debug!("Rate limited while looking up {}, waiting {:?}", user, network.rate_limit_backoff());
                waits += 1;
                sleep(network.rate_limit_backoff()).await;
            }
            Ok(None) => {
                warn!("Still rate limited after {} waits, skipping PR comments of {}", waits, user);
                return None;
            }
            Err(e) => {
                warn!("Failed to count PR comments of {}: {}", user, e);
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PruneOptions, RewriteConfig};
    use mockito::Matcher;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "OWNERS",
            "# root owners\napprovers:\n  - alice\n  - bob\nreviewers:\n  - carol\n",
        );
        write(dir.path(), "pkg/OWNERS", "approvers:\n  - bob\nreviewers:\n  - dave\n");
        write(dir.path(), "OWNERS_ALIASES", "aliases:\n  pkg-reviewers:\n    - dave\n    - carol\n");
        dir
    }

    fn offline_config(dry_run: bool) -> MaintainersConfig {
        MaintainersConfig::builder()
            .rewrite(RewriteConfig { indent: 2, dry_run })
            .prune(PruneOptions {
                skip_devstats: true,
                skip_github: true,
                ..PruneOptions::default()
            })
            .build()
    }

    #[test]
    fn test_files_to_rewrite() {
        let root = Path::new("/repo");
        let files = vec![
            root.join("OWNERS"),
            root.join("pkg/OWNERS"),
            root.join("OWNERS_ALIASES"),
        ];
        let excluded = vec!["pkg/OWNERS".to_string(), "/repo/OWNERS_ALIASES".to_string()];
        assert_eq!(files_to_rewrite(root, &files, &excluded), vec![root.join("OWNERS")]);
    }

    #[tokio::test]
    async fn test_prune_offline_dry_run() {
        let dir = fixture();
        let before = fs::read_to_string(dir.path().join("OWNERS")).unwrap();

        let mut config = offline_config(true);
        config.prune.include.insert("bob".to_string());
        let report = prune(dir.path(), &config).await.unwrap();

        assert_eq!(report.files.len(), 3);
        assert_eq!(report.alias_count, 1);
        assert_eq!(report.unique_users, 4);
        assert!(report.contributions.iter().all(|c| c.contributions.is_none()));
        assert_eq!(report.to_prune, vec!["bob"]);
        assert!(report.rewritten.is_empty());
        assert_eq!(fs::read_to_string(dir.path().join("OWNERS")).unwrap(), before);
    }

    #[tokio::test]
    async fn test_prune_rewrites_included_users() {
        let dir = fixture();
        let mut config = offline_config(false);
        config.prune.include.insert("bob".to_string());
        config.prune.include.insert("dave".to_string());
        config.prune.exclude_files.insert("OWNERS_ALIASES".to_string());

        let report = prune(dir.path(), &config).await.unwrap();
        assert_eq!(report.rewritten.len(), 2);

        let root = fs::read_to_string(dir.path().join("OWNERS")).unwrap();
        assert_eq!(
            root,
            "# root owners\napprovers:\n  - alice\nreviewers:\n  - carol\nemeritus_approvers:\n  - bob\n"
        );
        let pkg = fs::read_to_string(dir.path().join("pkg/OWNERS")).unwrap();
        assert_eq!(pkg, "approvers: []\nreviewers: []\nemeritus_approvers:\n  - bob\n");
        let aliases = fs::read_to_string(dir.path().join("OWNERS_ALIASES")).unwrap();
        assert!(aliases.contains("- dave"));
    }

    #[tokio::test]
    async fn test_prune_with_activity_sources() {
        let dir = fixture();
        let mut devstats = mockito::Server::new_async().await;
        devstats
            .mock("POST", "/api/ds/query")
            .with_status(200)
            .with_body(r#"{"results":{"A":{"frames":[{"data":{"values":[["alice","BOB","carol"],[500,3,40]]}}]}}}"#)
            .create_async()
            .await;

        let mut github = mockito::Server::new_async().await;
        github
            .mock("GET", "/search/issues")
            .match_query(Matcher::Regex("bob".into()))
            .with_status(200)
            .with_body(r#"{"total_count": 1}"#)
            .create_async()
            .await;
        github
            .mock("GET", "/search/issues")
            .match_query(Matcher::Regex("alice|carol".into()))
            .with_status(200)
            .with_body(r#"{"total_count": 30}"#)
            .create_async()
            .await;

        let mut config = MaintainersConfig::default();
        config.network = NetworkConfig {
            devstats_url: format!("{}/api/ds/query", devstats.url()),
            github_api_url: github.url(),
            github_token: None,
            request_delay_ms: 1,
            rate_limit_backoff_secs: 0,
            ..NetworkConfig::default()
        };

        let report = prune(dir.path(), &config).await.unwrap();

        assert_eq!(report.missing, vec!["dave"]);
        assert_eq!(report.low_activity, vec!["bob"]);
        assert_eq!(report.to_prune, vec!["bob", "dave"]);
        let ids: Vec<&str> = report.contributions.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "carol", "bob"]);
        assert_eq!(report.contributions[2].alias, "BOB");
        assert!(report.dry_run);
    }
}
