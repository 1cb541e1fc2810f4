//! Example showing a prune run with custom configuration

use maintainers::{prune, ActivityThresholds, MaintainersConfig, NetworkConfig, Period, PruneOptions, RewriteConfig};
use std::collections::BTreeSet;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MaintainersConfig::builder()
        .thresholds(ActivityThresholds {
            max_contributions: 10, // Stricter than the default of 20
            max_pr_comments: 5,
        })
        .network(NetworkConfig {
            request_delay_ms: 500,
            ..NetworkConfig::default()
        })
        .rewrite(RewriteConfig {
            indent: 2,
            dry_run: true, // Only report, never touch the files
        })
        .prune(PruneOptions {
            period: Period::Quarter,
            exclude: BTreeSet::from(["dims".to_string()]),
            skip_github: std::env::var("GITHUB_TOKEN").is_err(),
            ..PruneOptions::default()
        })
        .build();

    let root = Path::new(".");
    println!("Pruning ownership files under {}...\n", root.display());

    let report = prune(root, &config).await?;

    println!("=== Prune Results ===");
    println!("Files: {}", report.files.len());
    println!("Unique users: {}", report.unique_users);
    println!("Missing from devstats: {}", report.missing.len());
    println!("Low activity: {}", report.low_activity.len());

    if !report.to_prune.is_empty() {
        println!("\nWould move to emeritus:");
        for user in &report.to_prune {
            println!("  - {}", user);
        }
    }

    Ok(())
}
