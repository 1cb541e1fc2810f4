//! # maintainers
//!
//! Tooling for keeping Kubernetes-style ownership metadata healthy:
//! - **Pruning**: Find approvers and reviewers with little recent activity and
//!   move them to `emeritus_approvers`
//! - **Structure-preserving rewrites**: OWNERS and OWNERS_ALIASES files keep
//!   their key order, comments and scalar styles when edited
//! - **Validation and audit**: Check OWNERS files and the `sigs.yaml` group registry
//! - **Exports**: Owners and labels as CSV, URL reachability checks
//!
//! ## Quick Start
//!
//! ```no_run
//! use maintainers::{remove_users_from_file, RewriteConfig};
//! use std::path::Path;
//!
//! # fn main() -> maintainers::Result<()> {
//! let config = RewriteConfig {
//!     indent: 2,
//!     dry_run: false,
//! };
//! remove_users_from_file(Path::new("OWNERS"), &["alice".to_string()], &config)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - Case-insensitive removal, case-preserving promotion to emeritus
//! - Activity from devstats contribution counts and GitHub PR comments
//! - Configurable thresholds and network behaviour, loadable from TOML

mod activity;
mod audit;
mod config;
mod emeritus;
mod error;
mod export;
mod metadata;
mod owners;
mod prune;
mod sigs;
mod types;
mod urls;
mod validate;

pub mod yaml;

// Re-export public API
pub use activity::{is_low_activity, match_contributions, select_users_to_prune};
pub use audit::{audit_groups, AuditOptions};
pub use config::{
    ActivityThresholds, MaintainersConfig, MaintainersConfigBuilder, NetworkConfig, Period, PruneOptions,
    RewriteConfig,
};
pub use emeritus::{
    find_or_create_sequence, locate_target_mapping, locate_target_mapping_ref, migrate_to_emeritus,
    remove_from_named_sequences, remove_users_from_file, remove_users_from_files, MigrationOutcome,
};
pub use error::{MaintainersError, Result};
pub use export::{export_rows, files_by_label, write_labels_csv, write_owners_csv, OwnerRow};
pub use metadata::{fetch_contributions, fetch_pr_comment_count, fetch_repo_owners_files};
pub use owners::{
    collect_owners, find_aliases_file, find_owner_files, find_sigs_yaml, read_aliases, read_owners, Aliases,
    OwnersInfo, OwnersInventory,
};
pub use prune::prune;
pub use sigs::{read_sigs_yaml, Context, Group, GroupType};
pub use types::{AuditReport, Contribution, Finding, PruneReport, Severity};
pub use urls::{check_urls, UrlFailure};
pub use validate::validate;
