//! Core data types for pruning and audit reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Activity of one maintainer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// Identifier as spelled in the OWNERS files
    pub id: String,
    /// Identifier as spelled by devstats
    pub alias: String,
    /// Devstats contribution count, if it was looked up
    pub contributions: Option<u64>,
    /// Merged PRs the user commented on in the last year, if it was looked up
    pub pr_comments: Option<u64>,
}

impl Contribution {
    pub fn new(id: impl Into<String>, alias: impl Into<String>, contributions: Option<u64>) -> Self {
        Self {
            id: id.into(),
            alias: alias.into(),
            contributions,
            pr_comments: None,
        }
    }
}

/// Outcome of a prune run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneReport {
    /// Timestamp when the run started
    pub timestamp: DateTime<Utc>,
    pub devstats_repository: String,
    pub github_repository: String,
    /// Ownership files that were read (OWNERS files, then OWNERS_ALIASES)
    pub files: Vec<PathBuf>,
    /// Number of aliases defined in OWNERS_ALIASES
    pub alias_count: usize,
    /// Number of distinct identifiers found
    pub unique_users: usize,
    /// Activity of every user devstats knows about
    pub contributions: Vec<Contribution>,
    /// Users without any devstats contributions
    pub missing: Vec<String>,
    /// Users under both activity thresholds
    pub low_activity: Vec<String>,
    /// Final list of users to migrate
    pub to_prune: Vec<String>,
    /// Files that were rewritten (empty on a dry run)
    pub rewritten: Vec<PathBuf>,
    pub dry_run: bool,
}

/// How serious an audit finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Optional,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Warning => write!(f, "WARNING"),
            Self::Optional => write!(f, "OPTIONAL"),
            Self::Info => write!(f, "INFO"),
        }
    }
}

/// A single problem found in the ownership metadata
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// What the finding is about, e.g. `sig/sig-node` or a file path
    pub subject: String,
    pub message: String,
}

impl Finding {
    pub fn new(severity: Severity, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, subject, message)
    }

    pub fn warning(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, subject, message)
    }

    pub fn optional(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Optional, subject, message)
    }

    pub fn info(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, subject, message)
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.subject, self.message)
    }
}

/// Findings of an audit or validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// What was checked
    pub title: String,
    /// Timestamp when the run was performed
    pub timestamp: DateTime<Utc>,
    pub findings: Vec<Finding>,
    /// Number of findings per severity
    pub summary: BTreeMap<Severity, usize>,
}

impl AuditReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            timestamp: Utc::now(),
            findings: Vec::new(),
            summary: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Count the findings per severity
    pub fn compute_summary(&mut self) {
        self.summary.clear();
        for finding in &self.findings {
            *self.summary.entry(finding.severity).or_default() += 1;
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }
}
