//! CSV exports of ownership data: who owns what, and which files carry a label

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::owners::{collect_owners, OwnersInfo, OWNERS_ALIASES};

/// One `file,role,id` line of the owners export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRow {
    pub file: String,
    pub role: String,
    pub id: String,
}

impl OwnerRow {
    fn new(file: &str, role: impl Into<String>, id: &str) -> Self {
        Self {
            file: file.to_string(),
            role: role.into(),
            id: id.to_string(),
        }
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy().into_owned()
}

fn push_lists(rows: &mut Vec<OwnerRow>, file: &str, prefix: &str, lists: [(&str, &[String]); 4]) {
    for (role, ids) in lists {
        for id in ids {
            rows.push(OwnerRow::new(file, format!("{}{}", prefix, role), id));
        }
    }
}

fn owner_rows(file: &str, info: &OwnersInfo) -> Vec<OwnerRow> {
    let mut rows = Vec::new();
    push_lists(
        &mut rows,
        file,
        "",
        [
            ("approvers", info.approvers.as_slice()),
            ("reviewers", info.reviewers.as_slice()),
            ("required_reviewers", info.required_reviewers.as_slice()),
            ("emeritus_approvers", info.emeritus_approvers.as_slice()),
        ],
    );
    for (pattern, filter) in &info.filters {
        push_lists(
            &mut rows,
            file,
            &format!("filters/{}/", pattern),
            [
                ("approvers", filter.approvers.as_slice()),
                ("reviewers", filter.reviewers.as_slice()),
                ("required_reviewers", filter.required_reviewers.as_slice()),
                ("emeritus_approvers", filter.emeritus_approvers.as_slice()),
            ],
        );
    }
    rows
}

/// Every identifier of every OWNERS file below `root`, then every alias member
pub fn export_rows(root: &Path) -> Result<Vec<OwnerRow>> {
    let inventory = collect_owners(root)?;
    let mut rows = Vec::new();

    for (path, info) in &inventory.owners {
        rows.extend(owner_rows(&relative(root, path), info));
    }
    for (alias, ids) in &inventory.aliases {
        for id in ids {
            rows.push(OwnerRow::new(OWNERS_ALIASES, alias.as_str(), id));
        }
    }
    Ok(rows)
}

/// Labels used by the OWNERS files below `root`, each with the files using it
pub fn files_by_label(root: &Path) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let inventory = collect_owners(root)?;
    let mut labels: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (path, info) in &inventory.owners {
        for label in &info.labels {
            labels.entry(label.clone()).or_default().insert(relative(root, path));
        }
    }
    Ok(labels)
}

/// Quote a CSV field only when it has to be
pub fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_records<'a, I>(path: &Path, records: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<&'a str>>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        let line: Vec<String> = record.into_iter().map(csv_field).collect();
        writeln!(writer, "{}", line.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_owners_csv(path: &Path, rows: &[OwnerRow]) -> Result<()> {
    info!("Writing {} owner rows to {}", rows.len(), path.display());
    write_records(
        path,
        rows.iter()
            .map(|row| vec![row.file.as_str(), row.role.as_str(), row.id.as_str()]),
    )
}

pub fn write_labels_csv(path: &Path, labels: &BTreeMap<String, BTreeSet<String>>) -> Result<()> {
    info!("Writing {} labels to {}", labels.len(), path.display());
    write_records(
        path,
        labels
            .iter()
            .flat_map(|(label, files)| files.iter().map(move |file| vec![label.as_str(), file.as_str()])),
    )
}
