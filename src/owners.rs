//! Typed OWNERS / OWNERS_ALIASES records and discovery of ownership files

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{MaintainersError, Result};

pub const OWNERS: &str = "OWNERS";
pub const OWNERS_ALIASES: &str = "OWNERS_ALIASES";
pub const SIGS_YAML: &str = "sigs.yaml";

/// Contents of an OWNERS file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OwnersInfo {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, FiltersInfo>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub approvers: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub reviewers: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub required_reviewers: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub emeritus_approvers: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub options: DirOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirOptions {
    #[serde(default, deserialize_with = "nullable")]
    pub no_parent_owners: bool,
}

/// Per-pattern section of an OWNERS file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FiltersInfo {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub approvers: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub reviewers: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub emeritus_approvers: Vec<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub required_reviewers: Vec<String>,
}

/// Contents of an OWNERS_ALIASES file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Aliases {
    #[serde(default, deserialize_with = "nullable_lists")]
    pub aliases: BTreeMap<String, Vec<String>>,
}

/// Treat an explicit YAML null like a missing field
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_lists<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Option<Vec<String>>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, ids)| (name, ids.unwrap_or_default()))
        .collect())
}

impl OwnersInfo {
    /// Approvers, reviewers and required reviewers, in that order
    pub fn all_owners(&self) -> impl Iterator<Item = &String> {
        self.approvers
            .iter()
            .chain(self.reviewers.iter())
            .chain(self.required_reviewers.iter())
    }
}

/// Strictly decode a YAML document; an empty document decodes to the default
pub(crate) fn decode_strict<T>(path: &Path, source: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let value: serde_yaml::Value =
        serde_yaml::from_str(source).map_err(|e| MaintainersError::schema(path, e))?;
    if value.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(value).map_err(|e| MaintainersError::schema(path, e))
}

/// Decode an OWNERS document read from `path` (used in error messages only)
pub fn owners_from_str(path: &Path, source: &str) -> Result<OwnersInfo> {
    decode_strict(path, source)
}

pub fn read_owners(path: &Path) -> Result<OwnersInfo> {
    let source = std::fs::read_to_string(path)?;
    owners_from_str(path, &source)
}

pub fn read_aliases(path: &Path) -> Result<Aliases> {
    let source = std::fs::read_to_string(path)?;
    decode_strict(path, &source)
}

/// Every `OWNERS` file below `root`, skipping anything with `vendor` in its path
pub fn find_owner_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() || entry.file_name() != OWNERS {
            continue;
        }
        let path = entry.path();
        if path.to_string_lossy().contains("vendor") {
            debug!("Skipping vendored {}", path.display());
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn file_at_root(root: &Path, name: &str) -> Option<PathBuf> {
    let path = root.join(name);
    path.is_file().then_some(path)
}

/// `OWNERS_ALIASES` at the root of the tree, if present
pub fn find_aliases_file(root: &Path) -> Option<PathBuf> {
    file_at_root(root, OWNERS_ALIASES)
}

/// `sigs.yaml` at the root of the tree, if present
pub fn find_sigs_yaml(root: &Path) -> Option<PathBuf> {
    file_at_root(root, SIGS_YAML)
}

/// Everything a prune run needs to know about the ownership files of a tree
#[derive(Debug, Clone, Default)]
pub struct OwnersInventory {
    /// Distinct user identifiers, alias names excluded
    pub users: BTreeSet<String>,
    /// Alias definitions from OWNERS_ALIASES
    pub aliases: BTreeMap<String, Vec<String>>,
    /// Decoded OWNERS files, keyed by path
    pub owners: BTreeMap<PathBuf, OwnersInfo>,
    /// OWNERS files followed by the aliases file, the rewrite order
    pub files: Vec<PathBuf>,
    pub aliases_file: Option<PathBuf>,
}

/// Read every ownership file below `root`
pub fn collect_owners(root: &Path) -> Result<OwnersInventory> {
    let mut inventory = OwnersInventory::default();

    if let Some(path) = find_aliases_file(root) {
        let aliases = read_aliases(&path)?;
        for ids in aliases.aliases.values() {
            inventory.users.extend(ids.iter().cloned());
        }
        inventory.aliases = aliases.aliases;
        inventory.aliases_file = Some(path);
    }

    for path in find_owner_files(root)? {
        let info = read_owners(&path)?;
        for filter in info.filters.values() {
            inventory.users.extend(filter.approvers.iter().cloned());
            inventory.users.extend(filter.reviewers.iter().cloned());
        }
        inventory.users.extend(info.approvers.iter().cloned());
        inventory.users.extend(info.reviewers.iter().cloned());
        inventory.files.push(path.clone());
        inventory.owners.insert(path, info);
    }

    for alias in inventory.aliases.keys() {
        inventory.users.remove(alias);
    }
    if let Some(path) = &inventory.aliases_file {
        inventory.files.push(path.clone());
    }

    info!(
        "Found {} ownership files, {} aliases and {} unique users",
        inventory.files.len(),
        inventory.aliases.len(),
        inventory.users.len()
    );
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_decode_owners_info() {
        let info = owners_from_str(
            Path::new("OWNERS"),
            "approvers:\n  - alice\nreviewers:\nlabels:\n  - sig/node\noptions:\n  no_parent_owners: true\nfilters:\n  \".*\\\\.go$\":\n    approvers:\n      - bob\n",
        )
        .unwrap();

        assert_eq!(info.approvers, vec!["alice"]);
        assert!(info.reviewers.is_empty());
        assert!(info.options.no_parent_owners);
        assert_eq!(info.filters.values().next().unwrap().approvers, vec!["bob"]);
    }

    #[test]
    fn test_decode_rejects_unknown_fields() {
        let err = owners_from_str(Path::new("pkg/OWNERS"), "approver:\n  - alice\n").unwrap_err();
        match err {
            MaintainersError::Schema { path, .. } => assert_eq!(path, PathBuf::from("pkg/OWNERS")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_owners_file() {
        let info = owners_from_str(Path::new("OWNERS"), "# nothing yet\n").unwrap();
        assert_eq!(info, OwnersInfo::default());
    }

    #[test]
    fn test_find_owner_files_skips_vendor() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "OWNERS", "approvers: [a]\n");
        write(dir.path(), "pkg/kubelet/OWNERS", "approvers: [b]\n");
        write(dir.path(), "vendor/github.com/x/OWNERS", "approvers: [c]\n");
        write(dir.path(), "pkg/OWNERS.bak", "approvers: [d]\n");

        let files = find_owner_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("OWNERS"), dir.path().join("pkg/kubelet/OWNERS")]
        );
    }

    #[test]
    fn test_collect_owners() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            OWNERS_ALIASES,
            "aliases:\n  sig-node-leads:\n    - alice\n    - bob\n  empty-alias:\n",
        );
        write(
            dir.path(),
            "OWNERS",
            "approvers:\n  - sig-node-leads\n  - carol\nreviewers:\n  - dave\nrequired_reviewers:\n  - erin\n",
        );
        write(
            dir.path(),
            "pkg/OWNERS",
            "filters:\n  \".*\":\n    reviewers:\n      - frank\n",
        );

        let inventory = collect_owners(dir.path()).unwrap();
        let users: Vec<&str> = inventory.users.iter().map(String::as_str).collect();
        assert_eq!(users, vec!["alice", "bob", "carol", "dave", "frank"]);
        assert_eq!(inventory.aliases.len(), 2);
        assert_eq!(inventory.files.len(), 3);
        assert_eq!(inventory.files.last(), Some(&dir.path().join(OWNERS_ALIASES)));
        assert!(find_sigs_yaml(dir.path()).is_none());
    }
}
