//! In-place migration of maintainers to `emeritus_approvers`
//!
//! The operations here work on the generic document tree from [`crate::yaml`],
//! so everything the migration does not touch (key order, unrelated keys,
//! scalar styles, comments) is written back as it was read.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::RewriteConfig;
use crate::error::{MaintainersError, Result};
use crate::yaml::{self, Entry, Mapping, Node, Scalar, Sequence};

pub const APPROVERS: &str = "approvers";
pub const EMERITUS_APPROVERS: &str = "emeritus_approvers";
pub const ALIASES: &str = "aliases";

/// What one migration did to a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// The user was removed from at least one list
    pub removed: bool,
    /// The user was added to `emeritus_approvers`
    pub promoted: bool,
}

/// Find the mapping a migration operates on
///
/// This is the first mapping among the document's top-level nodes, or the
/// mapping under its `aliases` key when it has one (the OWNERS_ALIASES layout).
/// An `aliases` key without a nested mapping leaves the outer mapping as target.
pub fn locate_target_mapping(root: &mut Node) -> Option<&mut Mapping> {
    let mapping = match root {
        Node::Document(document) => document.content.iter_mut().find_map(Node::as_mapping_mut)?,
        Node::Mapping(mapping) => mapping,
        _ => return None,
    };

    if matches!(mapping.get(ALIASES), Some(Node::Mapping(_))) {
        return mapping.get_mut(ALIASES).and_then(Node::as_mapping_mut);
    }
    Some(mapping)
}

/// Read-only variant of [`locate_target_mapping`]
pub fn locate_target_mapping_ref(root: &Node) -> Option<&Mapping> {
    let mapping = match root {
        Node::Document(document) => document.content.iter().find_map(Node::as_mapping)?,
        Node::Mapping(mapping) => mapping,
        _ => return None,
    };

    match mapping.get(ALIASES) {
        Some(Node::Mapping(aliases)) => Some(aliases),
        _ => Some(mapping),
    }
}

#[derive(Debug, Default)]
struct Removal {
    removed: usize,
    approver_hit: bool,
}

fn remove_user(mapping: &mut Mapping, user: &str) -> Removal {
    let mut removal = Removal::default();

    for entry in mapping.entries.iter_mut() {
        if entry.key.value == EMERITUS_APPROVERS {
            continue;
        }
        let Node::Sequence(sequence) = &mut entry.value else {
            continue;
        };

        let before = sequence.items.len();
        sequence
            .items
            .retain(|item| !matches!(item, Node::Scalar(scalar) if scalar.matches_ignore_case(user)));
        let removed = before - sequence.items.len();

        if removed > 0 {
            debug!("Removed {} from {}", user, entry.key.value);
            removal.removed += removed;
            if entry.key.value == APPROVERS {
                removal.approver_hit = true;
            }
        }
    }

    removal
}

/// Remove `user` (case-insensitively) from every list of the mapping except
/// `emeritus_approvers`
///
/// Returns true iff something was removed from `approvers`.
pub fn remove_from_named_sequences(mapping: &mut Mapping, user: &str) -> bool {
    remove_user(mapping, user).approver_hit
}

/// Return the sequence stored under `key`, creating it if needed
///
/// A missing key is appended with an empty block sequence. An existing key
/// holding a null gets an empty sequence in its place; any other scalar is
/// kept as the first item of the new sequence.
pub fn find_or_create_sequence<'a>(mapping: &'a mut Mapping, key: &str) -> &'a mut Sequence {
    let idx = match mapping.entries.iter().position(|entry| entry.key.value == key) {
        Some(idx) => idx,
        None => {
            mapping.entries.push(Entry {
                key: Scalar::string(key),
                value: Node::Sequence(Sequence::default()),
            });
            mapping.entries.len() - 1
        }
    };
    sequence_in_place(&mut mapping.entries[idx].value)
}

fn sequence_in_place(value: &mut Node) -> &mut Sequence {
    if !matches!(value, Node::Sequence(_)) {
        let previous = std::mem::replace(value, Node::Scalar(Scalar::null()));
        *value = Node::Sequence(into_sequence(previous));
    }
    match value {
        Node::Sequence(sequence) => sequence,
        _ => unreachable!("value was replaced by a sequence"),
    }
}

fn into_sequence(node: Node) -> Sequence {
    let mut sequence = Sequence::default();
    match node {
        Node::Scalar(mut scalar) if !scalar.is_null() => {
            sequence.comments = std::mem::take(&mut scalar.comments);
            sequence.items.push(Node::Scalar(scalar));
        }
        other => {
            if let Some(comments) = other.comments() {
                sequence.comments = comments.clone();
            }
        }
    }
    sequence
}

/// Move `user` out of the approver and reviewer lists of a document
///
/// Only a removal from `approvers` adds the user to `emeritus_approvers`,
/// spelled as given and only if no entry matches it already. A document
/// without a mapping is left alone.
pub fn migrate_to_emeritus(root: &mut Node, user: &str) -> MigrationOutcome {
    let Some(mapping) = locate_target_mapping(root) else {
        debug!("No mapping to migrate {} in", user);
        return MigrationOutcome::default();
    };

    let removal = remove_user(mapping, user);
    let mut outcome = MigrationOutcome {
        removed: removal.removed > 0,
        promoted: false,
    };
    if !removal.approver_hit {
        debug!("{} is not an approver here, not promoting", user);
        return outcome;
    }

    let emeritus = find_or_create_sequence(mapping, EMERITUS_APPROVERS);
    let already_listed = emeritus
        .items
        .iter()
        .any(|item| matches!(item, Node::Scalar(scalar) if scalar.matches_ignore_case(user)));
    if !already_listed {
        emeritus.items.push(Node::Scalar(Scalar::string(user)));
        outcome.promoted = true;
    }
    outcome
}

/// Migrate each user in turn, re-reading and rewriting `path` for every one
///
/// A failure stops the loop; users processed before it stay written.
pub fn remove_users_from_file(path: &Path, users: &[String], config: &RewriteConfig) -> Result<()> {
    config.validate()?;
    info!("Fixing up {}", path.display());

    for (user_index, user) in users.iter().enumerate() {
        let outcome = rewrite_for_user(path, user, config).map_err(|source| MaintainersError::Rewrite {
            path: path.to_path_buf(),
            user_index,
            user: user.clone(),
            source: Box::new(source),
        })?;
        if outcome.removed {
            debug!(
                "{}: removed {}{}",
                path.display(),
                user,
                if outcome.promoted { ", added to emeritus_approvers" } else { "" }
            );
        }
    }
    Ok(())
}

fn rewrite_for_user(path: &Path, user: &str, config: &RewriteConfig) -> Result<MigrationOutcome> {
    let mut root = yaml::read_file(path)?;
    let outcome = migrate_to_emeritus(&mut root, user);
    if !config.dry_run {
        yaml::write_file(path, &root, config.indent)?;
    }
    Ok(outcome)
}

/// Run [`remove_users_from_file`] over an ordered file list, stopping at the
/// first file that fails
pub fn remove_users_from_files(paths: &[PathBuf], users: &[String], config: &RewriteConfig) -> Result<()> {
    for path in paths {
        remove_users_from_file(path, users, config)?;
    }
    Ok(())
}
