//! Classifying maintainers by their activity

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::ActivityThresholds;
use crate::types::Contribution;

/// Pair every user with their devstats record, matching case-insensitively
///
/// Returns the matched records (spelled as in the OWNERS files, with the
/// devstats spelling as alias) and the users devstats does not know.
pub fn match_contributions<'a, I>(users: I, contributions: &[Contribution]) -> (Vec<Contribution>, Vec<String>)
where
    I: IntoIterator<Item = &'a String>,
{
    let by_name: BTreeMap<String, &Contribution> = contributions
        .iter()
        .rev()
        .map(|c| (c.id.to_lowercase(), c))
        .collect();

    let mut matched = Vec::new();
    let mut missing = Vec::new();
    for user in users {
        match by_name.get(&user.to_lowercase()) {
            Some(record) => matched.push(Contribution::new(user.as_str(), record.id.as_str(), record.contributions)),
            None => missing.push(user.clone()),
        }
    }
    missing.sort();
    (matched, missing)
}

/// Records for users when devstats is not consulted
pub fn unknown_contributions<'a, I>(users: I) -> Vec<Contribution>
where
    I: IntoIterator<Item = &'a String>,
{
    users
        .into_iter()
        .map(|user| Contribution::new(user.as_str(), user.as_str(), None))
        .collect()
}

/// Both the contribution count and the PR comment count are at or below the thresholds
///
/// An unknown contribution count passes; an unknown PR comment count does not.
pub fn is_low_activity(contribution: &Contribution, thresholds: &ActivityThresholds) -> bool {
    let few_contributions = contribution
        .contributions
        .map_or(true, |count| count <= thresholds.max_contributions);
    let few_comments = contribution
        .pr_comments
        .map_or(false, |count| count <= thresholds.max_pr_comments);
    few_contributions && few_comments
}

/// Most active first
pub fn sort_by_activity(contributions: &mut [Contribution]) {
    contributions.sort_by_key(|c| (Reverse(c.contributions), Reverse(c.pr_comments), c.id.to_lowercase()));
}

/// Final, sorted and deduplicated list of users to migrate
pub fn select_users_to_prune(
    missing: &[String],
    low_activity: &[String],
    include: &BTreeSet<String>,
    exclude: &BTreeSet<String>,
) -> Vec<String> {
    let mut users: BTreeSet<String> = BTreeSet::new();
    users.extend(missing.iter().cloned());
    users.extend(low_activity.iter().cloned());
    users.extend(include.iter().cloned());
    for user in exclude {
        users.remove(user);
    }
    users.into_iter().collect()
}
