//! Audit of the sigs.yaml group registry and the OWNERS files it points to

use regex::Regex;
use reqwest::{Client, StatusCode};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::error::{MaintainersError, Result};
use crate::metadata::build_client;
use crate::owners::{find_owner_files, owners_from_str, read_owners, OwnersInfo};
use crate::sigs::{read_sigs_yaml, Contact, Context, Group, GroupType, Person, Role, Subproject};
use crate::types::{AuditReport, Finding};

const RAW_GITHUB_URL: &str =
    r"https://raw.githubusercontent.com/(?P<org>[^/]+)/(?P<repo>[^/]+)/(?P<branch>[^/]+)/(?P<path>.*)";
const GITHUB_URL: &str =
    r"https://github.com/(?P<org>[^/]+)/(?P<repo>[^/]+)/(blob|tree)/(?P<branch>[^/]+)/(?P<path>.*)";

/// The repository whose OWNERS files get the deeper label and alias checks
const MAIN_REPOSITORY: (&str, &str) = ("kubernetes", "kubernetes");

/// What to audit and where to look
#[derive(Debug, Clone, Default)]
pub struct AuditOptions {
    /// Group names or directories to audit (substring match), or `all`
    pub names: Vec<String>,
    /// Directory local charter links are resolved against
    pub community_dir: PathBuf,
    /// Checkout of the main repository, for classifying its OWNERS files
    pub kubernetes_dir: Option<PathBuf>,
    /// Skip every check that needs the network
    pub offline: bool,
}

/// Link to an OWNERS file, split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnersUrl {
    pub org: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

impl OwnersUrl {
    fn in_main_repository(&self) -> bool {
        (self.org.as_str(), self.repo.as_str()) == MAIN_REPOSITORY
    }
}

/// Accepted shapes of subproject owner links
pub struct OwnersUrlPatterns {
    raw: Regex,
    github: Regex,
}

impl OwnersUrlPatterns {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| MaintainersError::config(format!("bad owners url pattern: {}", e)))
        };
        Ok(Self {
            raw: compile(RAW_GITHUB_URL)?,
            github: compile(GITHUB_URL)?,
        })
    }

    pub fn parse(&self, url: &str) -> Option<OwnersUrl> {
        let captures = self.raw.captures(url).or_else(|| self.github.captures(url))?;
        let part = |name: &str| captures.name(name).map(|m| m.as_str().to_string()).unwrap_or_default();
        Some(OwnersUrl {
            org: part("org"),
            repo: part("repo"),
            branch: part("branch"),
            path: part("path"),
        })
    }
}

/// Audit the groups of `sigs_yaml` selected by `options.names`
pub async fn audit_groups(sigs_yaml: &Path, options: &AuditOptions, network: &NetworkConfig) -> Result<AuditReport> {
    info!("Starting audit of: {}", sigs_yaml.display());

    let context = read_sigs_yaml(sigs_yaml)?;
    let patterns = OwnersUrlPatterns::new()?;
    let mut report = AuditReport::new(format!("audit of {}", sigs_yaml.display()));

    let selected = select_groups(&context, &options.names);
    for name in &options.names {
        if !selected.iter().any(|(_, _, matched_by)| matched_by.contains(name)) {
            report.push(Finding::info(name.as_str(), "not found"));
        }
    }

    for (kind, group, _) in &selected {
        for finding in check_group(*kind, group, &context, &options.community_dir, &patterns) {
            report.push(finding);
        }
    }

    if !selected.is_empty() {
        for finding in check_github_ids(&context) {
            report.push(finding);
        }
        if let Some(kubernetes_dir) = &options.kubernetes_dir {
            for finding in classify_local_owners(&context, &options.names, kubernetes_dir, &patterns)? {
                report.push(finding);
            }
        }
    }

    if options.offline {
        debug!("Offline, skipping charter and OWNERS link checks");
    } else {
        let groups: Vec<(GroupType, &Group)> = selected.iter().map(|(kind, group, _)| (*kind, *group)).collect();
        for finding in check_remote_links(&groups, &patterns, network).await? {
            report.push(finding);
        }
    }

    report.compute_summary();
    info!(
        "Audit complete: {} errors, {} warnings in {} groups",
        report.count(crate::types::Severity::Error),
        report.count(crate::types::Severity::Warning),
        selected.len()
    );

    Ok(report)
}

/// Groups whose name or directory contains one of `names`, each once, with
/// the names that selected it
fn select_groups<'a>(context: &'a Context, names: &[String]) -> Vec<(GroupType, &'a Group, Vec<String>)> {
    let mut selected: Vec<(GroupType, &'a Group, Vec<String>)> = Vec::new();
    for (kind, group) in context.groups() {
        let matched_by: Vec<String> = names
            .iter()
            .filter(|name| name.as_str() == "all" || group.name.contains(name.as_str()) || group.dir.contains(name.as_str()))
            .cloned()
            .collect();
        if !matched_by.is_empty() {
            selected.push((kind, group, matched_by));
        }
    }
    selected
}

fn subject(kind: GroupType, group: &Group) -> String {
    format!("{}/{}", kind, group.dir)
}

/// Structural checks of one group that need neither the network nor other checkouts
pub fn check_group(
    kind: GroupType,
    group: &Group,
    context: &Context,
    community_dir: &Path,
    patterns: &OwnersUrlPatterns,
) -> Vec<Finding> {
    let subject = subject(kind, group);
    let mut findings = Vec::new();

    if group.dir.is_empty() {
        findings.push(Finding::warning(&subject, "missing 'dir' key"));
    }
    if group.name.is_empty() {
        findings.push(Finding::warning(&subject, "missing 'name' key"));
    }

    let expected_dir = group.dir_name(kind);
    if expected_dir != group.dir {
        findings.push(Finding::error(
            &subject,
            format!("expected dir: {}, got: {}", expected_dir, group.dir),
        ));
    }
    let expected_label = group.label_name(kind);
    if expected_label != group.label {
        findings.push(Finding::error(
            &subject,
            format!("expected label: {}, got: {}", expected_label, group.label),
        ));
    }
    if group.label.is_empty() {
        findings.push(Finding::warning(&subject, "missing 'label' key"));
    }

    if kind == GroupType::Sig {
        if group.mission_statement.is_empty() {
            findings.push(Finding::error(&subject, "missing 'mission_statement' key"));
        }
        if group.charter_link.is_empty() {
            findings.push(Finding::error(&subject, "missing 'charter_link' key"));
        } else if !group.charter_link.starts_with("http") {
            let charter = community_dir.join(&group.dir).join(&group.charter_link);
            if !charter.exists() {
                findings.push(Finding::warning(
                    &subject,
                    format!("missing file for 'charter_link' - {}", charter.display()),
                ));
            }
        }
    }

    findings.extend(check_stakeholders(kind, group, context));
    findings.extend(check_leadership(kind, group));

    if group.meetings.is_empty() {
        findings.push(Finding::warning(&subject, "missing 'meetings' key"));
    }
    findings.extend(check_contact(&subject, &group.contact));

    match kind {
        GroupType::Sig if group.subprojects.is_empty() => {
            findings.push(Finding::warning(&subject, "missing 'subprojects' key"));
        }
        GroupType::Sig => {
            for subproject in &group.subprojects {
                findings.extend(check_subproject(&subject, subproject, patterns));
            }
        }
        GroupType::Committee => {}
        _ if !group.subprojects.is_empty() => {
            findings.push(Finding::error(
                &subject,
                format!(
                    "only sigs and committees can own code / have subprojects, found: {} subprojects",
                    group.subprojects.len()
                ),
            ));
        }
        _ => {}
    }

    findings
}

fn check_stakeholders(kind: GroupType, group: &Group, context: &Context) -> Vec<Finding> {
    let subject = subject(kind, group);
    let mut findings = Vec::new();

    if kind != GroupType::WorkingGroup {
        if !group.stakeholder_sigs.is_empty() {
            findings.push(Finding::error(&subject, "only 'workinggroups' may have stakeholder_sigs"));
        }
        return findings;
    }

    if group.stakeholder_sigs.is_empty() {
        findings.push(Finding::warning(&subject, "missing 'stakeholder_sigs' key"));
    }
    for stakeholder in &group.stakeholder_sigs {
        if !context.sigs.iter().any(|sig| &sig.name == stakeholder) {
            findings.push(Finding::warning(
                &subject,
                format!("stakeholder_sigs entry '{}' not found (typo?)", stakeholder),
            ));
        }
    }
    findings
}

fn check_leadership(kind: GroupType, group: &Group) -> Vec<Finding> {
    let subject = subject(kind, group);
    let leadership = &group.leadership;
    let mut findings = Vec::new();

    if leadership.chairs.is_empty() {
        findings.push(Finding::warning(&subject, "missing 'chairs' key (in 'leadership' section)"));
    } else if kind == GroupType::Sig && leadership.chairs.len() == 1 {
        findings.push(Finding::warning(
            &subject,
            "please consider adding more folks in as 'chairs' (in 'leadership' section)",
        ));
    }
    if leadership.tech_leads.is_empty() {
        findings.push(Finding::warning(&subject, "missing 'tech_leads' key (in 'leadership' section)"));
        if kind == GroupType::Sig {
            findings.push(Finding::warning(
                &subject,
                "if chairs are serving as tech leads, please add them explicitly in 'tech_leads' key (in 'leadership' section)",
            ));
        }
    }

    for (_, people) in leadership.by_role() {
        for person in people {
            findings.extend(check_person(&subject, "leadership", person));
        }
    }
    findings
}

fn check_person(subject: &str, section: &str, person: &Person) -> Vec<Finding> {
    let mut findings = Vec::new();
    if person.name.is_empty() {
        findings.push(Finding::warning(subject, format!("missing 'name' key in {}", section)));
    }
    if person.github.is_empty() {
        findings.push(Finding::warning(
            subject,
            format!("missing 'github' key in {} for {}", section, person.name),
        ));
    }
    findings
}

fn check_contact(subject: &str, contact: &Contact) -> Vec<Finding> {
    let mut findings = Vec::new();
    if contact.slack.is_empty() {
        findings.push(Finding::warning(subject, "missing 'slack' in contact"));
    }
    if contact.mailing_list.is_empty() {
        findings.push(Finding::warning(subject, "missing 'mailing_list' in contact"));
    }
    if contact.private_mailing_list.is_empty() {
        findings.push(Finding::optional(subject, "missing 'private_mailing_list' in contact"));
    }
    if contact.teams.is_empty() {
        findings.push(Finding::optional(subject, "missing 'teams' in contact"));
    }
    if let Some(liaison) = &contact.liaison {
        findings.extend(check_person(subject, "contact/liaison", liaison));
    }
    findings
}

fn check_subproject(group_subject: &str, subproject: &Subproject, patterns: &OwnersUrlPatterns) -> Vec<Finding> {
    let subject = format!("{}/{}", group_subject, subproject.name);
    let mut findings = Vec::new();

    if subproject.name.is_empty() {
        findings.push(Finding::warning(&subject, "missing 'name' key"));
    }
    if subproject.description.is_empty() {
        findings.push(Finding::warning(&subject, "missing 'description' key"));
    }
    match &subproject.contact {
        Some(contact) => findings.extend(check_contact(&subject, contact)),
        None => findings.push(Finding::warning(&subject, "missing 'contact' key")),
    }
    if subproject.owners.is_empty() {
        findings.push(Finding::error(&subject, "missing 'owners' key"));
    }
    for url in &subproject.owners {
        if patterns.parse(url).is_none() {
            findings.push(Finding::error(
                &subject,
                format!("owner urls should match regexp {}, found: {}", RAW_GITHUB_URL, url),
            ));
        }
    }
    if subproject.meetings.is_empty() {
        findings.push(Finding::warning(&subject, "missing 'meetings' key"));
    }
    findings
}

/// The same GitHub id must carry the same name (and, outside emeritus
/// roles, the same company) everywhere; emeritus leads carry no company
pub fn check_github_ids(context: &Context) -> Vec<Finding> {
    let mut people: HashMap<&str, &Person> = HashMap::new();
    let mut findings = Vec::new();

    for (kind, group) in context.groups() {
        let subject = subject(kind, group);
        for (role, persons) in group.leadership.by_role() {
            let emeritus = role == Role::EmeritusLead;
            for person in persons {
                match people.get(person.github.as_str()) {
                    Some(known) => {
                        if known.name != person.name || (!emeritus && known.company != person.company) {
                            findings.push(Finding::error(
                                &subject,
                                format!(
                                    "{}: expected person: {} ({}, {}), got: {} ({}, {})",
                                    role,
                                    known.github,
                                    known.name,
                                    known.company,
                                    person.github,
                                    person.name,
                                    person.company
                                ),
                            ));
                        }
                    }
                    None if !emeritus => {
                        people.insert(person.github.as_str(), person);
                    }
                    None => {}
                }

                if emeritus && !person.company.is_empty() {
                    findings.push(Finding::error(
                        &subject,
                        format!(
                            "emeritus leads should not have company specified; company specified for: {}",
                            person.name
                        ),
                    ));
                }
            }
        }
    }
    findings
}

fn names_select_any(groups: &BTreeSet<String>, names: &[String]) -> bool {
    groups.iter().any(|group| {
        names
            .iter()
            .any(|name| name == "all" || group == name || group.contains(name.as_str()))
    })
}

/// Groups a local OWNERS file most likely belongs to, judged by its labels
/// and the aliases it lists
fn likely_groups(info: &OwnersInfo, group_dirs: &BTreeSet<String>) -> BTreeSet<String> {
    let labels = info.labels.iter().map(|label| label.replace('/', "-"));
    let owners = info.all_owners().cloned();
    let mut likely = BTreeSet::new();
    for candidate in labels.chain(owners) {
        for dir in group_dirs {
            if candidate.starts_with(dir.as_str()) {
                likely.insert(dir.clone());
            }
        }
    }
    likely
}

/// Compare the OWNERS files of a main-repository checkout against the groups
/// that claim them in sigs.yaml
pub fn classify_local_owners(
    context: &Context,
    names: &[String],
    kubernetes_dir: &Path,
    patterns: &OwnersUrlPatterns,
) -> Result<Vec<Finding>> {
    let mut claimed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut group_dirs = BTreeSet::new();
    for (_, group) in context.groups() {
        group_dirs.insert(group.dir.clone());
        for subproject in &group.subprojects {
            for url in subproject.owners.iter().filter_map(|url| patterns.parse(url)) {
                if url.in_main_repository() {
                    claimed.entry(url.path).or_default().insert(group.dir.clone());
                }
            }
        }
    }

    let mut findings = BTreeSet::new();
    for file in find_owner_files(kubernetes_dir)? {
        let subpath = file
            .strip_prefix(kubernetes_dir)
            .unwrap_or(&file)
            .to_string_lossy()
            .into_owned();
        let info = match read_owners(&file) {
            Ok(info) => info,
            Err(e) => {
                findings.insert(Finding::error(&subpath, format!("unable to read file - {}", e)));
                continue;
            }
        };

        let candidates = likely_groups(&info, &group_dirs);
        match claimed.get(&subpath) {
            Some(actual) => {
                if !candidates.is_empty()
                    && &candidates != actual
                    && (names_select_any(&candidates, names) || names_select_any(actual, names))
                {
                    findings.insert(Finding::error(
                        &subpath,
                        format!(
                            "should be in {:?} based on labels/aliases but is in {:?}",
                            candidates, actual
                        ),
                    ));
                }
            }
            None if candidates.is_empty() => {
                findings.insert(Finding::info(&subpath, "unable to classify"));
            }
            None => {
                if names_select_any(&candidates, names) {
                    findings.insert(Finding::warning(
                        &subpath,
                        format!("should be in one of {:?} based on labels/aliases", candidates),
                    ));
                }
            }
        }
    }

    Ok(findings.into_iter().collect())
}

/// Label and alias expectations for an OWNERS file of the main repository
pub fn check_owners_info(subject: &str, look_for: &str, group_label: &str, info: &OwnersInfo, url: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    let labelled = if info.labels.is_empty() {
        false
    } else {
        group_label.is_empty() || info.labels.iter().any(|label| label.ends_with(group_label))
    };
    if !labelled {
        findings.push(Finding::warning(
            subject,
            format!("needs labels reflecting {} - {}", look_for, url),
        ));
    }
    if !info.all_owners().any(|owner| owner.contains(look_for)) {
        findings.push(Finding::warning(
            subject,
            format!("needs an alias as approver/reviewer reflecting {} - {}", look_for, url),
        ));
    }
    findings
}

/// What a spawned link check needs to know about its group
#[derive(Clone)]
struct LinkCheck {
    subject: String,
    url: String,
    look_for: String,
    label: String,
    inspect: bool,
}

/// Fetch charter links and subproject OWNERS links of the selected groups
async fn check_remote_links(
    groups: &[(GroupType, &Group)],
    patterns: &OwnersUrlPatterns,
    network: &NetworkConfig,
) -> Result<Vec<Finding>> {
    let client = build_client(network)?;
    let mut tasks = Vec::new();

    for (kind, group) in groups {
        let subject = subject(*kind, group);
        if *kind == GroupType::Sig && group.charter_link.starts_with("http") {
            let client = client.clone();
            let url = group.charter_link.clone();
            let subject = subject.clone();
            tasks.push(tokio::spawn(async move { check_charter_url(&client, &subject, &url).await }));
        }
        if *kind != GroupType::Sig {
            continue;
        }

        for subproject in &group.subprojects {
            for url in &subproject.owners {
                let Some(parsed) = patterns.parse(url) else {
                    continue;
                };
                let check = LinkCheck {
                    subject: subject.clone(),
                    url: url.clone(),
                    look_for: group.dir_name(*kind),
                    label: group.label.clone(),
                    inspect: parsed.in_main_repository(),
                };
                let client = client.clone();
                tasks.push(tokio::spawn(async move { check_owners_url(&client, check).await }));
                sleep(network.request_delay()).await;
            }
        }
    }

    let mut findings = Vec::new();
    for task in tasks {
        match task.await {
            Ok(found) => findings.extend(found),
            Err(e) => warn!("Link check failed: {}", e),
        }
    }
    Ok(findings)
}

async fn check_charter_url(client: &Client, subject: &str, url: &str) -> Vec<Finding> {
    let reachable = matches!(client.get(url).send().await, Ok(response) if response.status() == StatusCode::OK);
    if reachable {
        Vec::new()
    } else {
        vec![Finding::warning(
            subject,
            format!("unable to reach url for 'charter_link' - {}", url),
        )]
    }
}

async fn check_owners_url(client: &Client, check: LinkCheck) -> Vec<Finding> {
    let response = match client.get(&check.url).send().await {
        Ok(response) if response.status() == StatusCode::OK => response,
        Ok(response) => {
            return vec![Finding::warning(
                &check.subject,
                format!("stale url - {} - http status code = {}", check.url, response.status().as_u16()),
            )]
        }
        Err(e) => {
            return vec![Finding::warning(
                &check.subject,
                format!("stale url - {} - {}", check.url, e),
            )]
        }
    };

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            return vec![Finding::error(
                &check.subject,
                format!("unable to read owners file at {} url - {}", check.url, e),
            )]
        }
    };
    let info = match owners_from_str(Path::new(&check.url), &body) {
        Ok(info) => info,
        Err(e) => {
            return vec![Finding::error(
                &check.subject,
                format!("unable to parse owners file at {} url - {}", check.url, e),
            )]
        }
    };

    if !check.inspect {
        return Vec::new();
    }
    check_owners_info(&check.subject, &check.look_for, &check.label, &info, &check.url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owners::decode_strict;
    use crate::types::Severity;
    use std::fs;
    use tempfile::TempDir;

    const SIGS: &str = r#"
sigs:
  - dir: sig-node
    name: Node
    mission_statement: Runs pods.
    charter_link: charter.md
    label: node
    leadership:
      chairs:
        - github: alice
          name: Alice
          company: Acme
        - github: bob
          name: Bob
          company: Initech
      tech_leads:
        - github: alice
          name: Alice
          company: Acme
    meetings:
      - description: Weekly
    contact:
      slack: sig-node
      mailing_list: sig-node@example.com
      private_mailing_list: sig-node-private@example.com
      teams:
        - name: sig-node-leads
    subprojects:
      - name: kubelet
        description: The node agent
        contact:
          slack: sig-node
          mailing_list: sig-node@example.com
          private_mailing_list: sig-node-private@example.com
          teams:
            - name: kubelet
        owners:
          - https://raw.githubusercontent.com/kubernetes/kubernetes/master/pkg/kubelet/OWNERS
        meetings:
          - description: Weekly
  - dir: sig-apps
    name: Apps
    label: apps
    leadership:
      chairs:
        - github: alice
          name: Alice A.
          company: Acme
      emeritus_leads:
        - github: carol
          name: Carol
          company: Globex
    subprojects:
      - name: workloads
        owners:
          - https://example.com/OWNERS
workinggroups:
  - dir: wg-batch
    name: Batch
    label: batch
    stakeholder_sigs:
      - Node
      - Scheduling
"#;

    fn context() -> Context {
        decode_strict(Path::new("sigs.yaml"), SIGS).unwrap()
    }

    fn messages(findings: &[Finding]) -> Vec<String> {
        findings.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_owners_url_patterns() {
        let patterns = OwnersUrlPatterns::new().unwrap();
        let raw = patterns
            .parse("https://raw.githubusercontent.com/kubernetes/kubernetes/master/pkg/kubelet/OWNERS")
            .unwrap();
        assert_eq!(raw.path, "pkg/kubelet/OWNERS");
        assert!(raw.in_main_repository());

        let blob = patterns
            .parse("https://github.com/kubernetes-sigs/kind/blob/main/OWNERS")
            .unwrap();
        assert_eq!(blob.org, "kubernetes-sigs");
        assert_eq!(blob.branch, "main");
        assert!(!blob.in_main_repository());

        assert!(patterns.parse("https://example.com/OWNERS").is_none());
    }

    #[test]
    fn test_clean_group_has_only_charter_warning() {
        let context = context();
        let dir = TempDir::new().unwrap();
        let patterns = OwnersUrlPatterns::new().unwrap();

        let findings = check_group(GroupType::Sig, &context.sigs[0], &context, dir.path(), &patterns);
        assert_eq!(findings.len(), 1, "{:?}", messages(&findings));
        assert!(findings[0].message.starts_with("missing file for 'charter_link'"));

        fs::create_dir_all(dir.path().join("sig-node")).unwrap();
        fs::write(dir.path().join("sig-node/charter.md"), "# Charter\n").unwrap();
        let findings = check_group(GroupType::Sig, &context.sigs[0], &context, dir.path(), &patterns);
        assert!(findings.is_empty(), "{:?}", messages(&findings));
    }

    #[test]
    fn test_incomplete_group() {
        let context = context();
        let patterns = OwnersUrlPatterns::new().unwrap();
        let findings = check_group(GroupType::Sig, &context.sigs[1], &context, Path::new("."), &patterns);
        let all = messages(&findings);

        assert!(all.contains(&"ERROR: sig/sig-apps: missing 'mission_statement' key".to_string()));
        assert!(all.contains(&"ERROR: sig/sig-apps: missing 'charter_link' key".to_string()));
        assert!(all.contains(&"WARNING: sig/sig-apps: missing 'meetings' key".to_string()));
        assert!(all.contains(&"OPTIONAL: sig/sig-apps: missing 'teams' in contact".to_string()));
        assert!(all.contains(&"WARNING: sig/sig-apps/workloads: missing 'contact' key".to_string()));
        assert!(all
            .iter()
            .any(|m| m.starts_with("ERROR: sig/sig-apps/workloads: owner urls should match regexp")));
    }

    #[test]
    fn test_working_group_stakeholders() {
        let context = context();
        let patterns = OwnersUrlPatterns::new().unwrap();
        let findings = check_group(
            GroupType::WorkingGroup,
            &context.workinggroups[0],
            &context,
            Path::new("."),
            &patterns,
        );
        let all = messages(&findings);
        assert!(all.contains(&"WARNING: wg/wg-batch: stakeholder_sigs entry 'Scheduling' not found (typo?)".to_string()));
        assert!(!all.iter().any(|m| m.contains("'Node'")));
    }

    #[test]
    fn test_check_github_ids() {
        let findings = check_github_ids(&context());
        assert_eq!(findings.len(), 2, "{:?}", messages(&findings));
        assert!(findings.iter().all(|f| f.severity == Severity::Error && f.subject == "sig/sig-apps"));
        assert!(findings[0].message.starts_with("chair: expected person: alice (Alice, Acme)"));
        assert!(findings[1].message.contains("company specified for: Carol"));
    }

    #[test]
    fn test_check_owners_info() {
        let info = OwnersInfo {
            approvers: vec!["sig-node-approvers".to_string()],
            labels: vec!["sig/node".to_string()],
            ..OwnersInfo::default()
        };
        assert!(check_owners_info("sig/sig-node", "sig-node", "node", &info, "u").is_empty());

        let bare = OwnersInfo {
            approvers: vec!["alice".to_string()],
            ..OwnersInfo::default()
        };
        let findings = check_owners_info("sig/sig-node", "sig-node", "node", &bare, "u");
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_classify_local_owners() {
        let dir = TempDir::new().unwrap();
        let write = |rel: &str, content: &str| {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        };
        write("pkg/kubelet/OWNERS", "approvers:\n  - sig-apps-approvers\n");
        write("pkg/controller/OWNERS", "labels:\n  - sig/apps\n");
        write("hack/OWNERS", "approvers:\n  - alice\n");

        let patterns = OwnersUrlPatterns::new().unwrap();
        let findings = classify_local_owners(&context(), &["all".to_string()], dir.path(), &patterns).unwrap();
        let all = messages(&findings);

        assert_eq!(all.len(), 3, "{:?}", all);
        assert!(all.contains(&"INFO: hack/OWNERS: unable to classify".to_string()));
        assert!(all.contains(
            &"WARNING: pkg/controller/OWNERS: should be in one of {\"sig-apps\"} based on labels/aliases".to_string()
        ));
        assert!(all.contains(
            &"ERROR: pkg/kubelet/OWNERS: should be in {\"sig-apps\"} based on labels/aliases but is in {\"sig-node\"}"
                .to_string()
        ));
    }

    #[tokio::test]
    async fn test_audit_groups_offline() {
        let dir = TempDir::new().unwrap();
        let sigs = dir.path().join("sigs.yaml");
        fs::write(&sigs, SIGS).unwrap();

        let options = AuditOptions {
            names: vec!["Node".to_string(), "nothing-like-this".to_string()],
            community_dir: dir.path().to_path_buf(),
            kubernetes_dir: None,
            offline: true,
        };
        let report = audit_groups(&sigs, &options, &NetworkConfig::default()).await.unwrap();

        assert!(report
            .findings
            .contains(&Finding::info("nothing-like-this", "not found")));
        assert!(report.findings.iter().any(|f| f.subject == "sig/sig-node"));
        assert!(!report.findings.iter().any(|f| f.subject == "sig/sig-apps" && f.message.contains("meetings")));
        assert!(report.has_errors());
    }

    #[tokio::test]
    async fn test_check_remote_links() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/charter")
            .with_status(404)
            .create_async()
            .await;

        let context = context();
        let mut group = context.sigs[0].clone();
        group.charter_link = format!("{}/charter", server.url());
        let network = NetworkConfig {
            request_delay_ms: 1,
            ..NetworkConfig::default()
        };
        let patterns = OwnersUrlPatterns::new().unwrap();
        group.subprojects.clear();

        let findings = check_remote_links(&[(GroupType::Sig, &group)], &patterns, &network)
            .await
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.starts_with("unable to reach url for 'charter_link'"));
    }
}
