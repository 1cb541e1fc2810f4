//! Typed view of the community `sigs.yaml` group registry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::owners::{decode_strict, nullable};

/// The whole registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Context {
    #[serde(default, deserialize_with = "nullable")]
    pub sigs: Vec<Group>,
    #[serde(default, deserialize_with = "nullable")]
    pub workinggroups: Vec<Group>,
    #[serde(default, deserialize_with = "nullable")]
    pub usergroups: Vec<Group>,
    #[serde(default, deserialize_with = "nullable")]
    pub committees: Vec<Group>,
}

/// A SIG, working group, user group or committee
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Group {
    pub dir: String,
    pub name: String,
    pub mission_statement: String,
    pub charter_link: String,
    pub stakeholder_sigs: Vec<String>,
    pub label: String,
    pub leadership: LeadershipGroup,
    pub meetings: Vec<Meeting>,
    pub contact: Contact,
    pub subprojects: Vec<Subproject>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LeadershipGroup {
    pub chairs: Vec<Person>,
    pub tech_leads: Vec<Person>,
    pub emeritus_leads: Vec<Person>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Person {
    pub github: String,
    pub name: String,
    pub company: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Meeting {
    pub description: String,
    pub day: String,
    pub time: String,
    pub tz: String,
    pub frequency: String,
    pub url: String,
    pub archive_url: String,
    pub recordings_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Contact {
    pub slack: String,
    pub mailing_list: String,
    pub private_mailing_list: String,
    pub teams: Vec<GithubTeam>,
    pub liaison: Option<Person>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GithubTeam {
    pub name: String,
    pub description: String,
}

/// Code area owned by a group, with links to its OWNERS files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Subproject {
    pub name: String,
    pub description: String,
    pub contact: Option<Contact>,
    pub owners: Vec<String>,
    pub meetings: Vec<Meeting>,
}

/// Kind of group, with the prefix used for its directory and label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupType {
    Sig,
    WorkingGroup,
    UserGroup,
    Committee,
}

impl GroupType {
    pub const ALL: [GroupType; 4] = [Self::Sig, Self::WorkingGroup, Self::UserGroup, Self::Committee];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Sig => "sig",
            Self::WorkingGroup => "wg",
            Self::UserGroup => "ug",
            Self::Committee => "committee",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Leadership role, as used in person-consistency checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Chair,
    TechLead,
    EmeritusLead,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chair => write!(f, "chair"),
            Self::TechLead => write!(f, "tech_lead"),
            Self::EmeritusLead => write!(f, "emeritus_lead"),
        }
    }
}

impl Context {
    pub fn groups_of(&self, kind: GroupType) -> &[Group] {
        match kind {
            GroupType::Sig => &self.sigs,
            GroupType::WorkingGroup => &self.workinggroups,
            GroupType::UserGroup => &self.usergroups,
            GroupType::Committee => &self.committees,
        }
    }

    /// Every group with its kind, sigs first, then working groups, user groups
    /// and committees
    pub fn groups(&self) -> impl Iterator<Item = (GroupType, &Group)> {
        GroupType::ALL
            .into_iter()
            .flat_map(move |kind| self.groups_of(kind).iter().map(move |group| (kind, group)))
    }
}

impl Group {
    /// Directory the group is expected to live in, e.g. `sig-api-machinery`
    pub fn dir_name(&self, kind: GroupType) -> String {
        format!("{}-{}", kind.prefix(), self.name.replace(' ', "-").to_lowercase())
    }

    /// Label the group is expected to use, e.g. `api-machinery`
    pub fn label_name(&self, kind: GroupType) -> String {
        self.dir_name(kind)
            .replacen(&format!("{}-", kind.prefix()), "", 1)
    }
}

impl LeadershipGroup {
    pub fn by_role(&self) -> [(Role, &[Person]); 3] {
        [
            (Role::Chair, self.chairs.as_slice()),
            (Role::TechLead, self.tech_leads.as_slice()),
            (Role::EmeritusLead, self.emeritus_leads.as_slice()),
        ]
    }
}

pub fn read_sigs_yaml(path: &Path) -> Result<Context> {
    let source = std::fs::read_to_string(path)?;
    decode_strict(path, &source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SIGS_PATH: &str = "sigs.yaml";

    const SIGS: &str = r#"
sigs:
  - dir: sig-api-machinery
    name: API Machinery
    mission_statement: >
      Covers all aspects of API server.
    charter_link: charter.md
    label: api-machinery
    leadership:
      chairs:
        - github: deads2k
          name: David Eads
          company: Red Hat
    meetings:
      - description: Regular SIG Meeting
        day: Wednesday
        time: "11:00"
        tz: PT (Pacific Time)
        frequency: biweekly
    contact:
      slack: sig-api-machinery
      mailing_list: https://groups.google.com/forum/#!forum/kubernetes-sig-api-machinery
    subprojects:
      - name: universal-machinery
        owners:
          - https://raw.githubusercontent.com/kubernetes/apimachinery/master/OWNERS
workinggroups:
  - dir: wg-batch
    name: Batch
    stakeholder_sigs:
      - Apps
"#;

    #[test]
    fn test_decode_sigs_yaml() {
        let context: Context = decode_strict(&PathBuf::from(SIGS_PATH), SIGS).unwrap();
        assert_eq!(context.sigs.len(), 1);
        let sig = &context.sigs[0];
        assert_eq!(sig.mission_statement, "Covers all aspects of API server.\n");
        assert_eq!(sig.leadership.chairs[0].github, "deads2k");
        assert_eq!(sig.meetings[0].time, "11:00");
        assert_eq!(context.workinggroups[0].stakeholder_sigs, vec!["Apps"]);
        assert!(context.committees.is_empty());
    }

    #[test]
    fn test_decode_rejects_unknown_group_field() {
        let source = "sigs:\n  - dir: sig-x\n    chairs: []\n";
        assert!(decode_strict::<Context>(&PathBuf::from(SIGS_PATH), source).is_err());
    }

    #[test]
    fn test_dir_and_label_names() {
        let group = Group {
            name: "API Machinery".to_string(),
            ..Group::default()
        };
        assert_eq!(group.dir_name(GroupType::Sig), "sig-api-machinery");
        assert_eq!(group.label_name(GroupType::Sig), "api-machinery");

        let committee = Group {
            name: "Steering".to_string(),
            ..Group::default()
        };
        assert_eq!(committee.dir_name(GroupType::Committee), "committee-steering");
        assert_eq!(committee.label_name(GroupType::Committee), "steering");
    }

    #[test]
    fn test_groups_iterates_in_kind_order() {
        let context: Context = decode_strict(&PathBuf::from(SIGS_PATH), SIGS).unwrap();
        let kinds: Vec<GroupType> = context.groups().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, vec![GroupType::Sig, GroupType::WorkingGroup]);
    }
}
