//! Analyzed-change model
//!
//! A `Change` is the impact-analysis verdict for one digest item (or group of
//! items); the report payload is assembled from these.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::practice_groups::PracticeGroup;

/// A compliance deadline surfaced by the analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    /// Concrete date when one could be parsed
    pub date: Option<NaiveDate>,
    pub description: String,
    pub affected_agencies: Vec<String>,
}

/// How strongly a practice group is implicated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Primary,
    Secondary,
}

/// A validated practice-group assignment on a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeGroupTag {
    pub group: PracticeGroup,
    pub relevance: Relevance,
    pub justification: String,
}

/// The analyzed impact of one digest item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Index of the digest item this change came from
    pub digest_index: usize,
    /// Plain-language summary of the substantive change
    pub substantive_change: String,
    /// Agency types the change affects, empty when no local impact
    pub local_agencies_impacted: Vec<String>,
    pub impact_description: String,
    pub key_action_items: Vec<String>,
    pub deadlines: Vec<Deadline>,
    pub requirements: Vec<String>,
    pub practice_groups: Vec<PracticeGroupTag>,
    /// True when the item never resolved to an operative section
    pub is_digest_only: bool,
}

impl Change {
    /// The primary practice group, when the model assigned one
    pub fn primary_group(&self) -> Option<PracticeGroup> {
        self.practice_groups
            .iter()
            .find(|t| t.relevance == Relevance::Primary)
            .map(|t| t.group)
    }

    /// Whether the analysis found any local-agency impact
    pub fn has_local_impact(&self) -> bool {
        !self.local_agencies_impacted.is_empty()
    }
}

/// A per-unit analysis failure, reported alongside successes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub digest_index: usize,
    /// Error kind string from the underlying model error
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(group: PracticeGroup, relevance: Relevance) -> PracticeGroupTag {
        PracticeGroupTag {
            group,
            relevance,
            justification: String::new(),
        }
    }

    #[test]
    fn primary_group_skips_secondary_tags() {
        let change = Change {
            digest_index: 1,
            substantive_change: String::new(),
            local_agencies_impacted: vec!["School District".into()],
            impact_description: String::new(),
            key_action_items: vec![],
            deadlines: vec![],
            requirements: vec![],
            practice_groups: vec![
                tag(PracticeGroup::Litigation, Relevance::Secondary),
                tag(PracticeGroup::PublicFinance, Relevance::Primary),
            ],
            is_digest_only: false,
        };
        assert_eq!(change.primary_group(), Some(PracticeGroup::PublicFinance));
        assert!(change.has_local_impact());
    }

    #[test]
    fn relevance_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Relevance::Primary).unwrap(),
            "\"primary\""
        );
    }
}
