//! Report payload assembly
//!
//! Groups analyzed changes by primary practice group, with a general section
//! for impacted-but-unrouted changes and a dedicated section for changes
//! with no local-agency impact. Failures ride along so the report never
//! silently drops a digest item.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::models::bill::BillDocument;
use crate::models::change::{Change, UnitFailure};
use crate::models::practice_groups::PracticeGroup;
use crate::services::analyzer::AnalysisOutcome;

pub const GENERAL_SECTION_TITLE: &str = "General Local Agency Impacts";
pub const NO_IMPACT_SECTION_TITLE: &str = "No Local Agency Impact";

/// Bill header carried on the report
#[derive(Debug, Clone, Serialize)]
pub struct BillMetadata {
    pub bill_number: String,
    pub chapter_number: Option<String>,
    pub title: String,
    pub approval_date: Option<chrono::NaiveDate>,
}

/// One report section with its changes
#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    pub title: String,
    /// Set for practice-group sections, absent for the two fixed sections
    pub practice_group: Option<PracticeGroup>,
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_changes: usize,
    pub analyzed: usize,
    pub digest_only: usize,
    pub failed: usize,
    /// Practice group names with at least one change
    pub practice_areas: Vec<String>,
}

/// The complete structured report
#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload {
    pub bill: BillMetadata,
    pub sections: Vec<ReportSection>,
    pub failed_units: Vec<UnitFailure>,
    pub metadata: ReportMetadata,
}

pub struct ReportBuilder;

impl ReportBuilder {
    /// Assemble the grouped report payload
    pub fn build(doc: &BillDocument, outcome: &AnalysisOutcome) -> ReportPayload {
        let mut sections: Vec<ReportSection> = Vec::new();
        let mut general: Vec<Change> = Vec::new();
        let mut no_impact: Vec<Change> = Vec::new();
        let mut areas: BTreeSet<&'static str> = BTreeSet::new();

        for group in PracticeGroup::all() {
            let changes: Vec<Change> = outcome
                .changes
                .iter()
                .filter(|c| c.primary_group() == Some(*group))
                .cloned()
                .collect();
            if !changes.is_empty() {
                areas.insert(group.name());
                sections.push(ReportSection {
                    title: group.name().to_string(),
                    practice_group: Some(*group),
                    changes,
                });
            }
        }

        for change in &outcome.changes {
            if change.primary_group().is_some() {
                continue;
            }
            if change.has_local_impact() {
                general.push(change.clone());
            } else {
                no_impact.push(change.clone());
            }
        }
        if !general.is_empty() {
            sections.push(ReportSection {
                title: GENERAL_SECTION_TITLE.to_string(),
                practice_group: None,
                changes: general,
            });
        }
        if !no_impact.is_empty() {
            sections.push(ReportSection {
                title: NO_IMPACT_SECTION_TITLE.to_string(),
                practice_group: None,
                changes: no_impact,
            });
        }

        let digest_only = outcome.changes.iter().filter(|c| c.is_digest_only).count();
        let metadata = ReportMetadata {
            generated_at: Utc::now(),
            total_changes: outcome.changes.len(),
            analyzed: outcome.changes.len() - digest_only,
            digest_only,
            failed: outcome.failures.len(),
            practice_areas: areas.into_iter().map(str::to_string).collect(),
        };
        debug!(
            "report for {}: {} sections, {} changes, {} failures",
            doc.bill_number,
            sections.len(),
            metadata.total_changes,
            metadata.failed
        );

        ReportPayload {
            bill: BillMetadata {
                bill_number: doc.bill_number.clone(),
                chapter_number: doc.chapter_number.clone(),
                title: doc.title.clone(),
                approval_date: doc.approval_date,
            },
            sections,
            failed_units: outcome.failures.clone(),
            metadata,
        }
    }
}
