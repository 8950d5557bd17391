//! Local-agency impact analysis
//!
//! One model call per matched digest item; digest-only items get a
//! deterministic minimal result with no model call. Per-item failures are
//! recorded and reported, not fatal; the stage fails only when every
//! model-backed item failed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::gateway::{ModelGateway, PromptSpec, ResponseMode};
use crate::models::agency_types::AgencyType;
use crate::models::bill::{BillDocument, DigestItem};
use crate::models::change::{Change, Deadline, PracticeGroupTag, Relevance, UnitFailure};
use crate::models::job::ModelSelection;
use crate::models::practice_groups::PracticeGroup;

const DIGEST_ONLY_PREFIX: &str = "(Legislative Counsel's Digest) ";
const NO_IMPACT_TEXT: &str = "No direct impact on local agencies identified.";

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a California local-agency law analyst. You assess \
how enacted legislation affects local public agencies and route each change to the right \
practice group. Respond with pure JSON matching the requested schema, no prose.";

/// Everything the Analyzing stage produced
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutcome {
    pub changes: Vec<Change>,
    pub failures: Vec<UnitFailure>,
}

pub struct ImpactAnalyzer {
    gateway: Arc<ModelGateway>,
}

impl ImpactAnalyzer {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Analyze every digest item of a matched document
    ///
    /// `progress` is invoked after each item completes, with (done, total).
    pub async fn analyze(
        &self,
        doc: &BillDocument,
        selection: ModelSelection,
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> AnalysisOutcome {
        let total = doc.digest_items.len();
        let mut outcome = AnalysisOutcome::default();

        let mut pending: Vec<&DigestItem> = Vec::new();
        let mut done = 0usize;
        for item in &doc.digest_items {
            if item.is_digest_only {
                outcome.changes.push(digest_only_change(item));
                done += 1;
                progress(done, total);
            } else {
                pending.push(item);
            }
        }
        debug!(
            "analyzing {}: {} model-backed, {} digest-only",
            doc.bill_number,
            pending.len(),
            outcome.changes.len()
        );

        let counter = Arc::new(AtomicUsize::new(done));
        let futures: Vec<_> = pending
            .iter()
            .map(|item| {
                let counter = counter.clone();
                async move {
                    let result = self.analyze_item(doc, item, selection).await;
                    let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(now, total);
                    (item.index, result)
                }
            })
            .collect();

        for (index, result) in join_all(futures).await {
            match result {
                Ok(change) => outcome.changes.push(change),
                Err(failure) => {
                    warn!(
                        "⚠️ impact analysis failed for digest item {}: {}",
                        index, failure.message
                    );
                    outcome.failures.push(failure);
                }
            }
        }

        outcome.changes.sort_by_key(|c| c.digest_index);
        outcome.failures.sort_by_key(|f| f.digest_index);
        info!(
            "✓ analysis complete: {} changes, {} failures",
            outcome.changes.len(),
            outcome.failures.len()
        );
        outcome
    }

    async fn analyze_item(
        &self,
        doc: &BillDocument,
        item: &DigestItem,
        selection: ModelSelection,
    ) -> Result<Change, UnitFailure> {
        let mode = if selection.supports_extended_reasoning() {
            ResponseMode::ExtendedReasoning
        } else {
            ResponseMode::Standard
        };
        let prompt = PromptSpec::for_model(
            selection,
            ANALYSIS_SYSTEM_PROMPT,
            build_analysis_prompt(doc, item),
            mode,
        );

        match self.gateway.invoke(selection.provider(), &prompt).await {
            Ok(result) => Ok(parse_change(item, &result.content)),
            Err(err) => Err(UnitFailure {
                digest_index: item.index,
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

/// Deterministic result for a digest item with no operative counterpart
fn digest_only_change(item: &DigestItem) -> Change {
    Change {
        digest_index: item.index,
        substantive_change: format!("{}{}", DIGEST_ONLY_PREFIX, item.summary_text),
        local_agencies_impacted: Vec::new(),
        impact_description: NO_IMPACT_TEXT.to_string(),
        key_action_items: Vec::new(),
        deadlines: Vec::new(),
        requirements: Vec::new(),
        practice_groups: Vec::new(),
        is_digest_only: true,
    }
}

fn build_analysis_prompt(doc: &BillDocument, item: &DigestItem) -> String {
    let section_texts: Vec<&str> = doc
        .operative_sections
        .iter()
        .filter(|s| item.matched_section_ids.contains(&s.label))
        .map(|s| s.full_text.as_str())
        .collect();

    format!(
        r#"Analyze this change enacted by California bill {bill} for its impact on local public agencies.

Digest item {index}:
{summary}

Operative section text:
{sections}

Local agency types to consider:
{agencies}

Practice groups:
{groups}

Respond with JSON of this exact shape:
{{
  "summary": "<plain-language description of the substantive change>",
  "agency_impacts": [
    {{
      "agency_type": "<one of the agency types above>",
      "impact": "<what this agency must do or how it is affected>",
      "deadlines": [{{"date": "YYYY-MM-DD or null", "description": "..."}}],
      "requirements": ["..."]
    }}
  ],
  "practice_groups": [
    {{"name": "<one of the practice groups above>", "relevance": "primary|secondary", "justification": "..."}}
  ],
  "action_items": ["..."],
  "deadlines": [{{"date": "YYYY-MM-DD or null", "description": "...", "affected_agencies": ["..."]}}],
  "requirements": ["..."]
}}

Count indirect impacts (funding conditions, reporting obligations, compliance exposure) as impacts.
If the change has no effect on any local agency, return an empty agency_impacts list."#,
        bill = doc.bill_number,
        index = item.index,
        summary = item.summary_text,
        sections = section_texts.join("\n\n"),
        agencies = AgencyType::prompt_catalog(),
        groups = PracticeGroup::prompt_catalog(),
    )
}

/// Build a `Change` from the model's JSON, tolerating missing fields
fn parse_change(item: &DigestItem, content: &Value) -> Change {
    let summary = content["summary"]
        .as_str()
        .unwrap_or(&item.summary_text)
        .to_string();

    let mut agencies: Vec<String> = Vec::new();
    let mut impact_parts: Vec<String> = Vec::new();
    let mut deadlines: Vec<Deadline> = Vec::new();
    let mut requirements: Vec<String> = Vec::new();

    if let Some(impacts) = content["agency_impacts"].as_array() {
        for impact in impacts {
            if let Some(agency) = impact["agency_type"].as_str() {
                if !agencies.iter().any(|a| a == agency) {
                    agencies.push(agency.to_string());
                }
                if let Some(text) = impact["impact"].as_str() {
                    impact_parts.push(format!("{}: {}", agency, text));
                }
                deadlines.extend(parse_deadlines(&impact["deadlines"], Some(agency)));
                requirements.extend(parse_string_list(&impact["requirements"]));
            }
        }
    }
    deadlines.extend(parse_deadlines(&content["deadlines"], None));
    requirements.extend(parse_string_list(&content["requirements"]));
    // duplicates may arrive from different agency impacts, so adjacency
    // cannot be assumed
    let mut seen = HashSet::new();
    requirements.retain(|r| seen.insert(r.clone()));

    let impact_description = if impact_parts.is_empty() {
        NO_IMPACT_TEXT.to_string()
    } else {
        impact_parts.join("\n")
    };

    Change {
        digest_index: item.index,
        substantive_change: summary,
        local_agencies_impacted: agencies,
        impact_description,
        key_action_items: parse_string_list(&content["action_items"]),
        deadlines,
        requirements,
        practice_groups: parse_practice_groups(&content["practice_groups"]),
        is_digest_only: false,
    }
}

/// Keep only tags whose name resolves against the catalog
fn parse_practice_groups(value: &Value) -> Vec<PracticeGroupTag> {
    let mut tags = Vec::new();
    if let Some(entries) = value.as_array() {
        for entry in entries {
            let name = entry["name"].as_str().unwrap_or_default();
            let group = match PracticeGroup::from_name(name) {
                Some(group) => group,
                None => {
                    if !name.is_empty() {
                        warn!("model returned unknown practice group {:?}; dropped", name);
                    }
                    continue;
                }
            };
            let relevance = match entry["relevance"].as_str() {
                Some("primary") => Relevance::Primary,
                _ => Relevance::Secondary,
            };
            tags.push(PracticeGroupTag {
                group,
                relevance,
                justification: entry["justification"].as_str().unwrap_or_default().to_string(),
            });
        }
    }
    tags
}

fn parse_deadlines(value: &Value, agency: Option<&str>) -> Vec<Deadline> {
    let mut deadlines = Vec::new();
    if let Some(entries) = value.as_array() {
        for entry in entries {
            let description = entry["description"].as_str().unwrap_or_default().to_string();
            if description.is_empty() {
                continue;
            }
            let affected = match agency {
                Some(a) => vec![a.to_string()],
                None => parse_string_list(&entry["affected_agencies"]),
            };
            deadlines.push(Deadline {
                date: entry["date"]
                    .as_str()
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
                description,
                affected_agencies: affected,
            });
        }
    }
    deadlines
}

fn parse_string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
