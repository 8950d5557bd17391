//! Digest-item to operative-section matching
//!
//! Deterministic first: a digest item that cites code sections matches the
//! operative sections touching those same sections. Ambiguous or empty
//! overlap escalates to a model call with the candidate list. Items the
//! model resolves to no section become digest-only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::gateway::{ModelGateway, PromptSpec, ResponseMode};
use crate::models::bill::{BillDocument, CodeReference, DigestItem, OperativeSection};
use crate::models::job::ModelSelection;
use crate::utils::logging::truncate_text;

/// Cap on how many candidate sections one escalation prompt carries
const MAX_PROMPT_CANDIDATES: usize = 40;
/// How much of each section's text goes into the prompt
const CANDIDATE_EXCERPT_CHARS: usize = 600;

const MATCH_SYSTEM_PROMPT: &str = "You map items of a California bill's Legislative Counsel's \
Digest to the operative sections of the same bill. Answer with pure JSON, no prose: \
{\"matches\": [\"<section label>\", ...]}. An empty list means the digest item has no \
operative counterpart.";

/// A candidate section serialized into the escalation prompt
#[derive(Serialize)]
struct CandidateForModel<'a> {
    label: &'a str,
    code_references: Vec<String>,
    excerpt: String,
}

pub struct SectionMatcher {
    gateway: Arc<ModelGateway>,
}

impl SectionMatcher {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Resolve every digest item to operative sections (or digest-only)
    ///
    /// `progress` is invoked after each item resolves, with (done, total).
    pub async fn match_document(
        &self,
        doc: &mut BillDocument,
        selection: ModelSelection,
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) {
        let total = doc.digest_items.len();
        let by_reference = index_sections(&doc.operative_sections);

        // deterministic pass
        let mut escalations: Vec<usize> = Vec::new();
        let mut done = 0usize;
        for (idx, item) in doc.digest_items.iter_mut().enumerate() {
            match resolve_by_references(item, &by_reference) {
                Resolution::Matched(labels) => {
                    debug!(
                        "digest item {} matched {} section(s) by code reference",
                        item.index,
                        labels.len()
                    );
                    item.matched_section_ids = labels;
                    item.is_digest_only = false;
                    done += 1;
                    progress(done, total);
                }
                Resolution::Escalate => escalations.push(idx),
            }
        }

        if escalations.is_empty() {
            return;
        }
        info!(
            "🔍 escalating {}/{} digest items to model matching",
            escalations.len(),
            total
        );

        // ambiguous items resolve concurrently; the gateway's rate limiter
        // bounds actual parallelism
        let counter = Arc::new(AtomicUsize::new(done));
        let items: &[DigestItem] = &doc.digest_items;
        let sections: &[OperativeSection] = &doc.operative_sections;
        let reference_index = &by_reference;
        let futures: Vec<_> = escalations
            .iter()
            .map(|&idx| {
                let item = &items[idx];
                let counter = counter.clone();
                async move {
                    let outcome = self
                        .match_with_model(item, sections, reference_index, selection)
                        .await;
                    let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(now, total);
                    (idx, outcome)
                }
            })
            .collect();
        let outcomes = join_all(futures).await;

        for (idx, labels) in outcomes {
            let item = &mut doc.digest_items[idx];
            if labels.is_empty() {
                item.matched_section_ids.clear();
                item.is_digest_only = true;
            } else {
                item.matched_section_ids = labels;
                item.is_digest_only = false;
            }
        }
    }

    /// One escalation call; a gateway failure degrades the item to
    /// digest-only rather than failing the whole matching stage
    async fn match_with_model(
        &self,
        item: &DigestItem,
        sections: &[OperativeSection],
        by_reference: &HashMap<CodeReference, Vec<String>>,
        selection: ModelSelection,
    ) -> Vec<String> {
        let candidates = candidate_sections(item, sections, by_reference);
        debug!(
            "escalating digest item {} ({} candidates): {}",
            item.index,
            candidates.len(),
            truncate_text(&item.summary_text, 80)
        );
        let user = build_match_prompt(item, &candidates);
        let prompt = PromptSpec::for_model(selection, MATCH_SYSTEM_PROMPT, user, ResponseMode::Standard);

        match self.gateway.invoke(selection.provider(), &prompt).await {
            Ok(result) => {
                let labels = parse_match_labels(&result.content, sections);
                debug!(
                    "model matched digest item {} to {:?}",
                    item.index, labels
                );
                labels
            }
            Err(err) => {
                warn!(
                    "⚠️ model matching failed for digest item {}: {}; treating as digest-only",
                    item.index, err
                );
                Vec::new()
            }
        }
    }
}

enum Resolution {
    Matched(Vec<String>),
    Escalate,
}

/// Match deterministically when every cited reference resolves to exactly
/// one operative section
fn resolve_by_references(
    item: &DigestItem,
    by_reference: &HashMap<CodeReference, Vec<String>>,
) -> Resolution {
    if item.referenced_code_sections.is_empty() {
        return Resolution::Escalate;
    }
    let mut labels: Vec<String> = Vec::new();
    let mut any_hit = false;
    for reference in &item.referenced_code_sections {
        match by_reference.get(reference) {
            Some(sections) if sections.len() == 1 => {
                any_hit = true;
                if !labels.contains(&sections[0]) {
                    labels.push(sections[0].clone());
                }
            }
            Some(_) => return Resolution::Escalate, // ambiguous reference
            None => {}
        }
    }
    if any_hit {
        Resolution::Matched(labels)
    } else {
        Resolution::Escalate
    }
}

fn index_sections(sections: &[OperativeSection]) -> HashMap<CodeReference, Vec<String>> {
    let mut map: HashMap<CodeReference, Vec<String>> = HashMap::new();
    for section in sections {
        for reference in &section.code_references {
            map.entry(reference.clone())
                .or_default()
                .push(section.label.clone());
        }
    }
    map
}

/// Candidate pool for an escalation: the union of sections its references
/// point at, or every section when nothing overlapped
fn candidate_sections<'a>(
    item: &DigestItem,
    sections: &'a [OperativeSection],
    by_reference: &HashMap<CodeReference, Vec<String>>,
) -> Vec<&'a OperativeSection> {
    let referenced: Vec<&str> = item
        .referenced_code_sections
        .iter()
        .filter_map(|r| by_reference.get(r))
        .flatten()
        .map(String::as_str)
        .collect();

    let pool: Vec<&OperativeSection> = if referenced.is_empty() {
        sections.iter().collect()
    } else {
        sections
            .iter()
            .filter(|s| referenced.contains(&s.label.as_str()))
            .collect()
    };
    pool.into_iter().take(MAX_PROMPT_CANDIDATES).collect()
}

fn build_match_prompt(item: &DigestItem, candidates: &[&OperativeSection]) -> String {
    let serialized: Vec<CandidateForModel> = candidates
        .iter()
        .map(|s| CandidateForModel {
            label: &s.label,
            code_references: s.code_references.iter().map(|r| r.to_string()).collect(),
            excerpt: s.full_text.chars().take(CANDIDATE_EXCERPT_CHARS).collect(),
        })
        .collect();
    let candidates_json = serde_json::to_string_pretty(&serialized).unwrap_or_default();

    format!(
        "Digest item {}:\n{}\n\nCandidate operative sections:\n{}\n\n\
         Return the labels of the sections this digest item describes.",
        item.index, item.summary_text, candidates_json
    )
}

/// Accept {"matches": ["SEC. 2.", ...]} or objects with a section_label key;
/// unknown labels are dropped
fn parse_match_labels(content: &serde_json::Value, sections: &[OperativeSection]) -> Vec<String> {
    let raw = content
        .get("matches")
        .and_then(|m| m.as_array())
        .cloned()
        .unwrap_or_default();

    let mut labels = Vec::new();
    for entry in raw {
        let candidate = entry
            .as_str()
            .map(str::to_string)
            .or_else(|| {
                entry
                    .get("section_label")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            });
        if let Some(candidate) = candidate {
            if let Some(section) = sections.iter().find(|s| labels_equal(&s.label, &candidate)) {
                if !labels.contains(&section.label) {
                    labels.push(section.label.clone());
                }
            }
        }
    }
    labels
}

fn labels_equal(a: &str, b: &str) -> bool {
    let norm = |s: &str| {
        s.to_uppercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
    };
    norm(a) == norm(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bill::ModificationKind;
    use serde_json::json;

    fn section(label: &str, refs: &[(&str, &str)]) -> OperativeSection {
        OperativeSection {
            label: label.to_string(),
            number: 1,
            code_references: refs
                .iter()
                .map(|(c, s)| CodeReference::new(c, s))
                .collect(),
            modification_kind: ModificationKind::Amended,
            full_text: format!("{} text", label),
        }
    }

    fn item(index: usize, refs: &[(&str, &str)]) -> DigestItem {
        DigestItem {
            index,
            summary_text: format!("digest item {}", index),
            existing_law: String::new(),
            proposed_changes: String::new(),
            referenced_code_sections: refs
                .iter()
                .map(|(c, s)| CodeReference::new(c, s))
                .collect(),
            matched_section_ids: Vec::new(),
            is_digest_only: false,
        }
    }

    #[test]
    fn unique_references_match_deterministically() {
        let sections = vec![
            section("SECTION 1.", &[("Education Code", "100")]),
            section("SEC. 2.", &[("Education Code", "200")]),
        ];
        let index_map = index_sections(&sections);
        let digest = item(1, &[("Education Code", "200")]);
        match resolve_by_references(&digest, &index_map) {
            Resolution::Matched(labels) => assert_eq!(labels, vec!["SEC. 2."]),
            Resolution::Escalate => panic!("expected deterministic match"),
        }
    }

    #[test]
    fn ambiguous_reference_escalates() {
        let sections = vec![
            section("SECTION 1.", &[("Education Code", "100")]),
            section("SEC. 2.", &[("Education Code", "100")]),
        ];
        let index_map = index_sections(&sections);
        let digest = item(1, &[("Education Code", "100")]);
        assert!(matches!(
            resolve_by_references(&digest, &index_map),
            Resolution::Escalate
        ));
    }

    #[test]
    fn item_without_references_escalates() {
        let sections = vec![section("SECTION 1.", &[("Education Code", "100")])];
        let index_map = index_sections(&sections);
        let digest = item(1, &[]);
        assert!(matches!(
            resolve_by_references(&digest, &index_map),
            Resolution::Escalate
        ));
    }

    #[test]
    fn match_labels_accept_strings_and_objects() {
        let sections = vec![
            section("SECTION 1.", &[]),
            section("SEC. 2.", &[]),
        ];
        let content = json!({"matches": ["sec 2", {"section_label": "SECTION 1."}, "SEC. 99."]});
        let labels = parse_match_labels(&content, &sections);
        assert_eq!(labels, vec!["SEC. 2.".to_string(), "SECTION 1.".to_string()]);
    }

    #[test]
    fn candidate_pool_falls_back_to_all_sections() {
        let sections = vec![
            section("SECTION 1.", &[("Education Code", "100")]),
            section("SEC. 2.", &[("Education Code", "200")]),
        ];
        let index_map = index_sections(&sections);
        let digest = item(1, &[("Water Code", "999")]);
        let pool = candidate_sections(&digest, &sections, &index_map);
        assert_eq!(pool.len(), 2);
    }
}
