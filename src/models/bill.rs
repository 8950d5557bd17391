//! Structured bill representation
//!
//! These types are the output of the deterministic structuring pass and the
//! input to matching and impact analysis.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A reference to a section of a named California code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeReference {
    /// Canonical code name, e.g. "Education Code"
    pub code_name: String,
    /// Section identifier, e.g. "17070.75" or "8482.3"
    pub section: String,
}

impl CodeReference {
    /// Build a reference with whitespace-normalized fields
    pub fn new(code_name: &str, section: &str) -> Self {
        Self {
            code_name: normalize_ws(code_name),
            section: section.trim().trim_end_matches('.').to_string(),
        }
    }
}

impl std::fmt::Display for CodeReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Section {}", self.code_name, self.section)
    }
}

/// How an operative section alters existing law
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModificationKind {
    Added,
    Amended,
    Repealed,
    RepealedAndAdded,
}

impl Default for ModificationKind {
    fn default() -> Self {
        ModificationKind::Amended
    }
}

/// One enacting section of the bill body ("SECTION 1.", "SEC. 2." ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperativeSection {
    /// The label as printed, e.g. "SEC. 4."
    pub label: String,
    /// The ordinal parsed from the label
    pub number: u32,
    /// Code sections this operative section touches
    pub code_references: Vec<CodeReference>,
    pub modification_kind: ModificationKind,
    /// Complete text of the section, label included
    pub full_text: String,
}

/// One numbered item of the Legislative Counsel's Digest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestItem {
    /// 1-based position within the digest
    pub index: usize,
    /// The full digest item text
    pub summary_text: String,
    /// Text describing existing law, when separable
    pub existing_law: String,
    /// Text describing what the bill changes ("This bill would ...")
    pub proposed_changes: String,
    /// Code references mentioned in the item
    pub referenced_code_sections: Vec<CodeReference>,
    /// Labels of operative sections this item resolved to
    pub matched_section_ids: Vec<String>,
    /// True when matching concluded the item has no operative counterpart
    pub is_digest_only: bool,
}

/// The fully structured bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillDocument {
    /// e.g. "AB 103"
    pub bill_number: String,
    /// Chapter number when the bill has been chaptered
    pub chapter_number: Option<String>,
    /// The "An act to ..." title sentence
    pub title: String,
    pub approval_date: Option<NaiveDate>,
    pub digest_items: Vec<DigestItem>,
    pub operative_sections: Vec<OperativeSection>,
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
