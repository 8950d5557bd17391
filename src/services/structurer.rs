//! Bill text structuring - deterministic layer
//!
//! Splits raw bill text into header, Legislative Counsel's Digest, and the
//! enacted body, then extracts digest items, operative sections, and code
//! references. No model calls here; structuring either succeeds on the text
//! alone or fails with a `ParseError`.

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::bill::{
    BillDocument, CodeReference, DigestItem, ModificationKind, OperativeSection,
};

/// Errors from the deterministic structuring pass
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("bill text is empty")]
    EmptyInput,
    #[error("no Legislative Counsel's Digest heading found")]
    MissingDigest,
    #[error("no enactment clause found after the digest")]
    MissingEnactment,
    #[error("digest contains no items")]
    NoDigestItems,
    #[error("bill header is missing a recognizable bill number")]
    MissingHeader,
    #[error("bill body contains no operative sections")]
    NoOperativeSections,
}

/// The raw text split produced by the parsing phase
#[derive(Debug, Clone, Copy)]
pub struct BillSegments<'a> {
    pub header: &'a str,
    pub digest: &'a str,
    pub body: &'a str,
}

pub struct TextStructurer {
    digest_heading: Regex,
    enactment_clause: Regex,
    bill_number: Regex,
    chapter_number: Regex,
    approval_date: Regex,
    title_line: Regex,
    digest_item_marker: Regex,
    section_marker: Regex,
    code_ref_forward: Regex,
    code_ref_added: Regex,
    code_ref_reverse: Regex,
    extra_sections: Regex,
}

impl TextStructurer {
    pub fn new() -> Self {
        Self {
            digest_heading: Regex::new(r"(?i)LEGISLATIVE\s+COUNSEL[\u{2019}']?S\s+DIGEST").unwrap(),
            enactment_clause: Regex::new(
                r"(?i)The\s+people\s+of\s+the\s+State\s+of\s+California\s+do\s+enact\s+as\s+follows\s*:?",
            )
            .unwrap(),
            bill_number: Regex::new(r"(?i)(Assembly|Senate)\s+Bill\s+(?:No\.\s*)?(\d+)").unwrap(),
            chapter_number: Regex::new(r"(?i)CHAPTER\s+(\d+)").unwrap(),
            approval_date: Regex::new(
                r"(?i)Approved\s+by\s+Governor\s+(\w+\s+\d{1,2},\s+\d{4})",
            )
            .unwrap(),
            title_line: Regex::new(r"(?m)^\s*An\s+act\s+to\s+.*$").unwrap(),
            digest_item_marker: Regex::new(r"\((\d+)\)").unwrap(),
            section_marker: Regex::new(r"(?m)^\s*(SECTION|SEC\.)\s+(\d+)\.").unwrap(),
            code_ref_forward: Regex::new(
                r"(?i)Sections?\s+([\d][\d.,\sand]*?)\s+(?:of|to)\s+the\s+([A-Z][A-Za-z\s]+?Code)",
            )
            .unwrap(),
            // "Section 17071.10 is added to the Education Code"
            code_ref_added: Regex::new(
                r"(?i)Sections?\s+([\d][\d.,\sand]*?)\s+(?:is|are)\s+(?:added|repealed and added)\s+to\s+the\s+([A-Z][A-Za-z\s]+?Code)",
            )
            .unwrap(),
            code_ref_reverse: Regex::new(
                r"(?i)([A-Z][A-Za-z\s]+?Code)\s+Sections?\s+([\d][\d.,\sand]*[\d])",
            )
            .unwrap(),
            extra_sections: Regex::new(r"\d+(?:\.\d+)?[a-z]?").unwrap(),
        }
    }

    /// Phase one: split raw bill text into header, digest, and body
    pub fn parse<'a>(&self, raw_text: &'a str) -> Result<BillSegments<'a>, ParseError> {
        if raw_text.trim().is_empty() {
            return Err(ParseError::EmptyInput);
        }

        let digest_match = self
            .digest_heading
            .find(raw_text)
            .ok_or(ParseError::MissingDigest)?;
        let after_digest_heading = &raw_text[digest_match.end()..];

        // the enacted body begins at the enactment clause; fall back to the
        // first SECTION 1. marker when the clause is missing from the text
        let (digest, body) = if let Some(m) = self.enactment_clause.find(after_digest_heading) {
            (
                &after_digest_heading[..m.start()],
                &after_digest_heading[m.end()..],
            )
        } else if let Some(m) = self.section_marker.find(after_digest_heading) {
            warn!("no enactment clause; splitting at first section marker");
            (
                &after_digest_heading[..m.start()],
                &after_digest_heading[m.start()..],
            )
        } else {
            return Err(ParseError::MissingEnactment);
        };

        Ok(BillSegments {
            header: &raw_text[..digest_match.start()],
            digest,
            body,
        })
    }

    /// Phase two: build the structured document from the split text
    pub fn build(&self, segments: &BillSegments<'_>) -> Result<BillDocument, ParseError> {
        let (bill_number, chapter_number, title, approval_date) =
            self.parse_header(segments.header)?;

        let digest_items = self.parse_digest_items(segments.digest)?;
        let operative_sections = self.parse_body_sections(segments.body)?;

        debug!(
            "structured {}: {} digest items, {} operative sections",
            bill_number,
            digest_items.len(),
            operative_sections.len()
        );

        Ok(BillDocument {
            bill_number,
            chapter_number,
            title,
            approval_date,
            digest_items,
            operative_sections,
        })
    }

    /// Both phases in one call
    pub fn structure(&self, raw_text: &str) -> Result<BillDocument, ParseError> {
        let segments = self.parse(raw_text)?;
        self.build(&segments)
    }

    fn parse_header(
        &self,
        header: &str,
    ) -> Result<(String, Option<String>, String, Option<NaiveDate>), ParseError> {
        let caps = self
            .bill_number
            .captures(header)
            .ok_or(ParseError::MissingHeader)?;
        let prefix = match caps[1].to_lowercase().as_str() {
            "assembly" => "AB",
            _ => "SB",
        };
        let bill_number = format!("{} {}", prefix, &caps[2]);

        let chapter_number = self
            .chapter_number
            .captures(header)
            .map(|c| c[1].to_string());

        let title = self
            .title_line
            .find(header)
            .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();

        let approval_date = self
            .approval_date
            .captures(header)
            .and_then(|c| NaiveDate::parse_from_str(&c[1], "%B %d, %Y").ok());

        Ok((bill_number, chapter_number, title, approval_date))
    }

    /// Split the digest into its numbered "(1) ... (2) ..." items
    fn parse_digest_items(&self, digest_text: &str) -> Result<Vec<DigestItem>, ParseError> {
        let trimmed = digest_text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::NoDigestItems);
        }

        // collect markers that actually continue the 1, 2, 3 ... sequence;
        // parenthesized numbers inside item text are cites, not markers
        let mut markers: Vec<(usize, usize)> = Vec::new();
        let mut expected = 1u32;
        for caps in self.digest_item_marker.captures_iter(trimmed) {
            let whole = caps.get(0).unwrap();
            let number: u32 = caps[1].parse().unwrap_or(0);
            if number == expected {
                markers.push((whole.start(), whole.end()));
                expected += 1;
            }
        }

        let items = if markers.is_empty() {
            // an unnumbered digest is a single item
            vec![self.build_digest_item(1, trimmed)]
        } else {
            let mut items = Vec::with_capacity(markers.len());
            for (i, &(_, end)) in markers.iter().enumerate() {
                let item_end = markers.get(i + 1).map(|&(s, _)| s).unwrap_or(trimmed.len());
                let text = trimmed[end..item_end].trim();
                items.push(self.build_digest_item(i + 1, text));
            }
            items
        };

        if items.iter().all(|i| i.summary_text.is_empty()) {
            return Err(ParseError::NoDigestItems);
        }
        Ok(items)
    }

    fn build_digest_item(&self, index: usize, text: &str) -> DigestItem {
        let summary = normalize_ws(text);
        // digest items conventionally describe existing law, then pivot on
        // "This bill would ..."
        let (existing_law, proposed_changes) = match summary.find("This bill would") {
            Some(pos) => (
                summary[..pos].trim().to_string(),
                summary[pos..].trim().to_string(),
            ),
            None => (String::new(), summary.clone()),
        };
        DigestItem {
            index,
            referenced_code_sections: self.extract_code_references(&summary),
            summary_text: summary,
            existing_law,
            proposed_changes,
            matched_section_ids: Vec::new(),
            is_digest_only: false,
        }
    }

    /// Split the enacted body at its "SECTION n." / "SEC. n." markers
    fn parse_body_sections(&self, body_text: &str) -> Result<Vec<OperativeSection>, ParseError> {
        let marks: Vec<_> = self.section_marker.captures_iter(body_text).collect();
        if marks.is_empty() {
            return Err(ParseError::NoOperativeSections);
        }

        let mut sections = Vec::with_capacity(marks.len());
        for (i, caps) in marks.iter().enumerate() {
            let whole = caps.get(0).unwrap();
            let end = marks
                .get(i + 1)
                .map(|c| c.get(0).unwrap().start())
                .unwrap_or(body_text.len());
            let full_text = body_text[whole.start()..end].trim().to_string();
            let number: u32 = caps[2].parse().unwrap_or(0);
            let label = format!("{} {}.", &caps[1], number);
            sections.push(OperativeSection {
                code_references: self.extract_code_references(&full_text),
                modification_kind: classify_modification(&full_text),
                label,
                number,
                full_text,
            });
        }
        Ok(sections)
    }

    /// Pull every "Section X of the Y Code" style reference out of `text`
    pub fn extract_code_references(&self, text: &str) -> Vec<CodeReference> {
        let mut refs: Vec<CodeReference> = Vec::new();

        for caps in self.code_ref_forward.captures_iter(text) {
            let code_name = caps[2].trim();
            for section in self.split_section_list(&caps[1]) {
                push_unique(&mut refs, CodeReference::new(code_name, &section));
            }
        }
        for caps in self.code_ref_added.captures_iter(text) {
            let code_name = caps[2].trim();
            for section in self.split_section_list(&caps[1]) {
                push_unique(&mut refs, CodeReference::new(code_name, &section));
            }
        }
        for caps in self.code_ref_reverse.captures_iter(text) {
            let code_name = caps[1].trim();
            for section in self.split_section_list(&caps[2]) {
                push_unique(&mut refs, CodeReference::new(code_name, &section));
            }
        }
        refs
    }

    /// "17070.75, 17071.10, and 17072" -> individual section numbers
    fn split_section_list(&self, list: &str) -> Vec<String> {
        self.extra_sections
            .find_iter(list)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Default for TextStructurer {
    fn default() -> Self {
        Self::new()
    }
}

/// Post-matching normalization: a document is consistent when every digest
/// item is either matched or digest-only, never both and never neither.
pub fn normalize_document(doc: &mut BillDocument) {
    for item in &mut doc.digest_items {
        if item.matched_section_ids.is_empty() {
            item.is_digest_only = true;
        } else {
            item.is_digest_only = false;
        }
    }
}

fn classify_modification(text: &str) -> ModificationKind {
    let head: String = text.chars().take(300).collect::<String>().to_lowercase();
    let repealed = head.contains("repealed");
    let added = head.contains("added") || head.contains("is added to");
    match (repealed, added) {
        (true, true) => ModificationKind::RepealedAndAdded,
        (true, false) => ModificationKind::Repealed,
        (false, true) => ModificationKind::Added,
        (false, false) => ModificationKind::Amended,
    }
}

fn push_unique(refs: &mut Vec<CodeReference>, candidate: CodeReference) {
    if !refs.contains(&candidate) {
        refs.push(candidate);
    }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
