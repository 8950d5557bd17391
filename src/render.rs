//! Report rendering
//!
//! `ReportRenderer` is the seam the pipeline hands its payload to;
//! `MarkdownRenderer` writes a Markdown file and returns its path.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::error::ReportError;
use crate::services::report_builder::ReportPayload;

/// Turns a report payload into an external artifact
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Render the payload; returns a reference to the artifact (a path,
    /// URL, or similar)
    async fn render(&self, payload: &ReportPayload) -> Result<String, ReportError>;
}

/// Writes the report as a Markdown file under `output_dir`
pub struct MarkdownRenderer {
    output_dir: PathBuf,
}

impl MarkdownRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn render_markdown(payload: &ReportPayload) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {} — Local Agency Impact Analysis\n\n", payload.bill.bill_number));
        if !payload.bill.title.is_empty() {
            out.push_str(&format!("*{}*\n\n", payload.bill.title));
        }
        if let Some(chapter) = &payload.bill.chapter_number {
            out.push_str(&format!("Chapter {}", chapter));
            if let Some(date) = payload.bill.approval_date {
                out.push_str(&format!(", approved {}", date.format("%B %-d, %Y")));
            }
            out.push_str("\n\n");
        }
        out.push_str(&format!(
            "Changes analyzed: {} ({} digest-only, {} failed)\n\n",
            payload.metadata.total_changes, payload.metadata.digest_only, payload.metadata.failed
        ));

        for section in &payload.sections {
            out.push_str(&format!("## {}\n\n", section.title));
            for change in &section.changes {
                out.push_str(&format!(
                    "### Digest item {}\n\n{}\n\n",
                    change.digest_index, change.substantive_change
                ));
                if change.has_local_impact() {
                    out.push_str(&format!(
                        "**Agencies impacted:** {}\n\n",
                        change.local_agencies_impacted.join(", ")
                    ));
                    out.push_str(&format!("{}\n\n", change.impact_description));
                }
                if !change.key_action_items.is_empty() {
                    out.push_str("**Action items:**\n");
                    for action in &change.key_action_items {
                        out.push_str(&format!("- {}\n", action));
                    }
                    out.push('\n');
                }
                if !change.deadlines.is_empty() {
                    out.push_str("**Deadlines:**\n");
                    for deadline in &change.deadlines {
                        match deadline.date {
                            Some(date) => out.push_str(&format!(
                                "- {}: {}\n",
                                date.format("%Y-%m-%d"),
                                deadline.description
                            )),
                            None => out.push_str(&format!("- {}\n", deadline.description)),
                        }
                    }
                    out.push('\n');
                }
                if !change.requirements.is_empty() {
                    out.push_str("**Requirements:**\n");
                    for requirement in &change.requirements {
                        out.push_str(&format!("- {}\n", requirement));
                    }
                    out.push('\n');
                }
            }
        }

        if !payload.failed_units.is_empty() {
            out.push_str("## Analysis Failures\n\n");
            out.push_str(&format!(
                "{} digest item(s) could not be analyzed:\n\n",
                payload.failed_units.len()
            ));
            for failure in &payload.failed_units {
                out.push_str(&format!(
                    "- Digest item {} ({}): {}\n",
                    failure.digest_index, failure.kind, failure.message
                ));
            }
            out.push('\n');
        }
        out
    }

    fn file_name(payload: &ReportPayload) -> String {
        let bill: String = payload
            .bill
            .bill_number
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        format!(
            "{}_{}.md",
            bill,
            payload.metadata.generated_at.format("%Y%m%d_%H%M%S")
        )
    }
}

#[async_trait]
impl ReportRenderer for MarkdownRenderer {
    async fn render(&self, payload: &ReportPayload) -> Result<String, ReportError> {
        let markdown = Self::render_markdown(payload);
        let path = self.output_dir.join(Self::file_name(payload));

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| ReportError::WriteFailed {
                path: self.output_dir.display().to_string(),
                source: Box::new(e),
            })?;
        tokio::fs::write(&path, markdown)
            .await
            .map_err(|e| ReportError::WriteFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;

        info!("📝 report written to {}", path.display());
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::change::Change;
    use crate::services::report_builder::{BillMetadata, ReportMetadata, ReportSection};
    use chrono::Utc;

    fn payload() -> ReportPayload {
        ReportPayload {
            bill: BillMetadata {
                bill_number: "AB 103".to_string(),
                chapter_number: Some("24".to_string()),
                title: "An act relating to education finance.".to_string(),
                approval_date: None,
            },
            sections: vec![ReportSection {
                title: "Governance".to_string(),
                practice_group: None,
                changes: vec![Change {
                    digest_index: 1,
                    substantive_change: "Requires a new report.".to_string(),
                    local_agencies_impacted: vec!["School District".to_string()],
                    impact_description: "School District: must file annually.".to_string(),
                    key_action_items: vec!["Calendar the filing date".to_string()],
                    deadlines: vec![],
                    requirements: vec![],
                    practice_groups: vec![],
                    is_digest_only: false,
                }],
            }],
            failed_units: vec![],
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                total_changes: 1,
                analyzed: 1,
                digest_only: 0,
                failed: 0,
                practice_areas: vec!["Governance".to_string()],
            },
        }
    }

    #[test]
    fn markdown_contains_sections_and_changes() {
        let markdown = MarkdownRenderer::render_markdown(&payload());
        assert!(markdown.contains("# AB 103"));
        assert!(markdown.contains("## Governance"));
        assert!(markdown.contains("### Digest item 1"));
        assert!(markdown.contains("Calendar the filing date"));
    }

    #[tokio::test]
    async fn renderer_writes_a_file() {
        let dir = std::env::temp_dir().join(format!("tba-render-{}", std::process::id()));
        let renderer = MarkdownRenderer::new(&dir);
        let path = renderer.render(&payload()).await.unwrap();
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(written.contains("AB 103"));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
