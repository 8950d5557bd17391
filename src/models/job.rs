//! Job lifecycle model
//!
//! Status, stage ladder, model selection, submission request, progress
//! events, and the per-job record the registry keeps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lifecycle status of an analysis job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The pipeline stage ladder
///
/// Numbering is strictly increasing; a running job may only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching = 1,
    Parsing = 2,
    Structuring = 3,
    Matching = 4,
    Analyzing = 5,
    Reporting = 6,
}

impl Stage {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Fetching => "fetching",
            Stage::Parsing => "parsing",
            Stage::Structuring => "structuring",
            Stage::Matching => "matching",
            Stage::Analyzing => "analyzing",
            Stage::Reporting => "reporting",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Model provider families the gateway can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// User-facing model choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSelection {
    Gpt4o,
    Gpt41,
    O4Mini,
    Claude37Sonnet,
}

impl ModelSelection {
    /// Parse a selection string ("gpt-4o", "claude-3-7-sonnet", ...)
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "gpt-4o" | "gpt4o" => Ok(ModelSelection::Gpt4o),
            "gpt-4.1" | "gpt-41" | "gpt4.1" => Ok(ModelSelection::Gpt41),
            "o4-mini" | "o4mini" => Ok(ModelSelection::O4Mini),
            "claude-3-7-sonnet" | "claude-3.7-sonnet" | "claude" => {
                Ok(ModelSelection::Claude37Sonnet)
            }
            other => Err(ValidationError::UnknownModelSelection {
                value: other.to_string(),
            }),
        }
    }

    /// The provider-side model identifier
    pub fn model_id(self) -> &'static str {
        match self {
            ModelSelection::Gpt4o => "gpt-4o-2024-08-06",
            ModelSelection::Gpt41 => "gpt-4.1",
            ModelSelection::O4Mini => "o4-mini",
            ModelSelection::Claude37Sonnet => "claude-3-7-sonnet-20250219",
        }
    }

    pub fn provider(self) -> ProviderKind {
        match self {
            ModelSelection::Gpt4o | ModelSelection::Gpt41 | ModelSelection::O4Mini => {
                ProviderKind::OpenAi
            }
            ModelSelection::Claude37Sonnet => ProviderKind::Anthropic,
        }
    }

    /// Whether the model can return a separate reasoning trace
    pub fn supports_extended_reasoning(self) -> bool {
        matches!(self, ModelSelection::Claude37Sonnet)
    }
}

impl std::fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.model_id())
    }
}

/// A validated job submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: String,
    /// e.g. "AB 103"
    pub bill_number: String,
    /// Session start year, e.g. "2025"
    pub session_year: String,
    pub model: ModelSelection,
}

impl JobRequest {
    /// Validate the raw submission fields
    pub fn parse(
        job_id: &str,
        bill_number: &str,
        session_year: &str,
        model: &str,
    ) -> Result<Self, ValidationError> {
        if job_id.trim().is_empty() {
            return Err(ValidationError::EmptyJobId);
        }
        if bill_number.trim().is_empty() {
            return Err(ValidationError::MissingBillNumber);
        }
        Ok(Self {
            job_id: job_id.trim().to_string(),
            bill_number: bill_number.trim().to_string(),
            session_year: session_year.trim().to_string(),
            model: ModelSelection::parse(model)?,
        })
    }
}

/// The registry's record of a job
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub request: JobRequest,
    pub status: JobStatus,
    /// Highest stage reached so far
    pub current_stage: Option<Stage>,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Path (or other reference) to the rendered report on success
    pub result_ref: Option<String>,
    /// Kind + message of the terminal error on failure
    pub last_error: Option<(String, String)>,
}

impl AnalysisJob {
    pub fn new(request: JobRequest) -> Self {
        Self {
            request,
            status: JobStatus::Pending,
            current_stage: None,
            submitted_at: Utc::now(),
            completed_at: None,
            result_ref: None,
            last_error: None,
        }
    }

    /// Record entry into a stage, enforcing forward-only movement
    pub fn enter_stage(&mut self, stage: Stage) {
        match self.current_stage {
            Some(current) if stage <= current => {}
            _ => self.current_stage = Some(stage),
        }
    }
}

/// A progress notification emitted during a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ProgressKind,
}

/// The closed set of progress notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressKind {
    /// A stage is beginning
    StageStarted { stage: Stage, message: String },
    /// Sub-unit progress within Matching or Analyzing
    SubStep {
        stage: Stage,
        current: usize,
        total: usize,
        message: String,
    },
    /// The job reached a terminal status
    Finished { status: JobStatus, message: String },
}

impl ProgressEvent {
    pub fn stage_started(job_id: &str, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
            kind: ProgressKind::StageStarted {
                stage,
                message: message.into(),
            },
        }
    }

    pub fn sub_step(
        job_id: &str,
        stage: Stage,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
            kind: ProgressKind::SubStep {
                stage,
                current,
                total,
                message: message.into(),
            },
        }
    }

    pub fn finished(job_id: &str, status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            timestamp: Utc::now(),
            kind: ProgressKind::Finished {
                status,
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_numbers_increase() {
        assert!(Stage::Fetching < Stage::Parsing);
        assert!(Stage::Analyzing < Stage::Reporting);
        assert_eq!(Stage::Fetching.number(), 1);
        assert_eq!(Stage::Reporting.number(), 6);
    }

    #[test]
    fn enter_stage_never_moves_backward() {
        let request = JobRequest::parse("j1", "AB 103", "2025", "gpt-4o").unwrap();
        let mut job = AnalysisJob::new(request);
        job.enter_stage(Stage::Matching);
        job.enter_stage(Stage::Parsing);
        assert_eq!(job.current_stage, Some(Stage::Matching));
        job.enter_stage(Stage::Analyzing);
        assert_eq!(job.current_stage, Some(Stage::Analyzing));
    }

    #[test]
    fn model_selection_parses_aliases() {
        assert_eq!(
            ModelSelection::parse("Claude-3-7-Sonnet").unwrap(),
            ModelSelection::Claude37Sonnet
        );
        assert_eq!(ModelSelection::parse("gpt-4o").unwrap(), ModelSelection::Gpt4o);
        assert!(ModelSelection::parse("gpt-2").is_err());
    }

    #[test]
    fn request_rejects_blank_fields() {
        assert!(matches!(
            JobRequest::parse("", "AB 103", "2025", "gpt-4o"),
            Err(ValidationError::EmptyJobId)
        ));
        assert!(matches!(
            JobRequest::parse("j1", "  ", "2025", "gpt-4o"),
            Err(ValidationError::MissingBillNumber)
        ));
    }

    #[test]
    fn progress_event_serializes_tagged() {
        let event = ProgressEvent::stage_started("j1", Stage::Fetching, "fetching bill text");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "stage_started");
        assert_eq!(value["stage"], "fetching");
        assert_eq!(value["job_id"], "j1");
    }
}
