use std::fmt;

use crate::gateway::ModelError;
use crate::services::structurer::ParseError;

/// Top-level application error type
///
/// Every stage of the analysis pipeline funnels its failures into one of
/// these categories so that the terminal job notification can carry both a
/// human-readable message and a machine-checkable error kind.
#[derive(Debug)]
pub enum AppError {
    /// Bill text retrieval failed (collaborator failure, not retried here)
    Fetch(FetchError),
    /// Bill text structure could not be parsed (deterministic, not retried)
    Parse(ParseError),
    /// Generative-model call failed after the gateway's own retries
    Model(ModelError),
    /// Impact analysis failed as a whole
    Analysis(AnalysisError),
    /// Report payload could not be rendered or written
    Report(ReportError),
    /// Job submission was rejected
    Validation(ValidationError),
    /// The job was cancelled by the caller
    Cancelled,
    /// The job exceeded its configured overall ceiling
    JobTimeout { limit_secs: u64 },
    /// Anything else (wrapping third-party errors)
    Other(String),
}

impl AppError {
    /// Machine-checkable error kind carried by the terminal notification
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch_error",
            AppError::Parse(_) => "parse_error",
            AppError::Model(_) => "model_error",
            AppError::Analysis(_) => "analysis_error",
            AppError::Report(_) => "report_error",
            AppError::Validation(_) => "validation_error",
            AppError::Cancelled => "cancelled",
            AppError::JobTimeout { .. } => "job_timeout",
            AppError::Other(_) => "other",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Fetch(e) => write!(f, "fetch error: {}", e),
            AppError::Parse(e) => write!(f, "parse error: {}", e),
            AppError::Model(e) => write!(f, "model error: {}", e),
            AppError::Analysis(e) => write!(f, "analysis error: {}", e),
            AppError::Report(e) => write!(f, "report error: {}", e),
            AppError::Validation(e) => write!(f, "validation error: {}", e),
            AppError::Cancelled => write!(f, "job cancelled"),
            AppError::JobTimeout { limit_secs } => {
                write!(f, "job exceeded its {}s time limit", limit_secs)
            }
            AppError::Other(msg) => write!(f, "error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Fetch(e) => Some(e),
            AppError::Parse(e) => Some(e),
            AppError::Model(e) => Some(e),
            AppError::Analysis(e) => Some(e),
            AppError::Report(e) => Some(e),
            AppError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Bill text retrieval errors
#[derive(Debug)]
pub enum FetchError {
    /// The bill does not exist for the given session
    NotFound {
        bill_number: String,
        session: String,
    },
    /// The underlying request failed
    RequestFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The response carried no usable text
    EmptyBody {
        bill_number: String,
    },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound {
                bill_number,
                session,
            } => {
                write!(f, "bill {} not found for session {}", bill_number, session)
            }
            FetchError::RequestFailed { url, source } => {
                write!(f, "request to {} failed: {}", url, source)
            }
            FetchError::EmptyBody { bill_number } => {
                write!(f, "empty response body for bill {}", bill_number)
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::RequestFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// Impact-analysis stage errors
#[derive(Debug)]
pub enum AnalysisError {
    /// Every model-backed change group failed; nothing to report
    AllUnitsFailed { failed: usize },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::AllUnitsFailed { failed } => {
                write!(f, "all {} impact-analysis groups failed", failed)
            }
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Report rendering errors
#[derive(Debug)]
pub enum ReportError {
    /// Writing the rendered artifact failed
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The renderer rejected the payload
    RenderFailed {
        message: String,
    },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::WriteFailed { path, source } => {
                write!(f, "failed to write report to {}: {}", path, source)
            }
            ReportError::RenderFailed { message } => {
                write!(f, "failed to render report: {}", message)
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::WriteFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// Job submission validation errors
#[derive(Debug)]
pub enum ValidationError {
    /// The job identifier was empty
    EmptyJobId,
    /// A job with the same identifier is already registered
    DuplicateJobId { job_id: String },
    /// The bill number was missing or blank
    MissingBillNumber,
    /// The model selection string was not recognised
    UnknownModelSelection { value: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyJobId => write!(f, "job id must not be empty"),
            ValidationError::DuplicateJobId { job_id } => {
                write!(f, "job id {} is already registered", job_id)
            }
            ValidationError::MissingBillNumber => write!(f, "bill number must not be empty"),
            ValidationError::UnknownModelSelection { value } => {
                write!(f, "unknown model selection: {}", value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

// ========== Conversions from category errors ==========

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::Fetch(err)
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::Parse(err)
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        AppError::Model(err)
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::Analysis(err)
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        AppError::Report(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Report(ReportError::WriteFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== Result type alias ==========

/// Application result type
pub type AppResult<T> = Result<T, AppError>;
