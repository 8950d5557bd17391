//! Trailer bill analysis pipeline
//!
//! Fetches a California bill, structures its text, correlates the
//! Legislative Counsel's Digest with the enacted sections, assesses
//! local-agency impact through generative-model providers, and renders a
//! practice-group-organized report.
//!
//! ## Architecture
//!
//! Layered, dependencies point downward only:
//!
//! - **orchestrator**: job registry (submission, status, cancellation,
//!   eviction); one spawned task per job
//! - **workflow**: the per-job pipeline state machine and its context
//! - **services**: structuring, matching, impact analysis, report assembly
//! - **gateway**: provider-agnostic model access (rate limiting, timeout,
//!   retry, JSON extraction)
//! - **fetch / render / progress**: collaborator seams for bill text in,
//!   report artifact out, progress events out
//! - **models**: plain data for bill structure, changes, jobs, catalogs

pub mod config;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod render;
pub mod services;
pub mod utils;
pub mod workflow;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use fetch::{BillTextFetcher, LeginfoFetcher};
pub use gateway::{ModelGateway, RetryPolicy};
pub use models::{JobRequest, JobStatus, ModelSelection, ProgressEvent, Stage};
pub use orchestrator::JobRegistry;
pub use progress::{BroadcastSink, CollectingSink, LogSink, ProgressSink};
pub use render::{MarkdownRenderer, ReportRenderer};
pub use workflow::{AnalysisPipeline, JobCtx};
