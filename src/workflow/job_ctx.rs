//! Per-job context
//!
//! Everything a running pipeline needs to know about its job: identity,
//! progress sink, and the cancellation signal. Stage entry goes through
//! here so the monotonic-stage rule has a single enforcement point.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::job::{JobRequest, JobStatus, ModelSelection, ProgressEvent, Stage};
use crate::progress::ProgressSink;

/// Context handed to the pipeline for one job
#[derive(Clone)]
pub struct JobCtx {
    pub job_id: String,
    pub bill_number: String,
    pub session_year: String,
    pub model: ModelSelection,
    sink: Arc<dyn ProgressSink>,
    cancel: watch::Receiver<bool>,
    /// Called on each stage entry; the registry hooks job-record updates here
    on_stage: Option<Arc<dyn Fn(Stage) + Send + Sync>>,
}

impl JobCtx {
    pub fn new(
        request: &JobRequest,
        sink: Arc<dyn ProgressSink>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            job_id: request.job_id.clone(),
            bill_number: request.bill_number.clone(),
            session_year: request.session_year.clone(),
            model: request.model,
            sink,
            cancel,
            on_stage: None,
        }
    }

    pub fn with_stage_hook(mut self, hook: Arc<dyn Fn(Stage) + Send + Sync>) -> Self {
        self.on_stage = Some(hook);
        self
    }

    /// Announce entry into a stage
    pub fn stage_started(&self, stage: Stage, message: impl Into<String>) {
        if let Some(hook) = &self.on_stage {
            hook(stage);
        }
        self.sink
            .emit(ProgressEvent::stage_started(&self.job_id, stage, message));
    }

    /// Announce sub-unit progress within a stage
    pub fn substep(&self, stage: Stage, current: usize, total: usize, message: impl Into<String>) {
        self.sink.emit(ProgressEvent::sub_step(
            &self.job_id,
            stage,
            current,
            total,
            message,
        ));
    }

    /// Announce the terminal status
    pub fn finished(&self, status: JobStatus, message: impl Into<String>) {
        self.sink
            .emit(ProgressEvent::finished(&self.job_id, status, message));
    }

    /// Non-blocking cancellation check
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves when cancellation is requested; for use inside `select!`
    pub async fn cancelled(&self) {
        let mut receiver = self.cancel.clone();
        if *receiver.borrow() {
            return;
        }
        loop {
            if receiver.changed().await.is_err() {
                // sender dropped without cancelling; never resolve
                std::future::pending::<()>().await;
            }
            if *receiver.borrow() {
                return;
            }
        }
    }
}

impl std::fmt::Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "job {} ({} / {})",
            self.job_id, self.bill_number, self.session_year
        )
    }
}
