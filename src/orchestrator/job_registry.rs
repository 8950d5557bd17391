//! Job registry and orchestration
//!
//! Owns job records, spawns one task per submitted job, applies the
//! optional whole-job timeout, delivers the terminal progress event, and
//! evicts finished records after the retention window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, ValidationError};
use crate::models::job::{AnalysisJob, JobRequest, JobStatus, Stage};
use crate::progress::ProgressSink;
use crate::utils::logging::{log_job_finished, log_job_start};
use crate::workflow::{AnalysisPipeline, JobCtx};

struct JobEntry {
    job: AnalysisJob,
    cancel: watch::Sender<bool>,
}

/// Submits, tracks, cancels, and evicts analysis jobs
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, JobEntry>>>,
    pipeline: Arc<AnalysisPipeline>,
    sink: Arc<dyn ProgressSink>,
    job_timeout: Option<Duration>,
    retention: Duration,
}

impl JobRegistry {
    pub fn new(pipeline: Arc<AnalysisPipeline>, sink: Arc<dyn ProgressSink>, config: &Config) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            pipeline,
            sink,
            job_timeout: config.job_timeout_secs.map(Duration::from_secs),
            retention: Duration::from_secs(config.job_retention_secs),
        }
    }

    /// Validate and start a job; returns once the job task is spawned
    pub fn submit(&self, request: JobRequest) -> Result<(), ValidationError> {
        if request.job_id.trim().is_empty() {
            return Err(ValidationError::EmptyJobId);
        }
        if request.bill_number.trim().is_empty() {
            return Err(ValidationError::MissingBillNumber);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        {
            let mut jobs = lock(&self.jobs);
            if jobs.contains_key(&request.job_id) {
                return Err(ValidationError::DuplicateJobId {
                    job_id: request.job_id.clone(),
                });
            }
            jobs.insert(
                request.job_id.clone(),
                JobEntry {
                    job: AnalysisJob::new(request.clone()),
                    cancel: cancel_tx,
                },
            );
        }

        log_job_start(
            &request.job_id,
            &request.bill_number,
            &request.session_year,
            request.model.model_id(),
        );

        let jobs = self.jobs.clone();
        let pipeline = self.pipeline.clone();
        let sink = self.sink.clone();
        let job_timeout = self.job_timeout;
        let retention = self.retention;

        tokio::spawn(async move {
            let job_id = request.job_id.clone();
            set_running(&jobs, &job_id);

            let stage_jobs = jobs.clone();
            let stage_job_id = job_id.clone();
            let ctx = JobCtx::new(&request, sink.clone(), cancel_rx).with_stage_hook(Arc::new(
                move |stage: Stage| {
                    if let Some(entry) = lock(&stage_jobs).get_mut(&stage_job_id) {
                        entry.job.enter_stage(stage);
                    }
                },
            ));

            let run = pipeline.run(&ctx);
            let result = match job_timeout {
                Some(limit) => match tokio::time::timeout(limit, run).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::JobTimeout {
                        limit_secs: limit.as_secs(),
                    }),
                },
                None => run.await,
            };

            let (status, message) = match &result {
                Ok(output) => {
                    let message = if output.failed_units.is_empty() {
                        format!("report at {}", output.result_ref)
                    } else {
                        format!(
                            "report at {} ({} units failed analysis)",
                            output.result_ref,
                            output.failed_units.len()
                        )
                    };
                    (JobStatus::Succeeded, message)
                }
                Err(AppError::Cancelled) => (JobStatus::Cancelled, "cancelled".to_string()),
                Err(err) => {
                    warn!("job {} failed: {}", job_id, err);
                    (JobStatus::Failed, err.to_string())
                }
            };

            // terminal event goes out before the record flips terminal
            ctx.finished(status, message.clone());

            {
                let mut map = lock(&jobs);
                if let Some(entry) = map.get_mut(&job_id) {
                    entry.job.status = status;
                    entry.job.completed_at = Some(chrono::Utc::now());
                    match &result {
                        Ok(output) => entry.job.result_ref = Some(output.result_ref.clone()),
                        Err(err) => {
                            entry.job.last_error = Some((err.kind().to_string(), err.to_string()))
                        }
                    }
                }
            }
            log_job_finished(&job_id, status.name(), &message);

            // cancelled jobs are evicted right away; other finished records
            // stay queryable for the retention window
            if status != JobStatus::Cancelled {
                tokio::time::sleep(retention).await;
            }
            lock(&jobs).remove(&job_id);
            info!("evicted job {}", job_id);
        });

        Ok(())
    }

    /// Snapshot of a job's current record
    pub fn status(&self, job_id: &str) -> Option<AnalysisJob> {
        lock(&self.jobs).get(job_id).map(|entry| entry.job.clone())
    }

    /// Request cancellation; true when the job exists and is not terminal
    pub fn cancel(&self, job_id: &str) -> bool {
        let map = lock(&self.jobs);
        match map.get(job_id) {
            Some(entry) if !entry.job.status.is_terminal() => {
                info!("🛑 cancelling job {}", job_id);
                let _ = entry.cancel.send(true);
                true
            }
            _ => false,
        }
    }

    /// Poll until the job reaches a terminal status (or was evicted)
    pub async fn wait_for_terminal(&self, job_id: &str) -> Option<AnalysisJob> {
        loop {
            match self.status(job_id) {
                Some(job) if job.status.is_terminal() => return Some(job),
                Some(_) => tokio::time::sleep(Duration::from_millis(50)).await,
                None => return None,
            }
        }
    }
}

fn lock(jobs: &Arc<Mutex<HashMap<String, JobEntry>>>) -> std::sync::MutexGuard<'_, HashMap<String, JobEntry>> {
    jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_running(jobs: &Arc<Mutex<HashMap<String, JobEntry>>>, job_id: &str) {
    if let Some(entry) = lock(jobs).get_mut(job_id) {
        entry.job.status = JobStatus::Running;
    }
}
