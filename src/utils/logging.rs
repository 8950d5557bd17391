/// Logging utilities
///
/// Subscriber setup plus a few helpers for consistent job-level log output.
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// Honors `RUST_LOG` when set; defaults to `info` otherwise. `verbose`
/// lowers the default to `debug` for this crate.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "info,trailer_bill_analysis=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Log a job kickoff banner
pub fn log_job_start(job_id: &str, bill_number: &str, session: &str, model: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 Starting analysis job {}", job_id);
    info!("📄 Bill: {} (session {})", bill_number, session);
    info!("🤖 Model: {}", model);
    info!("{}", "=".repeat(60));
}

/// Log the terminal summary for a job
pub fn log_job_finished(job_id: &str, status: &str, detail: &str) {
    info!("{}", "─".repeat(60));
    info!("📊 Job {} finished: {}", job_id, status);
    if !detail.is_empty() {
        info!("{}", detail);
    }
    info!("{}", "─".repeat(60));
}

/// Truncate long text for log display
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
