//! CLI entry point
//!
//! `trailer_bill_analysis <bill number> [session year] [--model NAME]
//! [--output DIR]` runs one analysis job end to end, streaming progress to
//! the log and writing the Markdown report.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use trailer_bill_analysis::services::{ImpactAnalyzer, SectionMatcher};
use trailer_bill_analysis::utils::logging::init_logging;
use trailer_bill_analysis::{
    AnalysisPipeline, Config, JobRegistry, JobRequest, JobStatus, LeginfoFetcher, LogSink,
    MarkdownRenderer, ModelGateway,
};

struct CliArgs {
    bill_number: String,
    session_year: String,
    model: Option<String>,
    output_dir: Option<String>,
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut positional: Vec<String> = Vec::new();
    let mut model = None;
    let mut output_dir = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--model" => {
                model = Some(iter.next().context("--model requires a value")?.clone());
            }
            "--output" => {
                output_dir = Some(iter.next().context("--output requires a value")?.clone());
            }
            other if other.starts_with("--") => bail!("unknown flag {}", other),
            other => positional.push(other.to_string()),
        }
    }

    if positional.is_empty() {
        bail!(
            "usage: trailer_bill_analysis <bill number> [session year] [--model NAME] [--output DIR]"
        );
    }
    // "AB 103" may arrive as two arguments; a trailing 4-digit argument is
    // the session year
    let session_year = if positional.len() > 1
        && positional.last().map(|s| s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()))
            == Some(true)
    {
        positional.pop().unwrap()
    } else {
        "2025".to_string()
    };
    Ok(CliArgs {
        bill_number: positional.join(" "),
        session_year,
        model,
        output_dir,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw_args)?;

    let mut config = Config::from_env();
    if let Some(dir) = &args.output_dir {
        config.report_output_dir = dir.clone();
    }
    init_logging(config.verbose_logging);

    let model_name = args.model.unwrap_or_else(|| config.default_model.clone());
    let request = JobRequest::parse(
        &format!("cli-{}", chrono::Utc::now().timestamp()),
        &args.bill_number,
        &args.session_year,
        &model_name,
    )
    .context("invalid submission")?;
    let job_id = request.job_id.clone();

    let gateway = Arc::new(ModelGateway::from_config(&config));
    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::new(LeginfoFetcher::new()),
        SectionMatcher::new(gateway.clone()),
        ImpactAnalyzer::new(gateway),
        Arc::new(MarkdownRenderer::new(config.report_output_dir.clone())),
    ));
    let registry = JobRegistry::new(pipeline, Arc::new(LogSink), &config);

    registry.submit(request).context("submission rejected")?;

    let job = registry
        .wait_for_terminal(&job_id)
        .await
        .context("job record lost before completion")?;

    if job.status != JobStatus::Succeeded {
        match job.last_error {
            Some((kind, message)) => bail!("job {}: {} ({})", job.status, message, kind),
            None => bail!("job finished with status {}", job.status),
        }
    }
    Ok(())
}
