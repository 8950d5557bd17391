//! The analysis pipeline
//!
//! Drives one job through Fetching → Parsing → Structuring → Matching →
//! Analyzing → Reporting. Cancellation is checked at every stage boundary
//! and raced against every long-running await; a cancelled job stops at the
//! next suspension point and any in-flight model results are discarded.

use std::sync::Arc;

use tracing::info;

use crate::error::{AnalysisError, AppError, AppResult};
use crate::fetch::BillTextFetcher;
use crate::models::change::UnitFailure;
use crate::models::job::Stage;
use crate::render::ReportRenderer;
use crate::services::analyzer::ImpactAnalyzer;
use crate::services::matcher::SectionMatcher;
use crate::services::report_builder::ReportBuilder;
use crate::services::structurer::{normalize_document, TextStructurer};
use crate::workflow::job_ctx::JobCtx;

/// What a successful run leaves behind
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Reference to the rendered report (a file path for the Markdown
    /// renderer)
    pub result_ref: String,
    /// Units that failed analysis but did not fail the job
    pub failed_units: Vec<UnitFailure>,
}

pub struct AnalysisPipeline {
    fetcher: Arc<dyn BillTextFetcher>,
    structurer: TextStructurer,
    matcher: SectionMatcher,
    analyzer: ImpactAnalyzer,
    renderer: Arc<dyn ReportRenderer>,
}

impl AnalysisPipeline {
    pub fn new(
        fetcher: Arc<dyn BillTextFetcher>,
        matcher: SectionMatcher,
        analyzer: ImpactAnalyzer,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            fetcher,
            structurer: TextStructurer::new(),
            matcher,
            analyzer,
            renderer,
        }
    }

    /// Run the whole pipeline for one job
    pub async fn run(&self, ctx: &JobCtx) -> AppResult<PipelineOutput> {
        // --- Fetching ---
        self.check_cancelled(ctx)?;
        ctx.stage_started(
            Stage::Fetching,
            format!("retrieving text of {}", ctx.bill_number),
        );
        let raw_text = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(AppError::Cancelled),
            result = self.fetcher.fetch(&ctx.bill_number, &ctx.session_year) => result?,
        };

        // --- Parsing ---
        // split the raw text into header, digest, and enacted body
        self.check_cancelled(ctx)?;
        ctx.stage_started(Stage::Parsing, "parsing bill text");
        let segments = self.structurer.parse(&raw_text)?;

        // --- Structuring ---
        // build digest items and operative sections from the split text
        self.check_cancelled(ctx)?;
        ctx.stage_started(Stage::Structuring, "building document structure");
        let mut doc = self.structurer.build(&segments)?;
        info!(
            "📄 {}: {} digest items, {} operative sections",
            doc.bill_number,
            doc.digest_items.len(),
            doc.operative_sections.len()
        );

        // --- Matching ---
        self.check_cancelled(ctx)?;
        ctx.stage_started(Stage::Matching, "correlating digest items with sections");
        {
            let progress_ctx = ctx.clone();
            let progress = move |done: usize, total: usize| {
                progress_ctx.substep(Stage::Matching, done, total, "digest items resolved");
            };
            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(AppError::Cancelled),
                _ = self.matcher.match_document(&mut doc, ctx.model, &progress) => {}
            }
        }
        normalize_document(&mut doc);

        // --- Analyzing ---
        self.check_cancelled(ctx)?;
        ctx.stage_started(Stage::Analyzing, "assessing local-agency impact");
        let outcome = {
            let progress_ctx = ctx.clone();
            let progress = move |done: usize, total: usize| {
                progress_ctx.substep(Stage::Analyzing, done, total, "changes analyzed");
            };
            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(AppError::Cancelled),
                outcome = self.analyzer.analyze(&doc, ctx.model, &progress) => outcome,
            }
        };
        // tolerate partial failure; fail only when every model-backed unit
        // failed
        let model_backed = doc.digest_items.iter().filter(|i| !i.is_digest_only).count();
        if model_backed > 0 && outcome.failures.len() == model_backed {
            return Err(AnalysisError::AllUnitsFailed {
                failed: outcome.failures.len(),
            }
            .into());
        }

        // --- Reporting ---
        self.check_cancelled(ctx)?;
        ctx.stage_started(Stage::Reporting, "assembling report");
        let payload = ReportBuilder::build(&doc, &outcome);
        let result_ref = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(AppError::Cancelled),
            result = self.renderer.render(&payload) => result?,
        };

        info!("✅ {} complete: {}", ctx, result_ref);
        Ok(PipelineOutput {
            result_ref,
            failed_units: outcome.failures,
        })
    }

    fn check_cancelled(&self, ctx: &JobCtx) -> AppResult<()> {
        if ctx.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}
