pub mod job_ctx;
pub mod pipeline;

pub use job_ctx::JobCtx;
pub use pipeline::{AnalysisPipeline, PipelineOutput};
