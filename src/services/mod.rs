pub mod analyzer;
pub mod matcher;
pub mod report_builder;
pub mod structurer;

pub use analyzer::{AnalysisOutcome, ImpactAnalyzer};
pub use matcher::SectionMatcher;
pub use report_builder::{ReportBuilder, ReportPayload};
pub use structurer::{BillSegments, ParseError, TextStructurer};
