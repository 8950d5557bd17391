pub mod agency_types;
pub mod bill;
pub mod change;
pub mod job;
pub mod practice_groups;

pub use agency_types::AgencyType;
pub use bill::{BillDocument, CodeReference, DigestItem, ModificationKind, OperativeSection};
pub use change::{Change, Deadline, PracticeGroupTag, Relevance, UnitFailure};
pub use job::{
    AnalysisJob, JobRequest, JobStatus, ModelSelection, ProgressEvent, ProgressKind, ProviderKind,
    Stage,
};
pub use practice_groups::PracticeGroup;
