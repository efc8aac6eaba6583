pub mod orchestrator;
pub mod paginator;
pub mod summary;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::SyncOrchestrator;
pub use paginator::{Page, Paginator, Walk, WalkEnd, WalkReport};
pub use summary::{RunSummary, Stage, StopReason, TableCounts, TenantSummary};
