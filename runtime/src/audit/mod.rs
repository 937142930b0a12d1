//! Batch re-fetch and rescore of a working set.

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{AuditOrchestrator, AuditState, AuditSummary};
pub use progress::{AuditProgress, ChannelObserver, ProgressObserver};
