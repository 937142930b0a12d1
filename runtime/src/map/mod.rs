//! Page records, the working set they live in, and its persisted form.

pub mod snapshot;
pub mod types;
pub mod working_set;

pub use snapshot::PersistedState;
pub use types::*;
pub use working_set::{FilterTab, MergeOutcome, MergeReport, WorkingSet, WorkingSetStats};
