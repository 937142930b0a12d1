//! Page classification: the heuristic scorer and the analyzer interface.

pub mod analyzer;
pub mod priority;
pub mod remote;

pub use analyzer::{build_analyzer, ContentAnalyzer, HeuristicAnalyzer};
pub use priority::{score, ScoringRules};
