//! PageScout runtime: discovers a site's pages, deduplicates them, scores
//! their monetization priority, and re-audits them in bounded batches.

pub mod acquisition;
pub mod audit;
pub mod cartography;
pub mod cli;
pub mod config;
pub mod error;
pub mod intelligence;
pub mod map;
pub mod scoring;
pub mod session;
