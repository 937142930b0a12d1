//! CLI subcommand implementations for the `pagescout` binary.

pub mod check_cms_cmd;
pub mod output;
pub mod progress;
pub mod scan_cmd;
