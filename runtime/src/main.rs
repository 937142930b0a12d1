use clap::{Parser, Subcommand};
use pagescout_runtime::cli::output::{self, OutputFlags, Styled};
use pagescout_runtime::cli::{check_cms_cmd, scan_cmd};
use pagescout_runtime::config::ScoutConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pagescout",
    version,
    about = "Find a site's pages and rank them by monetization opportunity"
)]
struct Cli {
    /// Config file (default: ~/.pagescout/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging and extra detail
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print results
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover pages, optionally audit them, and list opportunities
    Scan(scan_cmd::ScanArgs),
    /// Test the configured CMS credentials
    CheckCms,
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "pagescout_runtime=debug,pagescout=debug"
    } else {
        "pagescout_runtime=warn,pagescout=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);
    output::init(OutputFlags {
        json: cli.json,
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });

    let result = match ScoutConfig::load(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Command::Scan(args) => scan_cmd::run(config, args).await,
            Command::CheckCms => check_cms_cmd::run(config).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        let s = Styled::new();
        eprintln!("  {} {e:#}", s.fail_sym());
        std::process::exit(1);
    }
}
