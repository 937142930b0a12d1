//! `pagescout scan <target>`: discover pages, optionally audit them, and
//! print the opportunities.

use crate::audit::AuditState;
use crate::cli::output::{self, Styled};
use crate::cli::progress;
use crate::config::ScoutConfig;
use crate::error::DiscoveryError;
use crate::map::snapshot::PersistedState;
use crate::map::working_set::{FilterTab, MergeOutcome};
use crate::session::{DiscoveryReport, OperationKind, ScoutSession};
use anyhow::{anyhow, bail, Result};
use clap::Args;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// Domain or sitemap URL (e.g. example.com, https://example.com/post-sitemap.xml)
    pub target: Option<String>,

    /// Discover through the CMS REST API instead of the sitemap
    #[arg(long)]
    pub cms: bool,

    /// Add a page by URL (repeatable)
    #[arg(long = "add", value_name = "URL")]
    pub add: Vec<String>,

    /// Re-fetch and rescore every page after discovery
    #[arg(long)]
    pub audit: bool,

    /// Filter tab: all, critical, high, medium, low, monetized
    #[arg(long, default_value = "all")]
    pub tab: FilterTab,

    /// Case-insensitive search on title or URL
    #[arg(long, default_value = "")]
    pub search: String,

    /// Load the session from this file first and save it back afterwards
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,
}

/// Run the scan command.
pub async fn run(config: ScoutConfig, args: ScanArgs) -> Result<()> {
    let s = Styled::new();
    let start = Instant::now();
    let json = output::is_json();

    let mut session = ScoutSession::new(config)?;

    if let Some(path) = args.state.as_deref().filter(|p| p.exists()) {
        session.restore(PersistedState::load(path)?);
        if !output::is_quiet() && !json {
            eprintln!(
                "  Restored {} pages from {}",
                session.working_set().len(),
                path.display()
            );
        }
    }

    if args.target.is_none() && !args.cms && args.add.is_empty() && session.working_set().is_empty() {
        bail!("nothing to scan: give a domain or sitemap URL, --cms, or --add <url>");
    }

    if !output::is_quiet() && !json {
        output::print_header(&s);
    }

    // Ctrl-C cancels whatever is in flight.
    let slots = session.slots();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            slots.cancel_all();
        }
    });

    let outcome = scan(&mut session, &args, &s, json).await;
    interrupt.abort();
    outcome?;

    if let Some(path) = args.state.as_deref() {
        session.snapshot().save(path)?;
    }

    if json {
        output::print_json(&session.snapshot());
        return Ok(());
    }

    print_table(&s, &session, args.tab, &args.search);
    if !output::is_quiet() {
        eprintln!();
        eprintln!("  Done in {:.1}s", start.elapsed().as_secs_f64());
    }
    Ok(())
}

async fn scan(session: &mut ScoutSession, args: &ScanArgs, s: &Styled, json: bool) -> Result<()> {
    let quiet = output::is_quiet() || json;

    if args.cms {
        let cancel = session.begin(OperationKind::Discovery);
        let bar = progress::create_spinner("Listing CMS posts...");
        let mut on_progress = |current: usize, _total: usize| {
            bar.set_message(format!("Listing CMS posts... {current} found"));
        };
        let result = session.discover_cms(&mut on_progress, &cancel).await;
        report_discovery(&bar, result)?;
    } else if let Some(target) = args.target.as_deref() {
        let cancel = session.begin(OperationKind::Discovery);
        let bar = progress::create_spinner(&format!("Reading sitemap for {target}..."));
        let result = session.discover_sitemap(target, &cancel).await;
        report_discovery(&bar, result)?;
    }

    for url in &args.add {
        match session.add_manual(url, None) {
            Ok(MergeOutcome::Added(_)) if !quiet => {
                output::print_check(s.ok_sym(), "added", url);
            }
            Ok(MergeOutcome::Duplicate(_)) if !quiet => {
                output::print_check(s.warn_sym(), "already listed", url);
            }
            Ok(_) => {}
            Err(e) => {
                if !quiet {
                    output::print_check(s.fail_sym(), "invalid URL", url);
                    output::print_detail(&format!("{e} ({})", e.hint()));
                }
            }
        }
    }

    if args.audit {
        let cancel = session.begin(OperationKind::Audit);
        let bar = progress::create_audit_bar(session.working_set().len());
        let mut observer = |current: usize, total: usize| {
            bar.set_length(total as u64);
            bar.set_position(current as u64);
        };
        let summary = session.run_audit(&mut observer, &cancel).await?;
        let line = format!(
            "Audited {}/{} pages ({} rescored, {} skipped)",
            summary.processed, summary.total, summary.updated, summary.skipped
        );
        if summary.state == AuditState::Cancelled {
            progress::finish_warn(&bar, &format!("{line}, cancelled"));
        } else {
            progress::finish_ok(&bar, &line);
        }
    }

    Ok(())
}

fn report_discovery(
    bar: &ProgressBar,
    result: std::result::Result<DiscoveryReport, DiscoveryError>,
) -> Result<()> {
    match result {
        Ok(report) => {
            let mut line = format!(
                "Found {} pages ({} new, {} refreshed)",
                report.discovered,
                report.merge.added.len(),
                report.merge.updated.len()
            );
            if report.replaced {
                line.push_str(", previous site cleared");
            }
            progress::finish_ok(bar, &line);
            Ok(())
        }
        Err(e) => {
            progress::finish_clear(bar);
            Err(anyhow!("{e} ({})", e.hint()))
        }
    }
}

fn print_table(s: &Styled, session: &ScoutSession, tab: FilterTab, search: &str) {
    let set = session.working_set();
    let rows = set.filter(tab, search);
    let stats = set.stats();

    eprintln!();
    eprintln!(
        "  {}  {} critical · {} high · {} medium · {} low · {} monetized",
        s.bold(&format!("{} pages", stats.total)),
        s.red(&stats.critical.to_string()),
        s.yellow(&stats.high.to_string()),
        s.cyan(&stats.medium.to_string()),
        stats.low,
        s.green(&stats.monetized.to_string()),
    );
    eprintln!();

    if rows.is_empty() {
        eprintln!("  {}", s.dim("No pages match this view."));
        return;
    }
    for record in rows {
        println!("{}", output::format_record_row(s, record));
    }
    if output::is_verbose() {
        if let Some(target) = session.target() {
            eprintln!();
            eprintln!("  {}", s.dim(&format!("source: {target}")));
        }
    }
}
