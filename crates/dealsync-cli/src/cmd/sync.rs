use crate::cmd::load_config;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use dealsync_core::board::{BoardWriter, DryRunWriter};
use dealsync_core::config::sync_credentials_from_lookup;
use dealsync_core::notion::{NotionClient, NotionWriter};
use dealsync_core::paths;
use dealsync_core::pipedrive::PipedriveClient;
use dealsync_core::report::SyncReport;
use dealsync_core::sync::{self, SyncOptions};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct SyncArgs {
    /// Write changes to the board
    #[arg(long, conflicts_with = "dry_run")]
    pub apply: bool,

    /// Plan and report without writing (default)
    #[arg(long)]
    pub dry_run: bool,

    /// Process at most N deals (0 = all)
    #[arg(long, value_name = "N")]
    pub max_deals: Option<usize>,

    /// Only deals in these pipelines (comma-separated, case-insensitive)
    #[arg(long, value_delimiter = ',')]
    pub pipeline: Vec<String>,

    /// Pipedrive deal status filter, e.g. open or all_not_deleted
    #[arg(long)]
    pub deals_status: Option<String>,

    /// Fill missing document links from URLs in deal notes
    #[arg(long)]
    pub scan_notes: bool,

    /// Archive every board page before syncing
    #[arg(long)]
    pub clear_before_sync: bool,

    /// Report path (default: .dealsync/reports/sync-report.json)
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

fn options(args: &SyncArgs, base: SyncOptions) -> SyncOptions {
    let mut opts = base;
    if let Some(n) = args.max_deals {
        opts.max_deals = n;
    }
    let pipelines: Vec<String> = args
        .pipeline
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if !pipelines.is_empty() {
        opts.pipelines = pipelines;
    }
    if let Some(status) = args.deals_status.as_deref().map(str::trim) {
        if !status.is_empty() {
            opts.deals_status = status.to_string();
        }
    }
    opts.scan_notes |= args.scan_notes;
    opts.clear_before_sync = args.clear_before_sync;
    opts
}

pub fn run(root: &Path, args: SyncArgs, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let (pd_creds, notion_creds, database_id) =
        sync_credentials_from_lookup(&config, |k| std::env::var(k).ok())
            .context("cannot start sync")?;

    let mut opts = options(&args, SyncOptions::from_config(&config));
    opts.deal_url_base = Some(pd_creds.deal_url_base());

    let pipedrive =
        PipedriveClient::new(&pd_creds, &config.http).context("failed to build Pipedrive client")?;
    let notion =
        NotionClient::new(&notion_creds, &config.http).context("failed to build Notion client")?;
    let snapshot = notion
        .snapshot(&database_id, &config.board)
        .context("failed to read the board")?;

    let mut writer: Box<dyn BoardWriter + '_> = if args.apply {
        Box::new(NotionWriter::new(
            &notion,
            database_id.clone(),
            snapshot.schema.clone(),
        ))
    } else {
        Box::new(DryRunWriter)
    };

    let report = sync::run(
        &config,
        &opts,
        &pipedrive,
        &snapshot,
        writer.as_mut(),
        chrono::Utc::now(),
    )
    .context("sync failed")?;

    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| paths::default_report_path(root));
    report
        .save(&report_path)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    if json {
        return print_json(&report);
    }
    print_summary(&report, &report_path);
    Ok(())
}

fn print_summary(report: &SyncReport, report_path: &Path) {
    println!("{}", report.summary_line());
    if report.archived > 0 {
        println!("archived {} existing page(s)", report.archived);
    }

    if !report.blocked_examples.is_empty() {
        println!("\nBlocked:");
        let rows = report
            .blocked_examples
            .iter()
            .map(|b| {
                vec![
                    b.deal_id.to_string(),
                    b.title.clone(),
                    b.accepted.to_string(),
                    b.reason.clone(),
                ]
            })
            .collect();
        print_table(&["DEAL", "TITLE", "STAGE", "REASON"], rows);
    }

    if !report.errors.is_empty() {
        println!("\nErrors:");
        let rows = report
            .errors
            .iter()
            .map(|e| {
                vec![
                    e.deal_id.clone(),
                    e.stage.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                    e.error.clone(),
                ]
            })
            .collect();
        print_table(&["DEAL", "STAGE", "ERROR"], rows);
    }

    if !report.unknown_properties.is_empty() {
        let names: Vec<&str> = report.unknown_properties.iter().map(String::as_str).collect();
        println!("\nNot on the board (ignored): {}", names.join(", "));
    }

    println!("\nReport: {}", report_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealsync_core::config::Config;

    fn args() -> SyncArgs {
        SyncArgs {
            apply: false,
            dry_run: false,
            max_deals: None,
            pipeline: Vec::new(),
            deals_status: None,
            scan_notes: false,
            clear_before_sync: false,
            report: None,
        }
    }

    #[test]
    fn cli_flags_override_config() {
        let mut cfg = Config::default();
        cfg.pipedrive.pipelines = vec!["Sales".to_string()];
        cfg.pipedrive.max_deals = 50;

        let mut a = args();
        a.max_deals = Some(5);
        a.pipeline = vec![" Partners ".to_string(), String::new()];
        a.deals_status = Some("open".to_string());
        a.clear_before_sync = true;
        let opts = options(&a, SyncOptions::from_config(&cfg));
        assert_eq!(opts.max_deals, 5);
        assert_eq!(opts.pipelines, vec!["Partners".to_string()]);
        assert_eq!(opts.deals_status, "open");
        assert!(opts.clear_before_sync);
    }

    #[test]
    fn config_applies_without_flags() {
        let mut cfg = Config::default();
        cfg.pipedrive.scan_notes = true;
        cfg.pipedrive.pipelines = vec!["Sales".to_string()];
        let opts = options(&args(), SyncOptions::from_config(&cfg));
        assert!(opts.scan_notes);
        assert_eq!(opts.pipelines, vec!["Sales".to_string()]);
        assert_eq!(opts.deals_status, "all_not_deleted");
        assert_eq!(opts.max_deals, 0);
    }
}
