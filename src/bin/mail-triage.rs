#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for triaging IMAP mail with a local Ollama model

use anyhow::Context;
use clap::{Parser, Subcommand};
use mail_triage::{
    CacheRecord, ClassificationCache, ImapConfig, ImapTransport, MailTransport, MailboxFilter,
    OllamaOracle, OracleConfig, Triage, TriageConfig, TriageSummary,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mail-triage")]
#[command(about = "Sort unseen IMAP mail into importance folders using a local LLM")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Classify and file unseen mail, repeatedly
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Seconds to wait between cycles
        #[arg(long, default_value = "300")]
        interval: u64,
    },

    /// List IMAP folders and whether each one is scanned
    Folders,

    /// Show cached verdicts
    Cache {
        /// Maximum number of records to show (most recent last)
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Serialize)]
struct FolderEntry<'a> {
    name: &'a str,
    scanned: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match &args.command {
        Command::Run { once, interval } => {
            cmd_run(&args, *once, Duration::from_secs(*interval)).await?;
        }
        Command::Folders => cmd_folders(&args).await?,
        Command::Cache { limit } => cmd_cache(&args, *limit)?,
    }

    Ok(())
}

async fn cmd_run(args: &Args, once: bool, interval: Duration) -> anyhow::Result<()> {
    let imap = ImapConfig::from_env()?;
    let oracle_config = OracleConfig::from_env()?;
    let triage_config = TriageConfig::from_env()?;

    let oracle = OllamaOracle::new(&oracle_config)?;
    oracle.warm_up().await?;

    let mut triage = Triage::new(ImapTransport::new(imap), oracle, triage_config)?;

    loop {
        match triage.process_emails().await {
            Ok(summary) => print_summary(args, &summary)?,
            Err(e) => error!(error = %e, "Triage cycle failed"),
        }

        if once {
            break;
        }

        info!(seconds = interval.as_secs(), "Waiting for next cycle");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            () = tokio::time::sleep(interval) => {}
        }
    }

    Ok(())
}

async fn cmd_folders(args: &Args) -> anyhow::Result<()> {
    let imap = ImapConfig::from_env()?;
    let triage_config = TriageConfig::from_env()?;
    let filter = MailboxFilter::new(
        &triage_config.folders,
        &triage_config.excluded_mailboxes,
        &triage_config.included_mailboxes,
    );

    let mut transport = ImapTransport::new(imap);
    let names = transport.list_mailboxes().await?;
    transport.logout().await.ok();

    let entries: Vec<FolderEntry<'_>> = names
        .iter()
        .map(|name| FolderEntry {
            name,
            scanned: filter.allows(name),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            let marker = if entry.scanned { "scan" } else { "skip" };
            println!("{marker}  {}", entry.name);
        }
    }

    Ok(())
}

fn cmd_cache(args: &Args, limit: Option<usize>) -> anyhow::Result<()> {
    let triage_config = TriageConfig::from_env()?;
    let Some(path) = triage_config.cache_file else {
        anyhow::bail!("CACHE_FILE is not set");
    };

    let records = ClassificationCache::existing(&path)
        .with_context(|| format!("No cache file at {}", path.display()))?
        .records()?;
    let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
    let display: Vec<&CacheRecord> = records.iter().skip(skip).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&display)?);
    } else {
        print_record_table(&display);
    }

    Ok(())
}

fn print_summary(args: &Args, summary: &TriageSummary) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string(summary)?);
        return Ok(());
    }

    println!(
        "{:<24} {:>6} {:>10} {:>6} {:>12} {:>9} {:>7}",
        "Mailbox", "Passes", "Classified", "Cached", "Inconclusive", "Relocated", "Failed"
    );
    println!("{}", "-".repeat(82));
    for report in &summary.mailboxes {
        println!(
            "{:<24} {:>6} {:>10} {:>6} {:>12} {:>9} {:>7}{}",
            truncate(&report.mailbox, 24),
            report.passes,
            report.classified,
            report.cache_hits,
            report.inconclusive,
            report.relocated,
            report.relocation_failures,
            if report.completed { "" } else { "  (gave up)" },
        );
    }
    println!(
        "\n{} mailbox(es), {} message(s) moved, {} skipped",
        summary.mailboxes.len(),
        summary.relocated(),
        summary.skipped.len()
    );

    Ok(())
}

fn print_record_table(records: &[&CacheRecord]) {
    if records.is_empty() {
        println!("No cached verdicts.");
        return;
    }

    println!("{:<20} {:<17} {:<30} Subject", "Added", "Level", "From");
    println!("{}", "-".repeat(100));

    for record in records {
        println!(
            "{:<20} {:<17} {:<30} {}",
            record.time_added.chars().take(19).collect::<String>(),
            record.importance_level,
            truncate(&record.sender, 28),
            truncate(&record.email_subject, 40),
        );
    }

    println!("\n{} record(s)", records.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
