//! Batch action-item extraction over saved summaries.
//!
//! Usage: `generate-actions [SUMMARY_DIR...]`. Without arguments the
//! directories from `NOSY_SUMMARY_DIRS` (or the defaults) are scanned.

use std::path::PathBuf;

use anyhow::Context;
use nosy_worker::actions::{ActionExtractor, ExtractionReport};
use nosy_worker::config::AppConfig;
use nosy_worker::error::Error;
use nosy_worker::llm::{LlmConfig, create_provider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let dirs: Vec<PathBuf> = match std::env::args().skip(1).map(PathBuf::from).collect::<Vec<_>>() {
        args if args.is_empty() => config.summary_dirs.clone(),
        args => args,
    };

    let llm = LlmConfig::actions_from_env().map_err(Error::from)?;
    eprintln!("Model: {}", llm.model);
    for dir in &dirs {
        eprintln!("Scanning: {}", dir.display());
    }

    let provider = create_provider(&llm).map_err(Error::from)?;
    let extractor = ActionExtractor::new(provider, &config.actions_dir);
    let report = extractor.run(&dirs).await.map_err(Error::from)?;

    print_report(&report, &extractor);
    Ok(())
}

fn print_report(report: &ExtractionReport, extractor: &ActionExtractor) {
    if report.files_found == 0 {
        println!("No summary files found.");
        return;
    }

    println!(
        "Processed {} of {} summary files ({} actions).",
        report.files_processed, report.files_found, report.total_actions
    );
    for failed in &report.files_failed {
        println!("  skipped: {failed}");
    }
    if !report.written {
        println!("No actions extracted; nothing written.");
        return;
    }

    println!("All actions saved to {}", extractor.all_actions_path().display());
    println!(
        "Client-organized actions saved to {}",
        extractor.by_client_path().display()
    );

    println!("\n{}", "=".repeat(60));
    println!("CLIENT ACTION SUMMARY");
    println!("{}", "=".repeat(60));
    for (client, data) in &report.by_client {
        let info = &data.client_info;
        println!("\n{client}");
        println!("   Total Actions: {}", info.total_actions);
        println!("   High Priority: {}", info.high_priority);
        println!("   Medium Priority: {}", info.medium_priority);
        println!("   Low Priority: {}", info.low_priority);
        for (category, count) in data.categories.counts() {
            println!("   {category}: {count} actions");
        }
    }
}
