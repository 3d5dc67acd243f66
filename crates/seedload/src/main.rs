//! Seedload - main entry point

use anyhow::Context;
use clap::Parser;
use seedload::cli::{Cli, Commands};
use seedload::config::Config;
use seedload::csv::ChecksumTracker;
use seedload::db;
use seedload::loader::{parse_group_list, Dataloader, DataloaderConfig, LoadReport};
use seedload::location::Fetcher;
use seedload_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use std::sync::Arc;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Info };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("seedload")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        }
    };

    if let Err(e) = run(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let sources = DataloaderConfig::from_file(&config.dataloader.sources_file).await?;

    if let Commands::Resolve { groups } = &cli.command {
        let requested = parse_group_list(groups);
        let resolved = seedload::loader::resolve(&requested, &sources.sources);
        println!("{}", resolved.into_iter().collect::<Vec<_>>().join(","));
        return Ok(());
    }

    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;

    if let Commands::History { table } = &cli.command {
        let records = ChecksumTracker::new(pool).history(table).await?;
        if records.is_empty() {
            println!("No load history for {}", table);
        }
        for record in records {
            println!(
                "{}  {:>6} rows  {}  {}",
                record.created.to_rfc3339(),
                record.rows_affected,
                &record.checksum[..12.min(record.checksum.len())],
                record.source
            );
        }
        return Ok(());
    }

    let fetcher = Arc::new(Fetcher::new(
        &config.dataloader.resource_root,
        config.dataloader.http_timeout(),
    )?);
    let loader = Dataloader::builder(sources)
        .autoload(config.dataloader.autoload.clone())
        .with_default_loaders(pool, fetcher)
        .build();

    let report = match &cli.command {
        Commands::Load { groups } => loader.load_data(&parse_group_list(groups)).await?,
        _ => loader.autoload().await?,
    };
    print_report(&report);
    Ok(())
}

fn print_report(report: &LoadReport) {
    println!(
        "Loaded groups: {}",
        report.resolved.iter().cloned().collect::<Vec<_>>().join(",")
    );
    for path in &report.dispatched {
        println!("  {}", path);
    }
}
