//! Command routing and execution

use crate::cli::args::{Commands, ConfigArgs, EngineArgs, RunArgs};
use crate::config::{ConfigLoader, EngineConfig};
use crate::engine::{AggregationEngine, FinalAggregate, RangeSource, RecordSource};
use anyhow::{bail, Context, Result};
use tracing::{debug, info};

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run_aggregation(args).await,
        Commands::Config(args) => show_config(args).await,
    }
}

/// Resolve defaults, file, environment and flags into one validated config
pub async fn resolve_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_file(path);
    }

    let mut config = loader
        .load_unvalidated()
        .await
        .context("Failed to load configuration")?;

    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(workers) = args.max_workers {
        config = config.with_max_workers(workers);
    }
    if let Some(timeout) = args.timeout {
        config = config.with_timeout(timeout);
    }

    // Flags take precedence, so validate only once they are applied
    config.validate().context("Invalid configuration")?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

async fn run_aggregation(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args.engine).await?;
    let source = RangeSource::new(args.start, args.end);
    info!(
        "Aggregating {}..={} ({} records)",
        args.start,
        args.end,
        source.len()
    );

    let engine = AggregationEngine::new(config)?;
    let report = engine.run(&source).await.context("Aggregation run failed")?;

    if args.verify {
        let records = source.records()?;
        let expected = FinalAggregate::from_records(&records)
            .context("Sequential reference pass overflowed")?;
        if expected != report.aggregate {
            bail!(
                "Verification failed: parallel result {:?} differs from sequential {:?}",
                report.aggregate,
                expected
            );
        }
        info!("Verified against sequential single pass");
    }

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{rendered}");
    Ok(())
}

async fn show_config(args: ConfigArgs) -> Result<()> {
    let config = resolve_config(&args.engine).await?;
    print!("{}", config.to_toml()?);
    Ok(())
}
