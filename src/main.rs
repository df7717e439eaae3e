use anyhow::Context;
use clap::Parser;
use datatransfer::core::factory::resolve_storage;
use datatransfer::core::orchestrator::list_batch;
use datatransfer::utils::{logger, validation::Validate};
use datatransfer::{
    CliArgs, DefaultConnector, Role, TransferConfig, TransferEngine, TransferError, TransferMode,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    logger::init_cli_logger(args.verbose, args.json_logs);
    tracing::info!("Starting datatransfer");

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.exit_code());
        }
    };
    tracing::info!(
        "✅ Configuration loaded: {} -> {}",
        config.read.kind,
        config.write.kind
    );

    let connector = DefaultConnector;

    if args.dry_run {
        return dry_run(&config, &connector).await;
    }

    match args.every {
        Some(seconds) => run_on_schedule(&config, &connector, seconds).await,
        None => match TransferEngine::new(&config, &connector).run().await {
            Ok(report) => {
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
            Err(e) => {
                report_failure(&e);
                std::process::exit(e.exit_code());
            }
        },
    }
}

fn load_config(args: &CliArgs) -> datatransfer::Result<TransferConfig> {
    let config = if args.from_env {
        tracing::info!("📁 Loading configuration from environment");
        TransferConfig::from_env()?
    } else {
        tracing::info!("📁 Loading configuration from: {}", args.config);
        TransferConfig::from_file(&args.config)?
    };
    config.validate()?;
    Ok(config)
}

/// Independent runs on a fixed interval. A failed run is reported and the
/// next tick starts from scratch.
async fn run_on_schedule(
    config: &TransferConfig,
    connector: &DefaultConnector,
    seconds: u64,
) -> anyhow::Result<()> {
    anyhow::ensure!(seconds > 0, "--every must be at least 1 second");
    tracing::info!("🔁 Running every {}s", seconds);

    let mut interval = tokio::time::interval(Duration::from_secs(seconds));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = TransferEngine::new(config, connector).run().await {
                    report_failure(&e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested, stopping schedule");
                return Ok(());
            }
        }
    }
}

async fn dry_run(config: &TransferConfig, connector: &DefaultConnector) -> anyhow::Result<()> {
    tracing::info!("🔍 DRY RUN MODE - nothing will be transferred");

    let mut storage = resolve_storage(config, Role::Read, &config.transfer.source_path, connector)
        .await
        .context("failed to open read storage")?;
    // publish mode announces everything it lists
    let (mode, limit) = if config.transfer.publish_to_queue {
        (TransferMode::Publish, usize::MAX)
    } else {
        (TransferMode::DirectCopy, config.transfer.max_files_batch)
    };
    let batch = list_batch(storage.as_ref(), limit).await;
    storage.exit().await.ok();
    let batch = batch.context("failed to list source files")?;

    let summary = serde_json::json!({
        "source": config.transfer.source_path,
        "destination": config.transfer.dest_path,
        "mode": mode,
        "delete_source": !config.transfer.copy_files,
        "batch": batch,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn report_failure(e: &TransferError) {
    tracing::error!(
        "❌ Transfer failed: {} (Category: {:?})",
        e,
        e.category()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
}
