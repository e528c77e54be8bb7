use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ipwatch::{
    actors::{
        command_server::{CommandHandler, CommandServerHandle},
        scheduler::{SchedulerHandle, run_round},
    },
    channel::telegram::TelegramClient,
    config::{read_config_file, read_targets_file},
    cron::CronRebuilder,
    metrics::MetricsWriter,
    monitor::Monitor,
    monitors::probe::PingProber,
    storage,
    util::get_telegram_token,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Monitor IP reachability and alert over Telegram")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Target list (`IP;Name;SLA_Target`)
    #[arg(short, long, default_value = "targets.csv")]
    targets: PathBuf,

    /// Run a single probe round and exit
    #[arg(long)]
    once: bool,

    /// Log level for the monitor
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn init(level: LevelFilter) {
    // the library and the binary share the `ipwatch` target prefix
    let filter = filter::Targets::new().with_target("ipwatch", level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let mut config = read_config_file(&args.config)?;
    if let Some(token) = get_telegram_token() {
        config.telegram_token = token;
    }
    config.validate()?;

    let targets = read_targets_file(&args.targets)?;
    let recipients = config.resolve_recipients()?;
    info!(
        "loaded {} targets and {} recipients",
        targets.len(),
        recipients.len()
    );

    let telegram = Arc::new(match &config.telegram_api_url {
        Some(api_url) => TelegramClient::with_api_url(api_url, &config.telegram_token),
        None => TelegramClient::new(&config.telegram_token),
    });

    let log = storage::open(&config.storage())
        .await
        .context("failed to open probe log")?;

    let metrics = MetricsWriter::new(&config.prom_metrics_path);
    metrics.ensure_parent().await.with_context(|| {
        format!(
            "failed to create directory for {}",
            config.prom_metrics_path.display()
        )
    })?;

    let monitor = Arc::new(Monitor::new(
        targets,
        recipients.clone(),
        config.thresholds(),
        telegram.clone(),
        log,
        metrics,
    ));

    let prober = Arc::new(PingProber::new(config.ping_timeout()));
    if let Err(e) = prober.check_available().await {
        error!("{e}; every probe will fail");
    }

    if args.once {
        let summary = run_round(&monitor, prober.as_ref(), config.max_parallel_probes).await;
        info!(
            "single round: {}/{} reachable in {:?}",
            summary.reachable, summary.probed, summary.elapsed
        );
        return Ok(());
    }

    let cancel = CancellationToken::new();

    let scheduler = SchedulerHandle::spawn(
        monitor.clone(),
        prober,
        config.check_interval(),
        config.max_parallel_probes,
        cancel.clone(),
    );

    let delegate = Arc::new(CronRebuilder::new(recipients, config.report_command.clone()));
    let command_server = CommandServerHandle::spawn(
        CommandHandler::new(monitor, delegate),
        telegram,
        config.command_poll_timeout(),
        &cancel,
    );

    shutdown_signal().await;
    info!("shutting down");
    cancel.cancel();

    let (scheduled, commands) = tokio::join!(scheduler.join(), command_server.join());
    scheduled?;
    commands?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
