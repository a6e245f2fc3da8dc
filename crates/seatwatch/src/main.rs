use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use seatwatch_core::{
    config::{Config, RunMode},
    cursor::FileCursorStore,
    messaging::{dry_run::DryRunChat, port::ChatPort},
    registration::Registrar,
    registry::{FileRegistryStore, RegistryStore},
    scan::Notifier,
    scheduler::Scheduler,
};
use seatwatch_snipeit::SnipeItClient;
use seatwatch_telegram::TelegramChat;

/// Snipe-IT license expiry notifier for Telegram.
#[derive(Parser, Debug)]
#[command(name = "seatwatch", version)]
struct Cli {
    /// Run one scan and exit (overrides RUN_MODE).
    #[arg(long, conflicts_with = "schedule")]
    once: bool,

    /// Keep running: daily scan plus registration polling (overrides RUN_MODE).
    #[arg(long)]
    schedule: bool,

    /// Log messages instead of sending them (same as DRY_RUN=1).
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    seatwatch_core::config::load_dotenv();
    seatwatch_core::logging::init("seatwatch")?;

    let mut cfg = Config::load().context("invalid configuration")?;
    if cli.schedule {
        cfg.run_mode = RunMode::Schedule;
    }
    if cli.once {
        cfg.run_mode = RunMode::Once;
    }
    cfg.dry_run |= cli.dry_run;

    let telegram: Arc<dyn ChatPort> = Arc::new(TelegramChat::new(
        &cfg.telegram_bot_token,
        cfg.poll_interval,
    )?);
    let chat: Arc<dyn ChatPort> = if cfg.dry_run {
        warn!("DRY_RUN enabled: messages are logged, not sent");
        Arc::new(DryRunChat::new(telegram))
    } else {
        telegram
    };

    let inventory = Arc::new(SnipeItClient::new(
        cfg.snipeit_base_url.clone(),
        cfg.snipeit_api_token.clone(),
        cfg.request_timeout,
    )?);
    let registry: Arc<dyn RegistryStore> =
        Arc::new(FileRegistryStore::new(cfg.user_map_path.clone()));
    let notifier = Arc::new(Notifier::new(
        inventory,
        chat.clone(),
        registry.clone(),
        cfg.scan_settings(),
    ));

    match cfg.run_mode {
        RunMode::Once => {
            let report = notifier
                .run_once(Local::now().date_naive())
                .await
                .context("scan failed")?;
            info!(
                "scan done: {} licenses, {} expiring, {} sent, {} failed",
                report.licenses, report.items, report.delivery.sent, report.delivery.failed
            );
        }
        RunMode::Schedule => {
            let registrar = cfg.enable_registration.then(|| {
                Arc::new(Registrar::new(
                    chat.clone(),
                    registry.clone(),
                    Arc::new(FileCursorStore::new(cfg.state_path.clone())),
                    cfg.registration_settings(),
                ))
            });
            let scheduler = Scheduler::new(
                notifier,
                registrar,
                cfg.schedule_time,
                cfg.poll_interval,
            );

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("shutdown requested");
                        on_signal.cancel();
                    }
                    Err(e) => warn!("cannot listen for Ctrl-C: {e}"),
                }
            });
            scheduler.run(cancel).await;
        }
    }

    Ok(())
}
