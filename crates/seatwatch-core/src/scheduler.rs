//! Daily scan scheduler with optional registration polling.
//!
//! Everything runs on one task: `select!` only decides which cycle is next,
//! and the cycle itself is awaited outside the race, so a poll and a scan
//! never touch the registry file at the same time.

use std::{sync::Arc, time::Duration};

use chrono::{Days, Local, NaiveDate, NaiveDateTime, NaiveTime};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{registration::Registrar, scan::Notifier};

pub struct Scheduler {
    notifier: Arc<Notifier>,
    registrar: Option<Arc<Registrar>>,
    daily_at: NaiveTime,
    poll_every: Duration,
}

enum Wake {
    Stop,
    Scan,
    Poll,
}

impl Scheduler {
    pub fn new(
        notifier: Arc<Notifier>,
        registrar: Option<Arc<Registrar>>,
        daily_at: NaiveTime,
        poll_every: Duration,
    ) -> Self {
        Self {
            notifier,
            registrar,
            daily_at,
            poll_every,
        }
    }

    /// Run until `cancel` fires. Cycle errors are logged and the loop keeps
    /// going; the next tick is the retry.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut tick = interval(self.poll_every.max(Duration::from_secs(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_run: Option<NaiveDate> = None;

        info!(
            "scheduler started: daily scan at {}, registration {}",
            self.daily_at.format("%H:%M"),
            if self.registrar.is_some() { "on" } else { "off" }
        );

        loop {
            let now = Local::now().naive_local();
            let next = next_daily_run(now, self.daily_at, last_run);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Stop,
                _ = sleep(wait) => Wake::Scan,
                _ = tick.tick(), if self.registrar.is_some() => Wake::Poll,
            };

            match wake {
                Wake::Stop => break,
                Wake::Scan => {
                    last_run = Some(next.date());
                    self.scan("daily").await;
                }
                Wake::Poll => {
                    let Some(registrar) = &self.registrar else {
                        continue;
                    };
                    match registrar.poll_once().await {
                        Ok(true) => self.scan("requested").await,
                        Ok(false) => {}
                        Err(e) => error!("registration poll failed: {e}"),
                    }
                }
            }
        }
        info!("scheduler stopped");
    }

    async fn scan(&self, reason: &str) {
        let today = Local::now().date_naive();
        match self.notifier.run_once(today).await {
            Ok(report) => info!(
                "{reason} scan done: {} licenses, {} expiring, {} sent, {} failed",
                report.licenses, report.items, report.delivery.sent, report.delivery.failed
            ),
            Err(e) => error!("{reason} scan failed: {e}"),
        }
    }
}

/// Next time the daily scan is due, strictly after `now`.
///
/// Today's slot is skipped once it has passed or a scan already ran for
/// that date.
pub fn next_daily_run(
    now: NaiveDateTime,
    at: NaiveTime,
    last_run: Option<NaiveDate>,
) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now && last_run != Some(now.date()) {
        return today;
    }
    let tomorrow = now
        .date()
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDate::MAX);
    tomorrow.and_time(at)
}
