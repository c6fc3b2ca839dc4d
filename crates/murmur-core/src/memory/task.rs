//! Background driver for the daily summary pass.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};
use murmur_types::config::SummaryConfig;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::summary::{SummaryReport, SummaryScheduler};

/// Local hours `[start_hour, end_hour)` during which the pass may run.
///
/// A window whose start is after its end wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl SummaryWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour: start_hour % 24,
            end_hour: end_hour % 24,
        }
    }

    pub fn contains(&self, now: DateTime<FixedOffset>) -> bool {
        let hour = now.hour();
        match self.start_hour.cmp(&self.end_hour) {
            std::cmp::Ordering::Less => hour >= self.start_hour && hour < self.end_hour,
            std::cmp::Ordering::Greater => hour >= self.start_hour || hour < self.end_hour,
            std::cmp::Ordering::Equal => true,
        }
    }
}

impl From<&SummaryConfig> for SummaryWindow {
    fn from(config: &SummaryConfig) -> Self {
        Self::new(config.window_start_hour, config.window_end_hour)
    }
}

/// Runs [`SummaryScheduler::summarize_all`] at most once per local day,
/// inside the configured window.
pub struct SummaryTask {
    scheduler: Arc<SummaryScheduler>,
    clock: Arc<dyn Clock>,
    window: SummaryWindow,
    last_run: Mutex<Option<NaiveDate>>,
}

impl SummaryTask {
    pub fn new(
        scheduler: Arc<SummaryScheduler>,
        clock: Arc<dyn Clock>,
        window: SummaryWindow,
    ) -> Self {
        Self {
            scheduler,
            clock,
            window,
            last_run: Mutex::new(None),
        }
    }

    /// One check: run the pass if inside the window and not yet run today.
    pub async fn tick(&self, cancel: &CancellationToken) -> Option<SummaryReport> {
        let now = self.clock.now();
        let today = now.date_naive();
        if !self.window.contains(now) {
            debug!(hour = now.hour(), "outside summary window");
            return None;
        }
        if *self.last_run.lock().unwrap_or_else(|e| e.into_inner()) == Some(today) {
            debug!(%today, "summary pass already ran today");
            return None;
        }

        match self.scheduler.summarize_all(cancel).await {
            Ok(report) => {
                if !report.cancelled {
                    *self.last_run.lock().unwrap_or_else(|e| e.into_inner()) = Some(today);
                }
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "summary pass could not start");
                None
            }
        }
    }

    /// Check every `period` until `cancel` fires.
    pub fn spawn(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                period_secs = period.as_secs(),
                start_hour = self.window.start_hour,
                end_hour = self.window.end_hour,
                "summary task started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(report) = self.tick(&cancel).await {
                            debug!(updated = report.updated.len(), "summary tick finished");
                        }
                    }
                }
            }

            info!("summary task stopped");
        })
    }
}
