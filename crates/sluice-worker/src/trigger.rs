//! Run triggers
//!
//! In batch mode the binary runs once and exits. In service mode a
//! [`Scheduler`] wakes at every wall-clock half hour and asks its
//! [`TriggerGate`] whether this tick should start a run.
//!
//! Every run goes through [`run_guarded`], so a panic inside a run is logged
//! and the scheduler keeps going.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use chrono::{Duration, Local, NaiveDateTime, Timelike};
use tracing::{debug, error, info};

use crate::driver::{Reconciler, RunReport};

/// Which half of the hour a tick falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    /// `:30`
    HalfHour,
    /// `:00`
    FullHour,
}

/// A wall-clock half-hour boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub kind: TickKind,
    pub hour: u32,
}

impl Tick {
    /// Tick for a time on a half-hour boundary
    pub fn at(time: NaiveDateTime) -> Self {
        let kind = if time.minute() < 30 {
            TickKind::FullHour
        } else {
            TickKind::HalfHour
        };
        Self {
            kind,
            hour: time.hour(),
        }
    }
}

/// Decides whether a tick starts a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerGate {
    /// Every tick
    HalfHourly,
    /// Only the full-hour tick of the given hour
    DailyAt(u32),
}

impl TriggerGate {
    pub fn should_run(&self, tick: &Tick) -> bool {
        match self {
            TriggerGate::HalfHourly => true,
            TriggerGate::DailyAt(hour) => tick.kind == TickKind::FullHour && tick.hour == *hour,
        }
    }
}

impl FromStr for TriggerGate {
    type Err = anyhow::Error;

    /// Parse `half-hourly` or `daily@<hour>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "half-hourly" {
            return Ok(TriggerGate::HalfHourly);
        }

        let hour = s
            .strip_prefix("daily@")
            .ok_or_else(|| anyhow!("Unknown trigger schedule '{}', expected half-hourly or daily@<hour>", s))?;
        let hour: u32 = hour
            .parse()
            .map_err(|_| anyhow!("Invalid hour in trigger schedule '{}'", s))?;
        if hour > 23 {
            bail!("Trigger hour must be between 0 and 23, got {}", hour);
        }

        Ok(TriggerGate::DailyAt(hour))
    }
}

impl fmt::Display for TriggerGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerGate::HalfHourly => write!(f, "half-hourly"),
            TriggerGate::DailyAt(hour) => write!(f, "daily@{}", hour),
        }
    }
}

/// First half-hour boundary strictly after `now`
pub fn next_tick_after(now: NaiveDateTime) -> NaiveDateTime {
    let into_half = i64::from(now.minute() % 30) * 60 + i64::from(now.second());
    now - Duration::seconds(into_half) - Duration::nanoseconds(i64::from(now.nanosecond()))
        + Duration::minutes(30)
}

/// Run a reconciliation in its own task and log anything that escapes it
///
/// Returns `None` if the run panicked or was cancelled.
pub async fn run_guarded<F>(run: F) -> Option<RunReport>
where
    F: Future<Output = RunReport> + Send + 'static,
{
    match tokio::spawn(run).await {
        Ok(report) => Some(report),
        Err(e) => {
            error!("Reconciliation run failed unexpectedly: {:?}", e);
            None
        },
    }
}

/// Resident half-hourly loop
pub struct Scheduler {
    reconciler: Reconciler,
    gate: TriggerGate,
}

impl Scheduler {
    pub fn new(reconciler: Reconciler, gate: TriggerGate) -> Self {
        Self { reconciler, gate }
    }

    /// Run until `shutdown` completes
    ///
    /// Shutdown is observed between ticks; a run in progress is finished first.
    pub async fn run<S>(self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        info!(schedule = %self.gate, "Scheduler started");
        tokio::pin!(shutdown);

        loop {
            let now = Local::now().naive_local();
            let next = next_tick_after(now);
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next = %next, "Waiting for next tick");

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(wait) => {},
            }

            let tick = Tick::at(next);
            if !self.gate.should_run(&tick) {
                debug!(?tick, "Tick does not match schedule");
                continue;
            }

            let reconciler = self.reconciler.clone();
            run_guarded(async move { reconciler.run_once().await }).await;
        }

        info!("Scheduler stopped");
    }
}
