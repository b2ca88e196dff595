//! Foreground reminder loop.
//!
//! Every tick reloads config and data, rebuilds the in-memory triggers and
//! delivers the payloads due since the previous tick, each minute once.

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use clap::Args;
use medalarm_core::scheduler::minute_floor;

use super::open_service;

/// Longest gap (after a suspend, say) still delivered on the next tick.
const MAX_CATCH_UP_MINUTES: i64 = 60;

#[derive(Args)]
pub struct DaemonArgs {
    /// Poll interval in seconds, 1-60 (defaults to daemon.poll_interval_secs)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=60))]
    pub interval: Option<u64>,
    /// Run a single tick and exit
    #[arg(long)]
    pub once: bool,
}

pub async fn run(args: DaemonArgs) -> Result<(), Box<dyn std::error::Error>> {
    let poll_secs = match args.interval {
        Some(secs) => secs,
        None => open_service()?.config().daemon.poll_interval_secs,
    };

    let mut last_minute: Option<NaiveDateTime> = None;
    if args.once {
        tick(&mut last_minute).await?;
        return Ok(());
    }

    tracing::info!(poll_secs, "reminder daemon started");
    let mut interval = tokio::time::interval(Duration::from_secs(poll_secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = tick(&mut last_minute).await {
                    tracing::warn!(error = %e, "reminder tick failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("reminder daemon stopping");
                break;
            }
        }
    }
    Ok(())
}

async fn tick(last_minute: &mut Option<NaiveDateTime>) -> Result<(), Box<dyn std::error::Error>> {
    let svc = open_service()?;
    let report = svc.resync().await?;
    let sink = svc.scheduler().sink();

    let now = Local::now().naive_local();
    let current = minute_floor(now);
    let due: Vec<(NaiveDateTime, _)> = match *last_minute {
        None => sink.due(now).into_iter().map(|p| (current, p)).collect(),
        Some(last) => {
            let oldest = current - chrono::Duration::minutes(MAX_CATCH_UP_MINUTES);
            if last < oldest {
                tracing::warn!(since = %last, "reminders older than the catch-up limit were not delivered");
            }
            sink.due_between(last.max(oldest), now)
        }
    };
    *last_minute = Some(current);

    tracing::debug!(triggers = report.registered, due = due.len(), "reminder tick");
    for (minute, payload) in due {
        tracing::info!(
            medication_id = %payload.medication_id,
            alarm_id = %payload.alarm_id,
            time = %payload.alarm_time,
            due = %minute,
            "time to take {}",
            payload.medication_name
        );
        println!("{}", serde_json::to_string(&payload)?);
    }
    Ok(())
}
