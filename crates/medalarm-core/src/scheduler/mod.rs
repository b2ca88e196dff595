//! Recurrence scheduler for medication alarms.
//!
//! Translates every enabled alarm into one recurring platform trigger per
//! weekday. Synchronisation is always a full cancel followed by a full
//! re-register:
//! - the cancel completes before any registration starts
//! - malformed alarms are skipped without affecting the others
//! - a failed registration is logged and counted, never fatal

mod recurrence;
mod trigger;

pub use recurrence::{next_occurrence, next_trigger, upcoming, UpcomingReminder};
pub use trigger::{
    minute_floor, InMemoryTriggerSink, TriggerKey, TriggerPayload, TriggerRequest, TriggerSink,
};

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{TriggerError, ValidationError};
use crate::medication::{Alarm, Medication};

/// An alarm left out of a resync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAlarm {
    pub alarm_id: String,
    pub reason: String,
}

/// A registration the trigger sink refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRegistration {
    pub key: TriggerKey,
    pub error: String,
}

/// Outcome of [`RecurrenceScheduler::resync_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResyncReport {
    /// Triggers accepted by the sink
    pub registered: usize,
    /// Alarms not scheduled because they are disabled
    pub disabled: usize,
    /// Enabled alarms not scheduled because their data is unusable
    pub skipped: Vec<SkippedAlarm>,
    /// Individual registrations that failed
    pub failed: Vec<FailedRegistration>,
}

impl ResyncReport {
    /// True when at least one registration failed. Skipped alarms are a
    /// data problem, not a delivery one, and do not count.
    pub fn has_warnings(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Build the trigger requests for one alarm.
///
/// `medication_name` overrides the name denormalised on the alarm when the
/// owning medication is known.
///
/// # Errors
/// Returns the validation problem that prevents the alarm from firing.
pub fn trigger_requests(
    alarm: &Alarm,
    medication_name: Option<&str>,
) -> Result<Vec<TriggerRequest>, ValidationError> {
    let schedule = alarm.schedule()?;
    let payload = TriggerPayload {
        medication_id: alarm.medication_id.clone(),
        alarm_id: alarm.id.clone(),
        medication_name: medication_name.unwrap_or(&alarm.medication_name).to_string(),
        alarm_time: schedule.time.to_string(),
    };

    Ok(schedule
        .weekdays
        .iter()
        .map(|&day| TriggerRequest {
            key: TriggerKey::new(&alarm.id, day),
            weekday: day.to_platform(),
            hour: schedule.time.hour(),
            minute: schedule.time.minute(),
            payload: payload.clone(),
        })
        .collect())
}

/// Keeps the trigger sink in step with the alarm configuration.
pub struct RecurrenceScheduler<T: TriggerSink + ?Sized> {
    sink: Arc<T>,
}

impl<T: TriggerSink + ?Sized> Clone for RecurrenceScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<T: TriggerSink + ?Sized> RecurrenceScheduler<T> {
    pub fn new(sink: Arc<T>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<T> {
        &self.sink
    }

    /// Replace every registered trigger with the ones implied by `alarms`.
    ///
    /// Callers must not run two resyncs concurrently; if they do, the last
    /// one to finish wins.
    ///
    /// # Errors
    /// Fails only when the initial cancel fails, since registering on top of
    /// stale triggers could leave reminders that no longer exist.
    pub async fn resync_all(
        &self,
        medications: &[Medication],
        alarms: &[Alarm],
    ) -> Result<ResyncReport, TriggerError> {
        self.sink.cancel_all().await?;

        let names: HashMap<&str, &str> = medications
            .iter()
            .map(|m| (m.id.as_str(), m.name.as_str()))
            .collect();
        let mut report = ResyncReport::default();

        for alarm in alarms {
            if !alarm.enabled {
                report.disabled += 1;
                continue;
            }

            let requests = match trigger_requests(alarm, names.get(alarm.medication_id.as_str()).copied()) {
                Ok(requests) => requests,
                Err(ValidationError::NoWeekdays) => {
                    tracing::debug!(alarm_id = %alarm.id, "alarm has no weekdays, nothing to schedule");
                    report.skipped.push(SkippedAlarm {
                        alarm_id: alarm.id.clone(),
                        reason: ValidationError::NoWeekdays.to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    tracing::warn!(alarm_id = %alarm.id, error = %e, "skipping malformed alarm");
                    report.skipped.push(SkippedAlarm {
                        alarm_id: alarm.id.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            for request in requests {
                let key = request.key.clone();
                match self.sink.register_recurring(request).await {
                    Ok(()) => report.registered += 1,
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "trigger registration failed");
                        report.failed.push(FailedRegistration {
                            key,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        if report.has_warnings() {
            tracing::warn!(
                registered = report.registered,
                failed = report.failed.len(),
                "resync finished with failed registrations"
            );
        } else {
            tracing::info!(
                registered = report.registered,
                skipped = report.skipped.len(),
                disabled = report.disabled,
                "resync finished"
            );
        }
        Ok(report)
    }
}
