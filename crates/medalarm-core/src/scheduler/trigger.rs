//! Trigger-delivery boundary.
//!
//! The platform notification scheduler is reached through [`TriggerSink`].
//! One recurring trigger exists per (alarm, weekday), keyed by
//! [`TriggerKey`] so re-registering the same pair replaces rather than
//! duplicates.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::TriggerError;
use crate::medication::Weekday;

/// Deterministic key of a registered trigger: `"{alarm_id}:{weekday}"`,
/// weekday in stored numbering (Monday=1).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerKey(String);

impl TriggerKey {
    pub fn new(alarm_id: &str, weekday: Weekday) -> Self {
        Self(format!("{alarm_id}:{}", weekday.number()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Data handed back when a trigger fires. This shape is the whole contract
/// with whatever reacts to the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerPayload {
    pub medication_id: String,
    pub alarm_id: String,
    pub medication_name: String,
    pub alarm_time: String,
}

/// A weekly recurring registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub key: TriggerKey,
    /// Platform numbering, Sunday=1 .. Saturday=7.
    pub weekday: u8,
    pub hour: u32,
    pub minute: u32,
    pub payload: TriggerPayload,
}

impl TriggerRequest {
    /// Weekday in domain terms, decoded from the platform number.
    pub fn domain_weekday(&self) -> Option<Weekday> {
        Weekday::from_platform(self.weekday)
    }

    /// Whether this trigger fires at the minute containing `at`.
    pub fn matches(&self, at: NaiveDateTime) -> bool {
        self.domain_weekday() == Some(Weekday::from(at.weekday()))
            && self.hour == at.hour()
            && self.minute == at.minute()
    }
}

/// Start of the minute containing `at`.
pub fn minute_floor(at: NaiveDateTime) -> NaiveDateTime {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Platform trigger scheduler.
#[async_trait]
pub trait TriggerSink: Send + Sync {
    /// Remove every trigger previously registered by this application.
    async fn cancel_all(&self) -> Result<(), TriggerError>;

    /// Register (or replace, by key) a weekly recurring trigger.
    async fn register_recurring(&self, request: TriggerRequest) -> Result<(), TriggerError>;
}

/// Process-local trigger table.
///
/// Used by the daemon and by tests. Without notification permission,
/// registrations are accepted and dropped.
#[derive(Debug)]
pub struct InMemoryTriggerSink {
    triggers: Mutex<BTreeMap<TriggerKey, TriggerRequest>>,
    permission_granted: AtomicBool,
}

impl Default for InMemoryTriggerSink {
    fn default() -> Self {
        Self {
            triggers: Mutex::new(BTreeMap::new()),
            permission_granted: AtomicBool::new(true),
        }
    }
}

impl InMemoryTriggerSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    pub fn has_permission(&self) -> bool {
        self.permission_granted.load(Ordering::SeqCst)
    }

    fn table(&self) -> MutexGuard<'_, BTreeMap<TriggerKey, TriggerRequest>> {
        // The map holds plain data; a panicked writer cannot leave it torn.
        self.triggers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registered triggers ordered by key.
    pub fn registered(&self) -> Vec<TriggerRequest> {
        self.table().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    pub fn get(&self, key: &TriggerKey) -> Option<TriggerRequest> {
        self.table().get(key).cloned()
    }

    /// Payloads of every trigger that fires at the minute containing `now`.
    pub fn due(&self, now: NaiveDateTime) -> Vec<TriggerPayload> {
        self.table()
            .values()
            .filter(|t| t.matches(now))
            .map(|t| t.payload.clone())
            .collect()
    }

    /// Payloads due in every minute after the one containing `after`, up to
    /// and including the one containing `until`, paired with their minute
    /// and in firing order. Empty when `until` is not later than `after`.
    pub fn due_between(&self, after: NaiveDateTime, until: NaiveDateTime) -> Vec<(NaiveDateTime, TriggerPayload)> {
        let table = self.table();
        let last = minute_floor(until);
        let mut minute = minute_floor(after) + Duration::minutes(1);
        let mut due = Vec::new();
        while minute <= last {
            due.extend(
                table
                    .values()
                    .filter(|t| t.matches(minute))
                    .map(|t| (minute, t.payload.clone())),
            );
            minute += Duration::minutes(1);
        }
        due
    }
}

#[async_trait]
impl TriggerSink for InMemoryTriggerSink {
    async fn cancel_all(&self) -> Result<(), TriggerError> {
        self.table().clear();
        Ok(())
    }

    async fn register_recurring(&self, request: TriggerRequest) -> Result<(), TriggerError> {
        if !self.has_permission() {
            tracing::debug!(key = %request.key, "notification permission missing, dropping trigger");
            return Ok(());
        }
        self.table().insert(request.key.clone(), request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(alarm_id: &str, day: Weekday, hour: u32, minute: u32) -> TriggerRequest {
        TriggerRequest {
            key: TriggerKey::new(alarm_id, day),
            weekday: day.to_platform(),
            hour,
            minute,
            payload: TriggerPayload {
                medication_id: "med-1".to_string(),
                alarm_id: alarm_id.to_string(),
                medication_name: "Aspirin".to_string(),
                alarm_time: format!("{hour:02}:{minute:02}"),
            },
        }
    }

    #[test]
    fn key_is_alarm_and_stored_weekday() {
        assert_eq!(TriggerKey::new("a1", Weekday::Sunday).as_str(), "a1:7");
        assert_eq!(TriggerKey::new("a1", Weekday::Monday).to_string(), "a1:1");
    }

    #[test]
    fn payload_serializes_camel_case() {
        let json = serde_json::to_value(&request("a1", Weekday::Monday, 8, 0).payload).unwrap();
        assert_eq!(json["medicationId"], "med-1");
        assert_eq!(json["alarmId"], "a1");
        assert_eq!(json["medicationName"], "Aspirin");
        assert_eq!(json["alarmTime"], "08:00");
    }

    #[tokio::test]
    async fn same_key_replaces_existing_trigger() {
        let sink = InMemoryTriggerSink::new();
        sink.register_recurring(request("a1", Weekday::Monday, 8, 0)).await.unwrap();
        sink.register_recurring(request("a1", Weekday::Monday, 9, 0)).await.unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.registered()[0].hour, 9);
    }

    #[tokio::test]
    async fn registration_without_permission_is_noop() {
        let sink = InMemoryTriggerSink::new();
        sink.set_permission(false);
        sink.register_recurring(request("a1", Weekday::Monday, 8, 0)).await.unwrap();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn due_matches_weekday_hour_and_minute() {
        let sink = InMemoryTriggerSink::new();
        sink.register_recurring(request("a1", Weekday::Monday, 8, 0)).await.unwrap();
        sink.register_recurring(request("a2", Weekday::Tuesday, 8, 0)).await.unwrap();

        // 2026-03-02 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let due = sink.due(monday.and_hms_opt(8, 0, 42).unwrap());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].alarm_id, "a1");

        assert!(sink.due(monday.and_hms_opt(8, 1, 0).unwrap()).is_empty());
    }

    #[tokio::test]
    async fn due_between_covers_every_skipped_minute() {
        let sink = InMemoryTriggerSink::new();
        sink.register_recurring(request("a1", Weekday::Monday, 8, 1)).await.unwrap();
        sink.register_recurring(request("a2", Weekday::Monday, 8, 3)).await.unwrap();

        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let before = monday.and_hms_opt(8, 0, 30).unwrap();
        let after = monday.and_hms_opt(8, 2, 10).unwrap();

        // Polling only at 08:00 and 08:02 would never see 08:01.
        assert!(sink.due(before).is_empty());
        assert!(sink.due(after).is_empty());

        let due = sink.due_between(before, after);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, monday.and_hms_opt(8, 1, 0).unwrap());
        assert_eq!(due[0].1.alarm_id, "a1");

        let later = sink.due_between(after, monday.and_hms_opt(8, 3, 59).unwrap());
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].1.alarm_id, "a2");

        // Same minute: nothing new.
        assert!(sink.due_between(after, after).is_empty());
    }

    #[tokio::test]
    async fn cancel_all_clears_everything() {
        let sink = InMemoryTriggerSink::new();
        sink.register_recurring(request("a1", Weekday::Monday, 8, 0)).await.unwrap();
        sink.cancel_all().await.unwrap();
        assert!(sink.is_empty());
    }
}
