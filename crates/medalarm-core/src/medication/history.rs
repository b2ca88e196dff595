use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Alarm, AlarmTime, Medication};

/// Minutes either side of the nominal alarm time within which a dose
/// counts as taken on time.
pub const ON_TIME_WINDOW_MINUTES: u32 = 30;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// A recorded "taken" event. Entries are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub medication_id: String,
    pub medication_name: String,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub alarm_id: Option<String>,
    #[serde(default)]
    pub on_time: Option<bool>,
}

impl HistoryEntry {
    /// Record a dose of `medication` taken at `taken_at`.
    ///
    /// When the dose answers an alarm, `on_time` is set by comparing the
    /// wall-clock time of `taken_at` (in its own timezone) against the alarm
    /// time. A malformed alarm time leaves `on_time` unset.
    pub fn record<Tz: TimeZone>(
        medication: &Medication,
        alarm: Option<&Alarm>,
        taken_at: DateTime<Tz>,
        on_time_window_minutes: u32,
    ) -> Self {
        let local_time = taken_at.time();
        let on_time = alarm
            .and_then(|a| a.time.parse::<AlarmTime>().ok())
            .map(|t| is_on_time(t, local_time, on_time_window_minutes));

        Self {
            id: Uuid::new_v4().to_string(),
            medication_id: medication.id.clone(),
            medication_name: medication.name.clone(),
            taken_at: taken_at.with_timezone(&Utc),
            alarm_id: alarm.map(|a| a.id.clone()),
            on_time,
        }
    }

    /// Calendar date of this entry in `tz`.
    pub fn local_date<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.taken_at.with_timezone(tz).date_naive()
    }
}

/// Whether `taken` falls within `window_minutes` of `nominal`.
///
/// Distance wraps around midnight, so a 23:50 alarm answered at 00:10 is
/// twenty minutes late, not twenty-three hours early.
pub fn is_on_time(nominal: AlarmTime, taken: NaiveTime, window_minutes: u32) -> bool {
    let taken_min = taken.hour() * 60 + taken.minute();
    let diff = nominal.minutes_of_day().abs_diff(taken_min);
    diff.min(MINUTES_PER_DAY - diff) <= window_minutes
}
