//! Medication, alarm and history record types.
//!
//! A [`Medication`] owns its [`Alarm`]s; deleting the medication deletes
//! them. [`HistoryEntry`] values are append-only "taken" events.

mod alarm;
mod history;
mod weekday;

pub use alarm::{Alarm, AlarmSchedule, AlarmTime};
pub use history::{is_on_time, HistoryEntry, ON_TIME_WINDOW_MINUTES};
pub use weekday::Weekday;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub pill_count: u32,
    pub active: bool,
    /// Alarm ids in display order.
    #[serde(default)]
    pub alarm_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medication {
    pub fn new(name: impl Into<String>, pill_count: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            pill_count,
            active: true,
            alarm_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Take one pill.
    ///
    /// Returns `false` and leaves the count untouched when no pills are
    /// left; otherwise decrements by exactly one.
    pub fn take_pill(&mut self) -> bool {
        if self.pill_count == 0 {
            return false;
        }
        self.pill_count -= 1;
        self.updated_at = Utc::now();
        true
    }

    /// Add `amount` pills. Saturates at `u32::MAX`.
    pub fn refill(&mut self, amount: u32) {
        self.pill_count = self.pill_count.saturating_add(amount);
        self.updated_at = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.pill_count == 0
    }
}
