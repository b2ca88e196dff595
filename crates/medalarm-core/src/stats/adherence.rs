//! Medication adherence statistics
//!
//! Stats are derived on demand from a medication's alarms and its history
//! and are never stored. The evaluation window is a trailing run of days
//! ending today:
//! - **Expected day**: a date in the window on which at least one enabled
//!   alarm fires
//! - **Taken day**: a local calendar date with at least one history entry,
//!   however many doses were recorded on it

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::medication::{Alarm, AlarmSchedule, HistoryEntry, Medication, Weekday};

/// Default length of the trailing evaluation window, in days
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Adherence snapshot for one medication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdherenceStats {
    pub medication_id: String,
    /// Distinct expected days in the window
    pub total_expected: u32,
    /// Expected days on which a dose was recorded
    pub total_taken: u32,
    /// Percentage of expected days taken (0 to 100)
    pub adherence_rate: u8,
    /// Consecutive taken days ending today
    pub current_streak: u32,
    /// Longest run of consecutive taken days on record
    pub longest_streak: u32,
    /// Expected days with no dose recorded
    pub missed: u32,
}

impl AdherenceStats {
    /// All-zero stats for `medication_id`
    pub fn empty(medication_id: &str) -> Self {
        Self {
            medication_id: medication_id.to_string(),
            ..Self::default()
        }
    }
}

/// Computes [`AdherenceStats`] over a trailing window
#[derive(Debug, Clone)]
pub struct AdherenceEngine {
    /// Days in the evaluation window, today included
    pub window_days: u32,
}

impl Default for AdherenceEngine {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

impl AdherenceEngine {
    /// Create an engine with the default 30-day window
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with a custom window; zero is treated as one day
    pub fn with_window(window_days: u32) -> Self {
        Self {
            window_days: window_days.max(1),
        }
    }

    /// Compute stats as of the current local time
    pub fn compute_stats_now(
        &self,
        medication: &Medication,
        alarms: &[Alarm],
        history: &[HistoryEntry],
    ) -> AdherenceStats {
        self.compute_stats(medication, alarms, history, Local::now())
    }

    /// Compute stats as of `now`
    ///
    /// Calendar dates are taken in `now`'s timezone. Alarms and entries that
    /// belong to other medications are ignored, so callers may pass whole
    /// collections.
    ///
    /// # Returns
    /// All-zero stats when the medication has no enabled, well-formed alarm
    pub fn compute_stats<Tz: TimeZone>(
        &self,
        medication: &Medication,
        alarms: &[Alarm],
        history: &[HistoryEntry],
        now: DateTime<Tz>,
    ) -> AdherenceStats {
        let schedules: Vec<AlarmSchedule> = alarms
            .iter()
            .filter(|a| a.medication_id == medication.id && a.enabled)
            .filter_map(|a| a.schedule().ok())
            .collect();

        if schedules.is_empty() {
            return AdherenceStats::empty(&medication.id);
        }

        let tz = now.timezone();
        let today = now.date_naive();

        let expected = self.expected_days(&schedules, today);
        let taken: BTreeSet<NaiveDate> = history
            .iter()
            .filter(|e| e.medication_id == medication.id)
            .map(|e| e.local_date(&tz))
            .collect();

        let total_expected = expected.len() as u32;
        let total_taken = expected.intersection(&taken).count() as u32;

        let adherence_rate = if total_expected > 0 {
            ((total_taken as f64 / total_expected as f64) * 100.0).round().min(100.0) as u8
        } else {
            0
        };

        AdherenceStats {
            medication_id: medication.id.clone(),
            total_expected,
            total_taken,
            adherence_rate,
            current_streak: current_streak(&taken, today),
            longest_streak: longest_streak(&taken),
            missed: total_expected.saturating_sub(total_taken),
        }
    }

    /// Dates in the window ending `today` on which any schedule fires
    pub fn expected_days(&self, schedules: &[AlarmSchedule], today: NaiveDate) -> BTreeSet<NaiveDate> {
        let window = i64::from(self.window_days.max(1));
        (0..window)
            .map(|back| today - Duration::days(back))
            .filter(|date| {
                let day = Weekday::from(date.weekday());
                schedules.iter().any(|s| s.fires_on(day))
            })
            .collect()
    }
}

/// Consecutive taken days walking back from `today`; zero if today is not taken
pub fn current_streak(taken: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut day = Some(today);
    while let Some(d) = day.filter(|d| taken.contains(d)) {
        streak += 1;
        day = d.pred_opt();
    }
    streak
}

/// Longest run of consecutive calendar dates in `taken`
pub fn longest_streak(taken: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &date in taken {
        run = match previous {
            Some(prev) if (date - prev).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }
    longest
}
