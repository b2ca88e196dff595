//! Concrete trigger instants from weekly recurrences.

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::medication::{Alarm, AlarmSchedule, Weekday};

/// One concrete upcoming reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingReminder {
    pub alarm_id: String,
    pub medication_id: String,
    pub medication_name: String,
    /// Local wall-clock time.
    pub at: NaiveDateTime,
}

/// First instant strictly after `after` at which `schedule` fires.
pub fn next_occurrence(schedule: &AlarmSchedule, after: NaiveDateTime) -> NaiveDateTime {
    let time = schedule.time.to_naive_time();
    // Offset 7 lands on the same weekday next week, so a non-empty weekday
    // set always matches within the range.
    (0..=7)
        .map(|offset| after.date() + Duration::days(offset))
        .filter(|date| schedule.fires_on(Weekday::from(date.weekday())))
        .map(|date| date.and_time(time))
        .find(|candidate| *candidate > after)
        .unwrap_or_else(|| after.date().and_time(time) + Duration::days(7))
}

/// Next trigger of `alarm` after `after`; `None` if the alarm is disabled or
/// malformed.
pub fn next_trigger(alarm: &Alarm, after: NaiveDateTime) -> Option<NaiveDateTime> {
    if !alarm.enabled {
        return None;
    }
    let schedule = alarm.schedule().ok()?;
    Some(next_occurrence(&schedule, after))
}

/// The next `limit` reminders across `alarms`, in chronological order.
///
/// Ties at the same instant are ordered by alarm id.
pub fn upcoming(alarms: &[Alarm], after: NaiveDateTime, limit: usize) -> Vec<UpcomingReminder> {
    let mut reminders = Vec::new();
    if limit == 0 {
        return reminders;
    }

    for alarm in alarms.iter().filter(|a| a.enabled) {
        let Ok(schedule) = alarm.schedule() else {
            continue;
        };
        let mut cursor = after;
        for _ in 0..limit {
            cursor = next_occurrence(&schedule, cursor);
            reminders.push(UpcomingReminder {
                alarm_id: alarm.id.clone(),
                medication_id: alarm.medication_id.clone(),
                medication_name: alarm.medication_name.clone(),
                at: cursor,
            });
        }
    }

    reminders.sort_by(|a, b| a.at.cmp(&b.at).then_with(|| a.alarm_id.cmp(&b.alarm_id)));
    reminders.truncate(limit);
    reminders
}
