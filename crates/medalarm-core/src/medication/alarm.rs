use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Medication, Weekday};
use crate::error::ValidationError;

/// A weekly recurring reminder owned by a medication.
///
/// `time` and `days` are kept exactly as stored; use [`Alarm::schedule`] to
/// get a validated view. Light settings are carried for the device-control
/// layer and are never interpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: String,
    pub medication_id: String,
    pub medication_name: String,
    pub time: String, // HH:MM, device local time
    pub days: Vec<u8>, // 1=Mon ... 7=Sun
    pub enabled: bool,
    #[serde(default)]
    pub light_color: Option<String>,
    #[serde(default)]
    pub light_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Alarm {
    /// Create an enabled alarm for `medication`.
    pub fn new(medication: &Medication, time: impl Into<String>, days: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            medication_id: medication.id.clone(),
            medication_name: medication.name.clone(),
            time: time.into(),
            days,
            enabled: true,
            light_color: None,
            light_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Validated time and weekday set.
    ///
    /// # Errors
    /// Returns the first problem found: a malformed time, a weekday outside
    /// 1..=7, or an empty weekday set.
    pub fn schedule(&self) -> Result<AlarmSchedule, ValidationError> {
        let time: AlarmTime = self.time.parse()?;
        let weekdays = self
            .days
            .iter()
            .map(|&d| Weekday::from_number(d))
            .collect::<Result<BTreeSet<_>, _>>()?;
        if weekdays.is_empty() {
            return Err(ValidationError::NoWeekdays);
        }
        Ok(AlarmSchedule { time, weekdays })
    }

    /// Enabled with a valid schedule, i.e. expected to produce triggers.
    pub fn is_active(&self) -> bool {
        self.enabled && self.schedule().is_ok()
    }
}

/// Hour and minute of an alarm, local time. Always in range; serialized
/// as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlarmTime {
    hour: u32,
    minute: u32,
}

impl AlarmTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTime(format!("{hour}:{minute}")));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(self) -> u32 {
        self.hour
    }

    pub fn minute(self) -> u32 {
        self.minute
    }

    pub fn minutes_of_day(self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn to_naive_time(self) -> NaiveTime {
        // Range is checked on construction.
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for AlarmTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTime(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let valid_part = |p: &str| !p.is_empty() && p.len() <= 2 && p.bytes().all(|b| b.is_ascii_digit());
        if !valid_part(h) || !valid_part(m) {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }
}

impl TryFrom<String> for AlarmTime {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AlarmTime> for String {
    fn from(time: AlarmTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Validated recurrence of an [`Alarm`]. Never has an empty weekday set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSchedule {
    pub time: AlarmTime,
    pub weekdays: BTreeSet<Weekday>,
}

impl AlarmSchedule {
    pub fn fires_on(&self, day: Weekday) -> bool {
        self.weekdays.contains(&day)
    }
}
