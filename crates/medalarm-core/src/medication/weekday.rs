//! Weekday enumeration and numbering translation.
//!
//! Alarms store weekdays as Monday=1 .. Sunday=7. Platform notification
//! schedulers number them Sunday=1 .. Saturday=7; [`Weekday::to_platform`]
//! and [`Weekday::from_platform`] are the only place that mapping lives.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Parse a stored weekday number (Monday=1 .. Sunday=7).
    pub fn from_number(n: u8) -> Result<Self, ValidationError> {
        match n {
            1..=7 => Ok(Self::ALL[usize::from(n - 1)]),
            other => Err(ValidationError::InvalidWeekday(other)),
        }
    }

    /// Stored number, Monday=1 .. Sunday=7.
    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    /// Platform number, Sunday=1 .. Saturday=7.
    pub fn to_platform(self) -> u8 {
        match self {
            Weekday::Sunday => 1,
            other => other.number() + 1,
        }
    }

    /// Inverse of [`Weekday::to_platform`].
    pub fn from_platform(n: u8) -> Option<Self> {
        match n {
            1 => Some(Weekday::Sunday),
            2..=7 => Some(Self::ALL[usize::from(n - 2)]),
            _ => None,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Weekday::Monday => "Mon",
            Weekday::Tuesday => "Tue",
            Weekday::Wednesday => "Wed",
            Weekday::Thursday => "Thu",
            Weekday::Friday => "Fri",
            Weekday::Saturday => "Sat",
            Weekday::Sunday => "Sun",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        Self::ALL[day.num_days_from_monday() as usize]
    }
}

impl From<Weekday> for chrono::Weekday {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Monday => chrono::Weekday::Mon,
            Weekday::Tuesday => chrono::Weekday::Tue,
            Weekday::Wednesday => chrono::Weekday::Wed,
            Weekday::Thursday => chrono::Weekday::Thu,
            Weekday::Friday => chrono::Weekday::Fri,
            Weekday::Saturday => chrono::Weekday::Sat,
            Weekday::Sunday => chrono::Weekday::Sun,
        }
    }
}
