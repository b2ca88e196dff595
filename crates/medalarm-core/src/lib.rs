//! # medalarm Core Library
//!
//! This library provides the core logic for the medalarm medication
//! reminder. All operations are available through the standalone CLI binary;
//! any GUI is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Recurrence Scheduler**: turns weekly alarms into one platform trigger
//!   per (alarm, weekday), always by full cancel-and-reschedule
//! - **Adherence Engine**: derives adherence rate and streaks from alarms and
//!   the dose history on demand
//! - **Storage**: SQLite-based medication storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`RecurrenceScheduler`]: keeps a [`TriggerSink`] in sync with alarms
//! - [`AdherenceEngine`]: computes [`AdherenceStats`]
//! - [`MedicationDb`]: persistence, implementing [`MedicationStore`]
//! - [`ReminderService`]: wires the above together
//! - [`Config`]: application configuration management

pub mod error;
pub mod medication;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod storage;

pub use error::{ConfigError, CoreError, DatabaseError, TriggerError, ValidationError};
pub use medication::{Alarm, AlarmSchedule, AlarmTime, HistoryEntry, Medication, Weekday, ON_TIME_WINDOW_MINUTES};
pub use scheduler::{
    InMemoryTriggerSink, RecurrenceScheduler, ResyncReport, TriggerKey, TriggerPayload, TriggerRequest,
    TriggerSink, UpcomingReminder,
};
pub use service::{NewAlarm, ReminderService};
pub use stats::{AdherenceEngine, AdherenceStats};
pub use storage::{Config, DataResetOptions, DataResetSummary, MedicationDb, MedicationStore};
