//! Persistence boundary.
//!
//! Reads always return the complete collection; callers treat each result
//! as a fresh snapshot.

use async_trait::async_trait;

use crate::error::Result;
use crate::medication::{Alarm, HistoryEntry, Medication};

/// Storage for medications, alarms and history.
#[async_trait]
pub trait MedicationStore: Send + Sync {
    async fn load_medications(&self) -> Result<Vec<Medication>>;

    async fn load_alarms(&self) -> Result<Vec<Alarm>>;

    async fn load_history(&self) -> Result<Vec<HistoryEntry>>;

    /// Insert or update by id. Never touches the medication's alarms.
    async fn save_medication(&self, medication: &Medication) -> Result<()>;

    /// Delete a medication and every alarm it owns. Returns `false` if the
    /// id was unknown.
    async fn delete_medication(&self, id: &str) -> Result<bool>;

    /// Insert or update by id, keeping an existing alarm's position.
    async fn save_alarm(&self, alarm: &Alarm) -> Result<()>;

    async fn delete_alarm(&self, id: &str) -> Result<bool>;

    async fn append_history(&self, entry: &HistoryEntry) -> Result<()>;

    /// Save the decremented medication and append its history entry as one
    /// unit: either both are stored or neither is.
    async fn record_dose(&self, medication: &Medication, entry: &HistoryEntry) -> Result<()>;

    async fn delete_history_entry(&self, id: &str) -> Result<bool>;

    /// Remove every history entry, returning how many there were.
    async fn clear_history(&self) -> Result<usize>;

    /// Remove every alarm, returning how many there were.
    async fn clear_alarms(&self) -> Result<usize>;
}
