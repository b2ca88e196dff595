//! Application service wiring storage, scheduling and statistics.
//!
//! Built once at startup with its collaborators injected. Every mutation
//! that can change what should fire is followed by a full resync, and every
//! call starts from a fresh snapshot of the store.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, TimeZone};

use crate::error::{CoreError, Result, ValidationError};
use crate::medication::{Alarm, HistoryEntry, Medication};
use crate::scheduler::{RecurrenceScheduler, ResyncReport, TriggerSink};
use crate::stats::AdherenceStats;
use crate::storage::{Config, MedicationStore};

/// Fields of a new alarm.
#[derive(Debug, Clone, Default)]
pub struct NewAlarm {
    pub time: String,
    pub days: Vec<u8>,
    pub light_color: Option<String>,
    pub light_ids: Vec<String>,
}

pub struct ReminderService<S: MedicationStore + ?Sized, T: TriggerSink + ?Sized> {
    store: Arc<S>,
    scheduler: RecurrenceScheduler<T>,
    config: Config,
}

/// Alarms may be saved with no weekdays (they simply never fire), but not
/// with a time or weekday that cannot be scheduled.
fn validate_alarm(alarm: &Alarm) -> Result<()> {
    match alarm.schedule() {
        Ok(_) | Err(ValidationError::NoWeekdays) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn now_local() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

impl<S: MedicationStore + ?Sized, T: TriggerSink + ?Sized> ReminderService<S, T> {
    pub fn new(store: Arc<S>, sink: Arc<T>, config: Config) -> Self {
        Self {
            store,
            scheduler: RecurrenceScheduler::new(sink),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn scheduler(&self) -> &RecurrenceScheduler<T> {
        &self.scheduler
    }

    // === Scheduling ===

    /// Reload medications and alarms and rebuild every trigger.
    ///
    /// With reminders disabled in the config, this clears all triggers.
    pub async fn resync(&self) -> Result<ResyncReport> {
        let medications = self.store.load_medications().await?;
        let alarms = if self.config.reminders.enabled {
            self.store.load_alarms().await?
        } else {
            Vec::new()
        };
        Ok(self.scheduler.resync_all(&medications, &alarms).await?)
    }

    // === Medications ===

    pub async fn medications(&self) -> Result<Vec<Medication>> {
        self.store.load_medications().await
    }

    pub async fn medication(&self, id: &str) -> Result<Medication> {
        self.store
            .load_medications()
            .await?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| CoreError::medication_not_found(id))
    }

    pub async fn add_medication(&self, name: &str, pill_count: u32) -> Result<Medication> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "must not be empty".into(),
            }
            .into());
        }
        let medication = Medication::new(name, pill_count);
        self.store.save_medication(&medication).await?;
        tracing::info!(medication_id = %medication.id, name = %medication.name, "medication added");
        Ok(medication)
    }

    /// Save edits to a medication. A rename is copied onto its alarms.
    pub async fn update_medication(&self, medication: &Medication) -> Result<ResyncReport> {
        let existing = self.medication(&medication.id).await?;
        let mut updated = medication.clone();
        updated.updated_at = chrono::Utc::now();
        self.store.save_medication(&updated).await?;

        if existing.name != updated.name {
            for mut alarm in self
                .store
                .load_alarms()
                .await?
                .into_iter()
                .filter(|a| a.medication_id == updated.id)
            {
                alarm.medication_name = updated.name.clone();
                self.store.save_alarm(&alarm).await?;
            }
        }
        self.resync().await
    }

    /// Delete a medication and its alarms. History is kept.
    pub async fn delete_medication(&self, id: &str) -> Result<ResyncReport> {
        if !self.store.delete_medication(id).await? {
            return Err(CoreError::medication_not_found(id));
        }
        tracing::info!(medication_id = %id, "medication deleted");
        self.resync().await
    }

    /// Add `amount` pills to a medication's count.
    pub async fn refill(&self, medication_id: &str, amount: u32) -> Result<Medication> {
        let mut medication = self.medication(medication_id).await?;
        medication.refill(amount);
        self.store.save_medication(&medication).await?;
        Ok(medication)
    }

    // === Alarms ===

    pub async fn alarms(&self) -> Result<Vec<Alarm>> {
        self.store.load_alarms().await
    }

    pub async fn alarm(&self, id: &str) -> Result<Alarm> {
        self.store
            .load_alarms()
            .await?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| CoreError::alarm_not_found(id))
    }

    pub async fn add_alarm(&self, medication_id: &str, new: NewAlarm) -> Result<(Alarm, ResyncReport)> {
        let medication = self.medication(medication_id).await?;
        let mut alarm = Alarm::new(&medication, new.time.trim(), new.days);
        alarm.light_color = new.light_color;
        alarm.light_ids = new.light_ids;
        validate_alarm(&alarm)?;

        self.store.save_alarm(&alarm).await?;
        tracing::info!(alarm_id = %alarm.id, medication_id = %medication.id, time = %alarm.time, "alarm added");
        let report = self.resync().await?;
        Ok((alarm, report))
    }

    /// Save edits to an existing alarm. Ownership cannot change.
    pub async fn update_alarm(&self, alarm: &Alarm) -> Result<ResyncReport> {
        let existing = self.alarm(&alarm.id).await?;
        if existing.medication_id != alarm.medication_id {
            return Err(ValidationError::InvalidValue {
                field: "medication_id".into(),
                message: "alarms cannot move between medications".into(),
            }
            .into());
        }
        validate_alarm(alarm)?;
        self.store.save_alarm(alarm).await?;
        self.resync().await
    }

    pub async fn set_alarm_enabled(&self, id: &str, enabled: bool) -> Result<ResyncReport> {
        let mut alarm = self.alarm(id).await?;
        alarm.enabled = enabled;
        self.store.save_alarm(&alarm).await?;
        self.resync().await
    }

    pub async fn delete_alarm(&self, id: &str) -> Result<ResyncReport> {
        if !self.store.delete_alarm(id).await? {
            return Err(CoreError::alarm_not_found(id));
        }
        self.resync().await
    }

    // === Doses and history ===

    /// Record one dose taken now.
    ///
    /// Returns `None`, recording nothing, when no pills are left.
    pub async fn take_dose(&self, medication_id: &str, alarm_id: Option<&str>) -> Result<Option<HistoryEntry>> {
        self.take_dose_at(medication_id, alarm_id, now_local()).await
    }

    /// Record one dose taken at `taken_at` (local wall-clock time with offset).
    pub async fn take_dose_at(
        &self,
        medication_id: &str,
        alarm_id: Option<&str>,
        taken_at: DateTime<FixedOffset>,
    ) -> Result<Option<HistoryEntry>> {
        let mut medication = self.medication(medication_id).await?;
        let alarm = match alarm_id {
            Some(id) => Some(self.alarm(id).await?),
            None => None,
        };

        if !medication.take_pill() {
            tracing::info!(medication_id = %medication.id, "no pills left, dose not recorded");
            return Ok(None);
        }

        let entry = HistoryEntry::record(
            &medication,
            alarm.as_ref(),
            taken_at,
            self.config.reminders.on_time_window_minutes,
        );
        self.store.record_dose(&medication, &entry).await?;
        Ok(Some(entry))
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.store.load_history().await
    }

    pub async fn delete_history_entry(&self, id: &str) -> Result<bool> {
        self.store.delete_history_entry(id).await
    }

    /// Clear all history and alarms, keeping medications, then resync.
    pub async fn reset_all(&self) -> Result<ResyncReport> {
        let history = self.store.clear_history().await?;
        let alarms = self.store.clear_alarms().await?;
        tracing::info!(history, alarms, "history and alarms reset");
        self.resync().await
    }

    // === Statistics ===

    /// Adherence stats for one medication as of now.
    ///
    /// Never fails: a store error or unknown id is logged and reported as
    /// all-zero stats. Dose dates use the local zone rules in force at each
    /// dose, so a DST change does not move doses near midnight.
    pub async fn stats_for(&self, medication_id: &str) -> AdherenceStats {
        self.stats_for_at(medication_id, Local::now()).await
    }

    pub async fn stats_for_at<Tz: TimeZone>(&self, medication_id: &str, now: DateTime<Tz>) -> AdherenceStats {
        match self.try_stats(medication_id, now).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(medication_id = %medication_id, error = %e, "adherence stats unavailable");
                AdherenceStats::empty(medication_id)
            }
        }
    }

    async fn try_stats<Tz: TimeZone>(&self, medication_id: &str, now: DateTime<Tz>) -> Result<AdherenceStats> {
        let medication = self.medication(medication_id).await?;
        let alarms = self.store.load_alarms().await?;
        let history = self.store.load_history().await?;
        Ok(self
            .config
            .adherence_engine()
            .compute_stats(&medication, &alarms, &history, now))
    }

    /// Stats for every medication as of now.
    pub async fn dashboard(&self) -> Vec<AdherenceStats> {
        self.dashboard_at(Local::now()).await
    }

    pub async fn dashboard_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Vec<AdherenceStats> {
        let snapshot = async {
            let medications = self.store.load_medications().await?;
            let alarms = self.store.load_alarms().await?;
            let history = self.store.load_history().await?;
            Ok::<_, CoreError>((medications, alarms, history))
        };

        match snapshot.await {
            Ok((medications, alarms, history)) => {
                let engine = self.config.adherence_engine();
                medications
                    .iter()
                    .map(|m| engine.compute_stats(m, &alarms, &history, now.clone()))
                    .collect()
            }
            Err(e) => {
                tracing::error!(error = %e, "adherence dashboard unavailable");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::InMemoryTriggerSink;
    use crate::storage::MedicationDb;

    fn service() -> ReminderService<MedicationDb, InMemoryTriggerSink> {
        ReminderService::new(
            Arc::new(MedicationDb::open_memory().unwrap()),
            Arc::new(InMemoryTriggerSink::new()),
            Config::default(),
        )
    }

    fn alarm(time: &str, days: Vec<u8>) -> NewAlarm {
        NewAlarm {
            time: time.into(),
            days,
            ..NewAlarm::default()
        }
    }

    #[tokio::test]
    async fn add_alarm_registers_triggers() {
        let svc = service();
        let med = svc.add_medication("Aspirin", 10).await.unwrap();
        let (_, report) = svc.add_alarm(&med.id, alarm("08:00", vec![1, 2])).await.unwrap();
        assert_eq!(report.registered, 2);
        assert_eq!(svc.scheduler().sink().len(), 2);
    }

    #[tokio::test]
    async fn add_alarm_rejects_malformed_time() {
        let svc = service();
        let med = svc.add_medication("Aspirin", 10).await.unwrap();
        let err = svc.add_alarm(&med.id, alarm("25:00", vec![1])).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::InvalidTime(_))));
        assert!(svc.alarms().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_medication_rejects_blank_name() {
        let svc = service();
        assert!(svc.add_medication("   ", 1).await.is_err());
    }

    #[tokio::test]
    async fn rename_propagates_to_alarms_and_payloads() {
        let svc = service();
        let mut med = svc.add_medication("Aspirin", 10).await.unwrap();
        svc.add_alarm(&med.id, alarm("08:00", vec![1])).await.unwrap();

        med.name = "Aspirin 81mg".into();
        svc.update_medication(&med).await.unwrap();

        let alarms = svc.alarms().await.unwrap();
        assert_eq!(alarms[0].medication_name, "Aspirin 81mg");
        let triggers = svc.scheduler().sink().registered();
        assert_eq!(triggers[0].payload.medication_name, "Aspirin 81mg");
    }

    #[tokio::test]
    async fn take_dose_without_pills_records_nothing() {
        let svc = service();
        let med = svc.add_medication("Aspirin", 0).await.unwrap();
        assert!(svc.take_dose(&med.id, None).await.unwrap().is_none());
        assert!(svc.history().await.unwrap().is_empty());
        assert_eq!(svc.medication(&med.id).await.unwrap().pill_count, 0);
    }

    /// Delegates to a database but fails every dose write.
    struct DiskFullStore(MedicationDb);

    #[async_trait::async_trait]
    impl MedicationStore for DiskFullStore {
        async fn load_medications(&self) -> Result<Vec<Medication>> {
            self.0.load_medications().await
        }
        async fn load_alarms(&self) -> Result<Vec<Alarm>> {
            self.0.load_alarms().await
        }
        async fn load_history(&self) -> Result<Vec<HistoryEntry>> {
            self.0.load_history().await
        }
        async fn save_medication(&self, medication: &Medication) -> Result<()> {
            self.0.save_medication(medication).await
        }
        async fn delete_medication(&self, id: &str) -> Result<bool> {
            MedicationStore::delete_medication(&self.0, id).await
        }
        async fn save_alarm(&self, alarm: &Alarm) -> Result<()> {
            self.0.save_alarm(alarm).await
        }
        async fn delete_alarm(&self, id: &str) -> Result<bool> {
            MedicationStore::delete_alarm(&self.0, id).await
        }
        async fn append_history(&self, _entry: &HistoryEntry) -> Result<()> {
            Err(CoreError::Custom("disk full".into()))
        }
        async fn record_dose(&self, _medication: &Medication, _entry: &HistoryEntry) -> Result<()> {
            Err(CoreError::Custom("disk full".into()))
        }
        async fn delete_history_entry(&self, id: &str) -> Result<bool> {
            MedicationStore::delete_history_entry(&self.0, id).await
        }
        async fn clear_history(&self) -> Result<usize> {
            self.0.clear_history().await
        }
        async fn clear_alarms(&self) -> Result<usize> {
            self.0.clear_alarms().await
        }
    }

    #[tokio::test]
    async fn failed_dose_write_keeps_pill_count() {
        let svc = ReminderService::new(
            Arc::new(DiskFullStore(MedicationDb::open_memory().unwrap())),
            Arc::new(InMemoryTriggerSink::new()),
            Config::default(),
        );
        let med = svc.add_medication("Aspirin", 5).await.unwrap();

        assert!(svc.take_dose(&med.id, None).await.is_err());
        assert_eq!(svc.medication(&med.id).await.unwrap().pill_count, 5);
        assert!(svc.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_medication_stats_degrade_to_zero() {
        let svc = service();
        let stats = svc.stats_for("missing").await;
        assert_eq!(stats, AdherenceStats::empty("missing"));
    }

    #[tokio::test]
    async fn disabled_reminders_clear_triggers() {
        let mut config = Config::default();
        config.reminders.enabled = false;
        let svc = ReminderService::new(
            Arc::new(MedicationDb::open_memory().unwrap()),
            Arc::new(InMemoryTriggerSink::new()),
            config,
        );
        let med = svc.add_medication("Aspirin", 10).await.unwrap();
        let (_, report) = svc.add_alarm(&med.id, alarm("08:00", vec![1])).await.unwrap();
        assert_eq!(report.registered, 0);
        assert!(svc.scheduler().sink().is_empty());
    }
}
