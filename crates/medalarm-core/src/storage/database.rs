//! SQLite-based storage for medications, alarms and history.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use super::migrations;
use super::store::MedicationStore;
use crate::error::{CoreError, DatabaseError, Result};
use crate::medication::{Alarm, HistoryEntry, Medication};

// === Helper Functions ===

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Decode a JSON array column of alarm `alarm_id`, treating garbage as empty
fn parse_json_list<T: serde::de::DeserializeOwned>(raw: &str, column: &str, alarm_id: &str) -> Vec<T> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(alarm_id, column, error = %e, "corrupt alarm column, reading it as empty");
        Vec::new()
    })
}

const ALARM_COLUMNS: &str =
    "id, medication_id, medication_name, time, days, enabled, light_color, light_ids, created_at";

fn row_to_alarm(row: &rusqlite::Row) -> std::result::Result<Alarm, rusqlite::Error> {
    let days: String = row.get(4)?;
    let light_ids: String = row.get(7)?;
    let created_at: String = row.get(8)?;
    let id: String = row.get(0)?;
    Ok(Alarm {
        days: parse_json_list(&days, "days", &id),
        light_ids: parse_json_list(&light_ids, "light_ids", &id),
        id,
        medication_id: row.get(1)?,
        medication_name: row.get(2)?,
        time: row.get(3)?,
        enabled: row.get(5)?,
        light_color: row.get(6)?,
        created_at: parse_datetime_fallback(&created_at),
    })
}

fn row_to_medication(row: &rusqlite::Row) -> std::result::Result<Medication, rusqlite::Error> {
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(Medication {
        id: row.get(0)?,
        name: row.get(1)?,
        pill_count: row.get(2)?,
        active: row.get(3)?,
        alarm_ids: Vec::new(),
        created_at: parse_datetime_fallback(&created_at),
        updated_at: parse_datetime_fallback(&updated_at),
    })
}

fn row_to_history(row: &rusqlite::Row) -> std::result::Result<HistoryEntry, rusqlite::Error> {
    let taken_at: String = row.get(3)?;
    Ok(HistoryEntry {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        medication_name: row.get(2)?,
        taken_at: parse_datetime_fallback(&taken_at),
        alarm_id: row.get(4)?,
        on_time: row.get(5)?,
    })
}

/// Upsert rather than `INSERT OR REPLACE`, which would delete the row and
/// cascade to its alarms.
fn upsert_medication_row(conn: &Connection, medication: &Medication) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO medications (id, name, pill_count, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            pill_count = excluded.pill_count,
            active = excluded.active,
            updated_at = excluded.updated_at",
        params![
            medication.id,
            medication.name,
            medication.pill_count,
            medication.active,
            medication.created_at.to_rfc3339(),
            medication.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn insert_history_row(conn: &Connection, entry: &HistoryEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO history (id, medication_id, medication_name, taken_at, alarm_id, on_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id,
            entry.medication_id,
            entry.medication_name,
            entry.taken_at.to_rfc3339(),
            entry.alarm_id,
            entry.on_time,
        ],
    )?;
    Ok(())
}

/// Which data domains [`MedicationDb::reset_selected_data`] clears.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataResetOptions {
    pub history: bool,
    pub alarms: bool,
    /// Deleting medications also deletes their alarms.
    pub medications: bool,
}

impl DataResetOptions {
    /// History and alarms; medications and pill counts are kept.
    pub fn history_and_alarms() -> Self {
        Self {
            history: true,
            alarms: true,
            medications: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DataResetSummary {
    pub deleted_history: usize,
    pub deleted_alarms: usize,
    pub deleted_medications: usize,
}

/// SQLite database for medication storage.
pub struct MedicationDb {
    conn: Mutex<Connection>,
}

impl MedicationDb {
    /// Open the database at `<data_dir>/medalarm.db`.
    ///
    /// Creates the file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("medalarm.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Database(DatabaseError::Poisoned))
    }

    // === Medications ===

    /// All medications, oldest first, with their alarm ids in order.
    pub fn list_medications(&self) -> Result<Vec<Medication>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, pill_count, active, created_at, updated_at
             FROM medications ORDER BY created_at, id",
        )?;
        let mut meds = stmt
            .query_map([], row_to_medication)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut alarm_stmt = conn.prepare(
            "SELECT medication_id, id FROM alarms ORDER BY position, created_at, id",
        )?;
        let links = alarm_stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (medication_id, alarm_id) in links {
            if let Some(med) = meds.iter_mut().find(|m| m.id == medication_id) {
                med.alarm_ids.push(alarm_id);
            }
        }
        Ok(meds)
    }

    pub fn get_medication(&self, id: &str) -> Result<Option<Medication>> {
        Ok(self.list_medications()?.into_iter().find(|m| m.id == id))
    }

    /// Insert or update a medication.
    pub fn upsert_medication(&self, medication: &Medication) -> Result<()> {
        upsert_medication_row(&*self.conn()?, medication)?;
        Ok(())
    }

    /// Delete a medication; its alarms go with it.
    pub fn delete_medication(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM medications WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // === Alarms ===

    pub fn list_alarms(&self) -> Result<Vec<Alarm>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALARM_COLUMNS} FROM alarms ORDER BY medication_id, position, created_at, id"
        ))?;
        let alarms = stmt
            .query_map([], row_to_alarm)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(alarms)
    }

    pub fn alarms_for(&self, medication_id: &str) -> Result<Vec<Alarm>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALARM_COLUMNS} FROM alarms WHERE medication_id = ?1 ORDER BY position, created_at, id"
        ))?;
        let alarms = stmt
            .query_map(params![medication_id], row_to_alarm)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(alarms)
    }

    pub fn get_alarm(&self, id: &str) -> Result<Option<Alarm>> {
        let conn = self.conn()?;
        let alarm = conn
            .query_row(
                &format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE id = ?1"),
                params![id],
                row_to_alarm,
            )
            .optional()?;
        Ok(alarm)
    }

    /// Insert or update an alarm. New alarms go after the medication's
    /// existing ones.
    pub fn upsert_alarm(&self, alarm: &Alarm) -> Result<()> {
        let days = serde_json::to_string(&alarm.days)?;
        let light_ids = serde_json::to_string(&alarm.light_ids)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO alarms (
                id, medication_id, medication_name, time, days, enabled,
                light_color, light_ids, position, created_at
             ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM alarms WHERE medication_id = ?2),
                ?9
             )
             ON CONFLICT(id) DO UPDATE SET
                medication_id = excluded.medication_id,
                medication_name = excluded.medication_name,
                time = excluded.time,
                days = excluded.days,
                enabled = excluded.enabled,
                light_color = excluded.light_color,
                light_ids = excluded.light_ids",
            params![
                alarm.id,
                alarm.medication_id,
                alarm.medication_name,
                alarm.time,
                days,
                alarm.enabled,
                alarm.light_color,
                light_ids,
                alarm.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn delete_alarm(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM alarms WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // === History ===

    /// All history entries, oldest first.
    pub fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, medication_id, medication_name, taken_at, alarm_id, on_time
             FROM history ORDER BY taken_at, id",
        )?;
        let entries = stmt
            .query_map([], row_to_history)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        insert_history_row(&*self.conn()?, entry)?;
        Ok(())
    }

    /// Persist a taken dose in a single transaction.
    pub fn record_dose(&self, medication: &Medication, entry: &HistoryEntry) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        upsert_medication_row(&tx, medication)?;
        insert_history_row(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete_history_entry(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM history WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // === Reset ===

    /// Clear the selected data domains in a single transaction.
    ///
    /// Returns how many rows each selected domain held.
    pub fn reset_selected_data(&self, options: DataResetOptions) -> Result<DataResetSummary> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let count = |table: &str| -> std::result::Result<usize, rusqlite::Error> {
            tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as usize)
        };

        let deleted_history = if options.history { count("history")? } else { 0 };
        let deleted_alarms = if options.alarms || options.medications {
            count("alarms")?
        } else {
            0
        };
        let deleted_medications = if options.medications {
            count("medications")?
        } else {
            0
        };

        if options.history {
            tx.execute("DELETE FROM history", [])?;
        }
        if options.alarms {
            tx.execute("DELETE FROM alarms", [])?;
        }
        if options.medications {
            tx.execute("DELETE FROM medications", [])?;
        }
        tx.commit()?;

        Ok(DataResetSummary {
            deleted_history,
            deleted_alarms,
            deleted_medications,
        })
    }
}

#[async_trait]
impl MedicationStore for MedicationDb {
    async fn load_medications(&self) -> Result<Vec<Medication>> {
        self.list_medications()
    }

    async fn load_alarms(&self) -> Result<Vec<Alarm>> {
        self.list_alarms()
    }

    async fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        self.list_history()
    }

    async fn save_medication(&self, medication: &Medication) -> Result<()> {
        self.upsert_medication(medication)
    }

    async fn delete_medication(&self, id: &str) -> Result<bool> {
        MedicationDb::delete_medication(self, id)
    }

    async fn save_alarm(&self, alarm: &Alarm) -> Result<()> {
        self.upsert_alarm(alarm)
    }

    async fn delete_alarm(&self, id: &str) -> Result<bool> {
        MedicationDb::delete_alarm(self, id)
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        MedicationDb::append_history(self, entry)
    }

    async fn record_dose(&self, medication: &Medication, entry: &HistoryEntry) -> Result<()> {
        MedicationDb::record_dose(self, medication, entry)
    }

    async fn delete_history_entry(&self, id: &str) -> Result<bool> {
        MedicationDb::delete_history_entry(self, id)
    }

    async fn clear_history(&self) -> Result<usize> {
        Ok(self
            .reset_selected_data(DataResetOptions {
                history: true,
                ..DataResetOptions::default()
            })?
            .deleted_history)
    }

    async fn clear_alarms(&self) -> Result<usize> {
        Ok(self
            .reset_selected_data(DataResetOptions {
                alarms: true,
                ..DataResetOptions::default()
            })?
            .deleted_alarms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::medication::ON_TIME_WINDOW_MINUTES;

    fn seeded() -> (MedicationDb, Medication) {
        let db = MedicationDb::open_memory().unwrap();
        let med = Medication::new("Aspirin", 20);
        db.upsert_medication(&med).unwrap();
        (db, med)
    }

    #[test]
    fn medication_round_trip() {
        let (db, med) = seeded();
        let loaded = db.get_medication(&med.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Aspirin");
        assert_eq!(loaded.pill_count, 20);
        assert!(loaded.active);
    }

    #[test]
    fn alarm_round_trip_keeps_days_and_lights() {
        let (db, med) = seeded();
        let mut alarm = Alarm::new(&med, "08:15", vec![1, 3, 5]);
        alarm.light_color = Some("#ff0000".to_string());
        alarm.light_ids = vec!["lamp-1".to_string(), "lamp-2".to_string()];
        db.upsert_alarm(&alarm).unwrap();

        let loaded = db.get_alarm(&alarm.id).unwrap().unwrap();
        assert_eq!(loaded.days, vec![1, 3, 5]);
        assert_eq!(loaded.light_color.as_deref(), Some("#ff0000"));
        assert_eq!(loaded.light_ids, alarm.light_ids);
    }

    #[test]
    fn alarm_ids_follow_insertion_order() {
        let (db, med) = seeded();
        let first = Alarm::new(&med, "08:00", vec![1]);
        let second = Alarm::new(&med, "20:00", vec![1]);
        db.upsert_alarm(&first).unwrap();
        db.upsert_alarm(&second).unwrap();
        // Updating the first alarm must not move it to the end.
        let mut edited = first.clone();
        edited.time = "07:45".to_string();
        db.upsert_alarm(&edited).unwrap();

        let loaded = db.get_medication(&med.id).unwrap().unwrap();
        assert_eq!(loaded.alarm_ids, vec![first.id.clone(), second.id.clone()]);
        assert_eq!(db.get_alarm(&first.id).unwrap().unwrap().time, "07:45");
    }

    #[test]
    fn updating_medication_keeps_alarms() {
        let (db, mut med) = seeded();
        db.upsert_alarm(&Alarm::new(&med, "08:00", vec![1])).unwrap();
        med.name = "Aspirin 100mg".to_string();
        db.upsert_medication(&med).unwrap();
        assert_eq!(db.list_alarms().unwrap().len(), 1);
    }

    #[test]
    fn deleting_medication_cascades_to_alarms() {
        let (db, med) = seeded();
        db.upsert_alarm(&Alarm::new(&med, "08:00", vec![1])).unwrap();
        assert!(db.delete_medication(&med.id).unwrap());
        assert!(db.list_alarms().unwrap().is_empty());
        assert!(!db.delete_medication(&med.id).unwrap());
    }

    #[test]
    fn alarm_for_unknown_medication_is_rejected() {
        let db = MedicationDb::open_memory().unwrap();
        let ghost = Medication::new("Ghost", 1);
        assert!(db.upsert_alarm(&Alarm::new(&ghost, "08:00", vec![1])).is_err());
    }

    #[test]
    fn history_append_and_delete() {
        let (db, med) = seeded();
        let entry = HistoryEntry::record(&med, None, Utc::now(), ON_TIME_WINDOW_MINUTES);
        db.append_history(&entry).unwrap();
        let loaded = db.list_history().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].on_time, None);

        assert!(db.delete_history_entry(&entry.id).unwrap());
        assert!(db.list_history().unwrap().is_empty());
    }

    #[test]
    fn reset_selected_data_clears_only_selected_domains() {
        let (db, med) = seeded();
        db.upsert_alarm(&Alarm::new(&med, "08:00", vec![1])).unwrap();
        db.append_history(&HistoryEntry::record(&med, None, Utc::now(), ON_TIME_WINDOW_MINUTES))
            .unwrap();

        let summary = db
            .reset_selected_data(DataResetOptions::history_and_alarms())
            .unwrap();
        assert_eq!(
            summary,
            DataResetSummary {
                deleted_history: 1,
                deleted_alarms: 1,
                deleted_medications: 0,
            }
        );
        assert_eq!(db.list_medications().unwrap().len(), 1);
        assert!(db.list_alarms().unwrap().is_empty());
        assert!(db.list_history().unwrap().is_empty());
    }

    #[test]
    fn open_at_persists_to_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("medalarm.db");
        {
            let db = MedicationDb::open_at(&path).unwrap();
            db.upsert_medication(&Medication::new("Aspirin", 3)).unwrap();
        }
        let db = MedicationDb::open_at(&path).unwrap();
        assert_eq!(db.list_medications().unwrap().len(), 1);
    }

    #[test]
    fn record_dose_rolls_back_when_history_insert_fails() {
        let (db, mut med) = seeded();
        let entry = HistoryEntry::record(&med, None, Utc::now(), ON_TIME_WINDOW_MINUTES);
        db.append_history(&entry).unwrap();

        // Same entry id again: the insert violates the primary key.
        assert!(med.take_pill());
        assert!(db.record_dose(&med, &entry).is_err());

        assert_eq!(db.get_medication(&med.id).unwrap().unwrap().pill_count, 20);
        assert_eq!(db.list_history().unwrap().len(), 1);
    }

    #[test]
    fn record_dose_stores_count_and_entry_together() {
        let (db, mut med) = seeded();
        assert!(med.take_pill());
        let entry = HistoryEntry::record(&med, None, Utc::now(), ON_TIME_WINDOW_MINUTES);
        db.record_dose(&med, &entry).unwrap();

        assert_eq!(db.get_medication(&med.id).unwrap().unwrap().pill_count, 19);
        let history = db.list_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, entry.id);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn corrupt_days_column_is_read_as_empty_and_logged() {
        let (db, med) = seeded();
        let alarm = Alarm::new(&med, "08:00", vec![1, 2]);
        db.upsert_alarm(&alarm).unwrap();
        db.conn()
            .unwrap()
            .execute("UPDATE alarms SET days = 'not json' WHERE id = ?1", params![alarm.id])
            .unwrap();

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        let alarms = tracing::subscriber::with_default(subscriber, || db.list_alarms().unwrap());

        assert!(alarms[0].days.is_empty());
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("corrupt alarm column"));
        assert!(output.contains(&alarm.id));
    }
}
