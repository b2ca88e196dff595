pub mod alarm;
pub mod config;
pub mod daemon;
pub mod history;
pub mod med;
pub mod reset;
pub mod schedule;
pub mod stats;

use std::sync::Arc;

use medalarm_core::{Config, InMemoryTriggerSink, MedicationDb, ReminderService};
use serde::Serialize;

pub type Service = ReminderService<MedicationDb, InMemoryTriggerSink>;

/// Build the service over the on-disk database and a fresh in-memory sink.
pub fn open_service() -> Result<Service, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = MedicationDb::open()?;
    Ok(ReminderService::new(
        Arc::new(db),
        Arc::new(InMemoryTriggerSink::new()),
        config,
    ))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
