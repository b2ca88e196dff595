use clap::Subcommand;
use medalarm_core::NewAlarm;
use serde_json::json;

use super::{open_service, print_json};

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Add an alarm to a medication
    Add {
        /// Medication id
        medication: String,
        /// Time of day, HH:MM
        time: String,
        /// Weekdays, 1=Mon ... 7=Sun (e.g. "1,3,5")
        #[arg(long, value_delimiter = ',')]
        days: Vec<u8>,
        /// Light color forwarded to device control
        #[arg(long)]
        light_color: Option<String>,
        /// Light id forwarded to device control (repeatable)
        #[arg(long = "light-id")]
        light_ids: Vec<String>,
    },
    /// List alarms
    List {
        /// Only alarms of this medication
        #[arg(long)]
        medication: Option<String>,
    },
    /// Change an alarm's time or weekdays
    Edit {
        id: String,
        #[arg(long)]
        time: Option<String>,
        #[arg(long, value_delimiter = ',')]
        days: Option<Vec<u8>>,
    },
    /// Enable an alarm
    Enable { id: String },
    /// Disable an alarm
    Disable { id: String },
    /// Delete an alarm
    Delete { id: String },
}

pub async fn run(action: AlarmAction) -> Result<(), Box<dyn std::error::Error>> {
    let svc = open_service()?;

    match action {
        AlarmAction::Add {
            medication,
            time,
            days,
            light_color,
            light_ids,
        } => {
            let new = NewAlarm {
                time,
                days,
                light_color,
                light_ids,
            };
            let (alarm, report) = svc.add_alarm(&medication, new).await?;
            print_json(&json!({ "alarm": alarm, "resync": report }))?;
        }
        AlarmAction::List { medication } => {
            let alarms: Vec<_> = svc
                .alarms()
                .await?
                .into_iter()
                .filter(|a| medication.as_deref().map_or(true, |m| a.medication_id == m))
                .collect();
            print_json(&alarms)?;
        }
        AlarmAction::Edit { id, time, days } => {
            let mut alarm = svc.alarm(&id).await?;
            if let Some(time) = time {
                alarm.time = time.trim().to_string();
            }
            if let Some(days) = days {
                alarm.days = days;
            }
            let report = svc.update_alarm(&alarm).await?;
            print_json(&json!({ "alarm": alarm, "resync": report }))?;
        }
        AlarmAction::Enable { id } => {
            print_json(&svc.set_alarm_enabled(&id, true).await?)?;
        }
        AlarmAction::Disable { id } => {
            print_json(&svc.set_alarm_enabled(&id, false).await?)?;
        }
        AlarmAction::Delete { id } => {
            let report = svc.delete_alarm(&id).await?;
            print_json(&json!({ "deleted": id, "resync": report }))?;
        }
    }
    Ok(())
}
