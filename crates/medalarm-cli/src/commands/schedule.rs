use chrono::Local;
use clap::Subcommand;
use medalarm_core::scheduler::upcoming;
use serde_json::json;

use super::{open_service, print_json};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Resync and show every registered trigger
    Triggers,
    /// Show the next reminders due
    Next {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

pub async fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    let svc = open_service()?;

    match action {
        ScheduleAction::Triggers => {
            let report = svc.resync().await?;
            let triggers = svc.scheduler().sink().registered();
            print_json(&json!({ "resync": report, "triggers": triggers }))?;
        }
        ScheduleAction::Next { limit } => {
            let alarms = if svc.config().reminders.enabled {
                svc.alarms().await?
            } else {
                Vec::new()
            };
            let next = upcoming(&alarms, Local::now().naive_local(), limit);
            print_json(&next)?;
        }
    }
    Ok(())
}
