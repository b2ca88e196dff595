use clap::Subcommand;
use serde_json::json;

use super::{open_service, print_json};

#[derive(Subcommand)]
pub enum MedAction {
    /// Add a medication
    Add {
        /// Medication name
        name: String,
        /// Pills on hand
        #[arg(long, default_value_t = 0)]
        pills: u32,
    },
    /// List medications
    List,
    /// Show one medication
    Show { id: String },
    /// Rename a medication
    Rename { id: String, name: String },
    /// Mark a medication active or inactive
    SetActive { id: String, active: bool },
    /// Add pills to a medication
    Refill { id: String, amount: u32 },
    /// Record a dose taken now
    Take {
        id: String,
        /// Alarm the dose answers, for the on-time flag
        #[arg(long)]
        alarm: Option<String>,
    },
    /// Delete a medication and its alarms
    Delete { id: String },
}

pub async fn run(action: MedAction) -> Result<(), Box<dyn std::error::Error>> {
    let svc = open_service()?;

    match action {
        MedAction::Add { name, pills } => {
            let medication = svc.add_medication(&name, pills).await?;
            print_json(&medication)?;
        }
        MedAction::List => {
            print_json(&svc.medications().await?)?;
        }
        MedAction::Show { id } => {
            let medication = svc.medication(&id).await?;
            let alarms: Vec<_> = svc
                .alarms()
                .await?
                .into_iter()
                .filter(|a| a.medication_id == id)
                .collect();
            print_json(&json!({ "medication": medication, "alarms": alarms }))?;
        }
        MedAction::Rename { id, name } => {
            let mut medication = svc.medication(&id).await?;
            medication.name = name.trim().to_string();
            let report = svc.update_medication(&medication).await?;
            print_json(&json!({ "medication": medication, "resync": report }))?;
        }
        MedAction::SetActive { id, active } => {
            let mut medication = svc.medication(&id).await?;
            medication.active = active;
            svc.update_medication(&medication).await?;
            print_json(&medication)?;
        }
        MedAction::Refill { id, amount } => {
            print_json(&svc.refill(&id, amount).await?)?;
        }
        MedAction::Take { id, alarm } => match svc.take_dose(&id, alarm.as_deref()).await? {
            Some(entry) => print_json(&entry)?,
            None => return Err(format!("no pills left for medication {id}").into()),
        },
        MedAction::Delete { id } => {
            let report = svc.delete_medication(&id).await?;
            print_json(&json!({ "deleted": id, "resync": report }))?;
        }
    }
    Ok(())
}
