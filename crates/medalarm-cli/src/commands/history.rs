use clap::Subcommand;
use serde_json::json;

use super::{open_service, print_json};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List taken doses, newest first
    List {
        #[arg(long)]
        medication: Option<String>,
        /// Maximum number of entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete one history entry
    Delete { id: String },
}

pub async fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let svc = open_service()?;

    match action {
        HistoryAction::List { medication, limit } => {
            let mut entries: Vec<_> = svc
                .history()
                .await?
                .into_iter()
                .filter(|e| medication.as_deref().map_or(true, |m| e.medication_id == m))
                .collect();
            entries.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));
            if let Some(limit) = limit {
                entries.truncate(limit);
            }
            print_json(&entries)?;
        }
        HistoryAction::Delete { id } => {
            if !svc.delete_history_entry(&id).await? {
                return Err(format!("history entry not found: {id}").into());
            }
            print_json(&json!({ "deleted": id }))?;
        }
    }
    Ok(())
}
