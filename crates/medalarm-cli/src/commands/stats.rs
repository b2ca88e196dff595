use clap::Subcommand;

use super::{open_service, print_json};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Adherence for one medication
    Show { medication: String },
    /// Adherence for every medication
    All,
}

pub async fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let svc = open_service()?;

    match action {
        StatsAction::Show { medication } => {
            print_json(&svc.stats_for(&medication).await)?;
        }
        StatsAction::All => {
            print_json(&svc.dashboard().await)?;
        }
    }
    Ok(())
}
