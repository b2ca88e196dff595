use clap::Args;
use medalarm_core::DataResetOptions;
use serde_json::json;

use super::{open_service, print_json};

#[derive(Args)]
pub struct ResetArgs {
    /// Also delete medications
    #[arg(long)]
    pub medications: bool,
}

pub async fn run(args: ResetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let svc = open_service()?;

    let options = DataResetOptions {
        medications: args.medications,
        ..DataResetOptions::history_and_alarms()
    };
    let summary = svc.store().reset_selected_data(options)?;
    let report = svc.resync().await?;
    tracing::info!(
        history = summary.deleted_history,
        alarms = summary.deleted_alarms,
        medications = summary.deleted_medications,
        "data reset"
    );
    print_json(&json!({ "reset": summary, "resync": report }))
}
