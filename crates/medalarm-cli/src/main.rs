use clap::{Parser, Subcommand};
use medalarm_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "medalarm", version, about = "Medication reminder CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Medication management
    Med {
        #[command(subcommand)]
        action: commands::med::MedAction,
    },
    /// Alarm management
    Alarm {
        #[command(subcommand)]
        action: commands::alarm::AlarmAction,
    },
    /// Dose history
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Adherence statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Reminder triggers and upcoming doses
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Clear history and alarms
    Reset(commands::reset::ResetArgs),
    /// Run the reminder loop in the foreground
    Daemon(commands::daemon::DaemonArgs),
}

/// Logs go to stderr so stdout carries only JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Config::load_or_default().logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Med { action } => commands::med::run(action).await,
        Commands::Alarm { action } => commands::alarm::run(action).await,
        Commands::History { action } => commands::history::run(action).await,
        Commands::Stats { action } => commands::stats::run(action).await,
        Commands::Schedule { action } => commands::schedule::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Reset(args) => commands::reset::run(args).await,
        Commands::Daemon(args) => commands::daemon::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
