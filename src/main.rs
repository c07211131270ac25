use alarmist::{
    cmd::{
        self,
        abi::FetchAbiArgs,
        alarms::{AddAlarmArgs, ListAlarmsArgs},
        reconcile::{ReconcileArgs, WatermarksArgs},
    },
    config::AppConfig,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding `app.yaml`.
    #[arg(long, global = true, default_value = "configs")]
    config_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates or upgrades the database schema.
    Migrate,
    /// Validates and stores a new alarm.
    AddAlarm(AddAlarmArgs),
    /// Lists stored alarms as JSON.
    ListAlarms(ListAlarmsArgs),
    /// Looks up a contract ABI remotely.
    FetchAbi(FetchAbiArgs),
    /// Prints the per-address sync watermarks.
    Watermarks(WatermarksArgs),
    /// Runs one reconciliation pass over a batch file.
    Reconcile(ReconcileArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    tracing::debug!(config_dir = %cli.config_dir, "Loading application configuration...");
    let config = AppConfig::new(Some(&cli.config_dir))?;
    tracing::debug!(
        database_url = %config.database_url,
        reorg_safety_blocks = config.reorg_safety_blocks,
        "Configuration loaded."
    );

    match cli.command {
        Commands::Migrate => {
            cmd::open_repository(&config).await?;
            tracing::info!("Database migrations completed.");
        }
        Commands::AddAlarm(args) => cmd::alarms::add(config, args).await?,
        Commands::ListAlarms(args) => cmd::alarms::list(config, args).await?,
        Commands::FetchAbi(args) => cmd::abi::execute(config, args).await?,
        Commands::Watermarks(args) => cmd::reconcile::watermarks(config, args).await?,
        Commands::Reconcile(args) => cmd::reconcile::execute(config, args).await?,
    }

    Ok(())
}
