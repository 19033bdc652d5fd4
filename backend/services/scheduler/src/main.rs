use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pulse_common::error::PulseResult;
use pulse_config::{init_tracing, AppConfig, ProgressSettings};
use pulse_db::activity::pg_repository::PgActivityRepository;
use pulse_db::progress::pg_repository::PgProgressRepository;
use pulse_progress::scheduler::Scheduler;
use pulse_progress::service::ProgressService;

#[derive(Parser)]
#[command(name = "pulse-scheduler")]
#[command(about = "Recurring team progress recompute and insight cleanup", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run the recurring jobs until interrupted (default)
    Run,
    /// Process every team for the current week and exit
    Once,
    /// Delete resolved insights past the retention window and exit
    Cleanup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command.unwrap_or(Commands::Run)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "scheduler exited with error");
            eprintln!("pulse-scheduler: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> PulseResult<()> {
    let config = AppConfig::from_env()?;
    let settings = ProgressSettings::from_env()?;
    init_tracing(&config.log_level);
    tracing::info!(service = "pulse-scheduler", ?command, "starting");

    let pool = pulse_db::create_pool(&config.database_url).await?;
    pulse_db::run_migrations(&pool).await?;

    let service = Arc::new(ProgressService::new(
        PgActivityRepository::new(pool.clone()),
        PgProgressRepository::new(pool),
        settings.week_start,
    ));

    match command {
        Commands::Once => {
            let outcome = service.process_all_teams().await?;
            println!("processed {}/{} teams", outcome.processed, outcome.total);
        }
        Commands::Cleanup => {
            let removed = service
                .cleanup_resolved_insights(settings.insight_retention_days)
                .await?;
            println!("removed {removed} resolved insights");
        }
        Commands::Run => {
            let scheduler = Scheduler::new(Scheduler::standard_jobs(service, &settings));
            scheduler.start_all();
            for job in scheduler.status() {
                tracing::info!(job = %job.name, cadence = %job.cadence, "scheduled");
            }

            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
            scheduler.shutdown().await;
        }
    }

    Ok(())
}
