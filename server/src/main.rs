mod cli;
mod error;
mod routes;
mod state;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use smeta::db::default_database_path;
use smeta::{
    load_config, Config, Database, FileStorage, Intake, MessagesClient, Pipeline, PipelineConfig,
    RequestStore, ScratchSpace, SmetaError, WorkerPool,
};

use crate::cli::{Cli, Command};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Smeta(#[from] SmetaError),
    #[error("No database path configured and no platform data directory available")]
    NoDatabasePath,
    #[error("Failed to bind {bind}: {source}")]
    Bind {
        bind: String,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = cli::init_tracing(&cli) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let outcome = match cli.command {
        Some(Command::SeedCatalogs { force }) => seed_catalogs(&cli, force),
        None => run(&cli),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn seed_catalogs(cli: &Cli, force: bool) -> Result<(), StartupError> {
    let config = load_config(&cli.config).map_err(SmetaError::from)?;
    let report = smeta::seed_sample_catalogs(&config.catalogs, force).map_err(SmetaError::from)?;
    for path in &report.written {
        info!("Wrote {}", path.display());
    }
    for path in &report.kept {
        info!("Kept existing {} (use --force to replace)", path.display());
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), StartupError> {
    info!("Starting smeta-server v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli.config).map_err(SmetaError::from)?;
    info!("Loaded configuration from {}", cli.config.display());

    let database_path = config
        .storage
        .database_path()
        .or_else(default_database_path)
        .ok_or(StartupError::NoDatabasePath)?;
    let database = Database::open(&database_path).map_err(SmetaError::from)?;

    let store = RequestStore::new(database).with_transcript_limit(config.pipeline.transcript_limit);

    // Nothing from a previous process can still be running.
    let report = store.reconcile_interrupted().map_err(SmetaError::from)?;
    if report.interrupted > 0 || report.abandoned > 0 {
        warn!(
            interrupted = report.interrupted,
            abandoned = report.abandoned,
            "Closed requests left open by the previous run"
        );
    }

    // The blocking HTTP client must be built outside the async runtime.
    let client = MessagesClient::from_config(&config.generation)?;
    info!(model = client.model(), "Generation client ready");

    let pipeline = Arc::new(Pipeline::from_config(
        Arc::new(PipelineConfig::from_config(&config)),
        Arc::new(client),
        store.clone(),
    ));
    let pool = WorkerPool::new(pipeline, config.pipeline.worker_count).map_err(SmetaError::from)?;

    let state = AppState {
        intake: Intake::new(
            store.clone(),
            ScratchSpace::new(&config.storage.scratch_directory),
            pool.queue(),
        ),
        store,
        results: FileStorage::new(&config.storage.results_directory),
        history_limit: config.server.history_limit,
    };

    // Ends once every worker has stopped and dropped its result sender.
    let results = pool.results();
    let drain = std::thread::Builder::new()
        .name("smeta-results".to_string())
        .spawn(move || {
            for result in results.iter() {
                log_result(&result);
            }
        })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(serve(&config, state));
    drop(runtime);

    pool.shutdown();
    pool.wait();
    if drain.join().is_err() {
        error!("Result drain thread panicked");
    }
    info!("smeta-server stopped");

    served
}

async fn serve(config: &Config, state: AppState) -> Result<(), StartupError> {
    let app = routes::router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .map_err(|source| StartupError::Bind {
            bind: config.server.bind.clone(),
            source,
        })?;
    info!("Listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn log_result(result: &smeta::JobResult) {
    if let Some(record_error) = &result.record_error {
        error!(
            request_id = %result.request_id,
            error = record_error.as_str(),
            "Request outcome could not be recorded"
        );
    }
    if result.skipped {
        warn!(request_id = %result.request_id, "Request was not pending, run skipped");
    } else if result.success {
        info!(
            request_id = %result.request_id,
            artifacts = result.artifacts.len(),
            "Request completed"
        );
    } else {
        warn!(
            request_id = %result.request_id,
            error = result.error.as_deref().unwrap_or(""),
            "Request failed"
        );
    }
}
