//! sentimo
//!
//! Trains TF-IDF + random forest sentiment classifiers, records every run
//! in a filesystem registry, promotes the best one and serves it over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod cli;

use cli::{Cli, Commands};
use sentimo_registry::{PromotionOutcome, RunRegistry};
use sentimo_server::{create_router, AppConfig, AppState, PredictionService, TrainingPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = AppConfig::load(&cli.config)?.with_overrides(cli.registry, cli.experiment)?;
    let experiment = config.pipeline.registry.experiment.clone();
    let registry = Arc::new(
        RunRegistry::open(&config.pipeline.registry.root).with_context(|| {
            format!(
                "failed to open registry at {}",
                config.pipeline.registry.root.display()
            )
        })?,
    );

    match cli.command {
        Commands::Train { corpus, promote } => {
            let pipeline = TrainingPipeline::new(config.pipeline, registry);
            let outcome = pipeline.run(&corpus, promote)?;
            println!("run_id:     {}", outcome.run_id);
            println!("accuracy:   {:.4}", outcome.metrics.accuracy);
            println!("precision:  {:.4}", outcome.metrics.precision);
            println!("recall:     {:.4}", outcome.metrics.recall);
            println!("f1:         {:.4}", outcome.metrics.f1);
            if let Some((best, result)) = outcome.promoted {
                print_promotion(&best.run_id, result);
            }
        }

        Commands::Promote { run_id } => {
            let (run_id, result) = match run_id {
                Some(run_id) => {
                    let run = registry
                        .get_run(&experiment, &run_id)?
                        .with_context(|| format!("no run '{run_id}' in experiment '{experiment}'"))?;
                    let result = registry.promote(&run)?;
                    (run.run_id, result)
                }
                None => {
                    let (best, result) = registry.promote_best(&experiment)?;
                    (best.run_id, result)
                }
            };
            print_promotion(&run_id, result);
        }

        Commands::Runs { history } => {
            if history {
                for record in registry.promotion_history()? {
                    println!(
                        "{}  {}  {:.4}  {}",
                        record.promoted_at.to_rfc3339(),
                        record.run_id,
                        record.accuracy,
                        record.experiment
                    );
                }
                if !registry.verify_history()? {
                    warn!("Promotion history failed hash chain verification");
                }
            } else {
                let current = registry.current()?.map(|pair| pair.run_id);
                for run in registry.list_runs(&experiment)? {
                    let marker = if current.as_deref() == Some(run.run_id.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {}  {:.4}  {}",
                        marker,
                        run.run_id,
                        run.accuracy(),
                        run.timestamp.to_rfc3339()
                    );
                }
            }
        }

        Commands::Serve { listen, port } => {
            let mut server = config.server;
            if let Some(listen) = listen {
                server.listen = listen;
            }
            if let Some(port) = port {
                server.port = port;
            }

            let metrics_handle = init_metrics()?;
            let service = Arc::new(PredictionService::start(registry));
            let state = AppState::new(service).with_metrics(metrics_handle);
            let app = create_router(state, server.request_timeout());

            let addr: SocketAddr = format!("{}:{}", server.listen, server.port).parse()?;
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Serving predictions on http://{}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_signal().await;
                    warn!("Shutdown signal received, stopping server...");
                })
                .await?;

            info!("Server shutdown complete");
        }
    }

    Ok(())
}

fn print_promotion(run_id: &str, result: PromotionOutcome) {
    match result {
        PromotionOutcome::Promoted => println!("promoted:   {run_id}"),
        PromotionOutcome::AlreadyCurrent => println!("unchanged:  {run_id} is already promoted"),
    }
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("sentimo=debug,sentimo_core=debug,sentimo_model=debug,sentimo_registry=debug,sentimo_server=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("sentimo=info,sentimo_core=info,sentimo_model=info,sentimo_registry=info,sentimo_server=info")
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "sentimo_predictions_total",
        "Total number of predictions by sentiment"
    );
    metrics::describe_counter!(
        "sentimo_prediction_errors_total",
        "Total number of failed predictions by reason"
    );
    metrics::describe_histogram!(
        "sentimo_predict_latency_us",
        metrics::Unit::Microseconds,
        "Prediction latency in microseconds"
    );
    metrics::describe_counter!(
        "sentimo_reloads_total",
        "Total number of model reloads by outcome"
    );
    metrics::describe_counter!(
        "sentimo_runs_recorded_total",
        "Total number of training runs recorded"
    );
    metrics::describe_counter!(
        "sentimo_history_append_failures_total",
        "Promotions whose history record could not be written"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
