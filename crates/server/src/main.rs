//! vitrine server entry point.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use apalis::prelude::*;
use axum::Router;
use tokio::{signal, sync::oneshot, task::JoinHandle};
use tower_http::{
    limit::RequestBodyLimitLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitrine_common::{Config, LocalMediaStore};
use vitrine_db::Stores;
use vitrine_federation::{ApClient, FederationContext, InboxState, JobExecutor, JobQueue, router};
use vitrine_queue::{
    ApalisJobQueue, LocalJobQueue, LocalWorkerPool, QueuedJob, RetryConfig, WorkerContext,
    job_worker,
};

/// Largest activity body accepted by the inboxes.
const MAX_BODY_BYTES: usize = 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Where queued jobs go and who drains them.
enum Queue {
    Redis(ApalisJobQueue),
    Local(LocalJobQueue, tokio::sync::mpsc::UnboundedReceiver<QueuedJob>),
}

impl Queue {
    fn handle(&self) -> Arc<dyn JobQueue> {
        match self {
            Self::Redis(queue) => Arc::new(queue.clone()),
            Self::Local(queue, _) => Arc::new(queue.clone()),
        }
    }

    /// Start the workers. Sending on the returned channel stops them.
    fn start(self, executor: JobExecutor, concurrency: usize) -> (oneshot::Sender<()>, JoinHandle<()>) {
        let (stop, stopped) = oneshot::channel::<()>();
        let retry = RetryConfig::default();

        let handle = match self {
            Self::Redis(queue) => {
                let storage = queue.storage();
                let monitor = Monitor::new().register(
                    WorkerBuilder::new("vitrine-jobs")
                        .enable_tracing()
                        .concurrency(concurrency)
                        .data(WorkerContext {
                            executor,
                            queue,
                            retry,
                        })
                        .backend(storage)
                        .build_fn(job_worker),
                );
                tokio::spawn(async move {
                    let signal = async {
                        let _ = stopped.await;
                        Ok::<(), std::io::Error>(())
                    };
                    if let Err(e) = monitor.run_with_signal(signal).await {
                        error!(error = %e, "Job worker failed");
                    }
                })
            }
            Self::Local(queue, jobs) => {
                let pool = LocalWorkerPool::new(jobs, queue, executor, retry, concurrency);
                tokio::spawn(pool.run(async move {
                    let _ = stopped.await;
                }))
            }
        };
        (stop, handle)
    }
}

/// Public prefix for cached media. A path is taken relative to the server.
fn media_base_url(config: &Config) -> String {
    let base = &config.storage.base_url;
    if base.starts_with('/') {
        format!("{}{base}", config.server.url.trim_end_matches('/'))
    } else {
        base.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitrine=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting vitrine server...");

    let config = Config::load().context("failed to load configuration")?;

    let db = vitrine_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    vitrine_db::migrate(&db).await?;
    info!("Migrations completed");

    let queue = match &config.redis {
        Some(redis) => Queue::Redis(ApalisJobQueue::connect(redis).await?),
        None => {
            info!("Redis not configured, using the in-process job queue");
            let (queue, jobs) = LocalJobQueue::channel();
            Queue::Local(queue, jobs)
        }
    };

    let transport = ApClient::new(&config.federation).context("failed to build HTTP client")?;
    let media = LocalMediaStore::new(
        PathBuf::from(&config.storage.base_path),
        media_base_url(&config),
    );
    let ctx = Arc::new(FederationContext::from_config(
        &config,
        Stores::database(Arc::new(db)),
        Arc::new(transport),
        Arc::new(media),
        queue.handle(),
    )?);
    ctx.ensure_system_actor().await?;

    if !config.federation.enabled {
        info!("Federation is disabled, inboxes will answer 404");
    }

    let (stop_workers, workers) = queue.start(
        JobExecutor::new(ctx.clone()),
        config.federation.worker_concurrency.max(1),
    );
    info!("Job workers started");

    let mut app = Router::new().merge(router(InboxState::new(ctx)));
    if config.storage.base_url.starts_with('/') {
        app = app.nest_service(&config.storage.base_url, ServeDir::new(&config.storage.base_path));
    }
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT));

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server.host))?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Waiting for running jobs...");
    let _ = stop_workers.send(());
    if let Err(e) = workers.await {
        error!(error = %e, "Job worker task panicked");
    }

    info!("Server shutdown complete");
    Ok(())
}
