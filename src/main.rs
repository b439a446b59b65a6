// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    runtime::{reflector, watcher, Controller, WatchStreamExt},
    Api, Client,
};
use mysql_operator::{
    cert_manager::Certificate,
    constants::{
        DEFAULT_LABELER_WORKERS, DEFAULT_MAX_REQUEUES, DEFAULT_METRICS_BIND_ADDRESS,
        DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, ERROR_REQUEUE_DURATION_SECS,
        FIELD_MANAGER, MYSQL_PORT, REQUEUE_PENDING_SECS, REQUEUE_READY_SECS, TOKIO_WORKER_THREADS,
    },
    context::{Context, RequeueSettings},
    crd::MySQLCluster,
    events::KubeEventPublisher,
    labeler::{
        credentials::{CredentialSource, EnvCredentialSource},
        patcher::KubePodLabeler,
        probe::MySqlPrimaryProbe,
        queue::WorkQueue,
        validate_config, LabelerConfig, PodEventHandler, RoleLabelController,
    },
    labels::DATABASE_KIND_LABEL,
    metrics::serve_metrics,
    reconcilers::{
        certificates::{store::KubeCertificateStore, CertificateManager},
        error_policy, reconcile_mysqlcluster,
    },
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// MySQL group replication operator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the `MySQLCluster` certificate controller
    Operator(OperatorArgs),
    /// Run the pod role label controller
    Labeler(LabelerArgs),
}

#[derive(Args, Debug)]
struct OperatorArgs {
    /// Namespace to watch (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Deadline for each Kubernetes API call, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    /// Requeue interval once all certificate secrets exist, in seconds
    #[arg(long, env = "REQUEUE_READY_SECS", default_value_t = REQUEUE_READY_SECS)]
    requeue_ready_secs: u64,

    /// Requeue interval while certificate secrets are pending, in seconds
    #[arg(long, env = "REQUEUE_PENDING_SECS", default_value_t = REQUEUE_PENDING_SECS)]
    requeue_pending_secs: u64,

    /// Listen address of the metrics server
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    metrics_bind_address: SocketAddr,
}

#[derive(Args, Debug)]
struct LabelerArgs {
    /// Namespace to watch (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Number of concurrent workers
    #[arg(long, env = "LABELER_WORKERS", default_value_t = DEFAULT_LABELER_WORKERS)]
    workers: usize,

    /// Backoff requeues allowed before a failing pod is dropped
    #[arg(long, env = "MAX_REQUEUES", default_value_t = DEFAULT_MAX_REQUEUES)]
    max_requeues: u32,

    /// Only watch this pod (sidecar mode)
    #[arg(long, env = "POD_NAME")]
    pod_name: Option<String>,

    /// MySQL port on each pod
    #[arg(long, env = "MYSQL_PORT", default_value_t = MYSQL_PORT)]
    mysql_port: u16,

    /// Deadline for each replication probe and label patch, in seconds
    #[arg(long, env = "PROBE_TIMEOUT_SECS", default_value_t = DEFAULT_PROBE_TIMEOUT_SECS)]
    probe_timeout_secs: u64,

    /// Listen address of the metrics server
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    metrics_bind_address: SocketAddr,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("mysql-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    init_tracing();

    match cli.command {
        Commands::Operator(args) => run_operator(args).await,
        Commands::Labeler(args) => run_labeler(args).await,
    }
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
    debug!("Logging initialized with file and line number tracking");
}

/// Run the `MySQLCluster` controller until a shutdown signal arrives.
async fn run_operator(args: OperatorArgs) -> Result<()> {
    info!("Starting MySQL certificate controller");

    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let certificates = Arc::new(CertificateManager::new(
        Arc::new(KubeCertificateStore::new(client.clone())),
        Arc::new(KubeEventPublisher::new(client.clone(), FIELD_MANAGER)),
        Duration::from_secs(args.request_timeout_secs),
    ));
    let ctx = Arc::new(Context {
        client: client.clone(),
        certificates,
        requeue: RequeueSettings {
            ready: Duration::from_secs(args.requeue_ready_secs),
            pending: Duration::from_secs(args.requeue_pending_secs),
            error: Duration::from_secs(ERROR_REQUEUE_DURATION_SECS),
        },
    });

    let (clusters, owned): (Api<MySQLCluster>, Api<Certificate>) = match &args.watch_namespace {
        Some(namespace) => (
            Api::namespaced(client.clone(), namespace),
            Api::namespaced(client.clone(), namespace),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    let controller = Controller::new(clusters, watcher::Config::default())
        .owns(owned, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile_mysqlcluster, error_policy, ctx)
        .for_each(|result| {
            match result {
                Ok((object, action)) => {
                    debug!(cluster = %object.name, ?action, "Reconciled MySQLCluster");
                }
                Err(e) => warn!(error = %e, "MySQLCluster controller error"),
            }
            futures::future::ready(())
        });

    tokio::select! {
        () = controller => {
            info!("Graceful shutdown completed successfully");
            Ok(())
        }
        result = serve_metrics(args.metrics_bind_address) => {
            result.context("metrics server failed")?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
    }
}

/// Run the role label controller until a shutdown signal arrives.
async fn run_labeler(args: LabelerArgs) -> Result<()> {
    info!("Starting MySQL role label controller");

    let config = LabelerConfig {
        workers: args.workers,
        max_requeues: args.max_requeues,
        request_timeout: Duration::from_secs(args.probe_timeout_secs),
    };
    validate_config(&config)?;
    let credentials = EnvCredentialSource
        .credentials()
        .context("cannot start role labeler without probe credentials")?;

    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let pods: Api<Pod> = match &args.watch_namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };
    let mut watch_config = watcher::Config::default().labels(DATABASE_KIND_LABEL);
    if let Some(pod_name) = &args.pod_name {
        info!(pod = %pod_name, "Watching a single pod");
        watch_config = watch_config.fields(&format!("metadata.name={pod_name}"));
    }

    let (cache, writer) = reflector::store::<Pod>();
    let queue = WorkQueue::default();
    let probe = Arc::new(MySqlPrimaryProbe::new(
        credentials,
        args.mysql_port,
        config.request_timeout,
    ));
    let controller = Arc::new(RoleLabelController::new(
        cache,
        queue.clone(),
        probe,
        Arc::new(KubePodLabeler::new(client)),
        config,
    ));
    let workers = tokio::spawn(controller.run());

    let mut handler = PodEventHandler::new(writer, queue.clone());
    let watch = async move {
        let mut events = watcher(pods, watch_config).default_backoff().boxed();
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => handler.handle(&event),
                Err(e) => warn!(error = %e, "Pod watch error"),
            }
        }
    };

    let outcome = tokio::select! {
        () = watch => Err(anyhow::anyhow!("pod watch ended unexpectedly")),
        result = serve_metrics(args.metrics_bind_address) => match result {
            Ok(()) => Err(anyhow::anyhow!("metrics server exited unexpectedly without error")),
            Err(e) => Err(anyhow::Error::new(e).context("metrics server failed")),
        },
        result = shutdown_signal() => result,
    };

    info!("Stopping role label workers");
    queue.shut_down();
    workers.await?;
    outcome?;

    info!("Graceful shutdown completed successfully");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating graceful shutdown...");
    }
    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
