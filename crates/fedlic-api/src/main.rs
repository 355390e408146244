//! # fedlic-server — Binary Entry Point
//!
//! Wires the trust anchor, license store, resource counting, reconcile
//! loop and HTTP server together from `FEDLIC_*` environment variables.

use std::sync::Arc;

use anyhow::Context;
use fedlic_aggregator::{
    change_channel, ClusterConnection, ClusterResourceAggregator, FileClusterRegistry,
    KubeConnector, KubeNodeLister, NodeLister, StaticNodeLister,
};
use fedlic_api::config::{LogFormat, ServerConfig};
use fedlic_api::AppState;
use fedlic_core::DeploymentRole;
use fedlic_crypto::TrustAnchor;
use fedlic_policy::LicenseVerifier;
use fedlic_reconciler::{
    CountSource, FederatedCounts, FileLicenseStore, LicenseReconciler, LicenseStore,
    LocalCounts, LocalNodeWatcher, LoopConfig, MemoryLicenseStore, ReconcileLoop, StatusCache,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("invalid server configuration")?;
    init_tracing(config.log_format);
    tracing::info!(?config, "starting fedlic server");

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("installing metrics recorder")?;

    // Without a trust anchor no license can ever verify.
    let anchor = TrustAnchor::from_file(&config.trust_cert).with_context(|| {
        format!("loading trust certificate {}", config.trust_cert.display())
    })?;
    tracing::info!(fingerprint = anchor.fingerprint(), "trust anchor loaded");

    let store: Arc<dyn LicenseStore> = match &config.store_path {
        Some(path) => Arc::new(
            FileLicenseStore::open(path)
                .with_context(|| format!("opening license store {}", path.display()))?,
        ),
        None => {
            tracing::warn!("FEDLIC_STORE_PATH not set; license objects are kept in memory only");
            Arc::new(MemoryLicenseStore::new())
        }
    };

    let local = local_lister(&config)?;
    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    let (counts, changes) = match config.role {
        DeploymentRole::Host => {
            let clusters_file = config
                .clusters_file
                .clone()
                .context("FEDLIC_CLUSTERS_FILE is required for the host role")?;
            let (tx, rx) = change_channel();
            let aggregator = Arc::new(
                ClusterResourceAggregator::new(
                    Arc::new(FileClusterRegistry::new(clusters_file)),
                    Arc::new(KubeConnector::new(config.cluster_timeout)),
                    config.aggregator(),
                )?
                .with_host(Arc::clone(&local))
                .with_change_sink(tx),
            );
            tasks.push(aggregator.spawn(cancel.clone()));
            let counts: Arc<dyn CountSource> = Arc::new(FederatedCounts::new(aggregator));
            (counts, Some(rx))
        }
        DeploymentRole::Standalone | DeploymentRole::Member => {
            let counts: Arc<dyn CountSource> =
                Arc::new(LocalCounts::new(Arc::clone(&local), config.cluster_timeout));
            (counts, None)
        }
    };

    let cache = Arc::new(StatusCache::new());
    match cache.hydrate(store.as_ref()).await {
        Ok(loaded) => tracing::info!(loaded, "status cache hydrated"),
        Err(e) => tracing::warn!(error = %e, "status cache hydration failed; starting empty"),
    }

    let reconciler = Arc::new(LicenseReconciler::new(
        config.role,
        Arc::clone(&store),
        LicenseVerifier::new(Arc::new(anchor)),
        counts,
        cache,
    ));

    let loop_config = LoopConfig {
        resync: Some(config.aggregation_period),
        ..LoopConfig::default()
    };
    let mut reconcile_loop = ReconcileLoop::new(Arc::clone(&reconciler), loop_config);
    if let Some(rx) = changes {
        reconcile_loop = reconcile_loop.with_changes(rx);
    }
    let handle = reconcile_loop.handle();
    tasks.push(reconcile_loop.spawn(cancel.clone()));

    if config.role == DeploymentRole::Standalone {
        let watcher = LocalNodeWatcher::new(
            local,
            handle.clone(),
            config.aggregation_period,
            config.cluster_timeout,
        );
        tasks.push(watcher.spawn(cancel.clone()));
    }

    let state = AppState::new(reconciler)
        .with_reconcile_handle(handle)
        .with_metrics(metrics);
    let app = fedlic_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, role = %config.role, "fedlic server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .context("HTTP server failed")?;

    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "background task ended abnormally");
        }
    }
    tracing::info!("fedlic server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Lists the nodes of the cluster this server runs in.
fn local_lister(config: &ServerConfig) -> anyhow::Result<Arc<dyn NodeLister>> {
    let Some(url) = &config.local_nodes_url else {
        tracing::warn!("FEDLIC_LOCAL_NODES_URL not set; the local cluster counts as empty");
        return Ok(Arc::new(StaticNodeLister::default()));
    };
    let mut connection = ClusterConnection::new(url.as_str());
    if let Some(token) = &config.local_token {
        connection = connection.with_token(token.as_str());
    }
    let lister = KubeNodeLister::new("local", &connection, config.cluster_timeout)
        .context("configuring the local node lister")?;
    Ok(Arc::new(lister))
}

/// Resolves on Ctrl-C or SIGTERM and cancels background work.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown requested");
    cancel.cancel();
}
