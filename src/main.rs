//! Hostpath Scheduler Extender
//!
//! Process entry point: parses flags, starts the cluster cache, wires the
//! hostpath plugins and serves the extender callbacks and metrics.

use clap::Parser;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hostpath_scheduler_extender::domain::ClusterCacheRef;
use hostpath_scheduler_extender::{
    AnnotationDiskProvider, AnnotationVolumeReader, Error, Extender, ExtenderConfig,
    ExtenderMetrics, ExtenderServer, KubeCache, PluginContext, Result, SnapshotCache,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Hostpath Scheduler Extender - hostpath PV aware pod placement
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Extender API bind address
    #[arg(long, env = "ADDRESS", default_value = "0.0.0.0:8000")]
    address: String,

    /// Metrics server bind address
    #[arg(long, env = "METRIC_ADDRESS", default_value = "0.0.0.0:8001")]
    metric_address: String,

    /// Path prefix of the plugin endpoints
    #[arg(long, env = "API_PREFIX", default_value = "scheduler")]
    api_prefix: String,

    /// Kubeconfig file; in-cluster or default config when unset
    #[arg(long, env = "KUBECONFIG_PATH")]
    kubeconfig: Option<PathBuf>,

    /// Run without Kubernetes against a cluster snapshot file
    #[arg(long, env = "STANDALONE_SNAPSHOT")]
    standalone: Option<PathBuf>,

    /// Seconds to wait for the cluster cache to sync
    #[arg(long, env = "SYNC_TIMEOUT", default_value = "300")]
    sync_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting Hostpath Scheduler Extender");
    info!("  Version: {}", hostpath_scheduler_extender::VERSION);
    info!("  Extender API: {}", args.address);
    info!("  Metrics: {}", args.metric_address);
    info!("  Standalone mode: {}", args.standalone.is_some());

    let cache: ClusterCacheRef = match &args.standalone {
        Some(path) => Arc::new(SnapshotCache::from_path(path)?),
        None => KubeCache::start(kube_client(&args).await?),
    };
    let ctx = PluginContext::new(
        cache,
        Arc::new(AnnotationVolumeReader::new()),
        Arc::new(AnnotationDiskProvider::new()),
    );

    let mut extender = Extender::with_default_plugins()?;
    extender.init(&ctx).await?;
    wait_for_sync(&extender, Duration::from_secs(args.sync_timeout_secs)).await?;
    let extender = Arc::new(extender);

    // Start metrics server
    let metric_address = parse_addr(&args.metric_address, "metrics")?;
    let metrics = extender.metrics().clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(metric_address, metrics).await {
            error!("Metrics server error: {}", e);
        }
    });

    let config = ExtenderConfig {
        addr: parse_addr(&args.address, "extender")?,
        api_prefix: args.api_prefix.clone(),
    };
    let server = Arc::new(ExtenderServer::new(config, extender));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_server.shutdown();
        }
    });

    server.run().await?;

    info!("Extender shutdown complete");
    Ok(())
}

fn parse_addr(addr: &str, what: &str) -> Result<SocketAddr> {
    addr.parse()
        .map_err(|e| Error::Configuration(format!("Invalid {} address {}: {}", what, addr, e)))
}

// =============================================================================
// Kubernetes Client
// =============================================================================

async fn kube_client(args: &Args) -> Result<kube::Client> {
    use kube::config::{KubeConfigOptions, Kubeconfig};

    let config = match &args.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::Configuration(format!("Cannot read kubeconfig {}: {}", path.display(), e))
            })?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::Configuration(format!("Invalid kubeconfig: {}", e)))?
        }
        None => kube::Config::infer()
            .await
            .map_err(|e| Error::Configuration(format!("Cannot infer kube config: {}", e)))?,
    };

    Ok(kube::Client::try_from(config)?)
}

/// Block until every plugin reports its caches synced
async fn wait_for_sync(extender: &Extender, timeout: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    let synced = async {
        loop {
            ticker.tick().await;
            if extender.ready() {
                break;
            }
        }
    };

    tokio::time::timeout(timeout, synced).await.map_err(|_| {
        Error::Internal(format!(
            "Cluster cache did not sync within {}s",
            timeout.as_secs()
        ))
    })?;

    info!("Cluster cache synced");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},hyper=warn,kube=info,tower=warn,tower_http=info",
            level
        ))
    });

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: SocketAddr, metrics: ExtenderMetrics) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server};

    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let response = metrics_response(&metrics, req.uri().path());
                async move { Ok::<_, Infallible>(response) }
            }))
        }
    });

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}

fn metrics_response(metrics: &ExtenderMetrics, path: &str) -> hyper::Response<hyper::Body> {
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::{Body, Response, StatusCode};

    let mut response = Response::new(Body::empty());
    match path {
        "/metrics" => match metrics.encode() {
            Ok((content_type, buffer)) => {
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    response.headers_mut().insert(CONTENT_TYPE, value);
                }
                *response.body_mut() = Body::from(buffer);
            }
            Err(e) => {
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                *response.body_mut() = Body::from(e.to_string());
            }
        },
        _ => {
            *response.status_mut() = StatusCode::NOT_FOUND;
            *response.body_mut() = Body::from("not found");
        }
    }
    response
}
