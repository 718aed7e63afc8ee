use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use portal::config::{AppConfig, DataSource};
use portal::source::rest::RestSource;
use portal::source::snapshot::SnapshotSource;
use portal::source::ListSource;
use portal::web::{self, AppState};

async fn open_source(config: &AppConfig) -> Result<Arc<dyn ListSource>, String> {
    match &config.data_source {
        DataSource::Rest { base_url } => {
            info!(%base_url, "using REST source");
            let source = RestSource::new(base_url.clone()).map_err(|e| e.to_string())?;
            Ok(Arc::new(source))
        }
        DataSource::Snapshot { path } => {
            info!(%path, "using snapshot source");
            let source = SnapshotSource::load(path)
                .await
                .map_err(|e| format!("cannot load snapshot {path}: {e}"))?;
            Ok(Arc::new(source))
        }
    }
}

async fn bind(host: &str, port: u16) -> Result<TcpListener, String> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| format!("invalid listen address {host}:{port}: {e}"))?;

    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            let fallback_port = port.checked_add(1).ok_or("no fallback port available")?;
            warn!(%addr, error = %e, fallback_port, "bind failed, trying fallback port");
            let fallback: SocketAddr = format!("{host}:{fallback_port}")
                .parse()
                .map_err(|e| format!("invalid fallback address: {e}"))?;
            TcpListener::bind(fallback)
                .await
                .map_err(|e| format!("cannot bind {fallback}: {e}"))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let source = match open_source(&config).await {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "data source unavailable");
            return ExitCode::FAILURE;
        }
    };

    let listener = match bind(&config.host, config.port).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "cannot start listener");
            return ExitCode::FAILURE;
        }
    };

    if config.dev_user.is_some() {
        warn!("PORTAL_DEV_USER_ID is set, requests without a token use the dev session");
    }

    let app = web::router(AppState::new(config, source));

    match listener.local_addr() {
        Ok(addr) => info!("listening on http://{addr}, sign in at http://{addr}/login"),
        Err(e) => warn!(error = %e, "listener address unavailable"),
    }

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
