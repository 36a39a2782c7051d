use signing_service::config::Config;
use signing_service::keys::DirectoryCertificateStore;
use signing_service::routes::{self, AppState};
use signing_service::services::KeyProvisioner;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signing_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Signing Authority");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Configuration loaded successfully");

    // Provision the signing credential before accepting traffic
    let store = DirectoryCertificateStore::new(config.cert_store_root.clone());
    let provisioner = KeyProvisioner::new(std::env::current_dir()?, store);

    let credential = provisioner
        .provision(&config.signing_key)
        .await
        .map_err(|e| {
            error!("Failed to provision signing key: {}", e);
            e
        })?;

    if let Some(credential) = &credential {
        info!(key_id = credential.key_id(), "Signing key provisioned");
    }

    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(config, credential));

    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("{}", e);
        e
    })?;

    let app = routes::build_routes(state, metrics_handle);

    info!("Signing Authority listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Signing Authority shutdown complete");

    Ok(())
}

/// Returns when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, shutting down"),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, shutting down");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
}
