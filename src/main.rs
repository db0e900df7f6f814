use habitcal::auth::{AuthProvider, GoTrueAuth, SessionHandle};
use habitcal::backend::HabitBackend;
use habitcal::remote::{RemoteService, RestStore};
use habitcal::{AppState, Config, Coordinator, LocalStore, router};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    if let Some(parent) = config.data_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let local = Arc::new(LocalStore::open(&config.data_path).await);
    let session = SessionHandle::default();
    let mut coordinator = Coordinator::new(local.clone(), session.clone());
    let mut auth: Option<Arc<dyn AuthProvider>> = None;

    match &config.remote {
        Some(remote) => {
            info!("remote sync enabled against {}", remote.url);
            let store = Arc::new(RestStore::new(&remote.url, &remote.api_key));
            let service: Arc<dyn HabitBackend> = Arc::new(RemoteService::new(store, session));
            coordinator = coordinator.with_remote(service);
            let provider: Arc<dyn AuthProvider> =
                Arc::new(GoTrueAuth::new(&remote.url, &remote.api_key));
            auth = Some(provider);
        }
        None => info!("remote sync not configured, running in guest mode only"),
    }

    coordinator.load().await;
    let app = router(AppState::new(coordinator, local, auth));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
