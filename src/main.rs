//! Derby Bout Back binary entrypoint wiring REST, SSE, the clock ticker and bout storage.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use futures::{FutureExt, future::BoxFuture};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use derby_bout_back::{
    config::{AppConfig, StorageBackend},
    dao::{
        bout_store::BoutStore,
        storage::{StorageError, StorageResult},
    },
    routes,
    services::{clock_service, persistence_service, roster_service, sse_events, storage_supervisor},
    state::{AppState, SharedState},
};

/// Opens a fresh connection to the configured storage backend.
type Connector = Box<dyn FnMut() -> BoxFuture<'static, StorageResult<Arc<dyn BoutStore>>> + Send>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let rosters = roster_service::load_rosters(&config.roster_dir).await;
    let connector = storage_connector(config.storage_backend)?;
    info!(backend = %config.storage_backend, "selected storage backend");

    let app_state = AppState::new(config, rosters);

    tokio::spawn(storage_supervisor::run(app_state.clone(), connector));
    tokio::spawn(persistence_service::run(app_state.clone()));
    tokio::spawn(sse_events::run(app_state.clone()));
    clock_service::spawn(&app_state);

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    match persistence_service::flush(&app_state).await {
        Ok(()) => info!("bout saved on shutdown"),
        Err(err) => warn!(error = %err, "failed to save bout on shutdown"),
    }

    Ok(())
}

/// Build the connection factory handed to the storage supervisor.
fn storage_connector(backend: StorageBackend) -> anyhow::Result<Connector> {
    match backend {
        #[cfg(feature = "file-store")]
        StorageBackend::File => {
            use derby_bout_back::dao::bout_store::file::{FileBoutStore, FileStoreConfig};

            let config = FileStoreConfig::from_env();
            info!(dir = %config.dir.display(), "bouts are kept as JSON files");
            Ok(Box::new(move || {
                let config = config.clone();
                async move {
                    let store = FileBoutStore::open(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn BoutStore>)
                }
                .boxed()
            }))
        }
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => {
            use derby_bout_back::dao::bout_store::mongodb::{MongoBoutStore, MongoConfig};

            Ok(Box::new(|| {
                async {
                    let config = MongoConfig::from_env().await?;
                    let store = MongoBoutStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn BoutStore>)
                }
                .boxed()
            }))
        }
        #[cfg(feature = "couch-store")]
        StorageBackend::Couch => {
            use derby_bout_back::dao::bout_store::couchdb::{CouchBoutStore, CouchConfig};

            Ok(Box::new(|| {
                async {
                    let config = CouchConfig::from_env()?;
                    let store = CouchBoutStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn BoutStore>)
                }
                .boxed()
            }))
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("storage backend `{other}` is not compiled into this binary"),
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
