use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{bout_store::BoutStore, storage::StorageError},
    services::persistence_service,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
///
/// The first successful connection also restores the most recently saved bout.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn BoutStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;
    let mut recovered = false;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_bout_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                if !recovered {
                    match persistence_service::recover_latest(&state).await {
                        Ok(_) => recovered = true,
                        Err(err) => warn!(error = %err, "failed to recover the latest bout"),
                    }
                }

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded() {
                                info!("storage healthy again; leaving degraded mode");
                                state.update_degraded(false);
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(_) => {
                            let mut attempt = 0;
                            let mut reconnect_delay = INITIAL_DELAY;
                            let mut reconnected = false;

                            while attempt < MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!(
                                            "storage reconnection succeeded after health check failure"
                                        );
                                        reconnected = true;
                                        break;
                                    }
                                    Err(reconnect_err) => {
                                        if attempt == 0 {
                                            warn!(
                                                attempt, error = %reconnect_err,
                                                "storage reconnect first attempt failed; entering in degraded mode"
                                            );
                                            state.update_degraded(true);
                                        } else {
                                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                                        };
                                        attempt += 1;
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                                    }
                                }
                            }

                            if reconnected {
                                state.update_degraded(false);
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            } else {
                                warn!(
                                    "exhausted storage reconnect attempts; staying in degraded mode"
                                );
                                state.clear_bout_store().await;
                                break;
                            }
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

#[cfg(all(test, feature = "file-store"))]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::bout_store::file::{FileBoutStore, FileStoreConfig},
        state::{AppState, roster::RosterBook},
    };

    #[tokio::test(start_paused = true)]
    async fn connects_after_failures_and_leaves_degraded_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let state = AppState::new(AppConfig::default(), RosterBook::new());
        let mut attempts = 0;

        let supervisor = tokio::spawn(run(state.clone(), move || {
            attempts += 1;
            let fail = attempts < 3;
            let path = path.clone();
            async move {
                if fail {
                    return Err(StorageError::unavailable(
                        "backend not ready".into(),
                        std::io::Error::other("connection refused"),
                    ));
                }
                let store = FileBoutStore::open(FileStoreConfig::new(path)).await?;
                Ok(Arc::new(store) as Arc<dyn BoutStore>)
            }
        }));

        let mut degraded = state.degraded_watcher();
        assert!(*degraded.borrow());
        degraded.wait_for(|value| !*value).await.unwrap();
        assert!(state.bout_store().await.is_some());

        supervisor.abort();
    }
}
