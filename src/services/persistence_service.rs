//! Writes the live bout to the storage backend and restores it after a restart.

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::BoutEntity,
    error::ServiceError,
    state::{SharedState, game::GameState},
};

/// Save every new bout revision, and keep re-saving while a clock runs so a crash loses at
/// most one persistence interval of clock time.
pub async fn run(state: SharedState) {
    let mut changes = state.subscribe_changes();
    let mut periodic = interval(state.config().persist_interval);
    periodic.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                changes.borrow_and_update();
                save_logged(&state).await;
            }
            _ = periodic.tick() => {
                if clocks_running(&state.snapshot().await) {
                    save_logged(&state).await;
                }
            }
        }
    }
}

/// Save the live bout once, e.g. during shutdown.
pub async fn flush(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.bout_store().await.ok_or(ServiceError::Degraded)?;
    let snapshot = state.snapshot().await;
    let (id, version) = (snapshot.id, snapshot.version);
    store.save_bout(BoutEntity::snapshot(snapshot)).await?;
    debug!(bout = %id, version, "bout saved");
    Ok(())
}

/// Make the most recently saved bout live, unless the live bout already saw a command.
pub async fn recover_latest(state: &SharedState) -> Result<Option<Uuid>, ServiceError> {
    let live = state.snapshot().await;
    if live.version > 0 {
        return Ok(None);
    }

    let store = state.bout_store().await.ok_or(ServiceError::Degraded)?;
    let Some(entity) = store.latest_bout().await? else {
        return Ok(None);
    };

    if !state.replace_fresh_bout(live.id, entity.state).await {
        info!(bout = %entity.id, "live bout changed during recovery; keeping it");
        return Ok(None);
    }
    info!(bout = %entity.id, "recovered latest bout");
    Ok(Some(entity.id))
}

async fn save_logged(state: &SharedState) {
    match flush(state).await {
        Ok(()) => {}
        Err(ServiceError::Degraded) => debug!("no storage backend; bout not saved"),
        Err(err) => warn!(error = %err, "failed to save bout"),
    }
}

fn clocks_running(bout: &GameState) -> bool {
    bout.phase.clock().is_some_and(|clock| clock.running) || bout.phase.runs_game_clock()
}

#[cfg(all(test, feature = "file-store"))]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::bout_store::{
            BoutStore,
            file::{FileBoutStore, FileStoreConfig},
        },
        state::{AppState, command::Command, roster::RosterBook},
    };

    async fn app_with_store(dir: &TempDir) -> (SharedState, Arc<dyn BoutStore>) {
        let state = AppState::new(AppConfig::default(), RosterBook::new());
        let store: Arc<dyn BoutStore> = Arc::new(
            FileBoutStore::open(FileStoreConfig::new(dir.path().to_path_buf()))
                .await
                .unwrap(),
        );
        state.set_bout_store(store.clone()).await;
        (state, store)
    }

    #[tokio::test]
    async fn flush_then_recover_into_a_fresh_process() {
        let dir = TempDir::new().unwrap();
        let (first, _) = app_with_store(&dir).await;
        first.apply_command(&Command::StartPeriod).await.unwrap();
        first.apply_command(&Command::StartJam).await.unwrap();
        flush(&first).await.unwrap();
        let saved = first.snapshot().await;

        let (second, _) = app_with_store(&dir).await;
        assert_eq!(recover_latest(&second).await.unwrap(), Some(saved.id));
        let restored = second.snapshot().await;
        assert_eq!(restored.id, saved.id);
        assert_eq!(restored.version, saved.version);
        assert_eq!(restored.jams, saved.jams);
    }

    #[tokio::test]
    async fn recovery_never_overrides_a_bout_in_use() {
        let dir = TempDir::new().unwrap();
        let (first, _) = app_with_store(&dir).await;
        first.apply_command(&Command::StartPeriod).await.unwrap();
        flush(&first).await.unwrap();

        let (second, _) = app_with_store(&dir).await;
        second.apply_command(&Command::StartPeriod).await.unwrap();
        let own = second.snapshot().await.id;
        assert_eq!(recover_latest(&second).await.unwrap(), None);
        assert_eq!(second.snapshot().await.id, own);
    }

    #[tokio::test]
    async fn writer_saves_each_revision() {
        let dir = TempDir::new().unwrap();
        let (state, store) = app_with_store(&dir).await;
        let writer = tokio::spawn(run(state.clone()));
        tokio::task::yield_now().await;

        let applied = state.apply_command(&Command::StartPeriod).await.unwrap();
        let mut stored = None;
        for _ in 0..50 {
            stored = store.find_bout(applied.id).await.unwrap();
            if stored.as_ref().is_some_and(|bout| bout.state.version == applied.version) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(stored.map(|bout| bout.state.version), Some(applied.version));

        writer.abort();
    }

    #[tokio::test]
    async fn flush_without_store_is_degraded() {
        let state = AppState::new(AppConfig::default(), RosterBook::new());
        assert!(matches!(flush(&state).await, Err(ServiceError::Degraded)));
    }
}
