use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        bout::BoutSnapshot,
        sse::{ServerEvent, SystemStatus},
    },
    state::SharedState,
};

const EVENT_BOUT_UPDATED: &str = "bout.updated";
const EVENT_BOUT_RESET: &str = "bout.reset";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Fan out every bout revision and degraded-mode change to public subscribers.
///
/// Revisions of the same bout go out as `bout.updated`; a different bout id means a new or
/// restored bout and goes out as `bout.reset`. Bursts collapse into the latest snapshot.
pub async fn run(state: SharedState) {
    let mut changes = state.subscribe_changes();
    let mut degraded = state.degraded_watcher();
    let mut current_bout = changes.borrow_and_update().id;

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let change = *changes.borrow_and_update();
                let event = if change.id == current_bout {
                    EVENT_BOUT_UPDATED
                } else {
                    EVENT_BOUT_RESET
                };
                current_bout = change.id;
                broadcast_bout(&state, event).await;
            }
            changed = degraded.changed() => {
                if changed.is_err() {
                    break;
                }
                let value = *degraded.borrow_and_update();
                broadcast_system_status(&state, value);
            }
        }
    }
}

/// Broadcast the current bout snapshot under `event`.
async fn broadcast_bout(state: &SharedState, event: &str) {
    let snapshot = BoutSnapshot::new(state.snapshot().await, state.processor().clock_rules());
    send_public_event(state, event, &snapshot);
}

/// Broadcast whether the backend currently runs without storage.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    send_public_event(state, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{
        config::AppConfig,
        state::{AppState, command::Command, game::TeamRosters, roster::RosterBook},
    };

    async fn next_event(
        receiver: &mut tokio::sync::broadcast::Receiver<ServerEvent>,
    ) -> ServerEvent {
        timeout(Duration::from_secs(1), receiver.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn revisions_and_new_bouts_are_published() {
        let state = AppState::new(AppConfig::default(), RosterBook::new());
        let mut receiver = state.public_sse().subscribe();
        let publisher = tokio::spawn(run(state.clone()));
        tokio::task::yield_now().await;

        state.apply_command(&Command::StartPeriod).await.unwrap();
        let updated = next_event(&mut receiver).await;
        assert_eq!(updated.event.as_deref(), Some(EVENT_BOUT_UPDATED));
        let body: serde_json::Value = serde_json::from_str(&updated.data).unwrap();
        assert_eq!(body["version"], 1);
        assert_eq!(body["phase"]["kind"], "lineup");

        let fresh = state.processor().new_bout(TeamRosters::default());
        state.replace_bout(fresh.clone()).await;
        let reset = next_event(&mut receiver).await;
        assert_eq!(reset.event.as_deref(), Some(EVENT_BOUT_RESET));
        assert!(reset.data.contains(&fresh.id.to_string()));

        state.update_degraded(false);
        let status = next_event(&mut receiver).await;
        assert_eq!(status.event.as_deref(), Some(EVENT_SYSTEM_STATUS));
        assert_eq!(status.data, r#"{"degraded":false}"#);

        publisher.abort();
    }
}
