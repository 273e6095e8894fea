//! Background ticker that keeps the bout clocks moving.

use std::sync::{Arc, Weak};

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

use crate::state::{AppState, SharedState};

/// Advance the bout clocks every configured tick until the application state is dropped.
///
/// Jam-cap expiry is applied here even when no request arrives, so the jam stops on time.
pub async fn run(state: Weak<AppState>) {
    let Some(period) = state.upgrade().map(|state| state.config().tick_interval) else {
        return;
    };

    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let Some(state) = state.upgrade() else {
            break;
        };
        state.tick().await;
    }
}

/// Spawn the ticker as a tokio task holding only a weak reference to `state`.
pub fn spawn(state: &SharedState) -> JoinHandle<()> {
    tokio::spawn(run(Arc::downgrade(state)))
}
