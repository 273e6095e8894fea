pub mod budget;
pub mod clock;
pub mod command;
pub mod game;
pub mod penalty;
pub mod roster;
pub mod score;
mod sse;
pub mod state_machine;

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{RwLock, watch},
    time::Instant,
};
use tracing::info;
use uuid::Uuid;

use crate::{config::AppConfig, dao::bout_store::BoutStore};

pub use self::sse::SseHub;
use self::{
    command::{Command, CommandError, CommandProcessor},
    game::{GameState, TeamRosters},
    roster::RosterBook,
};

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 64;

/// Identity of the latest bout revision, published after every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoutChange {
    /// Bout the revision belongs to.
    pub id: Uuid,
    /// Revision number.
    pub version: u64,
}

impl From<&GameState> for BoutChange {
    fn from(state: &GameState) -> Self {
        Self {
            id: state.id,
            version: state.version,
        }
    }
}

/// Authoritative bout together with the instant its clocks were last brought up to date.
struct LiveBout {
    state: GameState,
    last_tick: Instant,
}

impl LiveBout {
    fn new(state: GameState) -> Self {
        Self {
            state,
            last_tick: Instant::now(),
        }
    }

    /// Whole milliseconds elapsed since the clocks were last advanced.
    fn pending(&self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last_tick);
        Duration::from_millis(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }

    /// Advance the clocks to `now`. Sub-millisecond remainders carry over to the next call.
    fn catch_up(&mut self, processor: &CommandProcessor, now: Instant) -> bool {
        let delta = self.pending(now);
        self.last_tick += delta;
        processor.advance(&mut self.state, delta)
    }
}

/// Central application state: the live bout, its rules, storage handle and broadcast hubs.
pub struct AppState {
    config: AppConfig,
    bout_store: RwLock<Option<Arc<dyn BoutStore>>>,
    sse: SseHub,
    rosters: Arc<RosterBook>,
    processor: CommandProcessor,
    bout: RwLock<LiveBout>,
    degraded: watch::Sender<bool>,
    changes: watch::Sender<BoutChange>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed, and
    /// with a fresh bout that has no rosters assigned.
    pub fn new(config: AppConfig, rosters: RosterBook) -> SharedState {
        let rosters = Arc::new(rosters);
        let processor = CommandProcessor::new(config.rules.clone(), rosters.clone());
        let initial = processor.new_bout(TeamRosters::default());
        let (degraded_tx, _rx) = watch::channel(true);
        let (changes_tx, _rx) = watch::channel(BoutChange::from(&initial));

        Arc::new(Self {
            config,
            bout_store: RwLock::new(None),
            sse: SseHub::new(SSE_CAPACITY),
            rosters,
            processor,
            bout: RwLock::new(LiveBout::new(initial)),
            degraded: degraded_tx,
            changes: changes_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Rules engine shared by every command.
    pub fn processor(&self) -> &CommandProcessor {
        &self.processor
    }

    /// Rosters loaded at startup.
    pub fn rosters(&self) -> &RosterBook {
        &self.rosters
    }

    /// Current bout with every clock projected to now. The stored bout is left untouched.
    pub async fn snapshot(&self) -> GameState {
        let live = self.bout.read().await;
        let mut state = live.state.clone();
        let delta = live.pending(Instant::now());
        drop(live);

        self.processor.advance(&mut state, delta);
        state
    }

    /// Bring the clocks up to date, then apply `command`.
    ///
    /// A rejected command leaves the bout as it was after the clock update.
    pub async fn apply_command(&self, command: &Command) -> Result<GameState, CommandError> {
        let mut live = self.bout.write().await;
        let expired = live.catch_up(&self.processor, Instant::now());

        match self.processor.apply(command, &live.state) {
            Ok(next) => {
                live.state = next.clone();
                drop(live);
                self.publish(&next);
                Ok(next)
            }
            Err(err) => {
                if expired {
                    let current = live.state.clone();
                    drop(live);
                    self.publish(&current);
                }
                Err(err)
            }
        }
    }

    /// Advance the clocks to now. Returns the new state when the jam cap stopped a jam.
    pub async fn tick(&self) -> Option<GameState> {
        let mut live = self.bout.write().await;
        if !live.catch_up(&self.processor, Instant::now()) {
            return None;
        }

        let state = live.state.clone();
        drop(live);
        info!(bout = %state.id, version = state.version, "jam cap reached; jam stopped");
        self.publish(&state);
        Some(state)
    }

    /// Swap in a different bout, for a fresh start or one restored from storage.
    pub async fn replace_bout(&self, state: GameState) {
        let change = BoutChange::from(&state);
        *self.bout.write().await = LiveBout::new(state);
        self.changes.send_replace(change);
    }

    /// Swap in `state` only while the live bout is still `expected` and has not seen a command.
    ///
    /// Returns `false`, leaving the live bout alone, when anything changed it in the meantime.
    pub async fn replace_fresh_bout(&self, expected: Uuid, state: GameState) -> bool {
        let change = BoutChange::from(&state);
        {
            let mut live = self.bout.write().await;
            if live.state.id != expected || live.state.version > 0 {
                return false;
            }
            *live = LiveBout::new(state);
        }
        self.changes.send_replace(change);
        true
    }

    /// Subscribe to bout revisions.
    pub fn subscribe_changes(&self) -> watch::Receiver<BoutChange> {
        self.changes.subscribe()
    }

    /// Obtain a handle to the current bout store, if one is installed.
    pub async fn bout_store(&self) -> Option<Arc<dyn BoutStore>> {
        let guard = self.bout_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new bout store implementation and leave degraded mode.
    pub async fn set_bout_store(&self, store: Arc<dyn BoutStore>) {
        {
            let mut guard = self.bout_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current bout store and enter degraded mode.
    pub async fn clear_bout_store(&self) {
        {
            let mut guard = self.bout_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.sse
    }

    fn publish(&self, state: &GameState) {
        self.changes.send_replace(BoutChange::from(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::state_machine::ActivePhase;

    fn app() -> SharedState {
        AppState::new(AppConfig::default(), RosterBook::new())
    }

    async fn run(state: &SharedState, command: Command) -> GameState {
        state.apply_command(&command).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_projects_clocks_without_mutating() {
        let state = app();
        run(&state, Command::StartPeriod).await;
        run(&state, Command::StartJam).await;

        tokio::time::advance(Duration::from_secs(10)).await;
        let projected = state.snapshot().await;
        let ActivePhase::Jam { clock, .. } = projected.phase else {
            panic!("expected a jam, got {:?}", projected.phase);
        };
        assert_eq!(clock.value, Duration::from_secs(110));

        let stored = state.bout.read().await.state.clone();
        assert_ne!(stored.phase, projected.phase);
        assert_eq!(stored.version, projected.version);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_bout_replacement_rechecks_under_the_lock() {
        let state = app();
        let fresh = state.snapshot().await.id;
        let restored = state.processor().new_bout(TeamRosters::default());

        run(&state, Command::StartPeriod).await;
        assert!(!state.replace_fresh_bout(fresh, restored.clone()).await);
        let live = state.snapshot().await;
        assert_eq!(live.id, fresh);
        assert_eq!(live.version, 1);

        let other = app();
        let stale = Uuid::new_v4();
        assert!(!other.replace_fresh_bout(stale, restored.clone()).await);

        let untouched = other.snapshot().await.id;
        assert!(other.replace_fresh_bout(untouched, restored.clone()).await);
        assert_eq!(other.snapshot().await.id, restored.id);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_stops_jam_at_cap_and_publishes() {
        let state = app();
        run(&state, Command::StartPeriod).await;
        let started = run(&state, Command::StartJam).await;
        let mut changes = state.subscribe_changes();
        changes.mark_unchanged();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(state.tick().await.is_none());

        tokio::time::advance(Duration::from_secs(61)).await;
        let stopped = state.tick().await.unwrap();
        assert!(matches!(stopped.phase, ActivePhase::Lineup { .. }));
        assert_eq!(stopped.version, started.version + 1);
        assert!(changes.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn command_sees_clock_caught_up() {
        let state = app();
        run(&state, Command::StartPeriod).await;
        let started = run(&state, Command::StartJam).await;
        tokio::time::advance(Duration::from_secs(125)).await;

        let err = state.apply_command(&Command::StopJam).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");
        let current = state.snapshot().await;
        assert!(matches!(current.phase, ActivePhase::Lineup { .. }));
        assert!(current.jams.current().unwrap().is_closed());
        assert_eq!(current.version, started.version + 1);
    }

    #[tokio::test]
    async fn degraded_flag_follows_store_installation() {
        let state = app();
        assert!(state.is_degraded());
        let mut watcher = state.degraded_watcher();

        state.update_degraded(true);
        assert!(!watcher.has_changed().unwrap());

        state.update_degraded(false);
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
    }
}
