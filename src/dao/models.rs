use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    game::{GameState, Team, TeamRosters},
    state_machine::BoutPhase,
};

/// Bout snapshot persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoutEntity {
    /// Primary key of the bout, equal to `state.id`.
    pub id: Uuid,
    /// Time the snapshot was taken.
    pub updated_at: SystemTime,
    /// Full bout state, clocks included.
    pub state: GameState,
}

impl BoutEntity {
    /// Snapshot `state` as of now.
    pub fn snapshot(state: GameState) -> Self {
        Self {
            id: state.id,
            updated_at: SystemTime::now(),
            state,
        }
    }
}

/// Summary of a stored bout used by listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoutListItemEntity {
    /// Primary key of the bout.
    pub id: Uuid,
    /// Time of the latest snapshot.
    pub updated_at: SystemTime,
    /// Rosters assigned to both teams.
    pub rosters: TeamRosters,
    /// Coarse progress when the snapshot was taken.
    pub bout_phase: BoutPhase,
    /// Current period.
    pub period: u8,
    /// Home points.
    pub home_score: u32,
    /// Away points.
    pub away_score: u32,
}

impl From<&BoutEntity> for BoutListItemEntity {
    fn from(entity: &BoutEntity) -> Self {
        Self {
            id: entity.id,
            updated_at: entity.updated_at,
            rosters: entity.state.rosters.clone(),
            bout_phase: entity.state.bout_phase(),
            period: entity.state.game_clock.period,
            home_score: entity.state.running_total(Team::Home),
            away_score: entity.state.running_total(Team::Away),
        }
    }
}

impl From<BoutEntity> for BoutListItemEntity {
    fn from(entity: BoutEntity) -> Self {
        (&entity).into()
    }
}
