use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    budget::{BudgetRules, TimeoutBudget},
    clock::{ClockRules, GameClock},
    penalty::PenaltyLedger,
    score::{JamKey, ScoreLedger},
    state_machine::{ActivePhase, BoutPhase, ReviewOutcome},
};

/// One of the two teams of a bout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// Home team.
    Home,
    /// Away team.
    Away,
}

impl Team {
    /// Both teams, home first.
    pub const BOTH: [Team; 2] = [Team::Home, Team::Away];
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Home => f.write_str("home"),
            Team::Away => f.write_str("away"),
        }
    }
}

/// Roster identifiers assigned to each team.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct TeamRosters {
    /// Roster used for the home team.
    pub home: Option<String>,
    /// Roster used for the away team.
    pub away: Option<String>,
}

impl TeamRosters {
    /// Roster identifier of `team`, if one is assigned.
    pub fn get(&self, team: Team) -> Option<&str> {
        match team {
            Team::Home => self.home.as_deref(),
            Team::Away => self.away.as_deref(),
        }
    }
}

/// History entry for an official review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReviewRecord {
    /// Team that asked for the review.
    pub team: Team,
    /// Most recent jam when the review was requested.
    pub jam: Option<JamKey>,
    /// Ruling; stays pending when the review was closed without one.
    pub outcome: ReviewOutcome,
}

/// Authoritative state of a bout. Persisted as-is and served to every station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GameState {
    /// Bout identifier.
    pub id: Uuid,
    /// Incremented by every applied command and every automatic transition.
    pub version: u64,
    /// Rosters assigned to both teams.
    pub rosters: TeamRosters,
    /// Period clock.
    pub game_clock: GameClock,
    /// Active phase and its clock.
    pub phase: ActivePhase,
    /// Timeout and review allowances.
    pub budgets: TimeoutBudget,
    /// Scoring records, one entry per jam.
    pub jams: ScoreLedger,
    /// Penalties in jam order.
    pub penalties: PenaltyLedger,
    /// Official reviews requested so far.
    pub reviews: Vec<ReviewRecord>,
}

impl GameState {
    /// Fresh bout waiting for its first command.
    pub fn new(rosters: TeamRosters, budget: &BudgetRules) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: 0,
            rosters,
            game_clock: GameClock::default(),
            phase: ActivePhase::PreGame,
            budgets: TimeoutBudget::new(budget),
            jams: ScoreLedger::default(),
            penalties: PenaltyLedger::default(),
            reviews: Vec::new(),
        }
    }

    /// Coarse bout progress.
    pub fn bout_phase(&self) -> BoutPhase {
        self.phase.bout_phase()
    }

    /// Points scored by `team` over the whole bout.
    pub fn running_total(&self, team: Team) -> u32 {
        self.jams.running_total(team)
    }

    /// Time left on the period clock.
    pub fn period_remaining(&self, rules: &ClockRules) -> Duration {
        if self.game_clock.period == 0 {
            return rules.period;
        }
        self.game_clock.remaining(rules.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bout_starts_in_pre_game() {
        let state = GameState::new(TeamRosters::default(), &BudgetRules::default());
        assert_eq!(state.phase, ActivePhase::PreGame);
        assert_eq!(state.bout_phase(), BoutPhase::PreGame);
        assert_eq!(state.budgets.home.timeouts_remaining, 3);
        assert_eq!(state.budgets.away.reviews_remaining, 2);
        assert_eq!(
            state.period_remaining(&ClockRules::default()),
            Duration::from_secs(1_800)
        );
    }

    #[test]
    fn team_parses_from_lowercase() {
        let team: Team = serde_json::from_str("\"away\"").unwrap();
        assert_eq!(team, Team::Away);
        assert_eq!(Team::Home.to_string(), "home");
    }
}
