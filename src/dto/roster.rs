//! Roster projections served to the scoreboard and penalty stations.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{game::Team, roster::Roster};

/// One line of a roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SkaterEntry {
    /// Skater number, at most four characters.
    pub number: String,
    /// Derby name.
    pub name: String,
}

/// Roster summary used by listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct RosterListItem {
    /// Roster identifier, the file stem it was loaded from.
    pub id: String,
    /// Team name.
    pub name: String,
    /// Number of skaters on the roster.
    pub skater_count: usize,
}

impl From<&Roster> for RosterListItem {
    fn from(roster: &Roster) -> Self {
        Self {
            id: roster.id.clone(),
            name: roster.name.clone(),
            skater_count: roster.skaters.len(),
        }
    }
}

/// Roster assigned to one side of the current bout.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamRosterResponse {
    /// Side of the bout.
    pub team: Team,
    /// Roster identifier.
    pub roster_id: String,
    /// Team name.
    pub name: String,
    /// Skaters ordered by number.
    pub skaters: Vec<SkaterEntry>,
}

impl TeamRosterResponse {
    /// Project `roster` as the roster of `team`.
    pub fn new(team: Team, roster: Roster) -> Self {
        Self {
            team,
            roster_id: roster.id,
            name: roster.name,
            skaters: roster
                .skaters
                .into_iter()
                .map(|(number, name)| SkaterEntry { number, name })
                .collect(),
        }
    }
}
