//! Per-jam scoring records and the totals derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::{command::CommandError, game::Team};

/// Highest value a single scoring trip can be worth.
pub const MAX_TRIP_POINTS: u8 = 5;
/// Trips a team can record in one jam, jammer and pivot combined.
pub const MAX_TRIPS_PER_JAM: usize = 9;

/// Identifies a jam; jam numbers restart in every period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub struct JamKey {
    /// Period the jam belongs to.
    pub period: u8,
    /// Jam number within the period, starting at 1.
    pub number: u16,
}

impl fmt::Display for JamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{} J{}", self.period, self.number)
    }
}

/// Lifecycle of a jam record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JamStatus {
    /// Jam in progress; trips may be appended.
    Running,
    /// Jam over; flags and the last trip may still be corrected.
    Ended,
    /// The following lineup is over; the record no longer changes.
    Sealed,
}

/// What one team did during one jam.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct TeamJam {
    /// Skater number of the jammer.
    pub jammer: Option<String>,
    /// Skater number of the pivot.
    pub pivot: Option<String>,
    /// Lead jammer.
    pub lead: bool,
    /// The jammer called the jam off.
    pub call: bool,
    /// Lead was lost or could not be earned.
    pub lost: bool,
    /// Jam called for an injury.
    pub injury: bool,
    /// The star was passed to the pivot.
    pub star_pass: bool,
    /// Trips scored by the jammer.
    pub jammer_points: Vec<u8>,
    /// Trips scored by the pivot after a star pass.
    pub pivot_points: Vec<u8>,
}

impl TeamJam {
    /// Number of trips recorded, jammer and pivot combined.
    pub fn trips(&self) -> usize {
        self.jammer_points.len() + self.pivot_points.len()
    }

    /// Points scored in this jam.
    pub fn total(&self) -> u32 {
        self.jammer_points
            .iter()
            .chain(&self.pivot_points)
            .map(|points| u32::from(*points))
            .sum()
    }

    fn scoring_trips(&mut self) -> &mut Vec<u8> {
        if self.star_pass {
            &mut self.pivot_points
        } else {
            &mut self.jammer_points
        }
    }
}

/// Both teams' records for a single jam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JamRecord {
    /// Period and jam number.
    pub key: JamKey,
    /// Whether the record can still change.
    pub status: JamStatus,
    /// Home team record.
    pub home: TeamJam,
    /// Away team record.
    pub away: TeamJam,
}

impl JamRecord {
    fn open(key: JamKey) -> Self {
        Self {
            key,
            status: JamStatus::Running,
            home: TeamJam::default(),
            away: TeamJam::default(),
        }
    }

    /// Record of `team`.
    pub fn team(&self, team: Team) -> &TeamJam {
        match team {
            Team::Home => &self.home,
            Team::Away => &self.away,
        }
    }

    /// Mutable record of `team`.
    pub fn team_mut(&mut self, team: Team) -> &mut TeamJam {
        match team {
            Team::Home => &mut self.home,
            Team::Away => &mut self.away,
        }
    }

    /// The jam is no longer running.
    pub fn is_closed(&self) -> bool {
        self.status != JamStatus::Running
    }

    /// Append a scoring trip for `team`, credited to the pivot after a star pass.
    pub fn record_trip(&mut self, team: Team, points: u8) -> Result<(), CommandError> {
        if points > MAX_TRIP_POINTS {
            return Err(CommandError::out_of_range(
                "points",
                format!("a trip is worth 0 to {MAX_TRIP_POINTS} points, got {points}"),
            ));
        }

        let key = self.key;
        let record = self.team_mut(team);
        if record.trips() >= MAX_TRIPS_PER_JAM {
            return Err(CommandError::TripLimitExceeded {
                team,
                jam: key,
                limit: MAX_TRIPS_PER_JAM,
            });
        }

        record.scoring_trips().push(points);
        Ok(())
    }

    /// Hand the star to the pivot for the rest of the jam.
    pub fn mark_star_pass(&mut self, team: Team) -> Result<(), CommandError> {
        let key = self.key;
        let record = self.team_mut(team);
        if record.star_pass {
            return Err(CommandError::AlreadyStarPassed { team, jam: key });
        }
        record.star_pass = true;
        Ok(())
    }

    /// Correct the latest trip of `team` by `delta`, opening a zero-point trip if none exists.
    ///
    /// The corrected value is clamped at zero and may not exceed [`MAX_TRIP_POINTS`].
    pub fn adjust_last_trip(&mut self, team: Team, delta: i8) -> Result<(), CommandError> {
        let key = self.key;
        let record = self.team_mut(team);
        let no_trip_yet = record.scoring_trips().is_empty();
        if no_trip_yet && record.trips() >= MAX_TRIPS_PER_JAM {
            return Err(CommandError::TripLimitExceeded {
                team,
                jam: key,
                limit: MAX_TRIPS_PER_JAM,
            });
        }

        let trips = record.scoring_trips();
        let current = trips.last().copied().unwrap_or(0);
        let adjusted = (i16::from(current) + i16::from(delta)).max(0);
        let adjusted = u8::try_from(adjusted)
            .ok()
            .filter(|points| *points <= MAX_TRIP_POINTS)
            .ok_or_else(|| {
                CommandError::out_of_range(
                    "delta",
                    format!("trip would be worth {adjusted} points, maximum is {MAX_TRIP_POINTS}"),
                )
            })?;

        match trips.last_mut() {
            Some(last) => *last = adjusted,
            None => trips.push(adjusted),
        }
        Ok(())
    }
}

/// Ordered list of jam records for the whole bout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ScoreLedger {
    jams: Vec<JamRecord>,
}

impl ScoreLedger {
    /// All jams in play order.
    pub fn jams(&self) -> &[JamRecord] {
        &self.jams
    }

    /// Most recent jam, whatever its status.
    pub fn current(&self) -> Option<&JamRecord> {
        self.jams.last()
    }

    /// Record of a specific jam.
    pub fn find(&self, key: JamKey) -> Option<&JamRecord> {
        self.jams.iter().find(|jam| jam.key == key)
    }

    /// Number the next jam of `period` will get.
    pub fn next_number(&self, period: u8) -> u16 {
        self.jams
            .iter()
            .rev()
            .find(|jam| jam.key.period == period)
            .map_or(1, |jam| jam.key.number + 1)
    }

    /// Seal the previous jam and open a running record for `key`.
    pub fn open(&mut self, key: JamKey) {
        self.seal_current();
        self.jams.push(JamRecord::open(key));
    }

    /// Move the running jam, if any, to [`JamStatus::Ended`].
    pub fn end_running(&mut self) {
        if let Some(jam) = self.jams.last_mut()
            && jam.status == JamStatus::Running
        {
            jam.status = JamStatus::Ended;
        }
    }

    /// Make the most recent jam immutable.
    pub fn seal_current(&mut self) {
        if let Some(jam) = self.jams.last_mut() {
            jam.status = JamStatus::Sealed;
        }
    }

    /// The running jam, if one is in progress.
    pub fn running_mut(&mut self) -> Option<&mut JamRecord> {
        self.jams
            .last_mut()
            .filter(|jam| jam.status == JamStatus::Running)
    }

    /// The most recent jam while it can still be corrected.
    pub fn amendable_mut(&mut self) -> Option<&mut JamRecord> {
        self.jams
            .last_mut()
            .filter(|jam| jam.status != JamStatus::Sealed)
    }

    /// Points `team` scored in the jam identified by `key`.
    pub fn total(&self, team: Team, key: JamKey) -> Option<u32> {
        self.find(key).map(|jam| jam.team(team).total())
    }

    /// Points `team` scored over the whole bout.
    pub fn running_total(&self, team: Team) -> u32 {
        self.jams.iter().map(|jam| jam.team(team).total()).sum()
    }

    /// Points `team` scored up to and including the jam identified by `key`.
    pub fn total_through(&self, team: Team, key: JamKey) -> u32 {
        self.jams
            .iter()
            .take_while(|jam| jam.key <= key)
            .map(|jam| jam.team(team).total())
            .sum()
    }
}
