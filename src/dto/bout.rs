//! DTO definitions for the bout REST API, the scoresheet and the penalty board.

use serde::{Deserialize, Serialize};
use time::Time;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::BoutListItemEntity,
    dto::{format_system_time, validation::validate_roster_id},
    state::{
        clock::ClockRules,
        command::CommandError,
        game::{GameState, Team, TeamRosters},
        penalty::{PenaltyCode, PenaltyRecord},
        roster::Roster,
        score::{JamRecord, JamStatus, TeamJam},
        state_machine::BoutPhase,
    },
};

/// Full bout state plus the read-only values every display derives from it.
///
/// Dropping the derived fields yields a document that deserializes back into [`GameState`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BoutSnapshot {
    /// Authoritative state.
    #[serde(flatten)]
    pub state: GameState,
    /// Coarse bout progress.
    pub bout_phase: BoutPhase,
    /// Time left on the period clock, in milliseconds.
    pub period_remaining_ms: u64,
    /// Home points over the whole bout.
    pub home_total: u32,
    /// Away points over the whole bout.
    pub away_total: u32,
    /// Points of the most recent jam, absent before the first jam.
    pub current_jam: Option<JamTotals>,
}

impl BoutSnapshot {
    /// Derive the read-only fields of `state` under `rules`.
    pub fn new(state: GameState, rules: &ClockRules) -> Self {
        let period_remaining = state.period_remaining(rules);
        Self {
            bout_phase: state.bout_phase(),
            period_remaining_ms: u64::try_from(period_remaining.as_millis()).unwrap_or(u64::MAX),
            home_total: state.running_total(Team::Home),
            away_total: state.running_total(Team::Away),
            current_jam: state.jams.current().map(JamTotals::from),
            state,
        }
    }
}

/// Jam points of both teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct JamTotals {
    /// Period of the jam.
    pub period: u8,
    /// Jam number within the period.
    pub jam: u16,
    /// Whether the jam can still change.
    pub status: JamStatus,
    /// Home points in this jam.
    pub home: u32,
    /// Away points in this jam.
    pub away: u32,
}

impl From<&JamRecord> for JamTotals {
    fn from(record: &JamRecord) -> Self {
        Self {
            period: record.key.period,
            jam: record.key.number,
            status: record.status,
            home: record.home.total(),
            away: record.away.total(),
        }
    }
}

/// Payload used to start a fresh bout.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct NewBoutRequest {
    /// Roster of the home team.
    #[serde(default)]
    #[validate(custom(function = "validate_roster_id"))]
    pub home_roster: Option<String>,
    /// Roster of the away team.
    #[serde(default)]
    #[validate(custom(function = "validate_roster_id"))]
    pub away_roster: Option<String>,
    /// When set, the time-to-derby countdown starts right away.
    #[serde(default)]
    #[validate(range(min = 1, max = 86_400))]
    pub time_to_derby_seconds: Option<u32>,
    /// When set, the time-to-derby countdown runs until this time of day.
    #[serde(default)]
    pub start_at: Option<StartAt>,
}

impl NewBoutRequest {
    /// Roster assignment requested for the new bout.
    pub fn rosters(&self) -> TeamRosters {
        TeamRosters {
            home: self.home_roster.clone(),
            away: self.away_roster.clone(),
        }
    }
}

/// Half of the day for 12-hour start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Meridiem {
    /// Midnight to noon.
    Am,
    /// Noon to midnight.
    Pm,
}

/// Time of day the bout starts at, in the server's local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub struct StartAt {
    /// Hour: 0 to 23, or 1 to 12 with `meridiem`.
    pub hour: u8,
    /// Minute: 0 to 59.
    pub minute: u8,
    /// `AM` or `PM` for a 12-hour clock.
    #[serde(default)]
    pub meridiem: Option<Meridiem>,
}

impl StartAt {
    /// Whole seconds from `now` until the next occurrence of this time of day.
    ///
    /// A start time equal to `now` is a full day away.
    pub fn countdown_from(&self, now: Time) -> Result<u32, CommandError> {
        let hour = self.hour_of_day()?;
        if self.minute >= 60 {
            return Err(CommandError::out_of_range(
                "minute",
                format!("minutes range from 0 to 59, got {}", self.minute),
            ));
        }
        let at = Time::from_hms(hour, self.minute, 0)
            .map_err(|err| CommandError::out_of_range("hour", err.to_string()))?;

        let mut until = at - now;
        if !until.is_positive() {
            until += time::Duration::DAY;
        }
        let seconds = until.whole_seconds() + i64::from(until.subsec_nanoseconds() > 0);
        u32::try_from(seconds)
            .map_err(|_| CommandError::out_of_range("hour", "start time is out of reach"))
    }

    fn hour_of_day(&self) -> Result<u8, CommandError> {
        match (self.meridiem, self.hour) {
            (None, hour @ 0..=23) => Ok(hour),
            (Some(Meridiem::Am), 12) => Ok(0),
            (Some(Meridiem::Pm), 12) => Ok(12),
            (Some(Meridiem::Am), hour @ 1..=11) => Ok(hour),
            (Some(Meridiem::Pm), hour @ 1..=11) => Ok(hour + 12),
            (Some(_), hour) => Err(CommandError::out_of_range(
                "hour",
                format!("12-hour times range from 1 to 12, got {hour}"),
            )),
            (None, hour) => Err(CommandError::out_of_range(
                "hour",
                format!("hours range from 0 to 23, got {hour}"),
            )),
        }
    }
}

/// One team's line of a scoresheet row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamJamLine {
    /// What the team did during the jam.
    #[serde(flatten)]
    pub record: TeamJam,
    /// Points scored in this jam.
    pub jam_total: u32,
    /// Points scored up to and including this jam.
    pub game_total: u32,
}

/// One jam of the scoresheet.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JamSheetRow {
    /// Period of the jam.
    pub period: u8,
    /// Jam number within the period.
    pub jam: u16,
    /// Whether the jam can still change.
    pub status: JamStatus,
    /// Home line.
    pub home: TeamJamLine,
    /// Away line.
    pub away: TeamJamLine,
}

/// Build the scoresheet of `state`, one row per jam in play order.
pub fn jam_sheet(state: &GameState) -> Vec<JamSheetRow> {
    let mut home_total = 0;
    let mut away_total = 0;
    state
        .jams
        .jams()
        .iter()
        .map(|record| {
            home_total += record.home.total();
            away_total += record.away.total();
            JamSheetRow {
                period: record.key.period,
                jam: record.key.number,
                status: record.status,
                home: TeamJamLine {
                    record: record.home.clone(),
                    jam_total: record.home.total(),
                    game_total: home_total,
                },
                away: TeamJamLine {
                    record: record.away.clone(),
                    jam_total: record.away.total(),
                    game_total: away_total,
                },
            }
        })
        .collect()
}

/// A penalty as shown on the penalty board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PenaltyEntry {
    /// Period of the jam the penalty is attributed to.
    pub period: u8,
    /// Jam number within the period.
    pub jam: u16,
    /// Penalty code.
    pub code: PenaltyCode,
}

impl From<&PenaltyRecord> for PenaltyEntry {
    fn from(record: &PenaltyRecord) -> Self {
        Self {
            period: record.period,
            jam: record.jam,
            code: record.code,
        }
    }
}

/// Every penalty of one skater.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SkaterPenalties {
    /// Skater number.
    pub number: String,
    /// Derby name, when the team has a roster listing the skater.
    pub name: Option<String>,
    /// Penalties in jam order.
    pub penalties: Vec<PenaltyEntry>,
}

/// Penalties of one team grouped by skater.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PenaltyBoard {
    /// Side of the bout.
    pub team: Team,
    /// Penalized skaters ordered by number.
    pub skaters: Vec<SkaterPenalties>,
}

impl PenaltyBoard {
    /// Board of `team`, resolving skater names through `roster` when one is given.
    pub fn new(state: &GameState, team: Team, roster: Option<&Roster>) -> Self {
        let skaters = state
            .penalties
            .by_skater(team)
            .into_iter()
            .map(|(number, records)| SkaterPenalties {
                number: number.to_owned(),
                name: skater_name(roster, number),
                penalties: records.into_iter().map(PenaltyEntry::from).collect(),
            })
            .collect();
        Self { team, skaters }
    }
}

/// One skater's penalties, built from the ledger.
pub fn skater_penalties(
    state: &GameState,
    team: Team,
    number: &str,
    roster: Option<&Roster>,
) -> SkaterPenalties {
    SkaterPenalties {
        number: number.to_owned(),
        name: skater_name(roster, number),
        penalties: state
            .penalties
            .penalties_for(team, number)
            .map(PenaltyEntry::from)
            .collect(),
    }
}

fn skater_name(roster: Option<&Roster>, number: &str) -> Option<String> {
    roster
        .and_then(|roster| roster.skaters.get(number))
        .filter(|name| !name.is_empty())
        .cloned()
}

/// Minimal projection of a stored bout.
#[derive(Debug, Serialize, ToSchema)]
pub struct BoutListItem {
    /// Bout identifier.
    pub id: Uuid,
    /// RFC 3339 time of the latest snapshot.
    pub updated_at: String,
    /// Rosters assigned to both teams.
    pub rosters: TeamRosters,
    /// Coarse progress when the snapshot was taken.
    pub bout_phase: BoutPhase,
    /// Period when the snapshot was taken.
    pub period: u8,
    /// Home points.
    pub home_score: u32,
    /// Away points.
    pub away_score: u32,
}

impl From<BoutListItemEntity> for BoutListItem {
    fn from(entity: BoutListItemEntity) -> Self {
        Self {
            id: entity.id,
            updated_at: format_system_time(entity.updated_at),
            rosters: entity.rosters,
            bout_phase: entity.bout_phase,
            period: entity.period,
            home_score: entity.home_score,
            away_score: entity.away_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::state::{
        command::{BoutRules, Command, CommandProcessor},
        roster::RosterBook,
    };

    fn play(commands: &[Command]) -> (GameState, CommandProcessor) {
        let processor = CommandProcessor::new(BoutRules::default(), Arc::new(RosterBook::new()));
        let mut state = processor.new_bout(TeamRosters::default());
        for command in commands {
            state = processor.apply(command, &state).unwrap();
        }
        (state, processor)
    }

    #[test]
    fn snapshot_deserializes_back_into_state() {
        let (state, processor) = play(&[
            Command::StartPeriod,
            Command::StartJam,
            Command::RecordTrip {
                team: Team::Away,
                points: 3,
            },
        ]);
        let snapshot = BoutSnapshot::new(state.clone(), processor.clock_rules());
        assert_eq!(snapshot.away_total, 3);
        assert_eq!(snapshot.period_remaining_ms, 1_800_000);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["bout_phase"], "in_progress");
        assert_eq!(json["current_jam"]["away"], 3);
        let restored: GameState = serde_json::from_value(json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn jam_sheet_carries_running_totals() {
        let (state, _) = play(&[
            Command::StartPeriod,
            Command::StartJam,
            Command::RecordTrip {
                team: Team::Home,
                points: 4,
            },
            Command::StopJam,
            Command::StartJam,
            Command::RecordTrip {
                team: Team::Home,
                points: 2,
            },
            Command::RecordTrip {
                team: Team::Away,
                points: 1,
            },
        ]);

        let rows = jam_sheet(&state);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, JamStatus::Sealed);
        assert_eq!(rows[1].home.jam_total, 2);
        assert_eq!(rows[1].home.game_total, 6);
        assert_eq!(rows[1].away.game_total, 1);
    }

    #[test]
    fn new_bout_request_validation() {
        let valid = NewBoutRequest {
            home_roster: Some("toasters".into()),
            away_roster: None,
            time_to_derby_seconds: Some(600),
            start_at: None,
        };
        assert!(valid.validate().is_ok());

        let bad_roster = NewBoutRequest {
            home_roster: Some("../secret".into()),
            ..NewBoutRequest::default()
        };
        assert!(bad_roster.validate().is_err());

        let too_long = NewBoutRequest {
            time_to_derby_seconds: Some(86_401),
            ..NewBoutRequest::default()
        };
        assert!(too_long.validate().is_err());
    }

    fn start_at(hour: u8, minute: u8, meridiem: Option<Meridiem>) -> StartAt {
        StartAt {
            hour,
            minute,
            meridiem,
        }
    }

    #[test]
    fn start_at_counts_down_to_the_next_occurrence() {
        let now = Time::from_hms(18, 30, 0).unwrap();
        assert_eq!(start_at(19, 0, None).countdown_from(now), Ok(30 * 60));
        assert_eq!(
            start_at(7, 0, Some(Meridiem::Pm)).countdown_from(now),
            Ok(30 * 60)
        );
        assert_eq!(
            start_at(18, 0, None).countdown_from(now),
            Ok(23 * 3_600 + 30 * 60)
        );
        assert_eq!(start_at(18, 30, None).countdown_from(now), Ok(86_400));
        assert_eq!(
            start_at(12, 0, Some(Meridiem::Am)).countdown_from(now),
            Ok(5 * 3_600 + 30 * 60)
        );

        let just_before = Time::from_hms_milli(18, 59, 59, 500).unwrap();
        assert_eq!(start_at(19, 0, None).countdown_from(just_before), Ok(1));
    }

    #[test]
    fn start_at_rejects_impossible_times() {
        let now = Time::from_hms(12, 0, 0).unwrap();
        for bad in [
            start_at(24, 0, None),
            start_at(10, 60, None),
            start_at(0, 0, Some(Meridiem::Am)),
            start_at(13, 0, Some(Meridiem::Pm)),
        ] {
            let err = bad.countdown_from(now).unwrap_err();
            assert_eq!(err.kind(), "out_of_range_value", "{bad:?}");
        }
    }
}
