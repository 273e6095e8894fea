//! Commands sent by scorekeeping stations and the processor that applies them to a bout.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::{
    budget::{BudgetDecision, BudgetKind, BudgetRules},
    clock::{ClockRules, GameClock},
    game::{GameState, ReviewRecord, Team, TeamRosters},
    penalty::PenaltyCode,
    roster::{MAX_SKATER_NUMBER_LEN, RosterBook},
    score::{JamKey, JamRecord, MAX_TRIP_POINTS},
    state_machine::{
        ActivePhase, ClockEngine, ClockEvent, InvalidTransition, ReviewOutcome, TickOutcome,
    },
};

/// Upper bound for countdowns set by hand (time to derby, intermission).
const MAX_COUNTDOWN_SECONDS: u32 = 24 * 60 * 60;

/// Command accepted by the bout, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Start counting down to the first whistle.
    StartTimeToDerby {
        /// Countdown length.
        seconds: u32,
    },
    /// Start period 1, or period 2 from the intermission.
    StartPeriod,
    /// Start the next jam from a lineup.
    StartJam,
    /// Stop the running jam.
    StopJam,
    /// Officials stop play.
    OfficialTimeout,
    /// `team` calls a timeout.
    TeamTimeout {
        /// Requesting team.
        team: Team,
    },
    /// `team` challenges a ruling.
    OfficialReview {
        /// Requesting team.
        team: Team,
    },
    /// The pending review of `team` is upheld.
    ReviewRetained {
        /// Reviewing team.
        team: Team,
    },
    /// The pending review of `team` is denied.
    ReviewLost {
        /// Reviewing team.
        team: Team,
    },
    /// End the current timeout or review and resume play.
    EndTimeout,
    /// End the current period.
    EndPeriod,
    /// End the bout from the intermission.
    EndGame,
    /// Correct the countdown currently displayed.
    SetTime {
        /// New remaining time.
        seconds: u32,
    },
    /// Correct the latest trip of `team`.
    ScoreAdj {
        /// Team to correct.
        team: Team,
        /// Points to add (negative to remove).
        delta: i32,
    },
    /// Record a scoring trip.
    RecordTrip {
        /// Scoring team.
        team: Team,
        /// Points earned on the trip.
        points: i32,
    },
    /// The jammer hands the star to the pivot.
    MarkStarPass {
        /// Team passing the star.
        team: Team,
    },
    /// Mark or clear lead jammer.
    SetLead {
        /// Team to update.
        team: Team,
        /// New flag value.
        value: bool,
    },
    /// Mark or clear lost lead. Marking it clears lead.
    SetLost {
        /// Team to update.
        team: Team,
        /// New flag value.
        value: bool,
    },
    /// Mark or clear the jammer calling the jam.
    SetCall {
        /// Team to update.
        team: Team,
        /// New flag value.
        value: bool,
    },
    /// Mark or clear an injury stoppage.
    SetInjury {
        /// Team to update.
        team: Team,
        /// New flag value.
        value: bool,
    },
    /// Name the jammer of the current jam.
    SetJammer {
        /// Team to update.
        team: Team,
        /// Skater number, `null` to clear.
        skater: Option<String>,
    },
    /// Name the pivot of the current jam.
    SetPivot {
        /// Team to update.
        team: Team,
        /// Skater number, `null` to clear.
        skater: Option<String>,
    },
    /// Assess a penalty.
    RecordPenalty {
        /// Team of the skater.
        team: Team,
        /// Skater number.
        skater: String,
        /// Single-letter penalty code.
        code: String,
    },
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::StartTimeToDerby { .. } => "start_time_to_derby",
            Command::StartPeriod => "start_period",
            Command::StartJam => "start_jam",
            Command::StopJam => "stop_jam",
            Command::OfficialTimeout => "official_timeout",
            Command::TeamTimeout { .. } => "team_timeout",
            Command::OfficialReview { .. } => "official_review",
            Command::ReviewRetained { .. } => "review_retained",
            Command::ReviewLost { .. } => "review_lost",
            Command::EndTimeout => "end_timeout",
            Command::EndPeriod => "end_period",
            Command::EndGame => "end_game",
            Command::SetTime { .. } => "set_time",
            Command::ScoreAdj { .. } => "score_adj",
            Command::RecordTrip { .. } => "record_trip",
            Command::MarkStarPass { .. } => "mark_star_pass",
            Command::SetLead { .. } => "set_lead",
            Command::SetLost { .. } => "set_lost",
            Command::SetCall { .. } => "set_call",
            Command::SetInjury { .. } => "set_injury",
            Command::SetJammer { .. } => "set_jammer",
            Command::SetPivot { .. } => "set_pivot",
            Command::RecordPenalty { .. } => "record_penalty",
        }
    }
}

/// Reasons a command is rejected. A rejected command leaves the bout untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The current phase does not allow the command.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// The team has no timeout or review left.
    #[error("{team} has no {kind} remaining")]
    BudgetExhausted {
        /// Requesting team.
        team: Team,
        /// Allowance that ran out.
        kind: BudgetKind,
    },
    /// The team already has the maximum number of trips in this jam.
    #[error("{team} already recorded {limit} trips in {jam}")]
    TripLimitExceeded {
        /// Scoring team.
        team: Team,
        /// Jam concerned.
        jam: JamKey,
        /// Trip limit.
        limit: usize,
    },
    /// The star was already passed in this jam.
    #[error("{team} already passed the star in {jam}")]
    AlreadyStarPassed {
        /// Team concerned.
        team: Team,
        /// Jam concerned.
        jam: JamKey,
    },
    /// No review of this team awaits a ruling.
    #[error("no official review pending for {team}")]
    NoPendingReview {
        /// Team named in the command.
        team: Team,
    },
    /// A value is malformed or outside its allowed range.
    #[error("{field} out of range: {reason}")]
    OutOfRangeValue {
        /// Offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// Unknown jam, roster, or skater.
    #[error("not found: {0}")]
    NotFound(String),
}

impl CommandError {
    /// Shorthand for [`CommandError::OutOfRangeValue`].
    pub fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        CommandError::OutOfRangeValue {
            field,
            reason: reason.into(),
        }
    }

    /// Stable snake-case identifier reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::InvalidTransition(_) => "invalid_transition",
            CommandError::BudgetExhausted { .. } => "budget_exhausted",
            CommandError::TripLimitExceeded { .. } => "trip_limit_exceeded",
            CommandError::AlreadyStarPassed { .. } => "already_star_passed",
            CommandError::NoPendingReview { .. } => "no_pending_review",
            CommandError::OutOfRangeValue { .. } => "out_of_range_value",
            CommandError::NotFound(_) => "not_found",
        }
    }
}

/// Rule set a bout is played under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoutRules {
    /// Phase and period durations.
    pub clock: ClockRules,
    /// Timeout and review allowances.
    pub budget: BudgetRules,
}

/// Validates commands against a bout and produces the next state.
#[derive(Debug)]
pub struct CommandProcessor {
    engine: ClockEngine,
    budget: BudgetRules,
    rosters: Arc<RosterBook>,
}

impl CommandProcessor {
    /// Processor applying `rules`, checking skaters against `rosters`.
    pub fn new(rules: BoutRules, rosters: Arc<RosterBook>) -> Self {
        Self {
            engine: ClockEngine::new(rules.clock),
            budget: rules.budget,
            rosters,
        }
    }

    /// Phase and period durations in use.
    pub fn clock_rules(&self) -> &ClockRules {
        self.engine.rules()
    }

    /// Rosters skaters are checked against.
    pub fn rosters(&self) -> &RosterBook {
        &self.rosters
    }

    /// Fresh bout with the given roster assignment.
    pub fn new_bout(&self, rosters: TeamRosters) -> GameState {
        GameState::new(rosters, &self.budget)
    }

    /// Apply `command` to a copy of `current`.
    ///
    /// Either the returned state carries every effect of the command, or an error is returned
    /// and `current` is the state to keep.
    pub fn apply(&self, command: &Command, current: &GameState) -> Result<GameState, CommandError> {
        let mut next = current.clone();
        self.execute(command, &mut next)?;
        next.version += 1;
        Ok(next)
    }

    /// Run the clocks for `delta`. Returns `true` when the jam cap stopped the jam.
    pub fn advance(&self, state: &mut GameState, delta: Duration) -> bool {
        if delta.is_zero() {
            return false;
        }

        match self
            .engine
            .advance(&mut state.phase, &mut state.game_clock, delta)
        {
            TickOutcome::Advanced => false,
            TickOutcome::JamExpired { leftover } => {
                state.jams.end_running();
                state.phase = self.engine.lineup_after_jam(leftover);
                state.version += 1;
                true
            }
        }
    }

    fn execute(&self, command: &Command, state: &mut GameState) -> Result<(), CommandError> {
        match command {
            Command::StartTimeToDerby { seconds } => {
                let countdown = countdown_value(*seconds)?;
                if countdown.is_zero() {
                    return Err(CommandError::out_of_range(
                        "seconds",
                        "time to derby must be at least one second",
                    ));
                }
                self.transition(state, ClockEvent::StartTimeToDerby(countdown))
            }
            Command::StartPeriod => {
                self.transition(state, ClockEvent::StartPeriod)?;
                state.jams.seal_current();
                state.game_clock = GameClock::for_period(state.game_clock.period + 1);
                state.budgets.reset(&self.budget);
                Ok(())
            }
            Command::StartJam => {
                let period = state.game_clock.period;
                let number = state.jams.next_number(period);
                self.transition(state, ClockEvent::StartJam { number })?;
                state.jams.open(JamKey { period, number });
                Ok(())
            }
            Command::StopJam => {
                self.transition(state, ClockEvent::StopJam)?;
                state.jams.end_running();
                Ok(())
            }
            Command::OfficialTimeout => self.transition(state, ClockEvent::OfficialTimeout),
            Command::TeamTimeout { team } => {
                let next = self.next_phase(state, ClockEvent::TeamTimeout(*team))?;
                self.spend(state, *team, BudgetKind::Timeout)?;
                state.phase = next;
                Ok(())
            }
            Command::OfficialReview { team } => {
                let next = self.next_phase(state, ClockEvent::OfficialReview(*team))?;
                self.spend(state, *team, BudgetKind::Review)?;
                state.reviews.push(ReviewRecord {
                    team: *team,
                    jam: state.jams.current().map(|jam| jam.key),
                    outcome: ReviewOutcome::Pending,
                });
                state.phase = next;
                Ok(())
            }
            Command::ReviewRetained { team } => {
                self.close_review(state, *team, ReviewOutcome::Retained)
            }
            Command::ReviewLost { team } => self.close_review(state, *team, ReviewOutcome::Lost),
            Command::EndTimeout => self.transition(state, ClockEvent::EndTimeout),
            Command::EndPeriod => {
                self.transition(state, ClockEvent::EndPeriod)?;
                state.jams.end_running();
                state.jams.seal_current();
                Ok(())
            }
            Command::EndGame => {
                self.transition(state, ClockEvent::EndGame)?;
                state.jams.seal_current();
                Ok(())
            }
            Command::SetTime { seconds } => self.set_time(state, *seconds),
            Command::ScoreAdj { team, delta } => {
                let delta = adjustment(*delta)?;
                amendable_jam(state, "score_adj")?.adjust_last_trip(*team, delta)
            }
            Command::RecordTrip { team, points } => {
                let points = trip_points(*points)?;
                running_jam(state, "record_trip")?.record_trip(*team, points)
            }
            Command::MarkStarPass { team } => {
                running_jam(state, "mark_star_pass")?.mark_star_pass(*team)
            }
            Command::SetLead { team, value } => {
                amendable_jam(state, "set_lead")?.team_mut(*team).lead = *value;
                Ok(())
            }
            Command::SetLost { team, value } => {
                let record = amendable_jam(state, "set_lost")?.team_mut(*team);
                record.lost = *value;
                if *value {
                    record.lead = false;
                }
                Ok(())
            }
            Command::SetCall { team, value } => {
                amendable_jam(state, "set_call")?.team_mut(*team).call = *value;
                Ok(())
            }
            Command::SetInjury { team, value } => {
                amendable_jam(state, "set_injury")?.team_mut(*team).injury = *value;
                Ok(())
            }
            Command::SetJammer { team, skater } => {
                let skater = self.optional_skater(state, *team, skater.as_deref())?;
                amendable_jam(state, "set_jammer")?.team_mut(*team).jammer = skater;
                Ok(())
            }
            Command::SetPivot { team, skater } => {
                let skater = self.optional_skater(state, *team, skater.as_deref())?;
                amendable_jam(state, "set_pivot")?.team_mut(*team).pivot = skater;
                Ok(())
            }
            Command::RecordPenalty {
                team,
                skater,
                code,
            } => {
                let code: PenaltyCode = code.parse()?;
                let skater = self.checked_skater(state, *team, skater)?;
                let jam = state
                    .jams
                    .current()
                    .map(|jam| jam.key)
                    .ok_or_else(|| CommandError::NotFound("no jam has started yet".into()))?;
                state.penalties.record(*team, skater, jam, code);
                Ok(())
            }
        }
    }

    fn next_phase(&self, state: &GameState, event: ClockEvent) -> Result<ActivePhase, CommandError> {
        self.engine
            .transition(&state.phase, &state.game_clock, event)
            .map_err(Into::into)
    }

    fn transition(&self, state: &mut GameState, event: ClockEvent) -> Result<(), CommandError> {
        state.phase = self.next_phase(state, event)?;
        Ok(())
    }

    fn spend(&self, state: &mut GameState, team: Team, kind: BudgetKind) -> Result<(), CommandError> {
        match state.budgets.request(team, kind) {
            BudgetDecision::Granted => {
                state.budgets.consume(team, kind);
                Ok(())
            }
            BudgetDecision::Denied { .. } => Err(CommandError::BudgetExhausted { team, kind }),
        }
    }

    fn close_review(
        &self,
        state: &mut GameState,
        team: Team,
        outcome: ReviewOutcome,
    ) -> Result<(), CommandError> {
        let pending = matches!(
            state.phase,
            ActivePhase::OfficialReview {
                team: reviewing,
                outcome: ReviewOutcome::Pending,
                ..
            } if reviewing == team
        );
        if !pending {
            return Err(CommandError::NoPendingReview { team });
        }

        self.transition(state, ClockEvent::CloseReview { team, outcome })?;
        if let Some(review) = state
            .reviews
            .iter_mut()
            .rev()
            .find(|review| review.team == team && review.outcome == ReviewOutcome::Pending)
        {
            review.outcome = outcome;
        }
        if outcome == ReviewOutcome::Retained && self.budget.retained_review_restores_credit {
            state.budgets.restore(team, BudgetKind::Review, &self.budget);
        }
        Ok(())
    }

    fn set_time(&self, state: &mut GameState, seconds: u32) -> Result<(), CommandError> {
        let period_length = self.engine.rules().period;
        match &mut state.phase {
            ActivePhase::TimeToDerby { clock } | ActivePhase::Intermission { clock } => {
                clock.value = countdown_value(seconds)?;
                Ok(())
            }
            ActivePhase::Lineup { .. }
            | ActivePhase::OfficialTimeout { .. }
            | ActivePhase::TeamTimeout { .. }
            | ActivePhase::OfficialReview { .. } => {
                let remaining = Duration::from_secs(u64::from(seconds));
                if remaining > period_length {
                    return Err(CommandError::out_of_range(
                        "seconds",
                        format!(
                            "period clock cannot exceed {} seconds, got {seconds}",
                            period_length.as_secs()
                        ),
                    ));
                }
                state.game_clock.set_remaining(remaining, period_length);
                Ok(())
            }
            other => Err(InvalidTransition::new(other.kind(), "set_time").into()),
        }
    }

    fn optional_skater(
        &self,
        state: &GameState,
        team: Team,
        skater: Option<&str>,
    ) -> Result<Option<String>, CommandError> {
        skater
            .map(|number| self.checked_skater(state, team, number))
            .transpose()
    }

    /// Validate a skater number, and check it against the team roster when one is assigned.
    fn checked_skater(
        &self,
        state: &GameState,
        team: Team,
        number: &str,
    ) -> Result<String, CommandError> {
        let number = number.trim();
        if number.is_empty() || number.chars().count() > MAX_SKATER_NUMBER_LEN {
            return Err(CommandError::out_of_range(
                "skater",
                format!("skater numbers have 1 to {MAX_SKATER_NUMBER_LEN} characters, got {number:?}"),
            ));
        }

        if let Some(roster) = state.rosters.get(team) {
            match self.rosters.has_skater(roster, number) {
                Some(true) => {}
                Some(false) => {
                    return Err(CommandError::NotFound(format!(
                        "skater {number} is not on the {team} roster `{roster}`"
                    )));
                }
                None => {
                    return Err(CommandError::NotFound(format!(
                        "roster `{roster}` is not loaded"
                    )));
                }
            }
        }

        Ok(number.to_owned())
    }
}

fn countdown_value(seconds: u32) -> Result<Duration, CommandError> {
    if seconds > MAX_COUNTDOWN_SECONDS {
        return Err(CommandError::out_of_range(
            "seconds",
            format!("countdowns are limited to {MAX_COUNTDOWN_SECONDS} seconds, got {seconds}"),
        ));
    }
    Ok(Duration::from_secs(u64::from(seconds)))
}

/// Points of one scoring trip, 0 to [`MAX_TRIP_POINTS`].
fn trip_points(points: i32) -> Result<u8, CommandError> {
    u8::try_from(points)
        .ok()
        .filter(|points| *points <= MAX_TRIP_POINTS)
        .ok_or_else(|| {
            CommandError::out_of_range(
                "points",
                format!("a trip is worth 0 to {MAX_TRIP_POINTS} points, got {points}"),
            )
        })
}

/// Correction of one trip, at most [`MAX_TRIP_POINTS`] either way.
fn adjustment(delta: i32) -> Result<i8, CommandError> {
    let limit = i32::from(MAX_TRIP_POINTS);
    i8::try_from(delta)
        .ok()
        .filter(|_| (-limit..=limit).contains(&delta))
        .ok_or_else(|| {
            CommandError::out_of_range(
                "delta",
                format!("adjustments range from -{limit} to {limit}, got {delta}"),
            )
        })
}

fn running_jam<'a>(
    state: &'a mut GameState,
    action: &'static str,
) -> Result<&'a mut JamRecord, CommandError> {
    let from = state.phase.kind();
    if !matches!(state.phase, ActivePhase::Jam { .. }) {
        return Err(InvalidTransition::new(from, action).into());
    }
    state
        .jams
        .running_mut()
        .ok_or_else(|| InvalidTransition::new(from, action).into())
}

fn amendable_jam<'a>(
    state: &'a mut GameState,
    action: &'static str,
) -> Result<&'a mut JamRecord, CommandError> {
    let from = state.phase.kind();
    let played = state.jams.current().is_some();
    match state.jams.amendable_mut() {
        Some(jam) => Ok(jam),
        None if played => Err(InvalidTransition::new(from, action).into()),
        None => Err(CommandError::NotFound("no jam has been played yet".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        penalty::PenaltyCode, roster::Roster, score::JamStatus, state_machine::PhaseKind,
    };

    fn processor() -> CommandProcessor {
        CommandProcessor::new(BoutRules::default(), Arc::new(RosterBook::new()))
    }

    fn run(processor: &CommandProcessor, state: GameState, commands: &[Command]) -> GameState {
        commands.iter().fold(state, |state, command| {
            processor
                .apply(command, &state)
                .unwrap_or_else(|err| panic!("{} rejected: {err}", command.name()))
        })
    }

    fn in_lineup(processor: &CommandProcessor) -> GameState {
        let state = processor.new_bout(TeamRosters::default());
        run(processor, state, &[Command::StartPeriod])
    }

    #[test]
    fn jam_scoring_and_stop() {
        let processor = processor();
        let state = run(&processor, in_lineup(&processor), &[Command::StartJam]);
        match state.phase {
            ActivePhase::Jam { number, clock } => {
                assert_eq!(number, 1);
                assert!(clock.running);
            }
            other => panic!("unexpected phase {other:?}"),
        }

        let state = run(
            &processor,
            state,
            &[
                Command::RecordTrip {
                    team: Team::Home,
                    points: 4,
                },
                Command::RecordTrip {
                    team: Team::Home,
                    points: 3,
                },
            ],
        );
        assert_eq!(state.running_total(Team::Home), 7);

        let state = run(&processor, state, &[Command::StopJam]);
        assert_eq!(state.phase.kind(), PhaseKind::Lineup);
        let jam = state.jams.current().unwrap();
        assert!(jam.is_closed());
        assert_eq!(
            state.jams.total(Team::Home, JamKey { period: 1, number: 1 }),
            Some(7)
        );
    }

    #[test]
    fn exhausted_timeout_leaves_state_unchanged() {
        let processor = processor();
        let mut state = in_lineup(&processor);
        state.budgets.home.timeouts_remaining = 0;

        let err = processor
            .apply(&Command::TeamTimeout { team: Team::Home }, &state)
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::BudgetExhausted {
                team: Team::Home,
                kind: BudgetKind::Timeout
            }
        );
        assert_eq!(err.kind(), "budget_exhausted");
        assert_eq!(state.phase.kind(), PhaseKind::Lineup);
    }

    #[test]
    fn lost_review_costs_exactly_one_credit() {
        let processor = processor();
        let state = run(
            &processor,
            in_lineup(&processor),
            &[Command::OfficialReview { team: Team::Away }],
        );
        match state.phase {
            ActivePhase::OfficialReview { team, outcome, .. } => {
                assert_eq!(team, Team::Away);
                assert_eq!(outcome, ReviewOutcome::Pending);
            }
            other => panic!("unexpected phase {other:?}"),
        }

        let state = run(&processor, state, &[Command::ReviewLost { team: Team::Away }]);
        assert_eq!(state.phase.kind(), PhaseKind::Lineup);
        assert_eq!(state.budgets.away.reviews_remaining, 1);
        assert_eq!(state.reviews.len(), 1);
        assert_eq!(state.reviews[0].outcome, ReviewOutcome::Lost);
    }

    #[test]
    fn timeout_during_jam_restores_exact_clock() {
        let processor = processor();
        let mut state = run(&processor, in_lineup(&processor), &[Command::StartJam]);
        processor.advance(&mut state, Duration::from_millis(33_400));
        let frozen = state.phase.clock().copied().unwrap();

        let mut state = run(&processor, state, &[Command::OfficialTimeout]);
        assert_eq!(state.phase.kind(), PhaseKind::OfficialTimeout);
        processor.advance(&mut state, Duration::from_secs(75));

        let state = run(&processor, state, &[Command::EndTimeout]);
        assert_eq!(
            state.phase,
            ActivePhase::Jam {
                number: 1,
                clock: frozen
            }
        );
        assert_eq!(state.game_clock.elapsed, Duration::from_millis(33_400));
    }

    #[test]
    fn penalties_attach_to_current_jam() {
        let processor = processor();
        let mut state = in_lineup(&processor);
        for _ in 0..2 {
            state = run(&processor, state, &[Command::StartJam, Command::StopJam]);
        }
        state = run(&processor, state, &[Command::StartJam]);

        let state = run(
            &processor,
            state,
            &[
                Command::RecordPenalty {
                    team: Team::Home,
                    skater: "12".into(),
                    code: "X".into(),
                },
                Command::RecordPenalty {
                    team: Team::Home,
                    skater: "12".into(),
                    code: "F".into(),
                },
            ],
        );

        let penalties: Vec<_> = state.penalties.penalties_for(Team::Home, "12").collect();
        assert_eq!(penalties.len(), 2);
        assert_eq!(penalties[0].jam, 3);
        assert_eq!(penalties[0].code, PenaltyCode::CutTrack);
        assert_eq!(penalties[1].code, PenaltyCode::Forearms);
    }

    #[test]
    fn lineup_penalty_goes_to_the_jam_just_played() {
        let processor = processor();
        let state = run(
            &processor,
            in_lineup(&processor),
            &[
                Command::StartJam,
                Command::StopJam,
                Command::RecordPenalty {
                    team: Team::Away,
                    skater: "7".into(),
                    code: "g".into(),
                },
            ],
        );
        let record = &state.penalties.records()[0];
        assert_eq!(record.jam_key(), JamKey { period: 1, number: 1 });
        assert_eq!(record.code, PenaltyCode::Misconduct);
    }

    #[test]
    fn penalty_before_any_jam_is_not_found() {
        let processor = processor();
        let state = in_lineup(&processor);
        let err = processor
            .apply(
                &Command::RecordPenalty {
                    team: Team::Home,
                    skater: "12".into(),
                    code: "X".into(),
                },
                &state,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn rejected_commands_never_mutate() {
        let processor = processor();
        let state = run(
            &processor,
            in_lineup(&processor),
            &[
                Command::StartJam,
                Command::RecordTrip {
                    team: Team::Away,
                    points: 2,
                },
                Command::MarkStarPass { team: Team::Away },
            ],
        );

        let rejected = [
            Command::StartJam,
            Command::StartPeriod,
            Command::TeamTimeout { team: Team::Home },
            Command::ReviewRetained { team: Team::Home },
            Command::EndTimeout,
            Command::EndGame,
            Command::SetTime { seconds: 60 },
            Command::RecordTrip {
                team: Team::Away,
                points: 6,
            },
            Command::MarkStarPass { team: Team::Away },
            Command::ScoreAdj {
                team: Team::Home,
                delta: 9,
            },
            Command::RecordPenalty {
                team: Team::Home,
                skater: "12".into(),
                code: "Q".into(),
            },
            Command::RecordPenalty {
                team: Team::Home,
                skater: "12345".into(),
                code: "X".into(),
            },
        ];

        for command in rejected {
            let before = state.clone();
            assert!(
                processor.apply(&command, &state).is_err(),
                "{} should be rejected",
                command.name()
            );
            assert_eq!(state, before);
        }
    }

    #[test]
    fn repeated_start_and_stop_are_rejected() {
        let processor = processor();
        let state = run(&processor, in_lineup(&processor), &[Command::StartJam]);
        let err = processor.apply(&Command::StartJam, &state).unwrap_err();
        assert!(matches!(err, CommandError::InvalidTransition(_)));

        let state = run(&processor, state, &[Command::StopJam]);
        let err = processor.apply(&Command::StopJam, &state).unwrap_err();
        assert!(matches!(err, CommandError::InvalidTransition(_)));
        assert_eq!(state.jams.jams().len(), 1);
    }

    #[test]
    fn review_for_other_team_is_not_pending() {
        let processor = processor();
        let state = run(
            &processor,
            in_lineup(&processor),
            &[Command::OfficialReview { team: Team::Home }],
        );
        let err = processor
            .apply(&Command::ReviewLost { team: Team::Away }, &state)
            .unwrap_err();
        assert_eq!(err, CommandError::NoPendingReview { team: Team::Away });
    }

    #[test]
    fn retained_review_restores_credit_when_configured() {
        let rules = BoutRules {
            budget: BudgetRules {
                retained_review_restores_credit: true,
                ..BudgetRules::default()
            },
            ..BoutRules::default()
        };
        let processor = CommandProcessor::new(rules, Arc::new(RosterBook::new()));
        let state = run(
            &processor,
            in_lineup(&processor),
            &[
                Command::OfficialReview { team: Team::Home },
                Command::ReviewRetained { team: Team::Home },
            ],
        );
        assert_eq!(state.budgets.home.reviews_remaining, 2);

        let default_processor = self::processor();
        let state = run(
            &default_processor,
            in_lineup(&default_processor),
            &[
                Command::OfficialReview { team: Team::Home },
                Command::ReviewRetained { team: Team::Home },
            ],
        );
        assert_eq!(state.budgets.home.reviews_remaining, 1);
    }

    #[test]
    fn jam_cap_stops_the_jam_on_tick() {
        let processor = processor();
        let mut state = run(
            &processor,
            in_lineup(&processor),
            &[
                Command::StartJam,
                Command::RecordTrip {
                    team: Team::Home,
                    points: 4,
                },
            ],
        );
        let version = state.version;

        assert!(!processor.advance(&mut state, Duration::from_secs(119)));
        assert!(processor.advance(&mut state, Duration::from_millis(1_500)));
        assert_eq!(state.version, version + 1);
        assert_eq!(state.jams.current().unwrap().status, JamStatus::Ended);
        assert_eq!(
            state.phase.clock().unwrap().value,
            Duration::from_millis(29_500)
        );

        let err = processor.apply(&Command::StopJam, &state).unwrap_err();
        assert!(matches!(err, CommandError::InvalidTransition(_)));
    }

    #[test]
    fn score_adjustment_works_during_following_lineup() {
        let processor = processor();
        let state = run(
            &processor,
            in_lineup(&processor),
            &[
                Command::StartJam,
                Command::RecordTrip {
                    team: Team::Home,
                    points: 3,
                },
                Command::StopJam,
                Command::ScoreAdj {
                    team: Team::Home,
                    delta: 1,
                },
                Command::SetLead {
                    team: Team::Home,
                    value: true,
                },
                Command::SetCall {
                    team: Team::Home,
                    value: true,
                },
            ],
        );
        let jam = state.jams.current().unwrap();
        assert_eq!(jam.home.jammer_points, vec![4]);
        assert!(jam.home.lead && jam.home.call);

        let state = run(
            &processor,
            state,
            &[Command::SetLost {
                team: Team::Home,
                value: true,
            }],
        );
        let jam = state.jams.current().unwrap();
        assert!(jam.home.lost);
        assert!(!jam.home.lead);
    }

    #[test]
    fn period_change_seals_jams_and_refills_budgets() {
        let processor = processor();
        let state = run(
            &processor,
            in_lineup(&processor),
            &[
                Command::TeamTimeout { team: Team::Away },
                Command::EndTimeout,
                Command::StartJam,
                Command::EndPeriod,
            ],
        );
        assert_eq!(state.phase.kind(), PhaseKind::Intermission);
        assert_eq!(state.jams.current().unwrap().status, JamStatus::Sealed);
        assert_eq!(state.budgets.away.timeouts_remaining, 2);
        let err = processor
            .apply(
                &Command::ScoreAdj {
                    team: Team::Home,
                    delta: 1,
                },
                &state,
            )
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidTransition(_)));

        let state = run(&processor, state, &[Command::StartPeriod, Command::StartJam]);
        assert_eq!(state.game_clock.period, 2);
        assert_eq!(state.budgets.away.timeouts_remaining, 3);
        assert_eq!(
            state.jams.current().unwrap().key,
            JamKey { period: 2, number: 1 }
        );

        let state = run(&processor, state, &[Command::EndPeriod, Command::EndGame]);
        assert_eq!(state.phase, ActivePhase::Final);
        let err = processor.apply(&Command::StartPeriod, &state).unwrap_err();
        assert!(matches!(err, CommandError::InvalidTransition(_)));
    }

    #[test]
    fn set_time_targets_displayed_countdown() {
        let processor = processor();
        let state = run(
            &processor,
            processor.new_bout(TeamRosters::default()),
            &[
                Command::StartTimeToDerby { seconds: 600 },
                Command::SetTime { seconds: 300 },
            ],
        );
        assert_eq!(
            state.phase.clock().unwrap().value,
            Duration::from_secs(300)
        );

        let state = run(
            &processor,
            state,
            &[Command::StartPeriod, Command::SetTime { seconds: 1_200 }],
        );
        assert_eq!(
            state.period_remaining(processor.clock_rules()),
            Duration::from_secs(1_200)
        );

        let err = processor
            .apply(&Command::SetTime { seconds: 1_801 }, &state)
            .unwrap_err();
        assert_eq!(err.kind(), "out_of_range_value");
    }

    #[test]
    fn set_time_during_intermission_edits_the_intermission_clock() {
        let processor = processor();
        let state = run(
            &processor,
            in_lineup(&processor),
            &[Command::StartJam, Command::EndPeriod],
        );
        let period_left = state.period_remaining(processor.clock_rules());

        let state = run(&processor, state, &[Command::SetTime { seconds: 600 }]);
        assert_eq!(state.phase.kind(), PhaseKind::Intermission);
        assert_eq!(
            state.phase.clock().unwrap().value,
            Duration::from_secs(600)
        );
        assert_eq!(state.period_remaining(processor.clock_rules()), period_left);

        let jam = run(&processor, in_lineup(&processor), &[Command::StartJam]);
        let err = processor
            .apply(&Command::SetTime { seconds: 600 }, &jam)
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidTransition(_)));
    }

    #[test]
    fn suspended_jam_takes_no_trips() {
        let processor = processor();
        let state = run(
            &processor,
            in_lineup(&processor),
            &[Command::StartJam, Command::OfficialTimeout],
        );

        for command in [
            Command::RecordTrip {
                team: Team::Home,
                points: 4,
            },
            Command::MarkStarPass { team: Team::Home },
        ] {
            let err = processor.apply(&command, &state).unwrap_err();
            assert_eq!(err.kind(), "invalid_transition");
        }
        assert_eq!(state.running_total(Team::Home), 0);

        let state = run(
            &processor,
            state,
            &[
                Command::EndTimeout,
                Command::RecordTrip {
                    team: Team::Home,
                    points: 4,
                },
            ],
        );
        assert_eq!(state.running_total(Team::Home), 4);
    }

    #[test]
    fn wire_points_outside_a_trip_are_out_of_range() {
        let processor = processor();
        let state = run(
            &processor,
            in_lineup(&processor),
            &[
                Command::StartJam,
                Command::RecordTrip {
                    team: Team::Home,
                    points: 2,
                },
            ],
        );

        for raw in [
            r#"{"type": "record_trip", "team": "home", "points": 300}"#,
            r#"{"type": "record_trip", "team": "home", "points": -1}"#,
            r#"{"type": "score_adj", "team": "home", "delta": -200}"#,
            r#"{"type": "score_adj", "team": "home", "delta": 6}"#,
        ] {
            let command: Command = serde_json::from_str(raw).unwrap();
            let err = processor.apply(&command, &state).unwrap_err();
            assert_eq!(err.kind(), "out_of_range_value", "{raw}");
        }

        let state = run(
            &processor,
            state,
            &[Command::ScoreAdj {
                team: Team::Home,
                delta: -2,
            }],
        );
        assert_eq!(state.running_total(Team::Home), 0);
    }

    #[test]
    fn team_timeout_turned_into_review_spends_both_credits() {
        let processor = processor();
        let state = run(
            &processor,
            in_lineup(&processor),
            &[
                Command::TeamTimeout { team: Team::Home },
                Command::OfficialReview { team: Team::Home },
            ],
        );
        assert_eq!(state.phase.kind(), PhaseKind::OfficialReview);
        assert_eq!(state.budgets.home.timeouts_remaining, 2);
        assert_eq!(state.budgets.home.reviews_remaining, 1);
        assert_eq!(state.reviews.len(), 1);
        assert_eq!(state.reviews[0].team, Team::Home);
        assert_eq!(state.reviews[0].outcome, ReviewOutcome::Pending);

        let state = run(&processor, state, &[Command::EndTimeout]);
        assert_eq!(state.phase.kind(), PhaseKind::Lineup);
        assert_eq!(state.reviews[0].outcome, ReviewOutcome::Pending);
        assert_eq!(state.budgets.home.reviews_remaining, 1);
        let err = processor
            .apply(&Command::ReviewRetained { team: Team::Home }, &state)
            .unwrap_err();
        assert_eq!(err, CommandError::NoPendingReview { team: Team::Home });
    }

    #[test]
    fn roster_membership_is_enforced() {
        let rosters = Arc::new(RosterBook::new());
        rosters.insert(Roster::parse("toasters", "Toaster City\n12\tBob Rodney\n").unwrap());
        let processor = CommandProcessor::new(BoutRules::default(), rosters);
        let state = processor.new_bout(TeamRosters {
            home: Some("toasters".into()),
            away: None,
        });
        let state = run(
            &processor,
            state,
            &[
                Command::StartPeriod,
                Command::StartJam,
                Command::SetJammer {
                    team: Team::Home,
                    skater: Some("12".into()),
                },
                Command::SetJammer {
                    team: Team::Away,
                    skater: Some("999".into()),
                },
            ],
        );
        assert_eq!(state.jams.current().unwrap().home.jammer.as_deref(), Some("12"));

        let err = processor
            .apply(
                &Command::RecordPenalty {
                    team: Team::Home,
                    skater: "34".into(),
                    code: "B".into(),
                },
                &state,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn serialized_state_round_trips() {
        let processor = processor();
        let mut state = run(
            &processor,
            in_lineup(&processor),
            &[
                Command::StartJam,
                Command::RecordTrip {
                    team: Team::Home,
                    points: 4,
                },
                Command::RecordPenalty {
                    team: Team::Away,
                    skater: "8".into(),
                    code: "C".into(),
                },
                Command::OfficialTimeout,
            ],
        );
        processor.advance(&mut state, Duration::from_millis(1_234));

        let json = serde_json::to_string(&state).unwrap();
        let back: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }

    #[test]
    fn commands_use_type_tag() {
        let command: Command =
            serde_json::from_str(r#"{"type": "record_trip", "team": "home", "points": 4}"#)
                .unwrap();
        assert_eq!(
            command,
            Command::RecordTrip {
                team: Team::Home,
                points: 4
            }
        );
        let command: Command = serde_json::from_str(r#"{"type": "start_jam"}"#).unwrap();
        assert_eq!(command, Command::StartJam);
    }
}
