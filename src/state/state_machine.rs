use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::{
    clock::{Clock, ClockRules, GameClock, PERIODS_PER_BOUT},
    game::Team,
};

/// Result of an official review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// Officials have not ruled yet.
    Pending,
    /// The challenge succeeded.
    Retained,
    /// The challenge failed.
    Lost,
}

/// Phase frozen underneath a timeout or review, restored unchanged when it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuspendedPhase {
    /// Interrupted lineup.
    Lineup {
        /// Frozen lineup clock.
        clock: Clock,
    },
    /// Interrupted jam.
    Jam {
        /// Jam number within the period.
        number: u16,
        /// Frozen jam clock.
        clock: Clock,
    },
}

impl SuspendedPhase {
    /// Phase that becomes active again, with its clock running.
    pub fn resume(self) -> ActivePhase {
        match self {
            SuspendedPhase::Lineup { clock } => ActivePhase::Lineup {
                clock: clock.resumed(),
            },
            SuspendedPhase::Jam { number, clock } => ActivePhase::Jam {
                number,
                clock: clock.resumed(),
            },
        }
    }
}

/// The single timed phase the bout is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivePhase {
    /// Nothing started yet.
    PreGame,
    /// Countdown to the first whistle.
    TimeToDerby {
        /// Time left before the bout.
        clock: Clock,
    },
    /// Between jams.
    Lineup {
        /// Lineup countdown.
        clock: Clock,
    },
    /// Jam in progress.
    Jam {
        /// Jam number within the period.
        number: u16,
        /// Time left before the jam cap.
        clock: Clock,
    },
    /// Officials stopped play.
    OfficialTimeout {
        /// Time spent in the timeout.
        clock: Clock,
        /// Phase restored when the timeout ends.
        suspended: SuspendedPhase,
    },
    /// A team called a timeout.
    TeamTimeout {
        /// Team that called it.
        team: Team,
        /// Time left in the timeout.
        clock: Clock,
        /// Phase restored when the timeout ends.
        suspended: SuspendedPhase,
    },
    /// A team challenged a ruling.
    OfficialReview {
        /// Team that asked for the review.
        team: Team,
        /// Ruling so far.
        outcome: ReviewOutcome,
        /// Time spent in the review.
        clock: Clock,
        /// Phase restored when the review ends.
        suspended: SuspendedPhase,
    },
    /// Between periods, or after the last period.
    Intermission {
        /// Time left in the intermission.
        clock: Clock,
    },
    /// Bout over.
    Final,
}

/// Fieldless discriminant of [`ActivePhase`], used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// See [`ActivePhase::PreGame`].
    PreGame,
    /// See [`ActivePhase::TimeToDerby`].
    TimeToDerby,
    /// See [`ActivePhase::Lineup`].
    Lineup,
    /// See [`ActivePhase::Jam`].
    Jam,
    /// See [`ActivePhase::OfficialTimeout`].
    OfficialTimeout,
    /// See [`ActivePhase::TeamTimeout`].
    TeamTimeout,
    /// See [`ActivePhase::OfficialReview`].
    OfficialReview,
    /// See [`ActivePhase::Intermission`].
    Intermission,
    /// See [`ActivePhase::Final`].
    Final,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseKind::PreGame => "pre_game",
            PhaseKind::TimeToDerby => "time_to_derby",
            PhaseKind::Lineup => "lineup",
            PhaseKind::Jam => "jam",
            PhaseKind::OfficialTimeout => "official_timeout",
            PhaseKind::TeamTimeout => "team_timeout",
            PhaseKind::OfficialReview => "official_review",
            PhaseKind::Intermission => "intermission",
            PhaseKind::Final => "final",
        };
        f.write_str(name)
    }
}

/// Coarse bout progress shown to spectators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoutPhase {
    /// Before the first period.
    PreGame,
    /// A period is being played.
    InProgress,
    /// Between periods or after the last one.
    Intermission,
    /// Bout over.
    Final,
}

impl ActivePhase {
    /// Discriminant of this phase.
    pub fn kind(&self) -> PhaseKind {
        match self {
            ActivePhase::PreGame => PhaseKind::PreGame,
            ActivePhase::TimeToDerby { .. } => PhaseKind::TimeToDerby,
            ActivePhase::Lineup { .. } => PhaseKind::Lineup,
            ActivePhase::Jam { .. } => PhaseKind::Jam,
            ActivePhase::OfficialTimeout { .. } => PhaseKind::OfficialTimeout,
            ActivePhase::TeamTimeout { .. } => PhaseKind::TeamTimeout,
            ActivePhase::OfficialReview { .. } => PhaseKind::OfficialReview,
            ActivePhase::Intermission { .. } => PhaseKind::Intermission,
            ActivePhase::Final => PhaseKind::Final,
        }
    }

    /// Bout progress derived from the phase.
    pub fn bout_phase(&self) -> BoutPhase {
        match self {
            ActivePhase::PreGame | ActivePhase::TimeToDerby { .. } => BoutPhase::PreGame,
            ActivePhase::Lineup { .. }
            | ActivePhase::Jam { .. }
            | ActivePhase::OfficialTimeout { .. }
            | ActivePhase::TeamTimeout { .. }
            | ActivePhase::OfficialReview { .. } => BoutPhase::InProgress,
            ActivePhase::Intermission { .. } => BoutPhase::Intermission,
            ActivePhase::Final => BoutPhase::Final,
        }
    }

    /// Clock of the phase, if it has one.
    pub fn clock(&self) -> Option<&Clock> {
        match self {
            ActivePhase::PreGame | ActivePhase::Final => None,
            ActivePhase::TimeToDerby { clock }
            | ActivePhase::Lineup { clock }
            | ActivePhase::Jam { clock, .. }
            | ActivePhase::OfficialTimeout { clock, .. }
            | ActivePhase::TeamTimeout { clock, .. }
            | ActivePhase::OfficialReview { clock, .. }
            | ActivePhase::Intermission { clock } => Some(clock),
        }
    }

    fn clock_mut(&mut self) -> Option<&mut Clock> {
        match self {
            ActivePhase::PreGame | ActivePhase::Final => None,
            ActivePhase::TimeToDerby { clock }
            | ActivePhase::Lineup { clock }
            | ActivePhase::Jam { clock, .. }
            | ActivePhase::OfficialTimeout { clock, .. }
            | ActivePhase::TeamTimeout { clock, .. }
            | ActivePhase::OfficialReview { clock, .. }
            | ActivePhase::Intermission { clock } => Some(clock),
        }
    }

    /// Freeze a lineup or jam so an interruption can be layered on top.
    fn suspend(self) -> Option<SuspendedPhase> {
        match self {
            ActivePhase::Lineup { clock } => Some(SuspendedPhase::Lineup {
                clock: clock.frozen(),
            }),
            ActivePhase::Jam { number, clock } => Some(SuspendedPhase::Jam {
                number,
                clock: clock.frozen(),
            }),
            _ => None,
        }
    }

    /// Phase frozen underneath the current interruption.
    pub fn suspended(&self) -> Option<SuspendedPhase> {
        match self {
            ActivePhase::OfficialTimeout { suspended, .. }
            | ActivePhase::TeamTimeout { suspended, .. }
            | ActivePhase::OfficialReview { suspended, .. } => Some(*suspended),
            _ => None,
        }
    }

    /// The period clock only runs while skaters are on the track.
    pub fn runs_game_clock(&self) -> bool {
        matches!(self, ActivePhase::Lineup { .. } | ActivePhase::Jam { .. })
    }
}

/// Events that drive the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Start the countdown to the first whistle.
    StartTimeToDerby(Duration),
    /// Start the next period with a lineup.
    StartPeriod,
    /// Whistle for a new jam.
    StartJam {
        /// Number assigned to the jam.
        number: u16,
    },
    /// Jam called off or capped.
    StopJam,
    /// Officials stop play.
    OfficialTimeout,
    /// A team calls a timeout.
    TeamTimeout(Team),
    /// A team challenges a ruling.
    OfficialReview(Team),
    /// Officials rule on the pending review of a team.
    CloseReview {
        /// Team whose review is ruled on.
        team: Team,
        /// Ruling.
        outcome: ReviewOutcome,
    },
    /// Resume the phase under the current interruption.
    EndTimeout,
    /// Close the period.
    EndPeriod,
    /// Close the bout.
    EndGame,
}

impl ClockEvent {
    /// Command name the event originates from.
    pub fn name(&self) -> &'static str {
        match self {
            ClockEvent::StartTimeToDerby(_) => "start_time_to_derby",
            ClockEvent::StartPeriod => "start_period",
            ClockEvent::StartJam { .. } => "start_jam",
            ClockEvent::StopJam => "stop_jam",
            ClockEvent::OfficialTimeout => "official_timeout",
            ClockEvent::TeamTimeout(_) => "team_timeout",
            ClockEvent::OfficialReview(_) => "official_review",
            ClockEvent::CloseReview {
                outcome: ReviewOutcome::Lost,
                ..
            } => "review_lost",
            ClockEvent::CloseReview { .. } => "review_retained",
            ClockEvent::EndTimeout => "end_timeout",
            ClockEvent::EndPeriod => "end_period",
            ClockEvent::EndGame => "end_game",
        }
    }
}

/// Error returned when an action is not allowed in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {action} cannot be applied while in {from}")]
pub struct InvalidTransition {
    /// Phase the bout was in.
    pub from: PhaseKind,
    /// Rejected action.
    pub action: &'static str,
}

impl InvalidTransition {
    /// Rejection of `action` while in `from`.
    pub fn new(from: PhaseKind, action: &'static str) -> Self {
        Self { from, action }
    }
}

/// What a clock tick did besides moving clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Only clock values changed.
    Advanced,
    /// The jam clock ran out; the remainder of the tick is still to be charged.
    JamExpired {
        /// Part of the tick left after the cap was reached.
        leftover: Duration,
    },
}

/// Phase transition rules and clock advancement.
#[derive(Debug, Clone, Default)]
pub struct ClockEngine {
    rules: ClockRules,
}

impl ClockEngine {
    /// Engine using the given phase durations.
    pub fn new(rules: ClockRules) -> Self {
        Self { rules }
    }

    /// Phase durations in use.
    pub fn rules(&self) -> &ClockRules {
        &self.rules
    }

    /// Lineup right after a jam, with `leftover` already charged to its clock.
    pub fn lineup_after_jam(&self, leftover: Duration) -> ActivePhase {
        let mut clock = Clock::countdown(self.rules.lineup);
        clock.tick(leftover);
        ActivePhase::Lineup { clock }
    }

    /// Compute the phase following `event`, if the transition is valid.
    pub fn transition(
        &self,
        phase: &ActivePhase,
        game_clock: &GameClock,
        event: ClockEvent,
    ) -> Result<ActivePhase, InvalidTransition> {
        let next = match (*phase, event) {
            (ActivePhase::PreGame, ClockEvent::StartTimeToDerby(countdown)) => {
                ActivePhase::TimeToDerby {
                    clock: Clock::countdown(countdown),
                }
            }
            (ActivePhase::PreGame | ActivePhase::TimeToDerby { .. }, ClockEvent::StartPeriod)
                if game_clock.period == 0 =>
            {
                self.fresh_lineup()
            }
            (ActivePhase::Intermission { .. }, ClockEvent::StartPeriod)
                if game_clock.period < PERIODS_PER_BOUT =>
            {
                self.fresh_lineup()
            }
            (ActivePhase::Lineup { .. }, ClockEvent::StartJam { number }) => ActivePhase::Jam {
                number,
                clock: Clock::countdown(self.rules.jam),
            },
            (ActivePhase::Jam { .. }, ClockEvent::StopJam) => self.fresh_lineup(),
            (
                current @ (ActivePhase::Lineup { .. } | ActivePhase::Jam { .. }),
                ClockEvent::OfficialTimeout,
            ) => ActivePhase::OfficialTimeout {
                clock: Clock::countup(),
                suspended: Self::suspend(current, event)?,
            },
            (current @ ActivePhase::Lineup { .. }, ClockEvent::TeamTimeout(team)) => {
                ActivePhase::TeamTimeout {
                    team,
                    clock: Clock::countdown(self.rules.team_timeout),
                    suspended: Self::suspend(current, event)?,
                }
            }
            (current @ ActivePhase::Lineup { .. }, ClockEvent::OfficialReview(team)) => {
                ActivePhase::OfficialReview {
                    team,
                    outcome: ReviewOutcome::Pending,
                    clock: Clock::countup(),
                    suspended: Self::suspend(current, event)?,
                }
            }
            (ActivePhase::TeamTimeout { suspended, .. }, ClockEvent::OfficialReview(team)) => {
                ActivePhase::OfficialReview {
                    team,
                    outcome: ReviewOutcome::Pending,
                    clock: Clock::countup(),
                    suspended,
                }
            }
            (
                ActivePhase::OfficialReview {
                    team: pending,
                    outcome: ReviewOutcome::Pending,
                    suspended,
                    ..
                },
                ClockEvent::CloseReview { team, .. },
            ) if pending == team => suspended.resume(),
            (
                ActivePhase::OfficialTimeout { suspended, .. }
                | ActivePhase::TeamTimeout { suspended, .. }
                | ActivePhase::OfficialReview { suspended, .. },
                ClockEvent::EndTimeout,
            ) => suspended.resume(),
            (
                ActivePhase::Lineup { .. }
                | ActivePhase::Jam { .. }
                | ActivePhase::OfficialTimeout { .. }
                | ActivePhase::TeamTimeout { .. }
                | ActivePhase::OfficialReview { .. },
                ClockEvent::EndPeriod,
            ) => ActivePhase::Intermission {
                clock: Clock::countdown(self.rules.intermission),
            },
            (ActivePhase::Intermission { .. }, ClockEvent::EndGame) => ActivePhase::Final,
            (from, event) => return Err(InvalidTransition::new(from.kind(), event.name())),
        };

        Ok(next)
    }

    /// Advance the phase clock and, while skaters are on the track, the period clock.
    pub fn advance(
        &self,
        phase: &mut ActivePhase,
        game_clock: &mut GameClock,
        delta: Duration,
    ) -> TickOutcome {
        if phase.runs_game_clock() {
            game_clock.advance(delta, self.rules.period);
        }

        let Some(clock) = phase.clock_mut() else {
            return TickOutcome::Advanced;
        };
        let leftover = clock.tick(delta);

        match phase {
            ActivePhase::Jam { clock, .. } if clock.is_expired() => {
                TickOutcome::JamExpired { leftover }
            }
            _ => TickOutcome::Advanced,
        }
    }

    fn fresh_lineup(&self) -> ActivePhase {
        ActivePhase::Lineup {
            clock: Clock::countdown(self.rules.lineup),
        }
    }

    fn suspend(current: ActivePhase, event: ClockEvent) -> Result<SuspendedPhase, InvalidTransition> {
        current
            .suspend()
            .ok_or_else(|| InvalidTransition::new(current.kind(), event.name()))
    }
}
