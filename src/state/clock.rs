//! Phase clocks and the period clock driven by the bout ticker.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use utoipa::ToSchema;

/// Number of periods in a regulation bout.
pub const PERIODS_PER_BOUT: u8 = 2;

/// Whether a clock counts towards zero or away from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClockDirection {
    /// `value` is the remaining time and saturates at zero.
    Countdown,
    /// `value` is the elapsed time.
    Countup,
}

/// Clock attached to the active phase.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Clock {
    /// Whether ticks currently move the clock.
    pub running: bool,
    /// Remaining time for countdowns, elapsed time for count-ups (milliseconds on the wire).
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub value: Duration,
    /// Counting direction.
    pub direction: ClockDirection,
}

impl Clock {
    /// Running countdown starting at `limit`.
    pub fn countdown(limit: Duration) -> Self {
        Self {
            running: true,
            value: limit,
            direction: ClockDirection::Countdown,
        }
    }

    /// Running count-up starting at zero.
    pub fn countup() -> Self {
        Self {
            running: true,
            value: Duration::ZERO,
            direction: ClockDirection::Countup,
        }
    }

    /// Advance the clock by `delta`.
    ///
    /// Returns the part of `delta` that could not be consumed because a countdown hit zero.
    pub fn tick(&mut self, delta: Duration) -> Duration {
        if !self.running {
            return Duration::ZERO;
        }

        match self.direction {
            ClockDirection::Countdown => {
                let overflow = delta.saturating_sub(self.value);
                self.value = self.value.saturating_sub(delta);
                overflow
            }
            ClockDirection::Countup => {
                self.value = self.value.saturating_add(delta);
                Duration::ZERO
            }
        }
    }

    /// A countdown that reached zero.
    pub fn is_expired(&self) -> bool {
        self.direction == ClockDirection::Countdown && self.value.is_zero()
    }

    /// Same clock with ticks disabled.
    pub fn frozen(self) -> Self {
        Self {
            running: false,
            ..self
        }
    }

    /// Same clock with ticks enabled again.
    pub fn resumed(self) -> Self {
        Self {
            running: true,
            ..self
        }
    }
}

/// Period number and time played within that period.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct GameClock {
    /// Current period, `0` before the first period starts.
    pub period: u8,
    /// Time played in the current period (milliseconds on the wire).
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[schema(value_type = u64)]
    pub elapsed: Duration,
}

impl GameClock {
    /// Fresh clock for the given period.
    pub fn for_period(period: u8) -> Self {
        Self {
            period,
            elapsed: Duration::ZERO,
        }
    }

    /// Remaining period time, saturating at zero.
    pub fn remaining(&self, period_length: Duration) -> Duration {
        period_length.saturating_sub(self.elapsed)
    }

    /// Advance the elapsed time, never past the period length.
    pub fn advance(&mut self, delta: Duration, period_length: Duration) {
        self.elapsed = self.elapsed.saturating_add(delta).min(period_length);
    }

    /// Overwrite the remaining time shown on the period clock.
    pub fn set_remaining(&mut self, remaining: Duration, period_length: Duration) {
        self.elapsed = period_length.saturating_sub(remaining);
    }
}

/// Durations applied to each timed phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockRules {
    /// Length of a period.
    pub period: Duration,
    /// Jam cap; the jam stops on its own when this runs out.
    pub jam: Duration,
    /// Lineup countdown between jams.
    pub lineup: Duration,
    /// Team timeout countdown.
    pub team_timeout: Duration,
    /// Countdown shown between periods and after the final period.
    pub intermission: Duration,
}

impl Default for ClockRules {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30 * 60),
            jam: Duration::from_secs(120),
            lineup: Duration::from_secs(30),
            team_timeout: Duration::from_secs(60),
            intermission: Duration::from_secs(15 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_saturates_and_reports_overflow() {
        let mut clock = Clock::countdown(Duration::from_millis(500));
        assert_eq!(clock.tick(Duration::from_millis(200)), Duration::ZERO);
        assert_eq!(clock.value, Duration::from_millis(300));

        let overflow = clock.tick(Duration::from_millis(450));
        assert_eq!(overflow, Duration::from_millis(150));
        assert!(clock.is_expired());
    }

    #[test]
    fn frozen_clock_ignores_ticks() {
        let mut clock = Clock::countup().frozen();
        clock.tick(Duration::from_secs(3));
        assert_eq!(clock.value, Duration::ZERO);

        let mut clock = clock.resumed();
        clock.tick(Duration::from_secs(3));
        assert_eq!(clock.value, Duration::from_secs(3));
        assert!(!clock.is_expired());
    }

    #[test]
    fn game_clock_stops_at_period_length() {
        let length = Duration::from_secs(10);
        let mut clock = GameClock::for_period(1);
        clock.advance(Duration::from_secs(7), length);
        assert_eq!(clock.remaining(length), Duration::from_secs(3));

        clock.advance(Duration::from_secs(7), length);
        assert_eq!(clock.remaining(length), Duration::ZERO);

        clock.set_remaining(Duration::from_secs(4), length);
        assert_eq!(clock.elapsed, Duration::from_secs(6));
    }

    #[test]
    fn clock_serializes_milliseconds() {
        let clock = Clock::countdown(Duration::from_millis(1_250));
        let json = serde_json::to_value(clock).unwrap();
        assert_eq!(json["value"], 1_250);
        assert_eq!(json["direction"], "countdown");
    }
}
