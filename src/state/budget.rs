use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::game::Team;

/// Which per-team allowance a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BudgetKind {
    /// Team timeout.
    Timeout,
    /// Official review.
    Review,
}

impl fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetKind::Timeout => f.write_str("timeouts"),
            BudgetKind::Review => f.write_str("official reviews"),
        }
    }
}

/// Why a budget request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// Nothing left for this period.
    Exhausted,
}

/// Outcome of [`TimeoutBudget::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    /// The caller may start the phase and must then call [`TimeoutBudget::consume`].
    Granted,
    /// The request must be rejected.
    Denied {
        /// Reason for the denial.
        reason: DenialReason,
    },
}

/// Allowances replenished at each new period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetRules {
    /// Team timeouts granted per period.
    pub timeouts_per_period: u8,
    /// Official reviews granted per period.
    pub reviews_per_period: u8,
    /// Give the review credit back when the review is retained.
    pub retained_review_restores_credit: bool,
}

impl Default for BudgetRules {
    fn default() -> Self {
        Self {
            timeouts_per_period: 3,
            reviews_per_period: 2,
            retained_review_restores_credit: false,
        }
    }
}

/// Remaining allowances for one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PerTeamBudget {
    /// Team timeouts left in this period.
    pub timeouts_remaining: u8,
    /// Official reviews left in this period.
    pub reviews_remaining: u8,
}

impl PerTeamBudget {
    fn full(rules: &BudgetRules) -> Self {
        Self {
            timeouts_remaining: rules.timeouts_per_period,
            reviews_remaining: rules.reviews_per_period,
        }
    }

    fn slot(&mut self, kind: BudgetKind) -> &mut u8 {
        match kind {
            BudgetKind::Timeout => &mut self.timeouts_remaining,
            BudgetKind::Review => &mut self.reviews_remaining,
        }
    }

    /// Remaining count for `kind`.
    pub fn remaining(&self, kind: BudgetKind) -> u8 {
        match kind {
            BudgetKind::Timeout => self.timeouts_remaining,
            BudgetKind::Review => self.reviews_remaining,
        }
    }
}

/// Timeout and review counters for both teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeoutBudget {
    /// Home team allowances.
    pub home: PerTeamBudget,
    /// Away team allowances.
    pub away: PerTeamBudget,
}

impl TimeoutBudget {
    /// Both teams at full allowance.
    pub fn new(rules: &BudgetRules) -> Self {
        Self {
            home: PerTeamBudget::full(rules),
            away: PerTeamBudget::full(rules),
        }
    }

    /// Allowances of `team`.
    pub fn team(&self, team: Team) -> &PerTeamBudget {
        match team {
            Team::Home => &self.home,
            Team::Away => &self.away,
        }
    }

    fn team_mut(&mut self, team: Team) -> &mut PerTeamBudget {
        match team {
            Team::Home => &mut self.home,
            Team::Away => &mut self.away,
        }
    }

    /// Check whether `team` may start a phase of `kind`. Does not change any counter.
    pub fn request(&self, team: Team, kind: BudgetKind) -> BudgetDecision {
        if self.team(team).remaining(kind) == 0 {
            BudgetDecision::Denied {
                reason: DenialReason::Exhausted,
            }
        } else {
            BudgetDecision::Granted
        }
    }

    /// Spend one unit of `kind`. Saturates at zero.
    pub fn consume(&mut self, team: Team, kind: BudgetKind) {
        let slot = self.team_mut(team).slot(kind);
        *slot = slot.saturating_sub(1);
    }

    /// Hand one unit of `kind` back, never above the per-period allowance.
    pub fn restore(&mut self, team: Team, kind: BudgetKind, rules: &BudgetRules) {
        let cap = PerTeamBudget::full(rules).remaining(kind);
        let slot = self.team_mut(team).slot(kind);
        *slot = slot.saturating_add(1).min(cap);
    }

    /// Refill both teams for a new period.
    pub fn reset(&mut self, rules: &BudgetRules) {
        *self = Self::new(rules);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_denied_once_exhausted() {
        let rules = BudgetRules {
            timeouts_per_period: 1,
            ..BudgetRules::default()
        };
        let mut budget = TimeoutBudget::new(&rules);

        assert_eq!(
            budget.request(Team::Home, BudgetKind::Timeout),
            BudgetDecision::Granted
        );
        budget.consume(Team::Home, BudgetKind::Timeout);
        assert_eq!(
            budget.request(Team::Home, BudgetKind::Timeout),
            BudgetDecision::Denied {
                reason: DenialReason::Exhausted
            }
        );
        assert_eq!(
            budget.request(Team::Away, BudgetKind::Timeout),
            BudgetDecision::Granted
        );
    }

    #[test]
    fn consume_never_goes_negative() {
        let rules = BudgetRules::default();
        let mut budget = TimeoutBudget::new(&rules);
        for _ in 0..5 {
            budget.consume(Team::Away, BudgetKind::Review);
        }
        assert_eq!(budget.away.reviews_remaining, 0);
        assert_eq!(budget.away.timeouts_remaining, 3);
    }

    #[test]
    fn restore_is_capped_and_reset_refills() {
        let rules = BudgetRules::default();
        let mut budget = TimeoutBudget::new(&rules);
        budget.restore(Team::Home, BudgetKind::Review, &rules);
        assert_eq!(budget.home.reviews_remaining, 2);

        budget.consume(Team::Home, BudgetKind::Review);
        budget.consume(Team::Home, BudgetKind::Timeout);
        budget.reset(&rules);
        assert_eq!(budget, TimeoutBudget::new(&rules));
    }
}
