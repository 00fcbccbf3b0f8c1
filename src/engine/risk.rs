//! Risk manager.
//!
//! Gates every proposed stake against the bankroll-derived limits before it
//! may reach the driver. Approval is a pure function of its inputs; the
//! ledger applies the resulting stake and does all bookkeeping.

use rust_decimal::Decimal;
use std::fmt;
use tracing::debug;

use crate::config::RiskConfig;
use crate::engine::bankroll::BankrollState;
use crate::types::Mode;

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why a stake was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Zero or negative stake.
    NonPositiveStake { stake: Decimal },
    /// `sum_stakes + stake` would reach the configured ceiling.
    SumStakeLimit {
        sum_stakes: Decimal,
        stake: Decimal,
        max_sum_stake: Decimal,
    },
    /// Calculated bankroll has fallen to the configured floor.
    BankrollFloor {
        ratio: Decimal,
        min_bankroll_percent: Decimal,
    },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NonPositiveStake { stake } => {
                write!(f, "stake must be positive, got {stake}")
            }
            RejectionReason::SumStakeLimit {
                sum_stakes,
                stake,
                max_sum_stake,
            } => write!(
                f,
                "maximum sum of stakes reached ({sum_stakes} + {stake} >= {max_sum_stake})"
            ),
            RejectionReason::BankrollFloor {
                ratio,
                min_bankroll_percent,
            } => write!(
                f,
                "minimum bankroll percentage reached ({:.4} <= {min_bankroll_percent})",
                ratio
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Approval
// ---------------------------------------------------------------------------

/// A stake cleared for tendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizedStake {
    pub requested: Decimal,
    pub stake: Decimal,
}

impl AuthorizedStake {
    pub fn was_clamped(&self) -> bool {
        self.requested != self.stake
    }
}

pub struct RiskManager {
    config: RiskConfig,
    mode: Mode,
}

impl RiskManager {
    pub fn new(config: RiskConfig, mode: Mode) -> Self {
        Self { config, mode }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Approve `stake` given what is already committed.
    ///
    /// Rejects a non-positive stake, a sum of stakes that would reach
    /// `max_sum_stake`, or a calculated bankroll ratio at or below
    /// `min_bankroll_percent`. In live mode the stake is capped at
    /// `calculated * max_stake_percent` and then clamped into
    /// `[min_stake, max_stake]`; paper mode passes it through. The ceiling is
    /// checked against both the requested and the clamped stake.
    pub fn approve(
        &self,
        stake: Decimal,
        sum_stakes: Decimal,
        bankroll: &BankrollState,
    ) -> Result<AuthorizedStake, RejectionReason> {
        if stake <= Decimal::ZERO {
            return Err(RejectionReason::NonPositiveStake { stake });
        }
        self.check_ceiling(sum_stakes, stake)?;

        let ratio = bankroll.ratio();
        if ratio <= self.config.min_bankroll_percent {
            return Err(RejectionReason::BankrollFloor {
                ratio,
                min_bankroll_percent: self.config.min_bankroll_percent,
            });
        }

        let approved = if self.mode.is_live() {
            let cap = bankroll.calculated * self.config.max_stake_percent;
            stake
                .min(cap)
                .max(self.config.min_stake)
                .min(self.config.max_stake)
        } else {
            stake
        };
        // Clamping can raise a stake up to min_stake
        self.check_ceiling(sum_stakes, approved)?;

        debug!(
            requested = %stake,
            approved = %approved,
            mode = %self.mode,
            ratio = %ratio.round_dp(4),
            "Stake approved"
        );

        Ok(AuthorizedStake {
            requested: stake,
            stake: approved,
        })
    }

    fn check_ceiling(&self, sum_stakes: Decimal, stake: Decimal) -> Result<(), RejectionReason> {
        if sum_stakes + stake >= self.config.max_sum_stake {
            return Err(RejectionReason::SumStakeLimit {
                sum_stakes,
                stake,
                max_sum_stake: self.config.max_sum_stake,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
