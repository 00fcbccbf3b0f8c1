//! Bankroll tracking and reconciliation.
//!
//! The remote market is authoritative. The calculated bankroll is only a
//! prediction: stakes are debited from it at tender time, and it is reset to
//! the observed value at every confirmation cycle so estimation error cannot
//! accumulate.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Drift between observed and calculated bankroll that is tolerated silently.
pub const DRIFT_TOLERANCE: Decimal = dec!(1.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankrollState {
    /// Balance read when the session opened.
    pub starting: Decimal,
    /// Last balance read from the driver.
    pub observed: Decimal,
    /// `starting` minus stakes reserved since the last reconciliation.
    pub calculated: Decimal,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub calculated_before: Decimal,
    pub observed: Decimal,
    pub drift: Decimal,
}

impl Reconciliation {
    pub fn diverged(&self) -> bool {
        self.drift.abs() > DRIFT_TOLERANCE
    }
}

impl BankrollState {
    pub fn new(starting: Decimal) -> Self {
        Self {
            starting,
            observed: starting,
            calculated: starting,
        }
    }

    /// `calculated / starting`, or zero when there was nothing to start with.
    pub fn ratio(&self) -> Decimal {
        if self.starting <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            self.calculated / self.starting
        }
    }

    pub fn reserve(&mut self, stake: Decimal) {
        self.calculated -= stake;
    }

    /// Adopt a freshly observed balance, warning when the estimate drifted.
    /// Both `observed` and `calculated` take the driver's value.
    pub fn reconcile(&mut self, observed: Decimal) -> Reconciliation {
        let report = Reconciliation {
            calculated_before: self.calculated,
            observed,
            drift: observed - self.calculated,
        };

        info!(bankroll = %observed, "New bankroll");
        if report.diverged() {
            warn!(
                calculated = %self.calculated,
                observed = %observed,
                drift = %report.drift,
                "Real and calculated bankrolls are different"
            );
        }

        self.observed = observed;
        self.calculated = observed;
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
