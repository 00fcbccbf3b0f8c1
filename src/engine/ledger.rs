//! Wager ledger.
//!
//! Bet state machine and bookkeeping. Every stake passes the risk manager
//! before the driver sees it; tendered bets are then tracked as pending until
//! `confirm_bets` reconciles them against the betslip, or `clear_bets`
//! withdraws them. Stakes stay counted in `sum_stakes` either way; the
//! calculated bankroll is corrected at the next reconciliation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::driver::MarketDriver;
use crate::engine::bankroll::BankrollState;
use crate::engine::markets::MarketChoice;
use crate::engine::risk::{AuthorizedStake, RiskManager};
use crate::engine::session::SessionController;
use crate::types::{Fixture, Mode, Outcome, PendingBet, PlacedBet, PunterError, WagerState};

/// Serializable view of the ledger, saved at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub saved_at: DateTime<Utc>,
    pub mode: Mode,
    pub bankroll: BankrollState,
    pub sum_stakes: Decimal,
    pub placed: Vec<PlacedBet>,
    pub confirmed: Vec<PlacedBet>,
}

pub struct WagerLedger {
    risk: RiskManager,
    bankroll: BankrollState,
    sum_stakes: Decimal,
    pending: Vec<PendingBet>,
    placed: Vec<PlacedBet>,
    confirmed: Vec<PlacedBet>,
}

fn advance(state: &mut WagerState, next: WagerState) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid wager transition {state} -> {next}"
    );
    *state = next;
}

impl WagerLedger {
    pub fn new(risk: RiskManager, starting_bankroll: Decimal) -> Self {
        Self {
            risk,
            bankroll: BankrollState::new(starting_bankroll),
            sum_stakes: Decimal::ZERO,
            pending: Vec::new(),
            placed: Vec::new(),
            confirmed: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.risk.mode()
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn bankroll(&self) -> &BankrollState {
        &self.bankroll
    }

    pub fn sum_stakes(&self) -> Decimal {
        self.sum_stakes
    }

    pub fn pending(&self) -> &[PendingBet] {
        &self.pending
    }

    /// Every bet that passed the risk manager and was tendered, in order.
    pub fn placed(&self) -> &[PlacedBet] {
        &self.placed
    }

    pub fn confirmed(&self) -> &[PlacedBet] {
        &self.confirmed
    }

    /// Check `stake` against the risk limits without touching the driver.
    pub fn authorize(&self, stake: Decimal) -> Result<AuthorizedStake, PunterError> {
        self.risk
            .approve(stake, self.sum_stakes, &self.bankroll)
            .map_err(|reason| {
                warn!(stake = %stake, sum_stakes = %self.sum_stakes, %reason, "Bet rejected");
                PunterError::RiskLimitExceeded(reason)
            })
    }

    /// Risk-check `stake`, tender it on the fixture's betslip card and record
    /// the bet as pending. Returns the stake actually tendered.
    pub async fn place_bet<D: MarketDriver>(
        &mut self,
        session: &SessionController<D>,
        market: &MarketChoice,
        choice: Outcome,
        mut fixture: Fixture,
        odds: Decimal,
        stake: Decimal,
    ) -> Result<Decimal, PunterError> {
        let mut state = WagerState::Idle;
        let authorized = self.authorize(stake)?;
        advance(&mut state, WagerState::Authorized);

        if authorized.was_clamped() {
            info!(
                requested = %authorized.requested,
                stake = %authorized.stake,
                "Stake clamped by risk limits"
            );
        }

        let tendered = session
            .call(
                "tender_stake",
                session.driver().tender_stake(&fixture.handle, authorized.stake),
            )
            .await;
        if let Err(e) = tendered {
            warn!(fixture = %fixture, error = %e, "Failed to tender stake");
            session.withdraw(&mut fixture).await;
            return Err(e);
        }
        advance(&mut state, WagerState::Tendered);

        let record = PlacedBet {
            bet_id: Uuid::new_v4(),
            placed_at: Utc::now(),
            kickoff: fixture.kickoff,
            home: fixture.home.clone(),
            away: fixture.away.clone(),
            stake: authorized.stake,
            odds,
            choice,
            market: market.label().to_string(),
            mode: self.mode(),
        };
        info!(
            bet_id = %record.bet_id,
            fixture = %fixture,
            choice = %choice,
            odds = %odds,
            stake = %authorized.stake,
            mode = %record.mode,
            "Bet placed"
        );

        self.pending.push(PendingBet {
            bet_id: record.bet_id,
            market: market.label().to_string(),
            category_id: market.id().to_string(),
            choice,
            fixture,
            odds,
            stake: authorized.stake,
            state,
        });
        self.placed.push(record);

        self.sum_stakes += authorized.stake;
        self.bankroll.reserve(authorized.stake);
        Ok(authorized.stake)
    }

    /// Withdraw every pending bet. Never fails; returns how many bets were
    /// withdrawn.
    pub async fn clear_bets<D: MarketDriver>(&mut self, session: &SessionController<D>) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();

        for mut bet in pending {
            session.withdraw(&mut bet.fixture).await;
            advance(&mut bet.state, WagerState::Cancelled);
            debug!(bet_id = %bet.bet_id, state = %bet.state, "Bet withdrawn");
        }

        force_clear(session).await;
        if count > 0 {
            info!(count, "Pending bets cleared");
        }
        count
    }

    /// Confirm every pending bet.
    ///
    /// The betslip must show exactly as many staked cards and cards overall
    /// as there are pending bets; otherwise nothing is confirmed and a
    /// `ConsistencyFault` is returned with the pending list intact. The
    /// bankroll is re-read afterwards whether or not confirmation succeeded.
    pub async fn confirm_bets<D: MarketDriver>(
        &mut self,
        session: &SessionController<D>,
    ) -> Result<usize, PunterError> {
        if self.pending.is_empty() {
            debug!("Nothing to confirm, clearing betslip");
            force_clear(session).await;
            return Ok(0);
        }

        let settled = self.settle(session).await;
        let reconciled = self.reconcile(session).await;

        match (settled, reconciled) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(e)) => Err(e),
            (Ok(count), Ok(())) => Ok(count),
        }
    }

    async fn settle<D: MarketDriver>(
        &mut self,
        session: &SessionController<D>,
    ) -> Result<usize, PunterError> {
        let tendered = self.pending.len();
        let confirmed = session
            .call("count_confirmed_bets", session.driver().count_confirmed_bets())
            .await?;
        let cards = session
            .call(
                "count_pending_betslip_cards",
                session.driver().count_pending_betslip_cards(),
            )
            .await?;

        if confirmed != tendered || cards != tendered {
            error!(confirmed, pending = cards, tendered, "Betslip does not match ledger");
            return Err(PunterError::ConsistencyFault {
                confirmed,
                pending: cards,
                tendered,
            });
        }

        if self.mode().is_live() {
            session
                .call("confirm_all", session.driver().confirm_all())
                .await?;
        } else {
            info!(count = tendered, "[PAPER] Skipping final confirmation");
        }

        for mut bet in std::mem::take(&mut self.pending) {
            session.withdraw(&mut bet.fixture).await;
            advance(&mut bet.state, WagerState::Confirmed);
            if let Some(record) = self.placed.iter().find(|p| p.bet_id == bet.bet_id) {
                self.confirmed.push(record.clone());
            }
        }
        force_clear(session).await;

        info!(count = tendered, mode = %self.mode(), "Bets confirmed");
        Ok(tendered)
    }

    async fn reconcile<D: MarketDriver>(
        &mut self,
        session: &SessionController<D>,
    ) -> Result<(), PunterError> {
        let observed = session
            .call("read_bankroll", session.driver().read_bankroll())
            .await?;
        self.bankroll.reconcile(observed);
        Ok(())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            saved_at: Utc::now(),
            mode: self.mode(),
            bankroll: self.bankroll.clone(),
            sum_stakes: self.sum_stakes,
            placed: self.placed.clone(),
            confirmed: self.confirmed.clone(),
        }
    }
}

async fn force_clear<D: MarketDriver>(session: &SessionController<D>) {
    if let Err(e) = session
        .call("force_clear_betslip", session.driver().force_clear_betslip())
        .await
    {
        debug!(error = %e, "Betslip safety clear failed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
