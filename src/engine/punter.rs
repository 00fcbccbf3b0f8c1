//! The punter: session, catalog and ledger wired together for callers.

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::driver::MarketDriver;
use crate::engine::bankroll::BankrollState;
use crate::engine::catalog::{MatchCatalog, MatchQuery, NameMatcher};
use crate::engine::ledger::{LedgerSnapshot, WagerLedger};
use crate::engine::markets::{MarketBoard, MarketChoice, MarketKind};
use crate::engine::risk::RiskManager;
use crate::engine::session::{SessionController, SessionSettings};
use crate::types::{Credentials, Fixture, Mode, Outcome, PendingBet, PlacedBet, PunterError};

pub struct Punter<D: MarketDriver> {
    session: SessionController<D>,
    catalog: MatchCatalog,
    ledger: WagerLedger,
}

impl<D: MarketDriver> Punter<D> {
    /// Log in with a fresh driver from `connect`, retrying per the login
    /// policy. A failed attempt closes its driver before the next one.
    pub async fn login<F>(
        mut connect: F,
        credentials: Credentials,
        config: &AppConfig,
    ) -> Result<Self, PunterError>
    where
        F: FnMut() -> anyhow::Result<D>,
    {
        let settings = SessionSettings::from_config(config);
        let league = config.session.default_league.as_str();

        let session = config
            .retry
            .login
            .run("login", |_| true, || {
                let driver = connect();
                let credentials = credentials.clone();
                let settings = settings.clone();
                async move {
                    let driver = driver.map_err(|e| PunterError::driver("connect", e))?;
                    SessionController::establish(driver, credentials, league, settings).await
                }
            })
            .await?;

        Self::attach(session, config).await
    }

    /// Build a punter on an established session: load the market board and
    /// record the starting bankroll.
    pub async fn attach(
        mut session: SessionController<D>,
        config: &AppConfig,
    ) -> Result<Self, PunterError> {
        session.load_markets().await?;
        let starting = session
            .call("read_bankroll", session.driver().read_bankroll())
            .await?;

        let mode = config.session.mode;
        info!(
            bankroll = %starting,
            mode = %mode,
            league = ?session.league(),
            "Logged in"
        );

        Ok(Self {
            session,
            catalog: MatchCatalog::with_cutoff(config.catalog.similarity_cutoff),
            ledger: WagerLedger::new(RiskManager::new(config.risk.clone(), mode), starting),
        })
    }

    // -- Session --------------------------------------------------------------

    pub async fn select_league(&mut self, league: &str) -> Result<(), PunterError> {
        self.session.select_league(league).await
    }

    pub async fn select_market(&mut self, kind: MarketKind) -> Result<MarketChoice, PunterError> {
        self.session.select_market(kind).await.cloned()
    }

    pub fn markets(&self) -> &MarketBoard {
        self.session.markets()
    }

    pub fn selected_market(&self) -> Option<&MarketChoice> {
        self.session.active_market()
    }

    pub fn league(&self) -> Option<&str> {
        self.session.league()
    }

    // -- Catalog --------------------------------------------------------------

    pub async fn select_matches(&self, query: &MatchQuery) -> Result<Vec<Fixture>, PunterError> {
        self.catalog.select_matches(&self.session, query).await
    }

    pub async fn select_matches_with(
        &self,
        query: &MatchQuery,
        matcher: &dyn NameMatcher,
    ) -> Result<Vec<Fixture>, PunterError> {
        self.catalog
            .select_matches_with(&self.session, query, matcher)
            .await
    }

    // -- Wagering -------------------------------------------------------------

    /// Back `outcome` on `fixture` in the active market.
    ///
    /// The stake is risk-checked before the selection is submitted, so a
    /// rejected bet never touches the betslip.
    pub async fn bet_on(
        &mut self,
        mut fixture: Fixture,
        outcome: Outcome,
        stake: Decimal,
    ) -> Result<Decimal, PunterError> {
        let market = self
            .session
            .active_market()
            .cloned()
            .ok_or(PunterError::NoActiveMarket)?;

        self.ledger.authorize(stake)?;
        let odds = market.submit(&self.session, &mut fixture, outcome).await?;
        self.ledger
            .place_bet(&self.session, &market, outcome, fixture, odds, stake)
            .await
    }

    /// Record and tender a bet whose selection is already on the betslip.
    pub async fn place_bet(
        &mut self,
        market: &MarketChoice,
        outcome: Outcome,
        fixture: Fixture,
        odds: Decimal,
        stake: Decimal,
    ) -> Result<Decimal, PunterError> {
        self.ledger
            .place_bet(&self.session, market, outcome, fixture, odds, stake)
            .await
    }

    pub async fn confirm_bets(&mut self) -> Result<usize, PunterError> {
        self.ledger.confirm_bets(&self.session).await
    }

    pub async fn clear_bets(&mut self) -> usize {
        self.ledger.clear_bets(&self.session).await
    }

    // -- Accessors ------------------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.ledger.mode()
    }

    pub fn placed_bets(&self) -> &[PlacedBet] {
        self.ledger.placed()
    }

    pub fn confirmed_bets(&self) -> &[PlacedBet] {
        self.ledger.confirmed()
    }

    pub fn pending_bets(&self) -> &[PendingBet] {
        self.ledger.pending()
    }

    pub fn sum_stakes(&self) -> Decimal {
        self.ledger.sum_stakes()
    }

    /// Latest calculated bankroll.
    pub fn bankroll(&self) -> Decimal {
        self.ledger.bankroll().calculated
    }

    pub fn bankroll_state(&self) -> &BankrollState {
        self.ledger.bankroll()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub fn session(&self) -> &SessionController<D> {
        &self.session
    }

    /// Withdraw anything still pending and close the session. Never fails;
    /// teardown problems are only logged.
    pub async fn close(&mut self) {
        if self.session.is_closed() {
            return;
        }
        if !self.ledger.pending().is_empty() {
            warn!(
                pending = self.ledger.pending().len(),
                "Closing with unconfirmed bets, withdrawing them"
            );
            self.ledger.clear_bets(&self.session).await;
        }
        self.session.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
