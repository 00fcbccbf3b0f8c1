//! Session controller.
//!
//! Owns the driver for the lifetime of one logged-in session: login,
//! liveness checks, re-authentication, league switching and the market
//! board. Every driver call goes through [`SessionController::call`], which
//! bounds it with a timeout and maps failures into `PunterError`.

use anyhow::anyhow;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::driver::MarketDriver;
use crate::engine::markets::{MarketBoard, MarketChoice, MarketKind};
use crate::engine::retry::RetryPolicy;
use crate::types::{Credentials, Fixture, PunterError};

/// Timeout and retry settings for one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub call_timeout: Duration,
    pub league_retry: RetryPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            league_retry: RetryPolicy::league(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            call_timeout: config.session.driver_timeout(),
            league_retry: config.retry.league.clone(),
        }
    }
}

pub struct SessionController<D: MarketDriver> {
    driver: D,
    credentials: Credentials,
    league: Option<String>,
    board: MarketBoard,
    settings: SessionSettings,
    closed: bool,
}

impl<D: MarketDriver> SessionController<D> {
    /// Log in, open `league` and check the session is live.
    ///
    /// On failure the controller is dropped, which closes the driver.
    pub async fn establish(
        driver: D,
        credentials: Credentials,
        league: &str,
        settings: SessionSettings,
    ) -> Result<Self, PunterError> {
        let mut session = Self {
            driver,
            credentials,
            league: None,
            board: MarketBoard::default(),
            settings,
            closed: false,
        };

        session.authenticate().await?;
        session.switch_league(league).await?;
        session.league = Some(league.to_string());

        info!(
            user = %session.credentials.username,
            league,
            "Session established"
        );
        Ok(session)
    }

    #[cfg(test)]
    pub(crate) fn detached(driver: D, settings: SessionSettings) -> Self {
        Self {
            driver,
            credentials: Credentials::new("test", "test"),
            league: None,
            board: MarketBoard::default(),
            settings,
            closed: false,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn league(&self) -> Option<&str> {
        self.league.as_deref()
    }

    pub fn markets(&self) -> &MarketBoard {
        &self.board
    }

    pub fn active_market(&self) -> Option<&MarketChoice> {
        self.board.active()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run one driver call under the session timeout.
    pub(crate) async fn call<T, F>(&self, op: &'static str, fut: F) -> Result<T, PunterError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if self.closed {
            return Err(PunterError::SessionClosed);
        }
        match tokio::time::timeout(self.settings.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(PunterError::driver(op, e)),
            Err(_) => Err(PunterError::driver(
                op,
                anyhow!("timed out after {:?}", self.settings.call_timeout),
            )),
        }
    }

    /// Run the fixture's cancel action, if it has one. Failures are logged
    /// at debug and dropped: the selection may already be gone.
    pub(crate) async fn withdraw(&self, fixture: &mut Fixture) {
        if let Some(cancel) = fixture.cancel.take() {
            if let Err(e) = self.call("cancel_selection", cancel.invoke()).await {
                debug!(fixture = %fixture, error = %e, "Could not withdraw selection");
            }
        }
    }

    pub async fn is_live(&self) -> Result<bool, PunterError> {
        self.call("is_session_live", self.driver.is_session_live())
            .await
    }

    async fn authenticate(&self) -> Result<(), PunterError> {
        debug!(user = %self.credentials.username, "Authenticating");
        self.call(
            "authenticate",
            self.driver
                .authenticate(&self.credentials.username, &self.credentials.password),
        )
        .await
    }

    /// One attempt at opening `league`, logging back in first if needed.
    async fn switch_league(&self, league: &str) -> Result<(), PunterError> {
        if !self.is_live().await? {
            warn!(league, "Session logged out, re-authenticating");
            self.authenticate().await?;
        }

        self.call("select_league", self.driver.select_league(league))
            .await?;

        if !self.is_live().await? {
            return Err(PunterError::ConnectionFault(format!(
                "still logged out after opening league '{league}'"
            )));
        }
        Ok(())
    }

    /// Switch to `league`, retrying on connection faults, and reload the
    /// market board it offers.
    pub async fn select_league(&mut self, league: &str) -> Result<(), PunterError> {
        let policy = self.settings.league_retry.clone();
        let this = &*self;
        policy
            .run("select_league", PunterError::is_connection_fault, move || {
                this.switch_league(league)
            })
            .await?;

        self.league = Some(league.to_string());
        self.load_markets().await?;
        info!(league, "League selected");
        Ok(())
    }

    /// Refresh the market board from the driver's menu.
    pub async fn load_markets(&mut self) -> Result<&MarketBoard, PunterError> {
        let categories = self
            .call("list_market_categories", self.driver.list_market_categories())
            .await?;
        self.board = MarketBoard::from_categories(&categories);
        debug!(
            offered = self.board.choices().len(),
            active = ?self.board.active().map(|c| c.label()),
            "Market board loaded"
        );
        Ok(&self.board)
    }

    /// Make `kind` the active market. No driver call if it already is.
    pub async fn select_market(&mut self, kind: MarketKind) -> Result<&MarketChoice, PunterError> {
        if !self.board.is_active(kind) {
            let choice = self
                .board
                .get(kind)
                .ok_or_else(|| PunterError::UnsupportedMarket(kind.label().to_string()))?;

            let switched = self
                .call(
                    "select_market_category",
                    self.driver.select_market_category(choice.id()),
                )
                .await?;
            if !switched {
                return Err(PunterError::driver(
                    "select_market_category",
                    anyhow!("market menu did not switch to '{}'", kind.label()),
                ));
            }
            self.board.activate(kind);
            info!(market = %kind, "Market selected");
        }

        self.board.active().ok_or(PunterError::NoActiveMarket)
    }

    /// Close the driver. Later calls through this session fail with
    /// `SessionClosed`.
    /// Teardown failures are logged, never returned.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!("Closing session");
        if let Err(e) = self.driver.close() {
            warn!(error = %e, "Failed to close driver");
        }
    }
}

impl<D: MarketDriver> Drop for SessionController<D> {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
