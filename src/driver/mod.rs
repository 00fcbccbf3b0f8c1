//! Market automation drivers.
//!
//! Defines the `MarketDriver` trait: everything the engine needs from the
//! remote sportsbook session, with the page mechanics left to the
//! implementor. Provides:
//! - Replay: a paper venue served from a JSON file, no browser required

pub mod replay;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;

use crate::types::{DateGroup, EventDetails, EventHandle, MarketCategory, Outcome, Selection};

/// Abstraction over a remote sportsbook session.
///
/// Methods report failures as plain `anyhow` errors; the session controller
/// maps them into `PunterError::DriverFault` with the operation name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDriver: Send + Sync {
    /// Whether the remote session is still logged in.
    async fn is_session_live(&self) -> Result<bool>;

    async fn authenticate(&self, username: &str, password: &SecretString) -> Result<()>;

    async fn select_league(&self, league: &str) -> Result<()>;

    /// All wager categories in the market menu, with the selected one flagged.
    async fn list_market_categories(&self) -> Result<Vec<MarketCategory>>;

    /// Switch the market menu. Returns whether the switch took effect.
    async fn select_market_category(&self, category_id: &str) -> Result<bool>;

    /// Events of the current league grouped under their date bars.
    async fn list_events_by_date(&self) -> Result<Vec<DateGroup>>;

    async fn resolve_event(&self, handle: &EventHandle) -> Result<EventDetails>;

    async fn read_bankroll(&self) -> Result<Decimal>;

    /// Put `outcome` of the event on the betslip under `category_id`.
    async fn submit_selection(
        &self,
        category_id: &str,
        handle: &EventHandle,
        outcome: Outcome,
    ) -> Result<Selection>;

    /// Enter a stake on the betslip card for `handle`.
    async fn tender_stake(&self, handle: &EventHandle, stake: Decimal) -> Result<()>;

    /// Betslip cards that carry a stake and are ready to be placed.
    async fn count_confirmed_bets(&self) -> Result<usize>;

    /// Betslip cards currently shown, staked or not.
    async fn count_pending_betslip_cards(&self) -> Result<usize>;

    /// Place every staked card on the betslip.
    async fn confirm_all(&self) -> Result<()>;

    /// Remove every card from the betslip.
    async fn force_clear_betslip(&self) -> Result<()>;

    /// Release the underlying resource. Must be safe to call more than once.
    fn close(&self) -> Result<()>;
}
