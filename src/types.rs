//! Shared types for the PUNTER engine.
//!
//! These types form the data model used across all modules. The driver,
//! catalog, ledger and session modules all depend on them, so they stay
//! free of any driver or engine logic.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use uuid::Uuid;

use crate::engine::risk::RejectionReason;

// ---------------------------------------------------------------------------
// Operating mode
// ---------------------------------------------------------------------------

/// Whether stakes are committed for real.
///
/// Anything other than `"live"` in the config is paper mode: every code path
/// runs, but stakes are not clamped and the final confirm click is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    Live,
    Paper,
}

impl Mode {
    pub fn is_live(&self) -> bool {
        matches!(self, Mode::Live)
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Paper
    }
}

impl From<String> for Mode {
    fn from(s: String) -> Self {
        Mode::from(s.as_str())
    }
}

impl From<&str> for Mode {
    fn from(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("live") {
            Mode::Live
        } else {
            Mode::Paper
        }
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Live => write!(f, "live"),
            Mode::Paper => write!(f, "paper"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Side of a home/draw/away market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    /// Designation the remote betslip uses for this side.
    pub fn designation(&self) -> &'static str {
        match self {
            Outcome::Home => "home",
            Outcome::Draw => "draw",
            Outcome::Away => "away",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.designation())
    }
}

/// Case-insensitive parse; anything but home/draw/away is rejected.
impl std::str::FromStr for Outcome {
    type Err = PunterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "home" => Ok(Outcome::Home),
            "draw" => Ok(Outcome::Draw),
            "away" => Ok(Outcome::Away),
            _ => Err(PunterError::InvalidOutcome(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Login credentials for the remote market. The password never appears in
/// `Debug` output.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Driver-facing values
// ---------------------------------------------------------------------------

/// Opaque reference to a driver-side event row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventHandle(pub String);

impl EventHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Events listed under one date bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGroup {
    pub date: NaiveDate,
    pub events: Vec<EventHandle>,
}

/// Resolved details of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    pub home: String,
    pub away: String,
    pub kickoff: NaiveDateTime,
}

/// A wager category as listed in the market menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketCategory {
    pub label: String,
    pub id: String,
    /// Whether the menu currently shows this category as selected.
    #[serde(default)]
    pub active: bool,
}

/// Result of putting a selection on the betslip.
#[derive(Debug)]
pub struct Selection {
    /// Decimal odds offered at selection time.
    pub odds: Decimal,
    /// Withdraws the selection from the betslip.
    pub cancel: CancelAction,
}

// ---------------------------------------------------------------------------
// Cancellation action
// ---------------------------------------------------------------------------

/// Deferred withdrawal of a not-yet-confirmed betslip selection.
///
/// Owned and consumed on invocation, so it runs at most once.
pub struct CancelAction(Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>);

impl CancelAction {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self(Box::new(move || f().boxed()))
    }

    /// An action that does nothing (selection has no remote card to close).
    pub fn noop() -> Self {
        Self::new(|| async { Ok(()) })
    }

    pub async fn invoke(self) -> Result<()> {
        (self.0)().await
    }
}

impl fmt::Debug for CancelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelAction(..)")
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// A single bettable event surfaced by the match catalog.
#[derive(Debug)]
pub struct Fixture {
    pub home: String,
    pub away: String,
    pub kickoff: NaiveDateTime,
    pub handle: EventHandle,
    /// Set once a selection for this fixture sits on the betslip.
    pub cancel: Option<CancelAction>,
}

impl Fixture {
    pub fn new(handle: EventHandle, details: EventDetails) -> Self {
        Self {
            home: details.home,
            away: details.away,
            kickoff: details.kickoff,
            handle,
            cancel: None,
        }
    }
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "At: {} Home: {} - Away: {}",
            self.kickoff.format("%Y-%m-%d %H:%M"),
            self.home,
            self.away
        )
    }
}

// ---------------------------------------------------------------------------
// Wager lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle of a single wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WagerState {
    Idle,
    Authorized,
    Tendered,
    Confirmed,
    Cancelled,
}

impl WagerState {
    pub fn can_transition_to(&self, next: WagerState) -> bool {
        use WagerState::*;
        matches!(
            (self, next),
            (Idle, Authorized)
                | (Authorized, Tendered)
                | (Tendered, Confirmed)
                | (Tendered, Cancelled)
        )
    }
}

impl fmt::Display for WagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WagerState::Idle => write!(f, "idle"),
            WagerState::Authorized => write!(f, "authorized"),
            WagerState::Tendered => write!(f, "tendered"),
            WagerState::Confirmed => write!(f, "confirmed"),
            WagerState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Audit record of a bet that passed the risk engine and was tendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedBet {
    pub bet_id: Uuid,
    pub placed_at: DateTime<Utc>,
    pub kickoff: NaiveDateTime,
    pub home: String,
    pub away: String,
    pub stake: Decimal,
    pub odds: Decimal,
    pub choice: Outcome,
    pub market: String,
    pub mode: Mode,
}

impl fmt::Display for PlacedBet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - {} {} @ {} stake={} ({})",
            self.market, self.home, self.away, self.choice, self.odds, self.stake, self.mode,
        )
    }
}

impl PlacedBet {
    /// Gross return if the bet wins.
    pub fn potential_return(&self) -> Decimal {
        self.stake * self.odds
    }
}

/// A tendered bet waiting for confirmation.
#[derive(Debug)]
pub struct PendingBet {
    pub bet_id: Uuid,
    pub market: String,
    pub category_id: String,
    pub choice: Outcome,
    pub fixture: Fixture,
    pub odds: Decimal,
    pub stake: Decimal,
    pub state: WagerState,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for PUNTER.
#[derive(Debug, thiserror::Error)]
pub enum PunterError {
    #[error("Risk limit exceeded: {0}")]
    RiskLimitExceeded(RejectionReason),

    #[error(
        "Bets are not placed correctly: confirmed={confirmed}, pending={pending}, tendered={tendered}"
    )]
    ConsistencyFault {
        confirmed: usize,
        pending: usize,
        tendered: usize,
    },

    #[error("Connection fault: {0}")]
    ConnectionFault(String),

    #[error("Driver call `{op}` failed: {cause}")]
    DriverFault {
        op: &'static str,
        cause: anyhow::Error,
    },

    #[error("Market '{0}' is not supported yet")]
    UnsupportedMarket(String),

    #[error("No market is selected")]
    NoActiveMarket,

    #[error("Invalid outcome '{0}': expected home, draw or away")]
    InvalidOutcome(String),

    #[error("Session is closed")]
    SessionClosed,
}

impl PunterError {
    pub fn driver(op: &'static str, cause: anyhow::Error) -> Self {
        PunterError::DriverFault { op, cause }
    }

    pub fn is_connection_fault(&self) -> bool {
        matches!(self, PunterError::ConnectionFault(_))
    }

    pub fn is_risk_rejection(&self) -> bool {
        matches!(self, PunterError::RiskLimitExceeded(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
