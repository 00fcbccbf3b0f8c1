//! Market selector.
//!
//! Maps the driver's market menu onto the wager categories the engine knows,
//! and tracks the single category that is active for the session. Only the
//! main home/draw/away market can take bets today; the other kinds are known
//! so that asking for them fails with a clear error instead of a bad click.

use rust_decimal::Decimal;
use std::fmt;
use tracing::{debug, warn};

use crate::driver::MarketDriver;
use crate::engine::session::SessionController;
use crate::types::{Fixture, MarketCategory, Outcome, PunterError};

// ---------------------------------------------------------------------------
// Market kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketKind {
    MainMarkets,
    MoneylineMatch,
    HandicapMatch,
    TotalMatch,
    TeamTotalMatch,
    MoneylineFirstHalf,
    HandicapFirstHalf,
    TotalFirstHalf,
    TeamTotalFirstHalf,
}

impl MarketKind {
    pub const ALL: [MarketKind; 9] = [
        MarketKind::MainMarkets,
        MarketKind::MoneylineMatch,
        MarketKind::HandicapMatch,
        MarketKind::TotalMatch,
        MarketKind::TeamTotalMatch,
        MarketKind::MoneylineFirstHalf,
        MarketKind::HandicapFirstHalf,
        MarketKind::TotalFirstHalf,
        MarketKind::TeamTotalFirstHalf,
    ];

    /// Label as printed in the remote market menu.
    pub fn label(&self) -> &'static str {
        match self {
            MarketKind::MainMarkets => "Main Markets",
            MarketKind::MoneylineMatch => "Moneyline – Match",
            MarketKind::HandicapMatch => "Handicap – Match",
            MarketKind::TotalMatch => "Total – Match",
            MarketKind::TeamTotalMatch => "Team Total – Match",
            MarketKind::MoneylineFirstHalf => "Moneyline – 1st Half",
            MarketKind::HandicapFirstHalf => "Handicap – 1st Half",
            MarketKind::TotalFirstHalf => "Total – 1st Half",
            MarketKind::TeamTotalFirstHalf => "Team Total – 1st Half",
        }
    }

    /// Case- and whitespace-insensitive; a plain hyphen is accepted in place
    /// of the en dash.
    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = normalize_label(label);
        Self::ALL
            .into_iter()
            .find(|kind| normalize_label(kind.label()) == wanted)
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, MarketKind::MainMarkets)
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn normalize_label(label: &str) -> String {
    label
        .replace('–', "-")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Market choices
// ---------------------------------------------------------------------------

/// A wager category the engine can submit selections to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketChoice {
    /// Home / draw / away on the full match.
    MainMarket { label: String, id: String },
}

impl MarketChoice {
    /// Build the choice for `kind`, failing fast for kinds with no
    /// submission support.
    pub fn build(
        kind: MarketKind,
        label: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self, PunterError> {
        match kind {
            MarketKind::MainMarkets => Ok(MarketChoice::MainMarket {
                label: label.into(),
                id: id.into(),
            }),
            other => Err(PunterError::UnsupportedMarket(other.label().to_string())),
        }
    }

    pub fn kind(&self) -> MarketKind {
        match self {
            MarketChoice::MainMarket { .. } => MarketKind::MainMarkets,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MarketChoice::MainMarket { label, .. } => label,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            MarketChoice::MainMarket { id, .. } => id,
        }
    }

    /// Put `outcome` for `fixture` on the betslip and return the offered
    /// odds. The selection's cancel action is attached to the fixture.
    pub async fn submit<D: MarketDriver>(
        &self,
        session: &SessionController<D>,
        fixture: &mut Fixture,
        outcome: Outcome,
    ) -> Result<Decimal, PunterError> {
        // A fixture holds one selection at a time
        session.withdraw(fixture).await;

        match self {
            MarketChoice::MainMarket { id, .. } => {
                let selection = session
                    .call(
                        "submit_selection",
                        session.driver().submit_selection(id, &fixture.handle, outcome),
                    )
                    .await?;
                debug!(
                    fixture = %fixture,
                    outcome = %outcome,
                    odds = %selection.odds,
                    "Selection submitted"
                );
                fixture.cancel = Some(selection.cancel);
                Ok(selection.odds)
            }
        }
    }
}

impl fmt::Display for MarketChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Supported choices offered by the current league, plus the active one.
#[derive(Debug, Clone, Default)]
pub struct MarketBoard {
    choices: Vec<MarketChoice>,
    active: Option<MarketKind>,
}

impl MarketBoard {
    pub fn from_categories(categories: &[MarketCategory]) -> Self {
        let mut board = MarketBoard::default();

        for category in categories {
            let Some(kind) = MarketKind::from_label(&category.label) else {
                debug!(label = %category.label, "Ignoring unknown market category");
                continue;
            };
            match MarketChoice::build(kind, category.label.clone(), category.id.clone()) {
                Ok(choice) => {
                    if category.active && board.active.is_none() {
                        board.active = Some(kind);
                    }
                    if board.get(kind).is_none() {
                        board.choices.push(choice);
                    }
                }
                Err(e) => warn!(error = %e, "Skipping market category"),
            }
        }

        board
    }

    pub fn choices(&self) -> &[MarketChoice] {
        &self.choices
    }

    pub fn get(&self, kind: MarketKind) -> Option<&MarketChoice> {
        self.choices.iter().find(|c| c.kind() == kind)
    }

    pub fn active(&self) -> Option<&MarketChoice> {
        self.active.and_then(|kind| self.get(kind))
    }

    pub fn is_active(&self, kind: MarketKind) -> bool {
        self.active == Some(kind)
    }

    /// Mark `kind` as the active choice. Returns false if it is not offered.
    pub fn activate(&mut self, kind: MarketKind) -> bool {
        if self.get(kind).is_some() {
            self.active = Some(kind);
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
