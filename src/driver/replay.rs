//! Replay venue.
//!
//! A paper sportsbook served from a JSON file: leagues, their dated events
//! with fixed home/draw/away odds, a market menu and a balance. The betslip
//! lives in memory, so the whole engine can run end to end without a
//! browser. Nothing leaves the process.
//!
//! ```json
//! {
//!   "bankroll": 500.0,
//!   "markets": [{ "label": "Main Markets", "id": "main", "active": true }],
//!   "leagues": {
//!     "bundesliga": [
//!       { "date": "2026-10-24", "events": [
//!         { "id": "bl-1", "home": "Werder Bremen", "away": "Hamburger SV",
//!           "kickoff": "15:30", "odds": { "home": 2.1, "draw": 3.4, "away": 3.3 } }
//!       ] }
//!     ]
//!   }
//! }
//! ```

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::MarketDriver;
use crate::types::{
    CancelAction, DateGroup, EventDetails, EventHandle, MarketCategory, Outcome, Selection,
};

// ---------------------------------------------------------------------------
// Venue file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Venue {
    pub bankroll: Decimal,
    pub markets: Vec<MarketCategory>,
    pub leagues: BTreeMap<String, Vec<VenueDay>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueDay {
    pub date: NaiveDate,
    pub events: Vec<VenueEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueEvent {
    pub id: String,
    pub home: String,
    pub away: String,
    /// Local kickoff time, `HH:MM`.
    pub kickoff: String,
    pub odds: VenueOdds,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VenueOdds {
    pub home: Decimal,
    pub draw: Decimal,
    pub away: Decimal,
}

impl VenueOdds {
    fn price(&self, outcome: Outcome) -> Decimal {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Card {
    event: EventHandle,
    outcome: Outcome,
    odds: Decimal,
    stake: Option<Decimal>,
}

#[derive(Debug)]
struct ReplayState {
    venue: Venue,
    bankroll: Decimal,
    logged_in: bool,
    closed: bool,
    league: Option<String>,
    active_market: Option<String>,
    betslip: Vec<Card>,
    placed: Vec<Card>,
}

impl ReplayState {
    fn days(&self) -> Result<&[VenueDay]> {
        let league = self.league.as_deref().ok_or_else(|| anyhow!("no league open"))?;
        self.venue
            .leagues
            .get(league)
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("unknown league '{league}'"))
    }

    fn event(&self, handle: &EventHandle) -> Result<(NaiveDate, &VenueEvent)> {
        self.days()?
            .iter()
            .find_map(|day| {
                day.events
                    .iter()
                    .find(|e| e.id == handle.as_str())
                    .map(|e| (day.date, e))
            })
            .ok_or_else(|| anyhow!("event row '{handle}' not found"))
    }
}

/// In-memory sportsbook backed by a [`Venue`]. Clones share the same state.
#[derive(Debug, Clone)]
pub struct ReplayDriver {
    state: Arc<Mutex<ReplayState>>,
}

impl ReplayDriver {
    pub fn new(venue: Venue) -> Self {
        let active_market = venue.markets.iter().find(|m| m.active).map(|m| m.id.clone());
        Self {
            state: Arc::new(Mutex::new(ReplayState {
                bankroll: venue.bankroll,
                venue,
                logged_in: false,
                closed: false,
                league: None,
                active_market,
                betslip: Vec::new(),
                placed: Vec::new(),
            })),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let venue: Venue = serde_json::from_str(json).context("Failed to parse venue")?;
        Ok(Self::new(venue))
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read venue file: {path}"))?;
        let driver = Self::from_json(&json).with_context(|| format!("Invalid venue file: {path}"))?;
        info!(path, "Replay venue loaded");
        Ok(driver)
    }

    fn state(&self) -> Result<MutexGuard<'_, ReplayState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("replay venue state poisoned"))
    }

    fn open_state(&self) -> Result<MutexGuard<'_, ReplayState>> {
        let state = self.state()?;
        if state.closed {
            bail!("browser is closed");
        }
        Ok(state)
    }

    /// Cards currently on the betslip.
    pub fn betslip_len(&self) -> usize {
        self.state().map(|s| s.betslip.len()).unwrap_or_default()
    }

    /// Bets placed by `confirm_all` so far, as `(event id, outcome, stake)`.
    pub fn placed(&self) -> Vec<(String, Outcome, Decimal)> {
        self.state()
            .map(|s| {
                s.placed
                    .iter()
                    .map(|c| (c.event.0.clone(), c.outcome, c.stake.unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Simulate the site dropping the login.
    pub fn log_out(&self) {
        if let Ok(mut state) = self.state() {
            state.logged_in = false;
        }
    }
}

#[async_trait]
impl MarketDriver for ReplayDriver {
    async fn is_session_live(&self) -> Result<bool> {
        let state = self.open_state()?;
        Ok(state.logged_in)
    }

    async fn authenticate(&self, username: &str, _password: &SecretString) -> Result<()> {
        let mut state = self.open_state()?;
        if username.trim().is_empty() {
            bail!("login rejected: empty username");
        }
        state.logged_in = true;
        debug!(username, "Replay login");
        Ok(())
    }

    async fn select_league(&self, league: &str) -> Result<()> {
        let mut state = self.open_state()?;
        if !state.venue.leagues.contains_key(league) {
            bail!("unknown league '{league}'");
        }
        state.league = Some(league.to_string());
        Ok(())
    }

    async fn list_market_categories(&self) -> Result<Vec<MarketCategory>> {
        let state = self.open_state()?;
        Ok(state
            .venue
            .markets
            .iter()
            .map(|m| MarketCategory {
                label: m.label.clone(),
                id: m.id.clone(),
                active: state.active_market.as_deref() == Some(m.id.as_str()),
            })
            .collect())
    }

    async fn select_market_category(&self, category_id: &str) -> Result<bool> {
        let mut state = self.open_state()?;
        if state.venue.markets.iter().any(|m| m.id == category_id) {
            state.active_market = Some(category_id.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list_events_by_date(&self) -> Result<Vec<DateGroup>> {
        let state = self.open_state()?;
        Ok(state
            .days()?
            .iter()
            .map(|day| DateGroup {
                date: day.date,
                events: day.events.iter().map(|e| EventHandle::new(&e.id)).collect(),
            })
            .collect())
    }

    async fn resolve_event(&self, handle: &EventHandle) -> Result<EventDetails> {
        let state = self.open_state()?;
        let (date, event) = state.event(handle)?;
        let time = NaiveTime::parse_from_str(&event.kickoff, "%H:%M")
            .with_context(|| format!("bad kickoff '{}' for event {handle}", event.kickoff))?;
        Ok(EventDetails {
            home: event.home.clone(),
            away: event.away.clone(),
            kickoff: date.and_time(time),
        })
    }

    async fn read_bankroll(&self) -> Result<Decimal> {
        let state = self.open_state()?;
        Ok(state.bankroll)
    }

    async fn submit_selection(
        &self,
        category_id: &str,
        handle: &EventHandle,
        outcome: Outcome,
    ) -> Result<Selection> {
        let mut state = self.open_state()?;
        if state.active_market.as_deref() != Some(category_id) {
            bail!("market '{category_id}' is not open");
        }
        let odds = state.event(handle)?.1.odds.price(outcome);

        state.betslip.retain(|c| c.event != *handle);
        state.betslip.push(Card {
            event: handle.clone(),
            outcome,
            odds,
            stake: None,
        });

        let shared = self.state.clone();
        let event = handle.clone();
        let cancel = CancelAction::new(move || async move {
            let mut state = shared
                .lock()
                .map_err(|_| anyhow!("replay venue state poisoned"))?;
            let before = state.betslip.len();
            state.betslip.retain(|c| c.event != event);
            if state.betslip.len() == before {
                bail!("no betslip card for event {event}");
            }
            Ok::<(), anyhow::Error>(())
        });

        Ok(Selection { odds, cancel })
    }

    async fn tender_stake(&self, handle: &EventHandle, stake: Decimal) -> Result<()> {
        let mut state = self.open_state()?;
        if stake > state.bankroll {
            bail!("stake {stake} exceeds balance {}", state.bankroll);
        }
        let card = state
            .betslip
            .iter_mut()
            .find(|c| c.event == *handle)
            .ok_or_else(|| anyhow!("no betslip card for event {handle}"))?;
        card.stake = Some(stake);
        Ok(())
    }

    async fn count_confirmed_bets(&self) -> Result<usize> {
        let state = self.open_state()?;
        Ok(state.betslip.iter().filter(|c| c.stake.is_some()).count())
    }

    async fn count_pending_betslip_cards(&self) -> Result<usize> {
        let state = self.open_state()?;
        Ok(state.betslip.len())
    }

    async fn confirm_all(&self) -> Result<()> {
        let mut state = self.open_state()?;
        let (staked, unstaked): (Vec<Card>, Vec<Card>) =
            state.betslip.drain(..).partition(|c| c.stake.is_some());
        state.betslip = unstaked;

        for card in staked {
            let stake = card.stake.unwrap_or_default();
            state.bankroll -= stake;
            debug!(event = %card.event, outcome = %card.outcome, odds = %card.odds, stake = %stake, "Replay bet placed");
            state.placed.push(card);
        }
        Ok(())
    }

    async fn force_clear_betslip(&self) -> Result<()> {
        let mut state = self.open_state()?;
        state.betslip.clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state()?;
        state.closed = true;
        state.logged_in = false;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
