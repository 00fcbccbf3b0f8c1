//! Mock driver for integration testing.
//!
//! Provides a deterministic `MarketDriver` implementation with a fixed
//! slate of Bundesliga events, an in-memory betslip and knobs for injecting
//! faults. Clones share state, so a test can keep a handle while the engine
//! owns the driver.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use punter::driver::MarketDriver;
use punter::types::*;

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

fn kickoff(d: u32, h: u32) -> NaiveDateTime {
    day(d).and_hms_opt(h, 30, 0).unwrap()
}

#[derive(Default)]
struct MockState {
    days: Vec<DateGroup>,
    details: HashMap<String, EventDetails>,
    markets: Vec<MarketCategory>,
    bankroll: Decimal,
    bankroll_after_confirm: Option<Decimal>,
    odds: Decimal,
    logged_in: bool,
    stay_logged_out: bool,
    failing_logins: usize,
    league: Option<String>,
    betslip: Vec<(EventHandle, Option<Decimal>)>,
    confirmed_override: Option<usize>,
    failing: HashSet<String>,
    calls: Vec<String>,
    cancels: usize,
    closes: usize,
}

/// A scriptable sportsbook for deterministic testing.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Driver with the default slate and the given balance.
    pub fn new(bankroll: Decimal) -> Self {
        let mut state = MockState {
            bankroll,
            odds: dec!(2.0),
            markets: vec![
                MarketCategory {
                    label: "Main Markets".into(),
                    id: "main".into(),
                    active: false,
                },
                MarketCategory {
                    label: "Handicap – Match".into(),
                    id: "hcp".into(),
                    active: false,
                },
            ],
            ..MockState::default()
        };

        let slate = [
            ("ev-1", 24, 15, "Werder Bremen", "Hamburger SV"),
            ("ev-2", 24, 18, "Bayern Munich", "Borussia Dortmund"),
            ("ev-3", 25, 15, "Manchester United", "VfB Stuttgart"),
            ("ev-4", 25, 17, "Manchester City", "SC Freiburg"),
        ];
        for (id, d, h, home, away) in slate {
            match state.days.iter_mut().find(|g| g.date == day(d)) {
                Some(group) => group.events.push(EventHandle::new(id)),
                None => state.days.push(DateGroup {
                    date: day(d),
                    events: vec![EventHandle::new(id)],
                }),
            }
            state.details.insert(
                id.to_string(),
                EventDetails {
                    home: home.into(),
                    away: away.into(),
                    kickoff: kickoff(d, h),
                },
            );
        }

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Log the call and fail it if `op` has been set to fail.
    fn record(&self, op: &str) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(op.to_string());
        if state.failing.contains(op) {
            return Err(anyhow!("{op} failed (injected)"));
        }
        Ok(state)
    }

    // -- Fault injection --

    /// Make every call to `op` fail.
    pub fn set_error(&self, op: &str) {
        self.lock().failing.insert(op.to_string());
    }

    pub fn clear_error(&self, op: &str) {
        self.lock().failing.remove(op);
    }

    /// Reject the next `n` logins.
    pub fn fail_logins(&self, n: usize) {
        self.lock().failing_logins = n;
    }

    /// Keep reporting a dead session even after logging in.
    pub fn stay_logged_out(&self, on: bool) {
        self.lock().stay_logged_out = on;
    }

    pub fn log_out(&self) {
        self.lock().logged_in = false;
    }

    /// Report this many staked cards regardless of the betslip.
    pub fn override_confirmed_count(&self, count: Option<usize>) {
        self.lock().confirmed_override = count;
    }

    /// Balance to report once `confirm_all` has run.
    pub fn bankroll_after_confirm(&self, amount: Decimal) {
        self.lock().bankroll_after_confirm = Some(amount);
    }

    pub fn activate_market(&self, id: &str) {
        for market in self.lock().markets.iter_mut() {
            market.active = market.id == id;
        }
    }

    // -- Inspection --

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == op).count()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn cancels(&self) -> usize {
        self.lock().cancels
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    pub fn betslip_len(&self) -> usize {
        self.lock().betslip.len()
    }

    pub fn league(&self) -> Option<String> {
        self.lock().league.clone()
    }
}

#[async_trait]
impl MarketDriver for MockDriver {
    async fn is_session_live(&self) -> Result<bool> {
        let state = self.record("is_session_live")?;
        Ok(state.logged_in && !state.stay_logged_out)
    }

    async fn authenticate(&self, _username: &str, _password: &SecretString) -> Result<()> {
        let mut state = self.record("authenticate")?;
        if state.failing_logins > 0 {
            state.failing_logins -= 1;
            return Err(anyhow!("login form rejected credentials"));
        }
        state.logged_in = true;
        Ok(())
    }

    async fn select_league(&self, league: &str) -> Result<()> {
        let mut state = self.record("select_league")?;
        state.league = Some(league.to_string());
        Ok(())
    }

    async fn list_market_categories(&self) -> Result<Vec<MarketCategory>> {
        let state = self.record("list_market_categories")?;
        Ok(state.markets.clone())
    }

    async fn select_market_category(&self, category_id: &str) -> Result<bool> {
        let mut state = self.record("select_market_category")?;
        let mut found = false;
        for market in state.markets.iter_mut() {
            market.active = market.id == category_id;
            found |= market.active;
        }
        Ok(found)
    }

    async fn list_events_by_date(&self) -> Result<Vec<DateGroup>> {
        let state = self.record("list_events_by_date")?;
        Ok(state.days.clone())
    }

    async fn resolve_event(&self, handle: &EventHandle) -> Result<EventDetails> {
        let state = self.record("resolve_event")?;
        state
            .details
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("event {handle} vanished"))
    }

    async fn read_bankroll(&self) -> Result<Decimal> {
        let state = self.record("read_bankroll")?;
        Ok(state.bankroll)
    }

    async fn submit_selection(
        &self,
        _category_id: &str,
        handle: &EventHandle,
        _outcome: Outcome,
    ) -> Result<Selection> {
        let mut state = self.record("submit_selection")?;
        state.betslip.push((handle.clone(), None));

        let shared = self.state.clone();
        let event = handle.clone();
        let cancel = CancelAction::new(move || async move {
            let mut state = shared.lock().unwrap();
            state.cancels += 1;
            state.betslip.retain(|(e, _)| *e != event);
            Ok::<(), anyhow::Error>(())
        });

        Ok(Selection {
            odds: state.odds,
            cancel,
        })
    }

    async fn tender_stake(&self, handle: &EventHandle, stake: Decimal) -> Result<()> {
        let mut state = self.record("tender_stake")?;
        let card = state
            .betslip
            .iter_mut()
            .find(|(e, _)| e == handle)
            .ok_or_else(|| anyhow!("no card for {handle}"))?;
        card.1 = Some(stake);
        Ok(())
    }

    async fn count_confirmed_bets(&self) -> Result<usize> {
        let state = self.record("count_confirmed_bets")?;
        Ok(state
            .confirmed_override
            .unwrap_or_else(|| state.betslip.iter().filter(|(_, s)| s.is_some()).count()))
    }

    async fn count_pending_betslip_cards(&self) -> Result<usize> {
        let state = self.record("count_pending_betslip_cards")?;
        Ok(state.betslip.len())
    }

    async fn confirm_all(&self) -> Result<()> {
        let mut state = self.record("confirm_all")?;
        let staked: Decimal = state.betslip.iter().filter_map(|(_, s)| *s).sum();
        state.betslip.retain(|(_, s)| s.is_none());
        state.bankroll = match state.bankroll_after_confirm {
            Some(amount) => amount,
            None => state.bankroll - staked,
        };
        Ok(())
    }

    async fn force_clear_betslip(&self) -> Result<()> {
        let mut state = self.record("force_clear_betslip")?;
        state.betslip.clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.lock();
        state.closes += 1;
        state.logged_in = false;
        if state.failing.contains("close") {
            return Err(anyhow!("browser process already exited"));
        }
        Ok(())
    }
}
