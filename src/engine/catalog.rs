//! Match catalog resolver.
//!
//! Turns the driver's date-grouped event list into `Fixture`s and narrows it
//! down by date and by fuzzy team-name matching. A home name is matched
//! against the distinct home teams in scope and an away name against the
//! away teams; a query only selects a team when exactly one candidate is
//! close enough, so an ambiguous query yields no fixtures.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::driver::MarketDriver;
use crate::engine::session::SessionController;
use crate::types::{EventHandle, Fixture, PunterError};

/// Default similarity cutoff for team names.
pub const DEFAULT_CUTOFF: f64 = 0.7;

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Which fixtures to surface. An empty query selects every listed event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchQuery {
    pub date: Option<NaiveDate>,
    pub home: Option<String>,
    pub away: Option<String>,
}

impl MatchQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn on(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    pub fn home(mut self, name: impl Into<String>) -> Self {
        self.home = Some(name.into());
        self
    }

    pub fn away(mut self, name: impl Into<String>) -> Self {
        self.away = Some(name.into());
        self
    }

    fn has_names(&self) -> bool {
        self.home.is_some() || self.away.is_some()
    }
}

// ---------------------------------------------------------------------------
// Name matching
// ---------------------------------------------------------------------------

/// Decides whether a free-text team name refers to one of `candidates`.
pub trait NameMatcher: Send + Sync {
    fn matches(&self, query: &str, candidates: &[&str]) -> bool;

    /// Index of the single candidate `query` refers to. Each candidate is
    /// tried on its own; more than one hit is ambiguous.
    fn select(&self, query: &str, candidates: &[&str]) -> Option<usize> {
        let mut hits = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| self.matches(query, &[**c]))
            .map(|(i, _)| i);

        match (hits.next(), hits.next()) {
            (Some(i), None) => Some(i),
            _ => None,
        }
    }
}

impl<F> NameMatcher for F
where
    F: Fn(&str, &[&str]) -> bool + Send + Sync,
{
    fn matches(&self, query: &str, candidates: &[&str]) -> bool {
        self(query, candidates)
    }
}

/// Ratcliff/Obershelp similarity on lowercased names with a cutoff. An exact
/// (case-insensitive) name wins outright; otherwise exactly one candidate
/// may reach the cutoff.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityMatcher {
    pub cutoff: f64,
}

impl Default for SimilarityMatcher {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
        }
    }
}

impl SimilarityMatcher {
    pub fn new(cutoff: f64) -> Self {
        Self { cutoff }
    }
}

impl NameMatcher for SimilarityMatcher {
    fn matches(&self, query: &str, candidates: &[&str]) -> bool {
        self.select(query, candidates).is_some()
    }

    fn select(&self, query: &str, candidates: &[&str]) -> Option<usize> {
        let wanted = query.trim().to_lowercase();
        if let Some(exact) = candidates.iter().position(|c| c.to_lowercase() == wanted) {
            return Some(exact);
        }

        let mut hits = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| similarity(&wanted, c) >= self.cutoff)
            .map(|(i, _)| i);

        match (hits.next(), hits.next()) {
            (Some(i), None) => Some(i),
            _ => None,
        }
    }
}

/// `2 * matched / total` over lowercased characters, where `matched` counts
/// characters in the recursively found longest common blocks.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

/// Earliest longest common run as `(start_a, start_b, len)`.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // run[j + 1]: length of the common run ending at a[i], b[j]
    let mut run = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut next = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = run[j] + 1;
                next[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        run = next;
    }
    best
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub struct MatchCatalog {
    matcher: Box<dyn NameMatcher>,
}

impl Default for MatchCatalog {
    fn default() -> Self {
        Self::new(SimilarityMatcher::default())
    }
}

impl MatchCatalog {
    pub fn new(matcher: impl NameMatcher + 'static) -> Self {
        Self {
            matcher: Box::new(matcher),
        }
    }

    pub fn with_cutoff(cutoff: f64) -> Self {
        Self::new(SimilarityMatcher::new(cutoff))
    }

    /// Fixtures of the current league matching `query`.
    pub async fn select_matches<D: MarketDriver>(
        &self,
        session: &SessionController<D>,
        query: &MatchQuery,
    ) -> Result<Vec<Fixture>, PunterError> {
        self.select_matches_with(session, query, self.matcher.as_ref())
            .await
    }

    /// Same as [`select_matches`](Self::select_matches) with a one-off matcher.
    pub async fn select_matches_with<D: MarketDriver>(
        &self,
        session: &SessionController<D>,
        query: &MatchQuery,
        matcher: &dyn NameMatcher,
    ) -> Result<Vec<Fixture>, PunterError> {
        let groups = session
            .call("list_events_by_date", session.driver().list_events_by_date())
            .await?;

        let handles: Vec<EventHandle> = match query.date {
            // Only the first date bar for the day is considered
            Some(date) => groups
                .into_iter()
                .find(|g| g.date == date)
                .map(|g| g.events)
                .unwrap_or_default(),
            None => groups.into_iter().flat_map(|g| g.events).collect(),
        };

        let mut fixtures = Vec::with_capacity(handles.len());
        for handle in handles {
            let resolved = session
                .call("resolve_event", session.driver().resolve_event(&handle))
                .await;
            match resolved {
                Ok(details) => fixtures.push(Fixture::new(handle, details)),
                Err(e) => warn!(event = %handle, error = %e, "Skipping unreadable event"),
            }
        }
        debug!(in_scope = fixtures.len(), date = ?query.date, "Events resolved");

        let selected = filter_by_names(fixtures, query, matcher);
        info!(
            date = ?query.date,
            home = ?query.home,
            away = ?query.away,
            found = selected.len(),
            "Matches selected"
        );
        Ok(selected)
    }
}

/// Keep the fixtures whose home and away teams are the ones named in
/// `query`. Each name is only matched against its own side.
pub fn filter_by_names(
    fixtures: Vec<Fixture>,
    query: &MatchQuery,
    matcher: &dyn NameMatcher,
) -> Vec<Fixture> {
    if !query.has_names() {
        return fixtures;
    }

    let home = resolve_side(
        matcher,
        "home",
        query.home.as_deref(),
        fixtures.iter().map(|f| f.home.as_str()),
    );
    let away = resolve_side(
        matcher,
        "away",
        query.away.as_deref(),
        fixtures.iter().map(|f| f.away.as_str()),
    );
    let (home, away) = match (home, away) {
        (Some(home), Some(away)) => (home, away),
        _ => return Vec::new(),
    };

    let plays = |team: &str, wanted: &Option<String>| wanted.as_deref().map_or(true, |w| team == w);
    fixtures
        .into_iter()
        .filter(|f| plays(f.home.as_str(), &home) && plays(f.away.as_str(), &away))
        .collect()
}

/// Team on one side that `wanted` selects among the distinct `names`.
/// `Some(None)` when nothing was asked for, `None` when no single team fits.
fn resolve_side<'a>(
    matcher: &dyn NameMatcher,
    side: &'static str,
    wanted: Option<&str>,
    names: impl Iterator<Item = &'a str>,
) -> Option<Option<String>> {
    let Some(query) = wanted else {
        return Some(None);
    };

    let mut candidates: Vec<&str> = Vec::new();
    for name in names {
        if !candidates.contains(&name) {
            candidates.push(name);
        }
    }

    match matcher.select(query, &candidates) {
        Some(i) => candidates.get(i).map(|n| Some(n.to_string())),
        None => {
            debug!(query, side, candidates = candidates.len(), "No unique team name match");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
