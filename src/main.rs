//! PUNTER: risk-controlled sportsbook wagering engine
//!
//! Entry point. Loads configuration, initialises structured logging, logs in
//! to the replay venue, works through the configured tickets, confirms the
//! resulting bets and saves the ledger.

use anyhow::Result;
use tracing::{error, info, warn};

use punter::config::{AppConfig, Ticket};
use punter::driver::replay::ReplayDriver;
use punter::engine::catalog::MatchQuery;
use punter::engine::markets::MarketKind;
use punter::engine::Punter;
use punter::storage;

const BANNER: &str = r#"
 ____  _   _ _   _ _____ _____ ____
|  _ \| | | | \ | |_   _| ____|  _ \
| |_) | | | |  \| | | | |  _| | |_) |
|  __/| |_| | |\  | | | | |___|  _ <
|_|    \___/|_| \_| |_| |_____|_| \_\

  Risk-controlled sportsbook wagering engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("PUNTER_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        config = %config_path,
        mode = %cfg.session.mode,
        league = %cfg.session.default_league,
        tickets = cfg.tickets.len(),
        "PUNTER starting up"
    );

    let ledger_path = cfg.storage.ledger_path.as_str();
    if let Some(previous) = storage::load_ledger(Some(ledger_path))? {
        info!(
            saved_at = %previous.saved_at,
            confirmed = previous.confirmed.len(),
            bankroll = %previous.bankroll.observed,
            "Previous run"
        );
    }

    // -- Login ----------------------------------------------------------------

    let credentials = cfg.credentials()?;
    let venue = cfg.venue.fixture.clone();
    let mut punter = Punter::login(|| ReplayDriver::from_file(&venue), credentials, &cfg).await?;

    if let Err(e) = punter.select_market(MarketKind::MainMarkets).await {
        error!(error = %e, "Main market unavailable");
        punter.close().await;
        return Err(e.into());
    }

    // -- Tickets --------------------------------------------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let interrupted = tokio::select! {
        _ = run_tickets(&mut punter, &cfg.tickets) => false,
        _ = &mut shutdown => {
            warn!("Interrupted, withdrawing pending bets");
            true
        }
    };

    // -- Confirm & persist ----------------------------------------------------

    if interrupted {
        punter.clear_bets().await;
    } else {
        match punter.confirm_bets().await {
            Ok(count) => info!(count, bankroll = %punter.bankroll(), "Bets confirmed"),
            Err(e) => {
                error!(error = %e, "Confirmation failed, clearing betslip");
                punter.clear_bets().await;
            }
        }
    }

    for bet in punter.confirmed_bets() {
        info!(
            bet = %bet,
            potential_return = %bet.potential_return(),
            "Confirmed"
        );
    }

    if let Err(e) = storage::save_ledger(&punter.snapshot(), Some(ledger_path)) {
        error!(error = %e, "Failed to save ledger");
    }

    punter.close().await;
    info!(
        placed = punter.placed_bets().len(),
        sum_stakes = %punter.sum_stakes(),
        "PUNTER shut down"
    );
    Ok(())
}

/// Place one bet per ticket. Tickets that cannot be placed are logged and
/// skipped.
async fn run_tickets(punter: &mut Punter<ReplayDriver>, tickets: &[Ticket]) {
    for (n, ticket) in tickets.iter().enumerate() {
        if let Some(league) = ticket.league.as_deref() {
            if punter.league() != Some(league) {
                if let Err(e) = punter.select_league(league).await {
                    warn!(ticket = n, league, error = %e, "League unavailable, skipping ticket");
                    continue;
                }
                if let Err(e) = punter.select_market(MarketKind::MainMarkets).await {
                    warn!(ticket = n, league, error = %e, "Main market unavailable, skipping ticket");
                    continue;
                }
            }
        }

        let query = MatchQuery {
            date: ticket.date,
            home: ticket.home.clone(),
            away: ticket.away.clone(),
        };
        let mut fixtures = match punter.select_matches(&query).await {
            Ok(fixtures) => fixtures,
            Err(e) => {
                warn!(ticket = n, error = %e, "Match lookup failed, skipping ticket");
                continue;
            }
        };

        if fixtures.len() != 1 {
            warn!(
                ticket = n,
                found = fixtures.len(),
                home = ?ticket.home,
                away = ?ticket.away,
                "Ticket does not identify exactly one match, skipping"
            );
            continue;
        }
        let Some(fixture) = fixtures.pop() else {
            continue;
        };

        match punter.bet_on(fixture, ticket.pick, ticket.stake).await {
            Ok(stake) => info!(ticket = n, stake = %stake, pick = %ticket.pick, "Ticket placed"),
            Err(e) if e.is_risk_rejection() => {
                warn!(ticket = n, reason = %e, "Ticket rejected by risk limits");
            }
            Err(e) => error!(ticket = n, error = %e, "Ticket failed"),
        }
    }
}

/// Initialise the tracing subscriber with env-filter and optional JSON output.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("punter=info"));

    let json_logging = std::env::var("PUNTER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
