//! Risk-gated placement, confirmation and clearing against the mock driver.

use rust_decimal_macros::dec;

use punter::engine::catalog::MatchQuery;
use punter::engine::markets::MarketKind;
use punter::engine::risk::RejectionReason;
use punter::types::*;

use crate::mock_driver::{day, MockDriver};
use crate::{logged_in, test_config};

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_paper_bet_confirmed_without_final_click() {
    let driver = MockDriver::new(dec!(100));
    let mut punter = logged_in(&driver, &test_config(Mode::Paper)).await;

    let mut fixtures = punter
        .select_matches(&MatchQuery::on(day(24)).home("Werder Bremen"))
        .await
        .unwrap();
    assert_eq!(fixtures.len(), 1);

    let stake = punter
        .bet_on(fixtures.remove(0), Outcome::Home, dec!(25))
        .await
        .unwrap();
    assert_eq!(stake, dec!(25));
    assert_eq!(punter.bankroll(), dec!(75));
    assert_eq!(driver.betslip_len(), 1);

    assert_eq!(punter.confirm_bets().await.unwrap(), 1);
    assert_eq!(driver.count("confirm_all"), 0);
    assert_eq!(punter.confirmed_bets().len(), 1);
    assert_eq!(punter.confirmed_bets()[0].odds, dec!(2.0));
    assert!(punter.pending_bets().is_empty());
    // Paper venue never debited, so the estimate snaps back
    assert_eq!(punter.bankroll(), dec!(100));
    assert_eq!(punter.bankroll_state().observed, dec!(100));
    assert_eq!(driver.betslip_len(), 0);
}

#[tokio::test]
async fn test_live_bet_clamped_and_reconciled() {
    let driver = MockDriver::new(dec!(100));
    driver.bankroll_after_confirm(dec!(40.5));
    let mut punter = logged_in(&driver, &test_config(Mode::Live)).await;

    let fixture = punter
        .select_matches(&MatchQuery::all().home("Bayern Munchen"))
        .await
        .unwrap()
        .pop()
        .unwrap();
    let stake = punter.bet_on(fixture, Outcome::Away, dec!(1000)).await.unwrap();
    assert_eq!(stake, dec!(60));
    assert_eq!(punter.placed_bets()[0].stake, dec!(60));

    assert_eq!(punter.confirm_bets().await.unwrap(), 1);
    assert_eq!(driver.count("confirm_all"), 1);
    assert_eq!(punter.bankroll(), dec!(40.5));
    assert_eq!(punter.bankroll_state().observed, punter.bankroll());
}

#[tokio::test]
async fn test_confirm_with_nothing_pending() {
    let driver = MockDriver::new(dec!(100));
    let mut punter = logged_in(&driver, &test_config(Mode::Live)).await;
    driver.reset_calls();

    assert_eq!(punter.confirm_bets().await.unwrap(), 0);
    assert_eq!(driver.calls(), vec!["force_clear_betslip".to_string()]);
}

// ---------------------------------------------------------------------------
// Risk limits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sum_stake_limit_rejects_before_driver() {
    let driver = MockDriver::new(dec!(1000));
    let mut cfg = test_config(Mode::Paper);
    cfg.risk.max_sum_stake = dec!(50);
    let mut punter = logged_in(&driver, &cfg).await;

    let mut fixtures = punter.select_matches(&MatchQuery::all()).await.unwrap();
    punter
        .bet_on(fixtures.remove(0), Outcome::Home, dec!(30))
        .await
        .unwrap();
    driver.reset_calls();

    let err = punter
        .bet_on(fixtures.remove(0), Outcome::Draw, dec!(20))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PunterError::RiskLimitExceeded(RejectionReason::SumStakeLimit { .. })
    ));
    assert!(driver.calls().is_empty());
    assert_eq!(punter.placed_bets().len(), 1);
    assert_eq!(punter.sum_stakes(), dec!(30));
}

#[tokio::test]
async fn test_bankroll_floor_stops_betting() {
    let driver = MockDriver::new(dec!(100));
    let mut punter = logged_in(&driver, &test_config(Mode::Paper)).await;

    let mut fixtures = punter.select_matches(&MatchQuery::all()).await.unwrap();
    punter
        .bet_on(fixtures.remove(0), Outcome::Home, dec!(60))
        .await
        .unwrap();
    assert_eq!(punter.bankroll(), dec!(40));

    for stake in [dec!(0.01), dec!(1), dec!(10)] {
        let fixture = punter
            .select_matches(&MatchQuery::all().home("Manchester City"))
            .await
            .unwrap()
            .pop()
            .unwrap();
        let err = punter.bet_on(fixture, Outcome::Away, stake).await.unwrap_err();
        assert!(matches!(
            err,
            PunterError::RiskLimitExceeded(RejectionReason::BankrollFloor { .. })
        ));
    }
    assert_eq!(driver.count("submit_selection"), 1);
}

#[tokio::test]
async fn test_negative_stake_rejected_before_driver() {
    let driver = MockDriver::new(dec!(100));
    let mut punter = logged_in(&driver, &test_config(Mode::Paper)).await;
    let fixture = punter
        .select_matches(&MatchQuery::all().home("Werder Bremen"))
        .await
        .unwrap()
        .pop()
        .unwrap();
    driver.reset_calls();

    let err = punter.bet_on(fixture, Outcome::Home, dec!(-500)).await.unwrap_err();
    assert!(matches!(
        err,
        PunterError::RiskLimitExceeded(RejectionReason::NonPositiveStake { .. })
    ));
    assert!(driver.calls().is_empty());
    assert_eq!(punter.bankroll(), dec!(100));
    assert_eq!(punter.sum_stakes(), dec!(0));
}

// ---------------------------------------------------------------------------
// Faults and unwinding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_count_mismatch_resets_bankroll_then_clear_withdraws() {
    let driver = MockDriver::new(dec!(100));
    let mut punter = logged_in(&driver, &test_config(Mode::Live)).await;

    let fixtures = punter.select_matches(&MatchQuery::on(day(24))).await.unwrap();
    assert_eq!(fixtures.len(), 2);
    for fixture in fixtures {
        punter.bet_on(fixture, Outcome::Home, dec!(10)).await.unwrap();
    }
    driver.override_confirmed_count(Some(1));

    let err = punter.confirm_bets().await.unwrap_err();
    assert!(matches!(
        err,
        PunterError::ConsistencyFault {
            confirmed: 1,
            pending: 2,
            tendered: 2
        }
    ));
    assert_eq!(driver.count("confirm_all"), 0);
    assert_eq!(punter.pending_bets().len(), 2);
    assert_eq!(punter.sum_stakes(), dec!(20));
    // Reconciled to the venue balance even though the cycle failed
    assert_eq!(punter.bankroll(), dec!(100));
    assert_eq!(punter.bankroll_state().observed, punter.bankroll());

    assert_eq!(punter.clear_bets().await, 2);
    assert_eq!(driver.cancels(), 2);
    assert_eq!(punter.sum_stakes(), dec!(20));
    assert_eq!(punter.bankroll(), dec!(100));
    assert_eq!(driver.betslip_len(), 0);

    // Second clear has nothing left to withdraw
    assert_eq!(punter.clear_bets().await, 0);
    assert_eq!(driver.cancels(), 2);
    assert_eq!(punter.placed_bets().len(), 2);
}

#[tokio::test]
async fn test_tender_failure_withdraws_selection() {
    let driver = MockDriver::new(dec!(100));
    let mut punter = logged_in(&driver, &test_config(Mode::Live)).await;
    driver.set_error("tender_stake");

    let fixture = punter
        .select_matches(&MatchQuery::all().away("SC Freiburg"))
        .await
        .unwrap()
        .pop()
        .unwrap();
    let err = punter.bet_on(fixture, Outcome::Draw, dec!(5)).await.unwrap_err();

    assert!(matches!(err, PunterError::DriverFault { op: "tender_stake", .. }));
    assert_eq!(driver.cancels(), 1);
    assert_eq!(driver.betslip_len(), 0);
    assert!(punter.placed_bets().is_empty());
    assert_eq!(punter.bankroll(), dec!(100));

    driver.clear_error("tender_stake");
}

#[tokio::test]
async fn test_failed_cleanup_is_swallowed() {
    let driver = MockDriver::new(dec!(100));
    let mut punter = logged_in(&driver, &test_config(Mode::Paper)).await;
    let fixture = punter
        .select_matches(&MatchQuery::all().home("Werder Bremen"))
        .await
        .unwrap()
        .pop()
        .unwrap();
    punter.bet_on(fixture, Outcome::Home, dec!(5)).await.unwrap();

    driver.set_error("force_clear_betslip");
    assert_eq!(punter.clear_bets().await, 1);
    assert!(punter.pending_bets().is_empty());
}

#[tokio::test]
async fn test_bankroll_read_failure_surfaces_after_confirming() {
    let driver = MockDriver::new(dec!(100));
    let mut punter = logged_in(&driver, &test_config(Mode::Live)).await;
    let fixture = punter
        .select_matches(&MatchQuery::all().home("Werder Bremen"))
        .await
        .unwrap()
        .pop()
        .unwrap();
    punter.bet_on(fixture, Outcome::Home, dec!(5)).await.unwrap();

    driver.set_error("read_bankroll");
    let err = punter.confirm_bets().await.unwrap_err();
    assert!(matches!(err, PunterError::DriverFault { op: "read_bankroll", .. }));
    // The bets themselves went through
    assert_eq!(punter.confirmed_bets().len(), 1);
}

// ---------------------------------------------------------------------------
// Catalog and markets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_ambiguous_team_name_finds_nothing() {
    let driver = MockDriver::new(dec!(100));
    let punter = logged_in(&driver, &test_config(Mode::Paper)).await;

    let found = punter
        .select_matches(&MatchQuery::all().home("Manchester"))
        .await
        .unwrap();
    assert!(found.is_empty());

    let found = punter
        .select_matches(&MatchQuery::all().home("Manchester United"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].away, "VfB Stuttgart");
}

#[tokio::test]
async fn test_team_named_on_wrong_side_finds_nothing() {
    let driver = MockDriver::new(dec!(100));
    let punter = logged_in(&driver, &test_config(Mode::Paper)).await;

    let found = punter
        .select_matches(&MatchQuery::all().home("Borussia Dortmund"))
        .await
        .unwrap();
    assert!(found.is_empty());

    let found = punter
        .select_matches(&MatchQuery::all().away("Borussia Dortmund"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].home, "Bayern Munich");
}

#[tokio::test]
async fn test_custom_matcher() {
    let driver = MockDriver::new(dec!(100));
    let punter = logged_in(&driver, &test_config(Mode::Paper)).await;

    let contains = |q: &str, names: &[&str]| names.iter().any(|n| n.contains(q));
    let found = punter
        .select_matches_with(&MatchQuery::on(day(25)).home("City"), &contains)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].home, "Manchester City");
}

#[tokio::test]
async fn test_unsupported_market_fails_fast() {
    let driver = MockDriver::new(dec!(100));
    let mut punter = logged_in(&driver, &test_config(Mode::Paper)).await;
    driver.reset_calls();

    let err = punter.select_market(MarketKind::HandicapMatch).await.unwrap_err();
    assert!(matches!(err, PunterError::UnsupportedMarket(_)));
    assert!(driver.calls().is_empty());
    assert_eq!(
        punter.selected_market().map(|m| m.kind()),
        Some(MarketKind::MainMarkets)
    );
}

#[tokio::test]
async fn test_snapshot_reflects_ledger() {
    let driver = MockDriver::new(dec!(100));
    let mut punter = logged_in(&driver, &test_config(Mode::Paper)).await;
    let fixture = punter
        .select_matches(&MatchQuery::all().home("Werder Bremen"))
        .await
        .unwrap()
        .pop()
        .unwrap();
    punter.bet_on(fixture, Outcome::Draw, dec!(8)).await.unwrap();
    punter.confirm_bets().await.unwrap();

    let snapshot = punter.snapshot();
    assert_eq!(snapshot.mode, Mode::Paper);
    assert_eq!(snapshot.sum_stakes, dec!(8));
    assert_eq!(snapshot.placed, snapshot.confirmed);
    assert_eq!(snapshot.confirmed[0].choice, Outcome::Draw);
}
