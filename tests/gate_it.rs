mod common;

// std
use std::sync::Arc;
// crates.io
use time::Duration;
// self
use common::*;
use liftlog_client::{
	auth::AccessToken,
	gate::{GateOutcome, RefreshGate},
};

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
	let stale = token_expiring_in(Duration::hours(1));
	let rotated = token_expiring_in(Duration::days(7));
	let (refresher, release) = ScriptedRefresher::succeeding(rotated.clone()).held();
	let refresher = Arc::new(refresher);
	let gate = Arc::new(RefreshGate::new(memory_token_store(Some(stale)), refresher.clone()));
	let callers = (0..8)
		.map(|_| {
			let gate = gate.clone();

			tokio::spawn(async move { gate.ensure_fresh_token().await })
		})
		.collect::<Vec<_>>();

	while refresher.calls() < 1 || gate.pending_waiters() < 7 {
		tokio::task::yield_now().await;
	}

	assert!(gate.is_refreshing());
	assert!(callers.iter().all(|caller| !caller.is_finished()));

	release.notify_one();

	for caller in callers {
		let pass = caller.await.expect("Gate caller should not panic.");

		assert_eq!(pass.outcome, GateOutcome::Refreshed);
		assert_eq!(pass.token.as_ref(), Some(&rotated));
	}

	assert_eq!(refresher.calls(), 1);
	assert!(!gate.is_refreshing());
	assert_eq!(gate.pending_waiters(), 0);
	assert_eq!(gate.metrics().attempts(), 1);
	assert_eq!(gate.metrics().successes(), 1);
}

#[tokio::test]
async fn tokens_inside_window_refresh_and_outside_do_not() {
	let rotated = token_expiring_in(Duration::days(7));
	let inside = Arc::new(ScriptedRefresher::succeeding(rotated.clone()));
	let gate = RefreshGate::new(
		memory_token_store(Some(token_expiring_in(Duration::hours(23)))),
		inside.clone(),
	);
	let pass = gate.ensure_fresh_token().await;

	assert_eq!(pass.outcome, GateOutcome::Refreshed);
	assert_eq!(inside.calls(), 1);
	// The rotated token is outside the window, so the next call is served as is.
	assert_eq!(gate.ensure_fresh_token().await.outcome, GateOutcome::Fresh);
	assert_eq!(inside.calls(), 1);

	let outside = Arc::new(ScriptedRefresher::succeeding(rotated));
	let current = token_expiring_in(Duration::hours(25));
	let gate = RefreshGate::new(memory_token_store(Some(current.clone())), outside.clone());
	let pass = gate.ensure_fresh_token().await;

	assert_eq!(pass.outcome, GateOutcome::Fresh);
	assert_eq!(pass.token, Some(current));
	assert_eq!(outside.calls(), 0);
}

#[tokio::test]
async fn undecodable_tokens_are_refreshed() {
	let rotated = token_expiring_in(Duration::days(7));
	let refresher = Arc::new(ScriptedRefresher::succeeding(rotated.clone()));
	let gate =
		RefreshGate::new(memory_token_store(Some(AccessToken::new("opaque"))), refresher.clone());
	let pass = gate.ensure_fresh_token().await;

	assert_eq!(pass.outcome, GateOutcome::Refreshed);
	assert_eq!(pass.token, Some(rotated));
	assert_eq!(refresher.calls(), 1);
}

#[tokio::test]
async fn failed_refresh_falls_back_to_stale_token() {
	let stale = token_expiring_in(Duration::hours(2));
	let refresher = Arc::new(ScriptedRefresher::failing());
	let store = memory_token_store(Some(stale.clone()));
	let gate = RefreshGate::new(store.clone(), refresher.clone());
	let pass = gate.ensure_fresh_token().await;

	assert_eq!(pass.outcome, GateOutcome::Stale);
	assert_eq!(pass.token, Some(stale.clone()));
	assert_eq!(store.token(), Some(stale));
	assert_eq!(gate.metrics().failures(), 1);
	assert!(!gate.is_refreshing());
}

#[tokio::test(start_paused = true)]
async fn hung_refresh_times_out_and_releases_waiters() {
	let stale = token_expiring_in(Duration::hours(2));
	let refresher = Arc::new(ScriptedRefresher::hanging());
	let gate = Arc::new(
		RefreshGate::new(memory_token_store(Some(stale.clone())), refresher.clone())
			.with_refresh_timeout(Duration::seconds(1)),
	);
	let leader = tokio::spawn({
		let gate = gate.clone();

		async move { gate.ensure_fresh_token().await }
	});

	while !gate.is_refreshing() {
		tokio::task::yield_now().await;
	}

	let waiter = gate.ensure_fresh_token().await;
	let leader = leader.await.expect("Leader task should not panic.");

	assert_eq!(leader.outcome, GateOutcome::Stale);
	assert_eq!(waiter.outcome, GateOutcome::Stale);
	assert_eq!(waiter.token, Some(stale));
	assert_eq!(refresher.calls(), 1);
	assert_eq!(gate.metrics().timeouts(), 1);
	assert!(!gate.is_refreshing());
}

#[tokio::test]
async fn refreshed_user_is_persisted_with_the_token() {
	let rotated = token_expiring_in(Duration::days(7));
	let store = memory_token_store(Some(token_expiring_in(Duration::minutes(30))));
	let gate =
		RefreshGate::new(store.clone(), Arc::new(ScriptedRefresher::succeeding(rotated.clone())));

	gate.ensure_fresh_token().await;

	assert_eq!(store.token(), Some(rotated));
	assert_eq!(store.user().map(|user| user.email), Some("lifter@example.com".into()));
}
