// S5 (draft-PR recovery) and property 2 (no self-review).

mod support;

use agent_forge::bus::EventBus;
use agent_forge::pr_watcher::PrWatcher;
use agent_forge::rate_governor::RateGovernor;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn s5_ready_draft_with_labels_cleared_is_recovered() {
    let mock = support::MockGitHub::start().await;
    mock.mock_graphql_mutation(1).await;

    let github = Arc::new(mock.client());
    let governor = Arc::new(RateGovernor::new(Duration::from_secs(0)));
    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();

    let watcher = PrWatcher::new(github, governor, bus);
    let recovered = watcher
        .recover_draft_if_ready("ex", "r", 7, "PR_kwAoo", false, Some(true))
        .await
        .unwrap();

    assert!(recovered);
    let event = events.try_recv().expect("a DraftRecovered event was published");
    assert_eq!(event.topic, "pr.event");
    assert_eq!(event.payload["event"], "DraftRecovered");
    assert_eq!(event.payload["pr"], 7);
}

#[tokio::test]
async fn s5_draft_with_blocking_labels_is_not_recovered() {
    let mock = support::MockGitHub::start().await;
    // No graphql mock mounted — a mutation call here would fail with no matcher.

    let github = Arc::new(mock.client());
    let governor = Arc::new(RateGovernor::new(Duration::from_secs(0)));
    let bus = Arc::new(EventBus::new());
    let mut events = bus.subscribe();

    let watcher = PrWatcher::new(github, governor, bus);
    let recovered = watcher
        .recover_draft_if_ready("ex", "r", 7, "PR_kwAoo", true, Some(true))
        .await
        .unwrap();

    assert!(!recovered);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn reviewer_selection_never_includes_the_prs_own_author() {
    let mock = support::MockGitHub::start().await;
    let github = Arc::new(mock.client());
    let governor = Arc::new(RateGovernor::new(Duration::from_secs(0)));
    let bus = Arc::new(EventBus::new());
    let watcher = PrWatcher::new(github, governor, bus);

    let candidates = vec!["dev-A".to_string(), "rev-X".to_string(), "rev-Y".to_string()];
    let excluded = watcher.reviewer_exclusions("dev-A", &candidates);

    assert_eq!(excluded, vec!["dev-A".to_string()]);
    let eligible: Vec<_> = candidates.iter().filter(|c| !excluded.contains(c)).collect();
    assert!(!eligible.iter().any(|c| c.as_str() == "dev-A"));
    assert_eq!(eligible.len(), 2);
}
