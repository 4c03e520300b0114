// S2 (two pollers race) and S6 (restart safety) against a mocked issue
// comment thread.

mod support;

use agent_forge::claim::{ClaimOutcome, ClaimProtocol};
use agent_forge::rate_governor::RateGovernor;
use chrono::Duration;
use support::comment_json;

#[tokio::test]
async fn second_claimant_sees_first_as_owner_and_does_not_post() {
    let mock = support::MockGitHub::start().await;
    let client = mock.client();
    let gov = RateGovernor::new(std::time::Duration::from_secs(600));

    let claim_body = format!(
        "🤖 Agent dev-A started working on this issue at {}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    mock.mock_comments(
        "ex",
        "r",
        7,
        serde_json::json!([comment_json(1, "dev-A", &claim_body)]),
    )
    .await;
    // No create-comment mock mounted at all: if the second claimant tried to
    // post, wiremock would 404 and the call would surface as an error.

    let protocol = ClaimProtocol {
        github: &client,
        rate_governor: &gov,
    };

    let outcome = protocol
        .try_claim("ex", "r", 7, "dev-B", Duration::minutes(30), "acct")
        .await
        .unwrap();

    assert!(matches!(outcome, ClaimOutcome::Taken { other_agent, .. } if other_agent == "dev-A"));
}

#[tokio::test]
async fn restart_recovers_existing_unexpired_claim_without_reposting() {
    let mock = support::MockGitHub::start().await;
    let client = mock.client();
    let gov = RateGovernor::new(std::time::Duration::from_secs(600));

    let claim_body = format!(
        "🤖 Agent dev-A started working on this issue at {}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    mock.mock_comments(
        "ex",
        "r",
        13,
        serde_json::json!([comment_json(1, "dev-A", &claim_body)]),
    )
    .await;

    let protocol = ClaimProtocol {
        github: &client,
        rate_governor: &gov,
    };

    // Simulates the orchestrator restarting: a brand new process re-reads the
    // same comment thread and must recognize its own still-live claim.
    let outcome = protocol
        .try_claim("ex", "r", 13, "dev-A", Duration::minutes(30), "acct")
        .await
        .unwrap();

    assert!(matches!(outcome, ClaimOutcome::AlreadyOwned { .. }));
}

#[tokio::test]
async fn expired_claim_allows_new_owner_to_post() {
    let mock = support::MockGitHub::start().await;
    let client = mock.client();
    let gov = RateGovernor::new(std::time::Duration::from_secs(600));

    let stale_ts = chrono::Utc::now() - Duration::hours(2);
    let claim_body = format!(
        "🤖 Agent dev-A started working on this issue at {}",
        stale_ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    mock.mock_comments_up_to(
        "ex",
        "r",
        21,
        serde_json::json!([comment_json(1, "dev-A", &claim_body)]),
        1,
    )
    .await;
    mock.mock_create_comment("ex", "r", 21, 1).await;
    // After posting, try_claim re-reads comments; the first mock is exhausted
    // after one match so this one takes over, simulating the new comment
    // having landed.
    let fresh_body = format!(
        "🤖 Agent dev-B started working on this issue at {}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    mock.mock_comments(
        "ex",
        "r",
        21,
        serde_json::json!([comment_json(1, "dev-A", &claim_body), comment_json(2, "dev-B", &fresh_body)]),
    )
    .await;

    let protocol = ClaimProtocol {
        github: &client,
        rate_governor: &gov,
    };

    let outcome = protocol
        .try_claim("ex", "r", 21, "dev-B", Duration::minutes(30), "acct")
        .await
        .unwrap();

    assert!(matches!(outcome, ClaimOutcome::Owned { .. }));
}

#[tokio::test]
async fn release_unclaimed_posts_no_agent_available_comment() {
    let mock = support::MockGitHub::start().await;
    let client = mock.client();
    let gov = RateGovernor::new(std::time::Duration::from_secs(600));
    mock.mock_create_comment("ex", "r", 9, 1).await;

    let protocol = ClaimProtocol {
        github: &client,
        rate_governor: &gov,
    };

    protocol
        .release_unclaimed("ex", "r", 9, "acct")
        .await
        .unwrap();
}
