// Deterministic GitHub API mocking for integration tests, following the
// wiremock-against-octocrab pattern: point a `GitHubClient` at a local
// `MockServer` instead of api.github.com.
//
// Shared across several test binaries; not every binary uses every helper.
#![allow(dead_code)]

use agent_forge::GitHubClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct MockGitHub {
    pub server: MockServer,
}

impl MockGitHub {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn client(&self) -> GitHubClient {
        let octocrab = octocrab::Octocrab::builder()
            .base_uri(self.server.uri())
            .expect("mock uri parses")
            .personal_token("mock-token")
            .build()
            .expect("octocrab builds against mock server");
        GitHubClient::from_octocrab(octocrab)
    }

    pub async fn mock_issues_list(&self, owner: &str, repo: &str, label: Option<&str>, issues: serde_json::Value) {
        let mut given = Mock::given(method("GET")).and(path(format!("/repos/{owner}/{repo}/issues")));
        if let Some(label) = label {
            given = given.and(wiremock::matchers::query_param("labels", label));
        }
        given
            .respond_with(ResponseTemplate::new(200).set_body_json(issues))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_comments(&self, owner: &str, repo: &str, issue: u64, comments: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{owner}/{repo}/issues/{issue}/comments")))
            .respond_with(ResponseTemplate::new(200).set_body_json(comments))
            .mount(&self.server)
            .await;
    }

    /// Matches only the first `n` comment-list requests for this issue, then
    /// stops matching — used to simulate the thread changing mid-sequence
    /// (e.g. a claim comment landing between two reads).
    pub async fn mock_comments_up_to(&self, owner: &str, repo: &str, issue: u64, comments: serde_json::Value, n: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{owner}/{repo}/issues/{issue}/comments")))
            .respond_with(ResponseTemplate::new(200).set_body_json(comments))
            .up_to_n_times(n)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_graphql_mutation(&self, expect_times: u64) {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {}})))
            .expect(expect_times)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_create_comment(&self, owner: &str, repo: &str, issue: u64, expect_times: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/repos/{owner}/{repo}/issues/{issue}/comments")))
            .respond_with(ResponseTemplate::new(201).set_body_json(comment_json(999, "dev-A", "posted")))
            .expect(expect_times)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_add_labels(&self, owner: &str, repo: &str, issue: u64, expect_times: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/repos/{owner}/{repo}/issues/{issue}/labels")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(expect_times)
            .mount(&self.server)
            .await;
    }
}

fn author_json(login: &str, id: u64) -> serde_json::Value {
    let base = format!("https://api.github.com/users/{login}");
    serde_json::json!({
        "login": login,
        "id": id,
        "node_id": format!("user-{id}"),
        "avatar_url": format!("{base}/avatar"),
        "gravatar_id": "",
        "url": base,
        "html_url": format!("https://github.com/{login}"),
        "followers_url": format!("{base}/followers"),
        "following_url": format!("{base}/following{{/other_user}}"),
        "gists_url": format!("{base}/gists{{/gist_id}}"),
        "starred_url": format!("{base}/starred{{/owner}}{{/repo}}"),
        "subscriptions_url": format!("{base}/subscriptions"),
        "organizations_url": format!("{base}/orgs"),
        "repos_url": format!("{base}/repos"),
        "events_url": format!("{base}/events{{/privacy}}"),
        "received_events_url": format!("{base}/received_events"),
        "type": "User",
        "site_admin": false,
        "name": null,
        "patch_url": null,
    })
}

pub fn issue_json(number: u64, title: &str, body: &str, labels: &[&str], owner: &str, repo: &str) -> serde_json::Value {
    serde_json::json!({
        "id": number,
        "node_id": format!("issue-{number}"),
        "number": number,
        "title": title,
        "body": body,
        "state": "open",
        "user": author_json("filer", 99),
        "labels": labels.iter().map(|l| serde_json::json!({
            "id": 1, "node_id": "label-1", "name": l, "color": "ededed", "default": false,
            "url": format!("https://api.github.com/repos/{owner}/{repo}/labels/{l}"),
        })).collect::<Vec<_>>(),
        "locked": false,
        "assignees": [],
        "comments": 0,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z",
        "author_association": "NONE",
        "repository_url": format!("https://api.github.com/repos/{owner}/{repo}"),
        "labels_url": format!("https://api.github.com/repos/{owner}/{repo}/issues/{number}/labels{{/name}}"),
        "comments_url": format!("https://api.github.com/repos/{owner}/{repo}/issues/{number}/comments"),
        "events_url": format!("https://api.github.com/repos/{owner}/{repo}/issues/{number}/events"),
        "html_url": format!("https://github.com/{owner}/{repo}/issues/{number}"),
        "url": format!("https://api.github.com/repos/{owner}/{repo}/issues/{number}"),
    })
}

pub fn comment_json(id: u64, login: &str, body: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "node_id": format!("node-{id}"),
        "body": body,
        "author_association": "NONE",
        "user": author_json(login, 1),
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z",
        "html_url": format!("https://github.com/ex/r/issues/1#issuecomment-{id}"),
        "issue_url": "https://api.github.com/repos/ex/r/issues/1",
        "url": format!("https://api.github.com/repos/ex/r/issues/comments/{id}"),
    })
}
