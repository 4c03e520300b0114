// Typed, thin wrapper over the GitHub REST surface this service needs.
// Every operation goes through `GitHubRetryHandler` so transient failures are
// retried once at this layer; callers see a `ForgeError`, never an octocrab
// error.

use crate::error::ForgeError;
use crate::github::errors::GitHubError;
use crate::github::pagination::collect_all;
use crate::github::retry::GitHubRetryHandler;
use crate::github::types::{IssueState, WorkItem};
use octocrab::models::{issues::Comment, issues::Issue, pulls::PullRequest};
use octocrab::params;
use octocrab::Octocrab;

#[derive(Debug)]
pub struct GitHubClient {
    octocrab: Octocrab,
    retry: GitHubRetryHandler,
}

impl GitHubClient {
    pub fn new(token: String) -> Result<Self, GitHubError> {
        let octocrab = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(GitHubError::from)?;
        Ok(Self {
            octocrab,
            retry: GitHubRetryHandler::default(),
        })
    }

    pub fn from_octocrab(octocrab: Octocrab) -> Self {
        Self {
            octocrab,
            retry: GitHubRetryHandler::default(),
        }
    }

    async fn with_retry<F, Fut, R>(&self, op: F) -> Result<R, ForgeError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<R, ForgeError>>,
    {
        self.retry.execute_with_retry(op).await
    }

    pub async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        labels: &[String],
    ) -> Result<Vec<WorkItem>, ForgeError> {
        self.with_retry(|| async {
            let handler = self.octocrab.issues(owner, repo);
            let mut builder = handler.list().state(params::State::Open).per_page(100);
            if !labels.is_empty() {
                builder = builder.labels(labels);
            }
            let page = builder.send().await.map_err(GitHubError::from)?;
            let issues = collect_all(&self.octocrab, page).await?;
            Ok(issues
                .into_iter()
                .filter(|i| i.pull_request.is_none())
                .map(to_work_item)
                .collect())
        })
        .await
    }

    pub async fn get_issue(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<WorkItem, ForgeError> {
        self.with_retry(|| async {
            let issue = self
                .octocrab
                .issues(owner, repo)
                .get(number)
                .await
                .map_err(GitHubError::from)?;
            Ok(to_work_item(issue))
        })
        .await
    }

    pub async fn list_comments(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
    ) -> Result<Vec<Comment>, ForgeError> {
        self.with_retry(|| async {
            let page = self
                .octocrab
                .issues(owner, repo)
                .list_comments(issue_number)
                .per_page(100)
                .send()
                .await
                .map_err(GitHubError::from)?;
            Ok(collect_all(&self.octocrab, page).await?)
        })
        .await
    }

    pub async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<Comment, ForgeError> {
        self.with_retry(|| async {
            self.octocrab
                .issues(owner, repo)
                .create_comment(issue_number, body)
                .await
                .map_err(|e| GitHubError::from(e).into())
        })
        .await
    }

    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<WorkItem, ForgeError> {
        self.with_retry(|| async {
            let issue = self
                .octocrab
                .issues(owner, repo)
                .create(title)
                .body(body)
                .labels(labels.to_vec())
                .send()
                .await
                .map_err(GitHubError::from)?;
            Ok(to_work_item(issue))
        })
        .await
    }

    pub async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        labels: &[String],
    ) -> Result<(), ForgeError> {
        self.with_retry(|| async {
            self.octocrab
                .issues(owner, repo)
                .add_labels(issue_number, labels)
                .await
                .map_err(GitHubError::from)?;
            Ok(())
        })
        .await
    }

    pub async fn remove_labels(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        labels: &[String],
    ) -> Result<(), ForgeError> {
        self.with_retry(|| async {
            for label in labels {
                let result = self
                    .octocrab
                    .issues(owner, repo)
                    .remove_label(issue_number, label)
                    .await;
                if let Err(e) = result {
                    let github_err = GitHubError::from(e);
                    if !matches!(github_err, GitHubError::NotFound(_)) {
                        return Err(github_err.into());
                    }
                }
            }
            Ok(())
        })
        .await
    }

    pub async fn list_pulls(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        self.with_retry(|| async {
            let page = self
                .octocrab
                .pulls(owner, repo)
                .list()
                .state(params::State::Open)
                .per_page(100)
                .send()
                .await
                .map_err(GitHubError::from)?;
            Ok(collect_all(&self.octocrab, page).await?)
        })
        .await
    }

    pub async fn get_pull(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, ForgeError> {
        self.with_retry(|| async {
            self.octocrab
                .pulls(owner, repo)
                .get(number)
                .await
                .map_err(|e| GitHubError::from(e).into())
        })
        .await
    }

    pub async fn convert_pull_to_draft(
        &self,
        owner: &str,
        repo: &str,
        node_id: &str,
    ) -> Result<(), ForgeError> {
        self.graphql_pull_readiness(owner, repo, node_id, true)
            .await
    }

    pub async fn mark_pull_ready(
        &self,
        owner: &str,
        repo: &str,
        node_id: &str,
    ) -> Result<(), ForgeError> {
        self.graphql_pull_readiness(owner, repo, node_id, false)
            .await
    }

    async fn graphql_pull_readiness(
        &self,
        _owner: &str,
        _repo: &str,
        node_id: &str,
        to_draft: bool,
    ) -> Result<(), ForgeError> {
        let mutation_name = if to_draft {
            "convertPullRequestToDraft"
        } else {
            "markPullRequestReadyForReview"
        };
        let query = format!(
            "mutation($id: ID!) {{ {mutation_name}(input: {{ pullRequestId: $id }}) {{ clientMutationId }} }}"
        );
        self.with_retry(|| async {
            let body = serde_json::json!({ "query": query, "variables": { "id": node_id } });
            self.octocrab
                .graphql::<serde_json::Value>(&body)
                .await
                .map_err(GitHubError::from)?;
            Ok(())
        })
        .await
    }

    pub async fn merge_pull(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        method: params::pulls::MergeMethod,
    ) -> Result<(), ForgeError> {
        self.with_retry(|| async {
            let result = self
                .octocrab
                .pulls(owner, repo)
                .merge(number)
                .method(method)
                .send()
                .await
                .map_err(GitHubError::from)?;
            if result.merged {
                Ok(())
            } else {
                Err(ForgeError::Conflict(format!(
                    "pull #{number} was not merged"
                )))
            }
        })
        .await
    }

    pub async fn authenticated_user(&self) -> Result<String, ForgeError> {
        self.with_retry(|| async {
            let user = self
                .octocrab
                .current()
                .user()
                .await
                .map_err(GitHubError::from)?;
            Ok(user.login)
        })
        .await
    }
}

fn to_work_item(issue: Issue) -> WorkItem {
    WorkItem {
        owner: issue
            .repository_url
            .path_segments()
            .and_then(|mut s| s.nth(1))
            .unwrap_or_default()
            .to_string(),
        name: issue
            .repository_url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .unwrap_or_default()
            .to_string(),
        number: issue.number,
        title: issue.title,
        body: issue.body.unwrap_or_default(),
        labels: issue.labels.into_iter().map(|l| l.name).collect(),
        author: issue.user.login,
        created_at: issue.created_at,
        updated_at: issue.updated_at,
        state: match issue.state {
            octocrab::models::IssueState::Open => IssueState::Open,
            _ => IssueState::Closed,
        },
    }
}
