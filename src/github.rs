use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use crate::config::Config;
use crate::error::AppError;
use crate::models::{
    CommitDetail, GraphQlResponse, RepoRef, RestCommit, UserCommitsData, UserNode,
};

pub const REPOS_PER_PAGE: u32 = 100;
pub const MAX_REPO_PAGES: u32 = 10;
pub const COMMITS_PER_REPO: u32 = 100;

const USER_AGENT: &str = "gitdash";

/// Repositories (most recently updated first) with the last 100 commits of
/// each default branch, line counts included.
const USER_COMMITS_QUERY: &str = r#"
query($username: String!, $first: Int!, $since: GitTimestamp) {
  user(login: $username) {
    repositories(first: $first, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        name
        defaultBranchRef {
          target {
            ... on Commit {
              history(first: 100, since: $since) {
                nodes {
                  oid
                  message
                  committedDate
                  additions
                  deletions
                  author {
                    user {
                      login
                    }
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
"#;

/// Thin client over the GitHub REST and GraphQL endpoints.
#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    api_url: Arc<String>,
    graphql_url: Arc<String>,
    token: Option<Arc<String>>,
}

impl GithubClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.upstream_timeout)
            .build()?;
        Ok(GithubClient {
            http,
            api_url: Arc::new(config.api_url.clone()),
            graphql_url: Arc::new(config.graphql_url.clone()),
            token: config.github_token.clone().map(Arc::new),
        })
    }

    fn rest(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_url, path);
        debug!("GET {}", url);
        let req = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github.v3+json");
        match &self.token {
            Some(token) => req.header("Authorization", format!("token {}", token)),
            None => req,
        }
    }

    async fn send_checked(req: RequestBuilder, what: &str) -> Result<Response, AppError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::from_upstream_status(status.as_u16(), what));
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, AppError> {
        let resp = Self::send_checked(self.rest(path).query(query), what).await?;
        Ok(resp.json::<T>().await?)
    }

    /// Profile record for `username`, passed through untouched.
    pub async fn get_user(&self, username: &str) -> Result<Value, AppError> {
        self.get_json(&format!("/users/{}", username), &[], "user").await
    }

    /// Every repository of `username`, up to `MAX_REPO_PAGES` pages.
    pub async fn list_all_repos(&self, username: &str) -> Result<Vec<Value>, AppError> {
        let path = format!("/users/{}/repos", username);
        let mut all_repos = Vec::new();

        for page in 1..=MAX_REPO_PAGES {
            let repos: Vec<Value> = self
                .get_json(
                    &path,
                    &[
                        ("page", page.to_string()),
                        ("per_page", REPOS_PER_PAGE.to_string()),
                        ("sort", "updated".to_string()),
                    ],
                    "repos",
                )
                .await?;
            if repos.is_empty() {
                break;
            }
            all_repos.extend(repos);
        }

        Ok(all_repos)
    }

    /// Single page of the most recently updated repositories.
    pub async fn recent_repos(&self, username: &str, limit: u32) -> Result<Vec<RepoRef>, AppError> {
        self.get_json(
            &format!("/users/{}/repos", username),
            &[("per_page", limit.to_string()), ("sort", "updated".to_string())],
            "repos",
        )
        .await
    }

    /// Commits in `full_name` authored by `author`, filtered server-side.
    pub async fn list_commits(
        &self,
        full_name: &str,
        author: &str,
        since: Option<&str>,
    ) -> Result<Vec<RestCommit>, AppError> {
        let mut query = vec![
            ("author", author.to_string()),
            ("per_page", COMMITS_PER_REPO.to_string()),
        ];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }
        self.get_json(&format!("/repos/{}/commits", repo_path(full_name)), &query, "commits")
            .await
    }

    pub async fn commit_detail(&self, full_name: &str, sha: &str) -> Result<CommitDetail, AppError> {
        self.get_json(
            &format!("/repos/{}/commits/{}", repo_path(full_name), urlencoding::encode(sha)),
            &[],
            "commit detail",
        )
        .await
    }

    /// Run the batched repositories-and-history query for `username`.
    pub async fn user_commits(
        &self,
        username: &str,
        first: u32,
        since: Option<&str>,
    ) -> Result<UserNode, AppError> {
        let token = self.token.as_ref().ok_or(AppError::AuthenticationRequired)?;

        debug!("POST {}", self.graphql_url);
        let resp = self
            .http
            .post(self.graphql_url.as_str())
            .bearer_auth(token.as_str())
            .json(&json!({
                "query": USER_COMMITS_QUERY,
                "variables": {
                    "username": username,
                    "first": first,
                    "since": since,
                },
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            warn!("GitHub GraphQL API error {}: {}", status.as_u16(), snippet);
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: "GitHub GraphQL API error".to_string(),
            });
        }

        let parsed: GraphQlResponse<UserCommitsData> = resp.json().await?;

        if let Some(errors) = parsed.errors.filter(|errors| !errors.is_empty()) {
            if errors.iter().any(|e| e.kind.as_deref() == Some("NOT_FOUND")) {
                return Err(AppError::NotFound("User not found".to_string()));
            }
            let message = errors
                .into_iter()
                .next()
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Unknown GraphQL error".to_string());
            return Err(AppError::Query(message));
        }

        parsed
            .data
            .and_then(|d| d.user)
            .ok_or_else(|| AppError::Query("response contained no user record".to_string()))
    }
}

fn repo_path(full_name: &str) -> String {
    full_name
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
