use serde::{Deserialize, Serialize};

/// A commit as seen by either fetch strategy, already attributed to a repository.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    pub sha: String,
    pub author_login: Option<String>,
    pub date: Option<String>,
    pub message: String,
    pub repo: String,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
}

// ---- GitHub REST ----

#[derive(Debug, Clone, Deserialize)]
pub struct RepoRef {
    pub name: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RestCommit {
    pub sha: String,
    pub commit: RestCommitBody,
    pub author: Option<RestUser>,
}

#[derive(Debug, Deserialize)]
pub struct RestCommitBody {
    #[serde(default)]
    pub message: String,
    pub author: Option<GitSignature>,
}

#[derive(Debug, Deserialize)]
pub struct GitSignature {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RestUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct CommitDetail {
    pub stats: Option<LineStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LineStats {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

impl RestCommit {
    pub fn into_record(self, repo: &str) -> CommitRecord {
        CommitRecord {
            sha: self.sha,
            author_login: self.author.map(|a| a.login),
            date: self.commit.author.and_then(|a| a.date),
            message: self.commit.message,
            repo: repo.to_string(),
            additions: None,
            deletions: None,
        }
    }
}

// ---- GitHub GraphQL ----

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserCommitsData {
    pub user: Option<UserNode>,
}

#[derive(Debug, Deserialize)]
pub struct UserNode {
    pub repositories: RepoConnection,
}

#[derive(Debug, Deserialize)]
pub struct RepoConnection {
    pub nodes: Option<Vec<Option<RepoNode>>>,
}

#[derive(Debug, Deserialize)]
pub struct RepoNode {
    pub name: Option<String>,
    #[serde(rename = "defaultBranchRef")]
    pub default_branch_ref: Option<BranchRef>,
}

#[derive(Debug, Deserialize)]
pub struct BranchRef {
    pub target: Option<CommitTarget>,
}

#[derive(Debug, Deserialize)]
pub struct CommitTarget {
    pub history: Option<History>,
}

#[derive(Debug, Deserialize)]
pub struct History {
    pub nodes: Option<Vec<Option<HistoryNode>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryNode {
    #[serde(default)]
    pub oid: String,
    pub message: Option<String>,
    pub committed_date: Option<String>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub author: Option<GitActor>,
}

#[derive(Debug, Deserialize)]
pub struct GitActor {
    pub user: Option<UserLogin>,
}

#[derive(Debug, Deserialize)]
pub struct UserLogin {
    pub login: Option<String>,
}

impl HistoryNode {
    pub fn into_record(self, repo: &str) -> CommitRecord {
        CommitRecord {
            sha: self.oid,
            author_login: self.author.and_then(|a| a.user).and_then(|u| u.login),
            date: self.committed_date,
            message: self.message.unwrap_or_default(),
            repo: repo.to_string(),
            additions: Some(self.additions.unwrap_or(0)),
            deletions: Some(self.deletions.unwrap_or(0)),
        }
    }
}

// ---- API responses ----

/// Which fetcher produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Batch,
    Paginated,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecentCommit {
    pub sha: String,
    pub message: String,
    pub date: Option<String>,
    pub repo: String,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedCommit {
    pub sha: String,
    pub message: String,
    pub date: Option<String>,
    pub repo: String,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CommitPage {
    pub commits: Vec<FeedCommit>,
    pub page: u32,
    pub per_page: u32,
    pub total_commits: usize,
    pub total_pages: usize,
    pub has_more: bool,
    pub strategy: Strategy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub credential_configured: bool,
    pub rate_limiting_enabled: bool,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}
