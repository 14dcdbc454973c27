//! Stats and commit-feed assembly on top of [`GithubClient`].
//!
//! Both pipelines try the batched GraphQL query first and fall back to crawling
//! the REST API one repository at a time. Only a confirmed "no such user" stops
//! the fallback.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};
use crate::error::AppError;
use crate::github::GithubClient;
use crate::models::{CommitPage, CommitRecord, FeedCommit, Strategy};
use crate::stats::{short_sha, StatsAccumulator, StatsSummary, TimestampFormat};

/// Upper bound on per-commit detail requests in one paginated crawl.
pub const MAX_DETAIL_FETCHES: usize = 30;
const FEED_MESSAGE_LINES: usize = 3;
const FEED_MESSAGE_CHARS: usize = 300;

/// Counter guard for the per-commit fan-out.
#[derive(Debug)]
pub struct DetailBudget {
    remaining: usize,
}

impl DetailBudget {
    pub fn new(limit: usize) -> Self {
        DetailBudget { remaining: limit }
    }

    /// Claim one fetch; false once the budget is spent.
    pub fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// A commit found by the REST crawl, with the repository it came from.
#[derive(Debug)]
pub struct CrawledCommit {
    pub full_name: String,
    pub record: CommitRecord,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedQuery<'a> {
    pub repo_limit: u32,
    pub page: u32,
    pub per_page: u32,
    pub since: Option<&'a str>,
}

/// Bound a whole request. Dropping the future abandons every pending call.
pub async fn within<T, F>(limit: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    tokio::time::timeout(limit, fut).await?
}

fn authored_by(record: &CommitRecord, username: &str) -> bool {
    record
        .author_login
        .as_deref()
        .map(|login| login.eq_ignore_ascii_case(username))
        .unwrap_or(false)
}

/// Author-filtered commits from one GraphQL round trip, plus the number of
/// repositories returned.
pub async fn batch_records(
    client: &GithubClient,
    username: &str,
    limit: u32,
    since: Option<&str>,
) -> Result<(usize, Vec<CommitRecord>), AppError> {
    let user = client.user_commits(username, limit, since).await?;
    let repos = user.repositories.nodes.unwrap_or_default();
    let analyzed = repos.len();

    let mut records = Vec::new();
    for repo in repos.into_iter().flatten() {
        let name = repo.name.unwrap_or_else(|| "unknown".to_string());
        let history = repo
            .default_branch_ref
            .and_then(|branch| branch.target)
            .and_then(|target| target.history)
            .and_then(|history| history.nodes)
            .unwrap_or_default();

        // History is the whole branch, so other people's commits are in here too.
        records.extend(
            history
                .into_iter()
                .flatten()
                .map(|node| node.into_record(&name))
                .filter(|record| authored_by(record, username)),
        );
    }

    Ok((analyzed, records))
}

/// Commit lists for the `limit` most recently updated repositories. The repo
/// listing is mandatory; a failing repository is skipped.
pub async fn paginated_records(
    client: &GithubClient,
    username: &str,
    limit: u32,
    since: Option<&str>,
) -> Result<(usize, Vec<CrawledCommit>), AppError> {
    let repos = client.recent_repos(username, limit).await?;

    let mut crawled = Vec::new();
    for repo in &repos {
        match client.list_commits(&repo.full_name, username, since).await {
            Ok(commits) => crawled.extend(commits.into_iter().map(|commit| CrawledCommit {
                full_name: repo.full_name.clone(),
                record: commit.into_record(&repo.name),
            })),
            Err(e) => warn!("Skipping commits for {}: {}", repo.full_name, e),
        }
    }

    Ok((repos.len(), crawled))
}

pub async fn stats_batch(
    client: &GithubClient,
    username: &str,
    limit: u32,
    since: Option<&str>,
) -> Result<StatsSummary, AppError> {
    let (analyzed, records) = batch_records(client, username, limit, since).await?;

    let mut acc = StatsAccumulator::new();
    acc.repos_analyzed = analyzed;
    for record in &records {
        acc.record(record, TimestampFormat::Flexible);
    }
    Ok(acc.finish(Strategy::Batch, since.map(str::to_string)))
}

pub async fn stats_paginated(
    client: &GithubClient,
    username: &str,
    limit: u32,
    since: Option<&str>,
) -> Result<StatsSummary, AppError> {
    let (analyzed, crawled) = paginated_records(client, username, limit, since).await?;

    let mut acc = StatsAccumulator::new();
    acc.repos_analyzed = analyzed;
    let mut budget = DetailBudget::new(MAX_DETAIL_FETCHES);

    for CrawledCommit { full_name, mut record } in crawled {
        if budget.take() {
            match client.commit_detail(&full_name, &record.sha).await {
                Ok(detail) => {
                    let lines = detail.stats.unwrap_or_default();
                    record.additions = Some(lines.additions);
                    record.deletions = Some(lines.deletions);
                }
                Err(e) => warn!("Skipping line counts for {}@{}: {}", full_name, record.sha, e),
            }
        }
        acc.record(&record, TimestampFormat::Strict);
    }

    Ok(acc.finish(Strategy::Paginated, since.map(str::to_string)))
}

fn log_fallback(what: &str, username: &str, err: &AppError) {
    match err {
        AppError::AuthenticationRequired => {
            info!("No GitHub token configured, crawling REST API for {} of {}", what, username)
        }
        e => warn!("Batch query for {} of {} failed, falling back to REST crawl: {}", what, username, e),
    }
}

/// Stats for `username`, batch first.
pub async fn collect_stats(
    client: &GithubClient,
    username: &str,
    limit: u32,
    since: Option<&str>,
) -> Result<StatsSummary, AppError> {
    match stats_batch(client, username, limit, since).await {
        Ok(summary) => {
            info!("Stats for {} from batch query ({} commits)", username, summary.total_commits);
            return Ok(summary);
        }
        Err(e) if !e.is_fallback_eligible() => return Err(e),
        Err(e) => log_fallback("stats", username, &e),
    }

    let summary = stats_paginated(client, username, limit, since).await?;
    info!("Stats for {} from REST crawl ({} commits)", username, summary.total_commits);
    Ok(summary)
}

/// A page of the user's commits, newest first.
pub async fn commit_feed(
    client: &GithubClient,
    username: &str,
    query: FeedQuery<'_>,
) -> Result<CommitPage, AppError> {
    let (strategy, records) = match batch_records(client, username, query.repo_limit, query.since).await {
        Ok((_, records)) => (Strategy::Batch, records),
        Err(e) if !e.is_fallback_eligible() => return Err(e),
        Err(e) => {
            log_fallback("commit feed", username, &e);
            let (_, crawled) =
                paginated_records(client, username, query.repo_limit, query.since).await?;
            (Strategy::Paginated, crawled.into_iter().map(|c| c.record).collect())
        }
    };

    Ok(paginate(records, query.page, query.per_page, strategy))
}

pub fn paginate(mut records: Vec<CommitRecord>, page: u32, per_page: u32, strategy: Strategy) -> CommitPage {
    // ISO-8601 strings in one zone sort chronologically; undated commits go last.
    records.sort_by(|a, b| b.date.cmp(&a.date));

    let per_page = per_page.max(1);
    let page = page.max(1);
    let total_commits = records.len();
    let total_pages = total_commits.div_ceil(per_page as usize);
    let start = (page as usize - 1) * per_page as usize;

    let commits = records
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .map(|record| FeedCommit {
            sha: short_sha(&record.sha),
            message: feed_message(&record.message),
            date: record.date,
            repo: record.repo,
            additions: record.additions,
            deletions: record.deletions,
        })
        .collect();

    CommitPage {
        commits,
        page,
        per_page,
        total_commits,
        total_pages,
        has_more: (page as usize) < total_pages,
        strategy,
    }
}

fn feed_message(message: &str) -> String {
    message
        .lines()
        .take(FEED_MESSAGE_LINES)
        .collect::<Vec<_>>()
        .join("\n")
        .chars()
        .take(FEED_MESSAGE_CHARS)
        .collect()
}
