use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};
use crate::aggregate::{collect_stats, commit_feed, within, FeedQuery};
use crate::config::Config;
use crate::error::AppError;
use crate::github::GithubClient;
use crate::models::{ApiResponse, CommitPage, HealthResponse};
use crate::ratelimit::RateLimiter;
use crate::stats::StatsSummary;
use crate::validate::{
    clamp, clamp_limit, int_param, since_param, validate_username, DEFAULT_LIMIT,
    DEFAULT_PER_PAGE, DEFAULT_REPO_LIMIT, MAX_FEED_PAGES, MAX_LIMIT, MAX_PER_PAGE, MIN_LIMIT,
};

/// Everything under `/api`.
pub fn api(
    client: GithubClient,
    limiter: RateLimiter,
    config: Arc<Config>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("api").and(api_routes(client, limiter, config))
}

pub fn api_routes(
    client: GithubClient,
    limiter: RateLimiter,
    config: Arc<Config>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    health(config.clone())
        .or(user_profile(client.clone(), limiter.clone(), config.clone()))
        .or(user_repos(client.clone(), limiter.clone(), config.clone()))
        .or(user_stats(client.clone(), limiter.clone(), config.clone()))
        .or(user_commits(client, limiter, config))
}

fn health(config: Arc<Config>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("health")
        .and(warp::get())
        .and(with_config(config))
        .map(|config: Arc<Config>| {
            warp::reply::json(&HealthResponse {
                status: "healthy".to_string(),
                credential_configured: config.credential_configured(),
                rate_limiting_enabled: config.rate_limiting_enabled(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            })
        })
}

fn user_profile(
    client: GithubClient,
    limiter: RateLimiter,
    config: Arc<Config>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("user" / String)
        .and(warp::get())
        .and(with_rate_limit(limiter))
        .and(with_client(client))
        .and(with_config(config))
        .and_then(handle_user)
}

fn user_repos(
    client: GithubClient,
    limiter: RateLimiter,
    config: Arc<Config>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("repos" / String)
        .and(warp::get())
        .and(with_rate_limit(limiter))
        .and(with_client(client))
        .and(with_config(config))
        .and_then(handle_repos)
}

fn user_stats(
    client: GithubClient,
    limiter: RateLimiter,
    config: Arc<Config>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("stats" / String)
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_rate_limit(limiter))
        .and(with_client(client))
        .and(with_config(config))
        .and_then(handle_stats)
}

fn user_commits(
    client: GithubClient,
    limiter: RateLimiter,
    config: Arc<Config>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("commits" / String)
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_rate_limit(limiter))
        .and(with_client(client))
        .and(with_config(config))
        .and_then(handle_commits)
}

fn with_client(client: GithubClient) -> impl Filter<Extract = (GithubClient,), Error = Infallible> + Clone {
    warp::any().map(move || client.clone())
}

fn with_config(config: Arc<Config>) -> impl Filter<Extract = (Arc<Config>,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}

/// Requests without a peer address are not limited: they cannot be told apart.
fn with_rate_limit(limiter: RateLimiter) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::addr::remote()
        .and_then(move |addr: Option<SocketAddr>| {
            let limiter = limiter.clone();
            async move {
                let ip = match addr {
                    Some(addr) => addr.ip(),
                    None => return Ok(()),
                };
                if limiter.check(ip).await {
                    Ok(())
                } else {
                    warn!("Rate limit exceeded for {}", ip);
                    Err(warp::reject::custom(RateLimited))
                }
            }
        })
        .untuple_one()
}

async fn handle_user(
    username: String,
    client: GithubClient,
    config: Arc<Config>,
) -> Result<Box<dyn Reply>, Rejection> {
    let result: Result<Value, AppError> = async {
        let username = validate_username(&username)?;
        within(config.request_timeout, client.get_user(username)).await
    }
    .await;
    Ok(respond(result, "user"))
}

async fn handle_repos(
    username: String,
    client: GithubClient,
    config: Arc<Config>,
) -> Result<Box<dyn Reply>, Rejection> {
    let result: Result<Vec<Value>, AppError> = async {
        let username = validate_username(&username)?;
        within(config.request_timeout, client.list_all_repos(username)).await
    }
    .await;
    Ok(respond(result, "repositories"))
}

async fn handle_stats(
    username: String,
    query: HashMap<String, String>,
    client: GithubClient,
    config: Arc<Config>,
) -> Result<Box<dyn Reply>, Rejection> {
    let result: Result<StatsSummary, AppError> = async {
        let username = validate_username(&username)?;
        let limit = clamp_limit(int_param(&query, "limit", DEFAULT_LIMIT)?);
        let since = since_param(&query)?;
        within(
            config.request_timeout,
            collect_stats(&client, username, limit, since.as_deref()),
        )
        .await
    }
    .await;
    Ok(respond(result, "statistics"))
}

async fn handle_commits(
    username: String,
    query: HashMap<String, String>,
    client: GithubClient,
    config: Arc<Config>,
) -> Result<Box<dyn Reply>, Rejection> {
    let result: Result<CommitPage, AppError> = async {
        let username = validate_username(&username)?;
        let since = since_param(&query)?;
        let feed = FeedQuery {
            repo_limit: clamp(int_param(&query, "repo_limit", DEFAULT_REPO_LIMIT)?, MIN_LIMIT, MAX_LIMIT),
            page: clamp(int_param(&query, "page", 1)?, 1, MAX_FEED_PAGES),
            per_page: clamp(int_param(&query, "per_page", DEFAULT_PER_PAGE)?, 1, MAX_PER_PAGE),
            since: since.as_deref(),
        };
        within(config.request_timeout, commit_feed(&client, username, feed)).await
    }
    .await;
    Ok(respond(result, "commits"))
}

fn respond<T: Serialize>(result: Result<T, AppError>, what: &str) -> Box<dyn Reply> {
    match result {
        Ok(body) => Box::new(warp::reply::json(&body)),
        Err(e) => error_reply(e, what),
    }
}

fn error_reply(err: AppError, what: &str) -> Box<dyn Reply> {
    let status = err.status();
    if status.is_server_error() {
        error!("Failed to fetch {}: {}", what, err);
    } else {
        warn!("Request for {} rejected: {}", what, err);
    }
    let response = ApiResponse::failure(err.to_string());
    Box::new(warp::reply::with_status(warp::reply::json(&response), status))
}

/// Turn warp rejections into the same JSON error body the handlers use.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.find::<RateLimited>().is_some() {
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    let response = ApiResponse::failure(message);
    Ok(warp::reply::with_status(warp::reply::json(&response), status))
}

#[derive(Debug)]
struct RateLimited;

impl warp::reject::Reject for RateLimited {}
