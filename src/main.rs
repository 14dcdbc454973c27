use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use warp::Filter;

use gitdash::config::Config;
use gitdash::github::GithubClient;
use gitdash::handlers;
use gitdash::ratelimit::RateLimiter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Arc::new(Config::from_env()?);
    if config.credential_configured() {
        info!("GitHub token configured, batch queries enabled");
    } else {
        info!("No GitHub token configured, stats will use the REST crawl");
    }

    let client = GithubClient::new(&config)?;
    let limiter = RateLimiter::per_minute(config.rate_limit_per_minute);

    // Setup routes
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "OPTIONS"]);

    let static_files = warp::path("static")
        .and(warp::fs::dir(config.static_dir.clone()));

    let api = handlers::api(client, limiter, config.clone());

    let index = warp::path::end()
        .and(warp::fs::file(format!("{}/index.html", config.static_dir)));

    let routes = static_files
        .or(api)
        .or(index)
        .recover(handlers::handle_rejection)
        .with(cors);

    info!("Server starting on http://{}", config.bind_addr);
    warp::serve(routes)
        .run(config.bind_addr)
        .await;

    Ok(())
}
