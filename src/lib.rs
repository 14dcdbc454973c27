pub mod aggregate;
pub mod config;
pub mod error;
pub mod github;
pub mod handlers;
pub mod models;
pub mod ratelimit;
pub mod stats;
pub mod validate;

pub use aggregate::collect_stats;
pub use config::Config;
pub use error::AppError;
pub use github::GithubClient;
