use thiserror::Error;
use warp::http::StatusCode;

/// Everything that can go wrong while serving a dashboard request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidArgument(String),

    /// The batch query needs a credential and none is configured.
    #[error("GitHub token required for GraphQL API")]
    AuthenticationRequired,

    #[error("{0}")]
    NotFound(String),

    #[error("{message} (upstream status {status})")]
    Upstream { status: u16, message: String },

    /// GraphQL error payload or a response without a user record.
    #[error("GraphQL error: {0}")]
    Query(String),

    #[error("Unexpected response from GitHub: {0}")]
    Decode(String),

    #[error("Request to GitHub timed out")]
    Timeout,

    #[error("Network error talking to GitHub: {0}")]
    Transport(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Query(_) | AppError::Decode(_) | AppError::Transport(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// A confirmed "no such account" can't be fixed by the REST crawl, every
    /// other batch failure can.
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(self, AppError::NotFound(_) | AppError::InvalidArgument(_))
    }

    pub fn from_upstream_status(status: u16, what: &str) -> Self {
        if status == 404 {
            AppError::NotFound("User not found".to_string())
        } else {
            AppError::Upstream {
                status,
                message: format!("GitHub API error while fetching {}", what),
            }
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Timeout
        } else if e.is_decode() {
            AppError::Decode(e.without_url().to_string())
        } else {
            AppError::Transport(e.without_url().to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_preserved() {
        let err = AppError::from_upstream_status(403, "repos");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn upstream_404_becomes_not_found() {
        let err = AppError::from_upstream_status(404, "user");
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(!err.is_fallback_eligible());
    }

    #[test]
    fn batch_failures_fall_back() {
        assert!(AppError::AuthenticationRequired.is_fallback_eligible());
        assert!(AppError::Query("boom".into()).is_fallback_eligible());
        assert!(AppError::Timeout.is_fallback_eligible());
        assert!(AppError::Upstream { status: 502, message: "bad".into() }.is_fallback_eligible());
    }
}
