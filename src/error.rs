//! Error types for idealab-router.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::router::{ProviderKind, TaskCategory};

/// Result type alias for idealab-router operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for idealab-router.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error(
        "No credential configured for provider '{provider}'{}",
        route_context(.task, .provider)
    )]
    MissingCredential {
        /// Unset only when a route was invoked directly, outside `Router::execute`.
        task: Option<TaskCategory>,
        provider: ProviderKind,
    },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(
        "Provider '{provider}' failed{}: {message}",
        route_context(.task, .provider)
    )]
    Provider {
        task: Option<TaskCategory>,
        provider: ProviderKind,
        message: String,
        /// Upstream HTTP status, when the provider answered at all.
        status: Option<u16>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn route_context(task: &Option<TaskCategory>, provider: &ProviderKind) -> String {
    match task {
        Some(task) => format!(" (task '{}', model '{}')", task, provider.model()),
        None => format!(" (model '{}')", provider.model()),
    }
}

impl Error {
    /// Attach the task to a routing or provider error that does not name one yet.
    pub fn for_task(self, task: TaskCategory) -> Self {
        match self {
            Error::MissingCredential {
                task: None,
                provider,
            } => Error::MissingCredential {
                task: Some(task),
                provider,
            },
            Error::Provider {
                task: None,
                provider,
                message,
                status,
            } => Error::Provider {
                task: Some(task),
                provider,
                message,
                status,
            },
            other => other,
        }
    }

    /// Whether the caller may reasonably retry the same request.
    ///
    /// Only provider failures qualify; the router itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider { .. })
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::MissingCredential { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Provider { .. } => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::MissingCredential { .. } => "configuration_error",
            Error::Validation(_) => "validation_error",
            Error::Provider { .. } => "provider_error",
            Error::Internal(_) | Error::Database(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
                "code": status.as_u16(),
                "retryable": self.is_retryable(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
