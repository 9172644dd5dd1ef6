use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Error taxonomy for the gateway's request-handling boundary.
///
/// `anyhow::Result` is used at the CLI/startup boundary instead; this type only
/// ever crosses an HTTP handler or a component directly behind one.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("missing API key")]
    AuthMissing,

    #[error("route rejected: {0}")]
    RouteRejected(String),

    #[error("no valid token available")]
    NoValidToken,

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus {
        status: StatusCode,
        body: String,
        filtered_params: Vec<String>,
    },

    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("mapper error on field {field}: {message}")]
    MapperError { field: String, message: String },

    #[error("client disconnected")]
    CancelError,

    #[error("permanent auth failure for account {account_id}: {message}")]
    PermanentAuthFailure { account_id: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            AppError::AuthMissing => "authentication_error",
            AppError::RouteRejected(_) => "route_rejected",
            AppError::NoValidToken => "no_valid_token",
            AppError::UpstreamStatus { .. } => "upstream_status",
            AppError::UpstreamTransport(_) => "upstream_transport",
            AppError::MapperError { .. } => "mapper_error",
            AppError::CancelError => "cancel_error",
            AppError::PermanentAuthFailure { .. } => "permanent_auth_failure",
            AppError::Config(_) => "config_error",
            AppError::Store(_) => "store_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self {
            AppError::AuthMissing => StatusCode::UNAUTHORIZED,
            AppError::RouteRejected(_) => StatusCode::BAD_REQUEST,
            AppError::NoValidToken => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UpstreamStatus { status, .. } => *status,
            AppError::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
            AppError::MapperError { .. } => StatusCode::BAD_REQUEST,
            AppError::CancelError => StatusCode::OK,
            AppError::PermanentAuthFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // A cancelled client never gets a body written; the connection is simply dropped.
        if matches!(self, AppError::CancelError) {
            tracing::debug!("client disconnected, suppressing response body");
            return StatusCode::OK.into_response();
        }

        let status = self.status();
        let filtered = match &self {
            AppError::UpstreamStatus { filtered_params, .. } if !filtered_params.is_empty() => {
                Some(filtered_params.join(","))
            }
            _ => None,
        };

        let message = if let AppError::UpstreamStatus { body, .. } = &self {
            body.clone()
        } else {
            self.to_string()
        };

        let body = json!({ "error": { "message": message, "type": self.kind() } });
        let mut response = (status, axum::Json(body)).into_response();
        if let Some(filtered) = filtered {
            if let Ok(value) = axum::http::HeaderValue::from_str(&filtered) {
                response
                    .headers_mut()
                    .insert("X-Nexus-Codex-Filtered-Params", value);
            }
        }
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamTransport(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MapperError {
            field: "body".to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_missing_is_401() {
        assert_eq!(AppError::AuthMissing.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn route_rejected_is_400() {
        let e = AppError::RouteRejected("vertex not allowed for openai".to_string());
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn no_valid_token_is_503() {
        assert_eq!(AppError::NoValidToken.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn upstream_transport_is_502() {
        assert_eq!(
            AppError::UpstreamTransport("connect refused".to_string()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn cancel_error_writes_no_body_shape() {
        let resp = AppError::CancelError.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
