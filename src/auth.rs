//! API key authentication middleware. A single shared key, minted on first
//! boot and stored in the `configs` table, is accepted via any of four
//! client conventions: `Authorization: Bearer`, `x-api-key`, `x-goog-api-key`,
//! or a `?key=` query parameter — whichever dialect the caller speaks.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::store::Store;

#[derive(Clone)]
pub struct AuthState {
    pub store: Arc<Store>,
}

pub async fn auth_middleware(State(state): State<AuthState>, req: Request, next: Next) -> Result<Response, AppError> {
    let configured_key = state.store.api_key().await?;

    // An absent configured key (only possible before first-boot
    // provisioning completes) lets every request through rather than
    // locking the operator out before they can fetch the minted key.
    let Some(configured_key) = configured_key else {
        return Ok(next.run(req).await);
    };

    let presented = extract_presented_key(&req);
    match presented {
        Some(key) if key == configured_key => Ok(next.run(req).await),
        _ => Err(AppError::AuthMissing),
    }
}

fn extract_presented_key(req: &Request) -> Option<String> {
    if let Some(v) = req.headers().get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = v.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    if let Some(v) = req.headers().get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(v.to_string());
    }
    if let Some(v) = req.headers().get("x-goog-api-key").and_then(|v| v.to_str().ok()) {
        return Some(v.to_string());
    }
    req.uri().query().and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == "key")
            .map(|(_, v)| v.into_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn req_with_header(name: &str, value: &str) -> Request {
        HttpRequest::builder().uri("/v1/chat/completions").header(name, value).body(Body::empty()).unwrap()
    }

    #[test]
    fn bearer_prefix_is_extracted() {
        let req = req_with_header("authorization", "Bearer sk-abc");
        assert_eq!(extract_presented_key(&req).as_deref(), Some("sk-abc"));
    }

    #[test]
    fn x_api_key_header_is_accepted() {
        let req = req_with_header("x-api-key", "sk-abc");
        assert_eq!(extract_presented_key(&req).as_deref(), Some("sk-abc"));
    }

    #[test]
    fn x_goog_api_key_header_is_accepted() {
        let req = req_with_header("x-goog-api-key", "sk-abc");
        assert_eq!(extract_presented_key(&req).as_deref(), Some("sk-abc"));
    }

    #[test]
    fn query_key_param_is_accepted() {
        let req = HttpRequest::builder().uri("/v1beta/models?key=sk-abc").body(Body::empty()).unwrap();
        assert_eq!(extract_presented_key(&req).as_deref(), Some("sk-abc"));
    }

    #[test]
    fn no_credential_present_returns_none() {
        let req = HttpRequest::builder().uri("/v1/chat/completions").body(Body::empty()).unwrap();
        assert!(extract_presented_key(&req).is_none());
    }
}
