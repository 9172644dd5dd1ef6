//! Transparent Gemini-shaped proxy (spec §4.6, §6): `/v1beta/models/{model}:{action}`,
//! `/v1beta/models[/{model}]` and `/v1beta/openai/chat/completions` forwarded
//! byte-for-byte with a server-held key injected. When a Vertex API key is
//! configured the action route prefers Vertex (rewriting the path onto its
//! publisher-model shape); otherwise it falls back to the public Gemini API
//! at the same path the client already used.
//!
//! This is distinct from `/genai/v1beta/...`, which speaks the internal
//! pivot envelope through the router; these routes never touch routing or
//! the dialect mapper at all.

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::handlers::state::AppState;
use crate::handlers::util::split_model_action;
use crate::upstream::{gemini_proxy, proxy, vertex};

/// Parses the caller's raw query string, dropping `key` — the gateway's own
/// credential is injected by `proxy::forward` and must win over anything the
/// client sent (e.g. `alt=sse` is kept, a client-supplied `key` is not).
fn passthrough_query(raw: Option<String>) -> Vec<(String, String)> {
    raw.map(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .filter(|(k, _)| k != "key")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    })
    .unwrap_or_default()
}

pub async fn model_action(
    State(state): State<AppState>,
    Path(model_action): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let (model, action) = split_model_action(&model_action)
        .ok_or_else(|| AppError::RouteRejected(format!("malformed model:action segment '{model_action}'")))?;
    let extra_query = passthrough_query(query);
    let extra_query: Vec<(&str, &str)> = extra_query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    if let Some(key) = vertex::api_key() {
        vertex::validate_action(action)?;
        let path = vertex::rewrite_path(model, action)?;
        let url = format!("{}{}", vertex::base_url(), path);
        return relay(&state, vertex::method_for(action), url, headers, body, proxy::Injected::QueryKey(&key), &extra_query).await;
    }

    gemini_proxy::validate_action(action)?;
    let key = gemini_proxy::api_key().ok_or_else(|| AppError::RouteRejected("no Gemini or Vertex API key configured".to_string()))?;
    let url = format!("{}/v1beta/models/{}:{}", gemini_proxy::base_url(), model, action);
    relay(&state, Method::POST, url, headers, body, proxy::Injected::QueryKey(&key), &extra_query).await
}

pub async fn list_models(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let key = gemini_proxy::api_key().ok_or_else(|| AppError::RouteRejected("no Gemini API key configured".to_string()))?;
    let url = format!("{}{}", gemini_proxy::base_url(), gemini_proxy::MODELS_LIST_PATH);
    relay(&state, Method::GET, url, headers, Bytes::new(), proxy::Injected::QueryKey(&key), &[]).await
}

pub async fn get_model(State(state): State<AppState>, Path(model): Path<String>, headers: HeaderMap) -> Result<Response, AppError> {
    let key = gemini_proxy::api_key().ok_or_else(|| AppError::RouteRejected("no Gemini API key configured".to_string()))?;
    let url = format!("{}{}/{}", gemini_proxy::base_url(), gemini_proxy::MODELS_LIST_PATH, model);
    relay(&state, Method::GET, url, headers, Bytes::new(), proxy::Injected::QueryKey(&key), &[]).await
}

pub async fn openai_compat_chat(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response, AppError> {
    let key = gemini_proxy::api_key().ok_or_else(|| AppError::RouteRejected("no Gemini API key configured".to_string()))?;
    let url = format!("{}{}", gemini_proxy::base_url(), gemini_proxy::OPENAI_COMPAT_PATH);
    relay(&state, Method::POST, url, headers, body, proxy::Injected::Bearer(&key), &[]).await
}

async fn relay(
    state: &AppState,
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Bytes,
    credential: proxy::Injected<'_>,
    extra_query: &[(&str, &str)],
) -> Result<Response, AppError> {
    let (status, resp_headers, resp_body) =
        proxy::forward(&state.http_client, proxy::ProxyRequest { method, url, headers, body }, credential, extra_query).await?;
    let mut response = (status, resp_body).into_response();
    *response.headers_mut() = resp_headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_query_drops_key_keeps_alt() {
        let pairs = passthrough_query(Some("alt=sse&key=client-supplied".to_string()));
        assert_eq!(pairs, vec![("alt".to_string(), "sse".to_string())]);
    }

    #[test]
    fn passthrough_query_empty_when_absent() {
        assert!(passthrough_query(None).is_empty());
    }
}
