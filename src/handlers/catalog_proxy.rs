//! Per-provider catalog passthrough (spec §6): `POST /{provider}/v1/chat/completions`,
//! letting a client address a registered catalog provider directly by id
//! rather than going through model-based routing.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::handlers::state::AppState;
use crate::handlers::util::{Dispatched, Recorder};
use crate::upstream::{openai_compat, proxy};

pub async fn chat_completions(State(state): State<AppState>, Path(provider_id): Path<String>, body: Bytes) -> Result<Response, AppError> {
    let recorder = Recorder::new("POST", "/{provider}/v1/chat/completions", provider_id.clone(), "unknown".to_string())
        .request_body(String::from_utf8_lossy(&body).into_owned());

    let outcome = forward(&state, &provider_id, body).await;

    let (status, error, account_email, response_body, response) = match outcome {
        Ok(d) => (d.response.status().as_u16(), None, d.account_email, d.response_body, Ok(d.response)),
        Err(e) => (e.status().as_u16(), Some(e.kind().to_string()), None, None, Err(e)),
    };
    recorder.finish(&state, status, error, account_email, response_body, 0, 0).await;

    response
}

async fn forward(state: &AppState, provider_id: &str, body: Bytes) -> Result<Dispatched, AppError> {
    let provider = state
        .catalog
        .get(provider_id)
        .filter(|p| p.runtime_enabled())
        .ok_or_else(|| AppError::RouteRejected(format!("unknown or disabled catalog provider '{provider_id}'")))?;

    let url = openai_compat::chat_completions_url(provider);
    let key = openai_compat::bearer_key(provider)?;

    let mut headers = axum::http::HeaderMap::new();
    headers.insert("content-type", axum::http::HeaderValue::from_static("application/json"));
    for (k, v) in &provider.static_headers {
        if let (Ok(name), Ok(value)) = (axum::http::HeaderName::from_bytes(k.as_bytes()), axum::http::HeaderValue::from_str(v)) {
            headers.insert(name, value);
        }
    }

    let (status, resp_headers, resp_body) = proxy::forward(
        &state.http_client,
        proxy::ProxyRequest { method: Method::POST, url, headers, body },
        proxy::Injected::Bearer(key),
        &[],
    )
    .await?;

    let mut response = (status, resp_body).into_response();
    *response.headers_mut() = resp_headers;
    Ok(Dispatched::new(response))
}
