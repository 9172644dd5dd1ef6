//! Transparent Vertex-native proxy (spec §4.6, §6):
//! `POST /v1/publishers/google/models/{model}:{action}`, for clients that
//! already speak Vertex's own path shape. Forwarded as-is with the
//! server-held Vertex key injected — no path rewrite, unlike the
//! Gemini-shaped route that rewrites onto this same upstream shape.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;
use crate::handlers::state::AppState;
use crate::handlers::util::split_model_action;
use crate::upstream::{proxy, vertex};

pub async fn model_action(State(state): State<AppState>, Path(model_action): Path<String>, headers: HeaderMap, body: Bytes) -> Result<Response, AppError> {
    let (model, action) = split_model_action(&model_action)
        .ok_or_else(|| AppError::RouteRejected(format!("malformed model:action segment '{model_action}'")))?;
    vertex::validate_action(action)?;

    let key = vertex::api_key().ok_or_else(|| AppError::RouteRejected("NEXUS_VERTEX_API_KEY is not configured".to_string()))?;
    let url = format!("{}/v1/publishers/google/models/{}:{}", vertex::base_url(), model, action);

    let (status, resp_headers, resp_body) = proxy::forward(
        &state.http_client,
        proxy::ProxyRequest { method: vertex::method_for(action), url, headers, body },
        proxy::Injected::QueryKey(&key),
        &[],
    )
    .await?;

    let mut response = (status, resp_body).into_response();
    *response.headers_mut() = resp_headers;
    Ok(response)
}
