//! Native GenAI surface (spec §6): `POST /genai/v1beta/models/{model}:{action}`.
//! The wire shape here already matches the internal pivot envelope, so the
//! `google` provider needs no dialect translation at all — the request body
//! deserializes straight into [`InternalRequest`] and the response is
//! whatever Cloud-Code returned. `vertex`/`gemini` targets aren't reshaped
//! either; they're raw-bytes passthrough through the same proxy the
//! transparent routes use.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::Json;
use std::convert::Infallible;

use crate::dialect::envelope::{InternalEnvelope, InternalRequest};
use crate::error::AppError;
use crate::handlers::state::AppState;
use crate::handlers::util::{new_request_id, split_model_action, Dispatched, Recorder};
use crate::router::Protocol;
use crate::upstream::{gemini_proxy, proxy, vertex};

const USER_AGENT: &str = "nexus-gateway/1.0";

pub async fn generate_content(
    State(state): State<AppState>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let (model, action) = split_model_action(&model_action)
        .ok_or_else(|| AppError::RouteRejected(format!("malformed model:action segment '{model_action}'")))?;
    let streaming = action == "streamGenerateContent";

    let resolved = state.router.resolve(model, Protocol::GenAi)?;
    let recorder = Recorder::new("POST", "/genai/v1beta/models", resolved.provider.clone(), model.to_string())
        .mapped_model(resolved.model.clone())
        .request_body(String::from_utf8_lossy(&body).into_owned());

    let outcome = dispatch(&state, &resolved, action, streaming, headers, body).await;

    let (status, error, account_email, response_body, response) = match outcome {
        Ok(d) => (d.response.status().as_u16(), None, d.account_email, d.response_body, Ok(d.response)),
        Err(e) => (e.status().as_u16(), Some(e.kind().to_string()), None, None, Err(e)),
    };
    recorder.finish(&state, status, error, account_email, response_body, 0, 0).await;

    response
}

async fn dispatch(
    state: &AppState,
    resolved: &crate::router::ResolvedRoute,
    action: &str,
    streaming: bool,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Dispatched, AppError> {
    match resolved.provider.as_str() {
        "google" => google_generate(state, resolved, streaming, &body).await,
        "vertex" => vertex_passthrough(state, resolved, action, headers, body).await,
        "gemini" => gemini_passthrough(state, resolved, action, headers, body).await,
        other => Err(AppError::RouteRejected(format!("provider '{other}' cannot serve the GenAI surface"))),
    }
}

async fn google_generate(state: &AppState, resolved: &crate::router::ResolvedRoute, streaming: bool, body: &[u8]) -> Result<Dispatched, AppError> {
    let token = state.token_manager.get_primary_or_default().await?;
    let request: InternalRequest =
        serde_json::from_slice(body).map_err(|e| AppError::MapperError { field: "body".to_string(), message: e.to_string() })?;

    let envelope = InternalEnvelope {
        project: token.project_id.clone(),
        request_id: new_request_id(),
        model: resolved.model.clone(),
        user_agent: USER_AGENT.to_string(),
        request_type: "GenerateContentRequest".to_string(),
        request,
    };

    if streaming {
        let frames = state.cloud_code.generate_frames(&token.account_id, &token.access_token, &envelope, true).await?;
        let events = frames
            .into_iter()
            .map(|f| Ok::<_, Infallible>(Event::default().data(serde_json::to_string(&f).unwrap_or_default())));
        let response = Sse::new(futures::stream::iter(events)).keep_alive(KeepAlive::default()).into_response();
        Ok(Dispatched::new(response).account_email(token.email))
    } else {
        let merged = state.cloud_code.generate(&token.account_id, &token.access_token, &envelope).await?;
        let body_text = serde_json::to_string(&merged).unwrap_or_default();
        Ok(Dispatched::new(Json(merged).into_response()).account_email(token.email).response_body(body_text))
    }
}

async fn vertex_passthrough(
    state: &AppState,
    resolved: &crate::router::ResolvedRoute,
    action: &str,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Dispatched, AppError> {
    vertex::validate_action(action)?;
    let key = vertex::api_key().ok_or_else(|| AppError::RouteRejected("NEXUS_VERTEX_API_KEY is not configured".to_string()))?;
    let path = vertex::rewrite_path(&resolved.model, action)?;
    let url = format!("{}{}", vertex::base_url(), path);

    let (status, resp_headers, resp_body) = proxy::forward(
        &state.http_client,
        proxy::ProxyRequest { method: vertex::method_for(action), url, headers, body },
        proxy::Injected::QueryKey(&key),
        &[],
    )
    .await?;

    let mut response = (status, resp_body).into_response();
    *response.headers_mut() = resp_headers;
    Ok(Dispatched::new(response))
}

async fn gemini_passthrough(
    state: &AppState,
    resolved: &crate::router::ResolvedRoute,
    action: &str,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Dispatched, AppError> {
    gemini_proxy::validate_action(action)?;
    let key = gemini_proxy::api_key().ok_or_else(|| AppError::RouteRejected("no Gemini API key configured".to_string()))?;
    let url = format!("{}/v1beta/models/{}:{}", gemini_proxy::base_url(), resolved.model, action);

    let (status, resp_headers, resp_body) = proxy::forward(
        &state.http_client,
        proxy::ProxyRequest { method: Method::POST, url, headers, body },
        proxy::Injected::QueryKey(&key),
        &[],
    )
    .await?;

    let mut response = (status, resp_body).into_response();
    *response.headers_mut() = resp_headers;
    Ok(Dispatched::new(response))
}
