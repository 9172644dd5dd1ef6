//! OpenAI Chat Completions surface (spec §6): `POST /v1/chat/completions` and
//! `GET /v1/models`. Dispatches to whichever upstream the router resolved —
//! Cloud-Code (Google), Codex, or an OpenAI-compatible catalog provider —
//! each speaking a different wire protocol underneath the same client-facing
//! shape.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::Json;
use serde::Serialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::dialect::{openai_in, openai_out};
use crate::error::AppError;
use crate::handlers::state::AppState;
use crate::handlers::util::{new_request_id, Dispatched, Recorder};
use crate::models::openai::ChatCompletionRequest;
use crate::router::{Protocol, ResolvedRoute};
use crate::store::now_secs;
use crate::upstream::{codex, openai_compat, proxy};

const USER_AGENT: &str = "nexus-gateway/1.0";
const ENDPOINT: &str = "/v1/chat/completions";

pub async fn chat_completions(State(state): State<AppState>, Json(req): Json<ChatCompletionRequest>) -> Result<Response, AppError> {
    let resolved = state.router.resolve(&req.model, Protocol::OpenAi)?;
    let recorder = Recorder::new("POST", ENDPOINT, resolved.provider.clone(), req.model.clone())
        .mapped_model(resolved.model.clone())
        .request_body(serde_json::to_string(&req).unwrap_or_default());
    let client_stream = req.stream.unwrap_or(false);

    let span = tracing::info_span!("chat_completions", client_model = %req.model, provider = %resolved.provider, target_model = %resolved.model, stream = client_stream);
    let _enter = span.enter();

    let outcome = dispatch(&state, &req, &resolved, client_stream).await;

    let (status, error, account_email, response_body, response) = match outcome {
        Ok(d) => (d.response.status().as_u16(), None, d.account_email, d.response_body, Ok(d.response)),
        Err(e) => (e.status().as_u16(), Some(e.kind().to_string()), None, None, Err(e)),
    };
    recorder.finish(&state, status, error, account_email, response_body, 0, 0).await;

    response
}

async fn dispatch(state: &AppState, req: &ChatCompletionRequest, resolved: &ResolvedRoute, client_stream: bool) -> Result<Dispatched, AppError> {
    match resolved.provider.as_str() {
        "google" => google_chat(state, req, resolved, client_stream).await,
        "codex" => codex_chat(state, req, resolved).await,
        other => catalog_chat(state, req, resolved, other).await,
    }
}

async fn google_chat(state: &AppState, req: &ChatCompletionRequest, resolved: &ResolvedRoute, client_stream: bool) -> Result<Dispatched, AppError> {
    let token = state.token_manager.get_primary_or_default().await?;
    let mut envelope = openai_in::to_internal(req, new_request_id(), USER_AGENT);
    envelope.model = resolved.model.clone();
    envelope.project = token.project_id.clone();

    let id = format!("chatcmpl-{}", Uuid::new_v4());
    let created = now_secs() as u64;

    if client_stream {
        let frames = state.cloud_code.generate_frames(&token.account_id, &token.access_token, &envelope, true).await?;
        let mut chunks = Vec::new();
        for (i, frame) in frames.iter().enumerate() {
            chunks.extend(openai_out::chunk_from_internal(frame, &resolved.model, &id, created, i == 0));
        }
        let events = chunks
            .into_iter()
            .map(|c| Ok::<_, Infallible>(Event::default().data(serde_json::to_string(&c).unwrap_or_default())))
            .chain(std::iter::once(Ok(Event::default().data("[DONE]"))));
        let response = Sse::new(futures::stream::iter(events)).keep_alive(KeepAlive::default()).into_response();
        Ok(Dispatched::new(response).account_email(token.email))
    } else {
        let merged = state.cloud_code.generate(&token.account_id, &token.access_token, &envelope).await?;
        let resp = openai_out::from_internal(&merged, &resolved.model, &id, created);
        let body_text = serde_json::to_string(&resp).unwrap_or_default();
        let dispatched = Dispatched::new(Json(resp).into_response()).account_email(token.email).response_body(body_text);
        Ok(dispatched)
    }
}

/// Codex speaks the Responses API, not Chat Completions; the gateway relays
/// its JSON reply to the client unreshaped rather than forcing it through
/// the Chat Completions schema, the same way a catalog provider's own native
/// response is relayed unmodified.
async fn codex_chat(state: &AppState, req: &ChatCompletionRequest, resolved: &ResolvedRoute) -> Result<Dispatched, AppError> {
    let auth = codex::load_auth()?;
    let access_token = if codex::needs_refresh(&auth.access_token) {
        let refreshed = state.codex_client.refresh(&auth).await?;
        codex::save_auth(&refreshed)?;
        refreshed.access_token
    } else {
        auth.access_token.clone()
    };

    let mut payload = serde_json::to_value(req)?;
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("model".to_string(), serde_json::Value::String(resolved.model.clone()));
    }

    let (value, filtered) = state.codex_client.responses(&access_token, auth.account_id.as_deref(), payload).await?;
    let body_text = serde_json::to_string(&value).unwrap_or_default();
    let mut response = Json(value).into_response();
    if !filtered.is_empty() {
        if let Ok(v) = HeaderValue::from_str(&filtered.join(",")) {
            response.headers_mut().insert("X-Nexus-Codex-Filtered-Params", v);
        }
    }
    Ok(Dispatched::new(response).response_body(body_text))
}

async fn catalog_chat(state: &AppState, req: &ChatCompletionRequest, resolved: &ResolvedRoute, provider_id: &str) -> Result<Dispatched, AppError> {
    let provider = state
        .catalog
        .get(provider_id)
        .ok_or_else(|| AppError::RouteRejected(format!("unknown catalog provider '{provider_id}'")))?;
    let url = openai_compat::chat_completions_url(provider);
    let key = openai_compat::bearer_key(provider)?;

    let mut body_value = serde_json::to_value(req)?;
    if let Some(obj) = body_value.as_object_mut() {
        obj.insert("model".to_string(), serde_json::Value::String(resolved.model.clone()));
    }
    let body = serde_json::to_vec(&body_value)?;

    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    for (k, v) in &provider.static_headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(v)) {
            headers.insert(name, value);
        }
    }

    let (status, resp_headers, resp_body) = proxy::forward(
        &state.http_client,
        proxy::ProxyRequest { method: Method::POST, url, headers, body: Bytes::from(body) },
        proxy::Injected::Bearer(key),
        &[],
    )
    .await?;

    let mut response = (status, resp_body).into_response();
    *response.headers_mut() = resp_headers;
    Ok(Dispatched::new(response))
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    id: String,
    object: String,
    created: i64,
    owned_by: String,
}

#[derive(Debug, Serialize)]
struct ModelList {
    object: String,
    data: Vec<ModelInfo>,
}

/// Aggregates the distinct client-facing model ids across every active
/// route — the only model catalog this gateway owns outright, since every
/// upstream's own model list lives behind its own auth.
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelList>, AppError> {
    let routes = state.store.list_routes().await?;
    let mut seen = std::collections::HashSet::new();
    let mut data = Vec::new();
    for route in routes.into_iter().filter(|r| r.is_active) {
        if seen.insert(route.client_model.to_lowercase()) {
            data.push(ModelInfo {
                id: route.client_model,
                object: "model".to_string(),
                created: route.created_at,
                owned_by: route.target_provider,
            });
        }
    }
    Ok(Json(ModelList { object: "list".to_string(), data }))
}
