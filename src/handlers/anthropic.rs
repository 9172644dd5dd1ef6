//! Anthropic Messages surface (spec §6): `POST /anthropic/v1/messages`. The
//! router only ever allows `google` for this protocol — Claude models are
//! served exclusively through Cloud-Code — so there is no multi-provider
//! dispatch here, unlike the OpenAI surface.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::Json;
use std::convert::Infallible;
use uuid::Uuid;

use crate::dialect::{anthropic_in, anthropic_out, streaming};
use crate::error::AppError;
use crate::handlers::state::AppState;
use crate::handlers::util::{new_request_id, Dispatched, Recorder};
use crate::models::anthropic::MessagesRequest;
use crate::router::Protocol;

const USER_AGENT: &str = "nexus-gateway/1.0";
const ENDPOINT: &str = "/anthropic/v1/messages";

pub async fn messages(State(state): State<AppState>, Json(req): Json<MessagesRequest>) -> Result<Response, AppError> {
    let resolved = state.router.resolve(&req.model, Protocol::Anthropic)?;
    let recorder = Recorder::new("POST", ENDPOINT, resolved.provider.clone(), req.model.clone())
        .mapped_model(resolved.model.clone())
        .request_body(serde_json::to_string(&req).unwrap_or_default());
    let client_stream = req.stream.unwrap_or(false);

    let span = tracing::info_span!("anthropic_messages", client_model = %req.model, target_model = %resolved.model, stream = client_stream);
    let _enter = span.enter();

    let token_result = state.token_manager.get_primary_or_default().await;
    let outcome: Result<Dispatched, AppError> = match token_result {
        Ok(token) => {
            let mut envelope = anthropic_in::to_internal(&req, new_request_id(), USER_AGENT);
            envelope.model = resolved.model.clone();
            envelope.project = token.project_id.clone();

            let id = format!("msg_{}", Uuid::new_v4());
            let email = token.email.clone();

            if client_stream {
                state
                    .cloud_code
                    .generate_frames(&token.account_id, &token.access_token, &envelope, true)
                    .await
                    .map(|frames| Dispatched::new(stream_response(&frames, &resolved.model, &id)).account_email(email))
            } else {
                state
                    .cloud_code
                    .generate(&token.account_id, &token.access_token, &envelope)
                    .await
                    .map(|merged| {
                        let resp = anthropic_out::from_internal(&merged, &resolved.model, &id);
                        let body_text = serde_json::to_string(&resp).unwrap_or_default();
                        Dispatched::new(Json(resp).into_response()).account_email(email).response_body(body_text)
                    })
            }
        }
        Err(e) => Err(e),
    };

    let (status, error, account_email, response_body, response) = match outcome {
        Ok(d) => (d.response.status().as_u16(), None, d.account_email, d.response_body, Ok(d.response)),
        Err(e) => (e.status().as_u16(), Some(e.kind().to_string()), None, None, Err(e)),
    };
    recorder.finish(&state, status, error, account_email, response_body, 0, 0).await;

    response
}

fn stream_response(frames: &[crate::dialect::InternalResponse], model: &str, id: &str) -> Response {
    let mut events = vec![streaming::message_start(model, id)];
    let mut block_index = 0;
    for frame in frames {
        let (frame_events, next_index) = streaming::anthropic_events_from_internal(frame, block_index);
        events.extend(frame_events);
        block_index = next_index;
    }
    events.push(crate::models::anthropic::StreamEvent {
        event_type: "message_stop".to_string(),
        message: None,
        index: None,
        content_block: None,
        delta: None,
        usage: None,
    });

    let sse_events = events.into_iter().map(|e| {
        let event_type = e.event_type.clone();
        Ok::<_, Infallible>(Event::default().event(event_type).data(serde_json::to_string(&e).unwrap_or_default()))
    });
    Sse::new(futures::stream::iter(sse_events)).keep_alive(KeepAlive::default()).into_response()
}
