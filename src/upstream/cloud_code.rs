//! Cloud-Code upstream client (spec §4.4): the Google-OAuth-backed path
//! that serves Gemini and Claude-on-Vertex models alike, wrapping every
//! request in the Cloud-Code envelope and falling over to the next
//! endpoint in the list on a retryable failure.
//!
//! All three endpoints speak the same `/v1internal` surface; the gateway
//! tries them in order, remembering which one last worked for a given
//! account ("sticky session", SPEC_FULL §11) so steady-state traffic
//! doesn't re-probe dead endpoints on every request.

use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::dialect::envelope::{InternalEnvelope, InternalResponse, ANTIGRAVITY_IDENTITY};
use crate::error::AppError;
use crate::upstream::sse_merge::{merge_frames, SseScanner};

pub const ENDPOINTS: &[&str] = &[
    "https://daily-cloudcode-pa.googleapis.com",
    "https://cloudcode-pa.googleapis.com",
    "https://daily-cloudcode-pa.sandbox.googleapis.com",
];

const API_PATH: &str = "/v1internal";

const USER_AGENT_HEADER: &str = "antigravity/1.11.9 windows/amd64";
const X_GOOG_API_CLIENT: &str = "google-cloud-sdk vscode_cloudshelleditor/0.1";
const CLIENT_METADATA: &str = r#"{"ideType":"IDE_UNSPECIFIED","platform":"PLATFORM_UNSPECIFIED","pluginType":"GEMINI"}"#;

/// Models Cloud-Code always streams regardless of the client's own
/// `stream` flag — the gateway must SSE-merge the response for a
/// non-streaming caller.
pub fn is_premium_model(model: &str) -> bool {
    let m = model.to_lowercase();
    m.contains("claude") || m.contains("gemini-3-pro")
}

/// Fills in `toolConfig.functionCallingConfig.mode = "VALIDATED"` when the
/// request carries tools and the dialect mapper didn't already set one from
/// the client's own `tool_choice` — unconditional injection has been
/// observed to cause 429s on models that never asked for it.
fn apply_default_tool_config(request: &mut serde_json::Map<String, Value>) {
    let has_tools = request.get("tools").and_then(Value::as_array).is_some_and(|t| !t.is_empty());
    if has_tools && !request.contains_key("toolConfig") {
        request.insert("toolConfig".to_string(), json!({"functionCallingConfig": {"mode": "VALIDATED"}}));
    }
}

/// Premium-model payload enhancement (spec §4.4): a random `sessionId`, a
/// fixed `toolConfig` forced to `VALIDATED` regardless of what the dialect
/// mapper set, and a `systemInstruction` carrying the Antigravity identity
/// twice — once plain, once wrapped in `[ignore]...[/ignore]` to neutralize
/// whatever system prompt the client itself sent.
fn apply_premium_enhancements(obj: &mut serde_json::Map<String, Value>) {
    obj.insert("sessionId".to_string(), Value::String(format!("session-{}", Uuid::new_v4())));
    if let Some(request) = obj.get_mut("request").and_then(Value::as_object_mut) {
        request.insert("toolConfig".to_string(), json!({"functionCallingConfig": {"mode": "VALIDATED"}}));
        request.insert(
            "systemInstruction".to_string(),
            json!({
                "parts": [
                    {"text": ANTIGRAVITY_IDENTITY},
                    {"text": format!("[ignore]{}[/ignore]", ANTIGRAVITY_IDENTITY)},
                ]
            }),
        );
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN || status.is_server_error()
}

pub struct CloudCodeClient {
    http: Client,
    /// account_id -> last endpoint index that worked.
    sticky: DashMap<String, usize>,
}

impl CloudCodeClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: Client::builder().timeout(timeout).build().expect("reqwest client"),
            sticky: DashMap::new(),
        }
    }

    fn endpoint_order(&self, account_id: &str) -> Vec<usize> {
        let preferred = self.sticky.get(account_id).map(|e| *e).unwrap_or(0);
        let mut order: Vec<usize> = (0..ENDPOINTS.len()).collect();
        if preferred != 0 {
            order.swap(0, preferred);
        }
        order
    }

    /// Sends one envelope, wrapped as `{project, requestId, model, ..., request}`,
    /// falling through the endpoint list on a 429/403/5xx. `streaming` picks
    /// the action suffix — premium models and genuinely-streaming callers hit
    /// `:streamGenerateContent?alt=sse`, everyone else hits `:generateContent`
    /// and gets back one JSON document instead of SSE frames.
    async fn send_raw(&self, account_id: &str, access_token: &str, envelope: &InternalEnvelope, streaming: bool) -> Result<String, AppError> {
        let order = self.endpoint_order(account_id);
        let mut last_err = None;
        let premium = is_premium_model(&envelope.model);
        let action = if streaming { "streamGenerateContent?alt=sse" } else { "generateContent" };

        for (attempt, &idx) in order.iter().enumerate() {
            let base = ENDPOINTS[idx];
            let url = format!("{base}{API_PATH}:{action}");

            let request_id = format!("agent-{}", Uuid::new_v4());
            let mut payload = serde_json::to_value(envelope).map_err(|e| AppError::MapperError { field: "envelope".to_string(), message: e.to_string() })?;
            if let Some(obj) = payload.as_object_mut() {
                obj.insert("requestId".to_string(), Value::String(request_id));
                obj.insert("userAgent".to_string(), Value::String("antigravity".to_string()));
                obj.insert("requestType".to_string(), Value::String("agent".to_string()));
                if let Some(request) = obj.get_mut("request").and_then(Value::as_object_mut) {
                    apply_default_tool_config(request);
                }
                if premium {
                    apply_premium_enhancements(obj);
                }
            }

            let result = self
                .http
                .post(&url)
                .bearer_auth(access_token)
                .header("Content-Type", "application/json")
                .header("User-Agent", USER_AGENT_HEADER)
                .header("X-Goog-Api-Client", X_GOOG_API_CLIENT)
                .header("Client-Metadata", CLIENT_METADATA)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        self.sticky.insert(account_id.to_string(), idx);
                        return resp.text().await.map_err(|e| AppError::UpstreamTransport(e.to_string()));
                    }
                    let body = resp.text().await.unwrap_or_default();
                    if is_retryable_status(status) && attempt + 1 < order.len() {
                        last_err = Some(AppError::UpstreamStatus { status, body, filtered_params: vec![] });
                        continue;
                    }
                    return Err(AppError::UpstreamStatus { status, body, filtered_params: vec![] });
                }
                Err(e) => {
                    last_err = Some(AppError::UpstreamTransport(e.to_string()));
                    if attempt + 1 < order.len() {
                        continue;
                    }
                }
            }
        }

        Err(last_err.unwrap_or(AppError::UpstreamTransport("no Cloud-Code endpoint reachable".to_string())))
    }

    /// Returns the individual frames unmerged, for callers that want to relay
    /// a genuinely streamed response to their own client rather than collapse
    /// it into one document. `client_stream` is the caller's own intent; a
    /// premium model is forced onto the streaming endpoint regardless, so the
    /// actual wire action is `client_stream || is_premium_model(model)`. When
    /// neither applies, the single upstream JSON document comes back as a
    /// one-element vec rather than SSE frames.
    pub async fn generate_frames(&self, account_id: &str, access_token: &str, envelope: &InternalEnvelope, client_stream: bool) -> Result<Vec<InternalResponse>, AppError> {
        let streaming = client_stream || is_premium_model(&envelope.model);
        let raw = self.send_raw(account_id, access_token, envelope, streaming).await?;

        if !streaming {
            let frame: InternalResponse = serde_json::from_str(&raw)
                .map_err(|e| AppError::MapperError { field: "response_body".to_string(), message: e.to_string() })?;
            return Ok(vec![frame]);
        }

        let mut scanner = SseScanner::new();
        let payloads = scanner.feed(&raw)?;

        let mut frames = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let frame: InternalResponse = serde_json::from_str(&payload)
                .map_err(|e| AppError::MapperError { field: "sse_frame".to_string(), message: e.to_string() })?;
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Merges the response into a single [`InternalResponse`] for a
    /// non-streaming caller — a plain `:generateContent` call already returns
    /// one document, a premium model's forced SSE stream gets merged down to
    /// one.
    pub async fn generate(&self, account_id: &str, access_token: &str, envelope: &InternalEnvelope) -> Result<InternalResponse, AppError> {
        let frames = self.generate_frames(account_id, access_token, envelope, false).await?;
        Ok(merge_frames(&frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premium_model_detection_matches_claude_and_gemini_3_pro() {
        assert!(is_premium_model("claude-sonnet-4-5"));
        assert!(is_premium_model("gemini-3-pro-preview"));
        assert!(!is_premium_model("gemini-3-flash"));
    }

    #[test]
    fn retryable_statuses_are_429_403_and_5xx() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::FORBIDDEN));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn sticky_endpoint_is_tried_first_after_a_success() {
        let client = CloudCodeClient::new(Duration::from_secs(1));
        client.sticky.insert("acc-1".to_string(), 2);
        let order = client.endpoint_order("acc-1");
        assert_eq!(order[0], 2);
    }

    #[test]
    fn premium_enhancements_add_session_id_tool_config_and_doubled_identity() {
        let mut obj = json!({
            "requestId": "agent-1",
            "model": "claude-sonnet-4-5",
            "request": {"contents": []}
        })
        .as_object()
        .unwrap()
        .clone();

        apply_premium_enhancements(&mut obj);

        assert!(obj.get("sessionId").and_then(Value::as_str).unwrap().starts_with("session-"));
        let request = obj.get("request").unwrap().as_object().unwrap();
        assert_eq!(
            request["toolConfig"]["functionCallingConfig"]["mode"].as_str(),
            Some("VALIDATED")
        );
        let parts = request["systemInstruction"]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"].as_str(), Some(ANTIGRAVITY_IDENTITY));
        assert_eq!(parts[1]["text"].as_str(), Some(format!("[ignore]{}[/ignore]", ANTIGRAVITY_IDENTITY).as_str()));
    }

    #[test]
    fn default_tool_config_fills_in_only_when_tools_present_and_unset() {
        let mut with_tools = json!({"contents": [], "tools": [{"functionDeclarations": []}]}).as_object().unwrap().clone();
        apply_default_tool_config(&mut with_tools);
        assert_eq!(with_tools["toolConfig"]["functionCallingConfig"]["mode"].as_str(), Some("VALIDATED"));

        let mut no_tools = json!({"contents": []}).as_object().unwrap().clone();
        apply_default_tool_config(&mut no_tools);
        assert!(!no_tools.contains_key("toolConfig"));

        let mut already_set = json!({
            "contents": [],
            "tools": [{"functionDeclarations": []}],
            "toolConfig": {"functionCallingConfig": {"mode": "ANY", "allowedFunctionNames": ["f"]}}
        })
        .as_object()
        .unwrap()
        .clone();
        apply_default_tool_config(&mut already_set);
        assert_eq!(already_set["toolConfig"]["functionCallingConfig"]["mode"].as_str(), Some("ANY"));
    }
}
