//! Shared per-request plumbing: a request id, and a little recorder that
//! writes both the Prometheus metrics and the monitor's request log once a
//! handler is done, mirroring the teacher's request-logger-at-the-edge
//! pattern (spec §5's ordering rule: translation, then credential
//! acquisition, then dispatch, then response adaptation, then log write).

use std::time::Instant;
use uuid::Uuid;

use crate::handlers::state::AppState;
use crate::logging::{redact_sensitive_data, truncate_body};
use crate::monitor::RequestEvent;
use crate::store::now_secs;

pub fn new_request_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

/// What a provider dispatch produced, alongside the response itself: the
/// account the credential belonged to and the serialized body, captured
/// whenever it's cheaply available (i.e. before it's consumed building the
/// client-facing response) rather than read back out of one.
pub struct Dispatched {
    pub response: axum::response::Response,
    pub account_email: Option<String>,
    pub response_body: Option<String>,
}

impl Dispatched {
    pub fn new(response: axum::response::Response) -> Self {
        Self { response, account_email: None, response_body: None }
    }

    pub fn account_email(mut self, email: impl Into<String>) -> Self {
        self.account_email = Some(email.into());
        self
    }

    pub fn response_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }
}

pub struct Recorder {
    start: Instant,
    method: &'static str,
    url: String,
    provider: String,
    model: String,
    mapped_model: Option<String>,
    request_body: Option<String>,
}

impl Recorder {
    pub fn new(method: &'static str, url: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            method,
            url: url.into(),
            provider: provider.into(),
            model: model.into(),
            mapped_model: None,
            request_body: None,
        }
    }

    pub fn mapped_model(mut self, m: impl Into<String>) -> Self {
        self.mapped_model = Some(m.into());
        self
    }

    pub fn request_body(mut self, body: impl Into<String>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    pub async fn finish(
        self,
        state: &AppState,
        status: u16,
        error: Option<String>,
        account_email: Option<String>,
        response_body: Option<String>,
        input_tokens: i64,
        output_tokens: i64,
    ) {
        crate::metrics::record_request(&self.provider, &self.model, &self.url);
        crate::metrics::record_duration(&self.provider, &self.model, self.start.elapsed());
        if let Some(e) = &error {
            crate::metrics::record_error(&self.provider, &self.model, e);
        }
        if input_tokens > 0 {
            crate::metrics::record_tokens(&self.provider, &self.model, "input", input_tokens as u64);
        }
        if output_tokens > 0 {
            crate::metrics::record_tokens(&self.provider, &self.model, "output", output_tokens as u64);
        }

        let obs = &state.config.load().observability;
        let (request_body, response_body) = if obs.body_logging_enabled {
            let request_body = self.request_body.map(|b| {
                let redacted = redact_sensitive_data(&b, &obs.redact_patterns);
                truncate_body(redacted, obs.request_body_limit).0
            });
            let response_body = response_body.map(|b| {
                let redacted = redact_sensitive_data(&b, &obs.redact_patterns);
                truncate_body(redacted, obs.response_body_limit).0
            });
            (request_body, response_body)
        } else {
            (None, None)
        };

        state
            .monitor
            .record(RequestEvent {
                timestamp: now_secs(),
                method: self.method.to_string(),
                url: self.url,
                status: status as i64,
                duration_ms: self.start.elapsed().as_millis() as i64,
                provider: self.provider,
                model: self.model,
                mapped_model: self.mapped_model,
                account_email,
                error,
                request_body,
                response_body,
                input_tokens,
                output_tokens,
            })
            .await;
    }
}

/// Splits a `{model}:{action}` path segment on its last colon — the model id
/// itself may contain none, but being defensive costs nothing.
pub fn split_model_action(raw: &str) -> Option<(&str, &str)> {
    let idx = raw.rfind(':')?;
    Some((&raw[..idx], &raw[idx + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_last_colon() {
        assert_eq!(split_model_action("gemini-3-flash:generateContent"), Some(("gemini-3-flash", "generateContent")));
        assert_eq!(split_model_action("no-colon-here"), None);
    }
}
