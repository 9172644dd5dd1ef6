//! SSE -> single-JSON merge for Cloud-Code premium models (spec §4.5).
//!
//! Premium models (anything with `claude` or `gemini-3-pro` in the model
//! id) are always served by the upstream as a streaming response even for a
//! non-streaming client request, so the Cloud-Code client always reads SSE
//! and — for non-streaming callers — merges every frame into one
//! [`InternalResponse`] before returning. The scanner buffer is capped at 8
//! MiB; a response that never emits a single candidate synthesizes an empty
//! text part rather than returning an empty candidate list.

use crate::dialect::envelope::{Candidate, Content, InternalResponse, Part, UsageMetadata};
use crate::error::AppError;

pub const MAX_BUFFER_BYTES: usize = 8 * 1024 * 1024;

/// Splits a raw SSE byte stream into `data:` payloads, skipping the
/// `[DONE]` sentinel and blank keep-alive frames. Frames are delimited by a
/// blank line (`\n\n`); a frame without a trailing blank line at the end of
/// the buffer is left for the next call (the caller re-invokes with the
/// unconsumed remainder appended to fresh bytes).
pub struct SseScanner {
    buffer: String,
}

impl SseScanner {
    pub fn new() -> Self {
        Self { buffer: String::new() }
    }

    /// Feeds more bytes in, returning any complete `data:` payloads found so
    /// far. Errors if the buffer would exceed [`MAX_BUFFER_BYTES`] without
    /// ever completing a frame (a malformed or runaway upstream).
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<String>, AppError> {
        self.buffer.push_str(chunk);
        if self.buffer.len() > MAX_BUFFER_BYTES {
            return Err(AppError::UpstreamTransport("SSE scanner buffer exceeded 8 MiB without a frame boundary".to_string()));
        }

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..pos + 2).collect();
            for line in frame.lines() {
                if let Some(data) = line.strip_prefix("data:") {
                    let data = data.trim();
                    if data.is_empty() || data == "[DONE]" {
                        continue;
                    }
                    payloads.push(data.to_string());
                }
            }
        }
        Ok(payloads)
    }
}

impl Default for SseScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges every parsed frame into a single [`InternalResponse`]: consecutive
/// text parts concatenate into one `Text` part, but a function-call or
/// inline-data part flushes whatever text ran before it first, so the
/// original interleaving between text and non-text parts survives the
/// merge instead of collapsing into "all text, then everything else". The
/// last non-null `finishReason` and `usageMetadata` win.
pub fn merge_frames(frames: &[InternalResponse]) -> InternalResponse {
    let mut role = "model".to_string();
    let mut parts: Vec<Part> = Vec::new();
    let mut pending_text = String::new();
    let mut finish_reason = None;
    let mut usage: Option<UsageMetadata> = None;
    let mut grounding = Vec::new();
    let mut trace_id = None;
    let mut saw_any_candidate = false;

    for frame in frames {
        for candidate in frame.candidates() {
            saw_any_candidate = true;
            if let Some(r) = &candidate.content.role {
                role = r.clone();
            }
            for part in candidate.content.parts {
                match part {
                    Part::Text { text: t, thought, .. } if !thought => pending_text.push_str(&t),
                    other => {
                        flush_pending_text(&mut pending_text, &mut parts);
                        parts.push(other);
                    }
                }
            }
            if candidate.finish_reason.is_some() {
                finish_reason = candidate.finish_reason;
            }
            grounding.extend(candidate.grounding_metadata);
        }
        if let Some(u) = frame.usage() {
            usage = Some(u);
        }
        if frame.trace_id.is_some() {
            trace_id = frame.trace_id.clone();
        }
    }

    if !pending_text.is_empty() {
        flush_pending_text(&mut pending_text, &mut parts);
    } else if !saw_any_candidate {
        parts.push(Part::text(String::new()));
    }

    InternalResponse {
        candidates: Some(vec![Candidate {
            content: Content { role: Some(role), parts },
            finish_reason,
            grounding_metadata: grounding,
        }]),
        response: None,
        usage_metadata: usage,
        trace_id,
    }
}

fn flush_pending_text(pending: &mut String, parts: &mut Vec<Part>) {
    if !pending.is_empty() {
        parts.push(Part::text(std::mem::take(pending)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(text: &str, finish: Option<&str>) -> InternalResponse {
        serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": finish,
            }]
        }))
        .unwrap()
    }

    #[test]
    fn scanner_splits_on_blank_line_and_skips_done_sentinel() {
        let mut scanner = SseScanner::new();
        let payloads = scanner.feed("data: {\"a\":1}\n\ndata: [DONE]\n\n").unwrap();
        assert_eq!(payloads, vec!["{\"a\":1}".to_string()]);
    }

    #[test]
    fn scanner_buffers_partial_frame_across_feeds() {
        let mut scanner = SseScanner::new();
        assert!(scanner.feed("data: {\"a\"").unwrap().is_empty());
        let payloads = scanner.feed(":1}\n\n").unwrap();
        assert_eq!(payloads, vec!["{\"a\":1}".to_string()]);
    }

    #[test]
    fn merge_concatenates_text_and_keeps_last_finish_reason() {
        let merged = merge_frames(&[frame("hello ", None), frame("world", Some("STOP"))]);
        let candidates = merged.candidates();
        match &candidates[0].content.parts[0] {
            Part::Text { text, .. } => assert_eq!(text, "hello world"),
            _ => panic!("expected text part"),
        }
        assert_eq!(candidates[0].finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn merge_preserves_interleaved_text_and_function_call_order() {
        let text_frame = |text: &str| -> InternalResponse {
            serde_json::from_value(json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
            }))
            .unwrap()
        };
        let call_frame: InternalResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "functionCall": { "name": "lookup", "args": {} } }] }
            }]
        }))
        .unwrap();

        let merged = merge_frames(&[text_frame("Hello"), call_frame, text_frame(" done")]);
        let candidates = merged.candidates();
        let parts = &candidates[0].content.parts;
        assert_eq!(parts.len(), 3);
        match &parts[0] {
            Part::Text { text, .. } => assert_eq!(text, "Hello"),
            _ => panic!("expected leading text part"),
        }
        assert!(matches!(&parts[1], Part::FunctionCall { .. }));
        match &parts[2] {
            Part::Text { text, .. } => assert_eq!(text, " done"),
            _ => panic!("expected trailing text part"),
        }
    }

    #[test]
    fn merge_with_no_candidates_synthesizes_empty_text() {
        let merged = merge_frames(&[]);
        let candidates = merged.candidates();
        assert_eq!(candidates.len(), 1);
        match &candidates[0].content.parts[0] {
            Part::Text { text, .. } => assert_eq!(text, ""),
            _ => panic!("expected synthesized empty text part"),
        }
    }

    #[test]
    fn scanner_rejects_runaway_buffer_without_frame_boundary() {
        let mut scanner = SseScanner::new();
        let huge = "x".repeat(MAX_BUFFER_BYTES + 1);
        assert!(scanner.feed(&huge).is_err());
    }
}
