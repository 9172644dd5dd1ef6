//! Internal envelope -> OpenAI Chat Completion response (spec §4.2.3).
//!
//! Concatenates non-thought text parts, mints a `tool_use`-shaped
//! `tool_calls` id via [`tool_ids::generate_tool_use_id`] for each
//! `functionCall` part, and maps usage accepting either a top-level or
//! nested `response.candidates` shape.

use serde_json::Value;

use crate::dialect::envelope::{InternalResponse, Part};
use crate::dialect::tool_ids::generate_tool_use_id;
use crate::models::openai::{
    Annotation, ChatChoice, ChatCompletionChunk, ChatCompletionResponse, ChatMessage, ChunkChoice, Delta,
    FunctionCall as OaFunctionCall, FunctionCallDelta, MessageContent, ToolCall, ToolCallDelta, UrlCitation, Usage,
};

/// Builds `annotations[]` from the candidate's `groundingMetadata` entries
/// (spec §4.2.3): for each `groundingSupport`, only the first chunk index is
/// used, and a chunk without a `web.uri` is skipped entirely.
fn extract_annotations(grounding_metadata: &[Value]) -> Vec<Annotation> {
    let mut annotations = Vec::new();

    for metadata in grounding_metadata {
        let chunks = metadata.get("groundingChunks").and_then(Value::as_array).cloned().unwrap_or_default();
        let supports = metadata.get("groundingSupports").and_then(Value::as_array).cloned().unwrap_or_default();

        for support in &supports {
            let chunk_index = support
                .get("groundingChunkIndices")
                .and_then(Value::as_array)
                .and_then(|indices| indices.first())
                .and_then(Value::as_u64);
            let Some(chunk_index) = chunk_index else { continue };
            let Some(chunk) = chunks.get(chunk_index as usize) else { continue };
            let Some(url) = chunk.get("web").and_then(|w| w.get("uri")).and_then(Value::as_str) else { continue };

            let segment = support.get("segment");
            let start_index = segment.and_then(|s| s.get("startIndex")).and_then(Value::as_u64).unwrap_or(0) as u32;
            let end_index = segment.and_then(|s| s.get("endIndex")).and_then(Value::as_u64).unwrap_or(0) as u32;
            let title = chunk.get("web").and_then(|w| w.get("title")).and_then(Value::as_str).map(str::to_string);

            annotations.push(Annotation {
                annotation_type: "url_citation".to_string(),
                url_citation: UrlCitation { start_index, end_index, url: url.to_string(), title },
            });
        }
    }

    annotations
}

fn map_finish_reason(reason: Option<&str>, had_tool_calls: bool) -> Option<String> {
    if had_tool_calls {
        return Some("tool_calls".to_string());
    }
    match reason {
        Some("STOP") | None => Some("stop".to_string()),
        Some("MAX_TOKENS") => Some("length".to_string()),
        Some("SAFETY") | Some("RECITATION") => Some("content_filter".to_string()),
        Some(other) => Some(other.to_lowercase()),
    }
}

pub fn from_internal(resp: &InternalResponse, model: &str, id: &str, created: u64) -> ChatCompletionResponse {
    let candidates = resp.candidates();
    let candidate = candidates.into_iter().next().unwrap_or_default();

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in &candidate.content.parts {
        match part {
            Part::Text { text: t, thought, .. } if !*thought => text.push_str(t),
            Part::FunctionCall { function_call, .. } => {
                tool_calls.push(ToolCall {
                    id: generate_tool_use_id(&function_call.name),
                    tool_type: "function".to_string(),
                    function: OaFunctionCall {
                        name: function_call.name.clone(),
                        arguments: serde_json::to_string(&function_call.args).unwrap_or_else(|_| "{}".to_string()),
                    },
                });
            }
            _ => {}
        }
    }

    let annotations = extract_annotations(&candidate.grounding_metadata);

    let message = ChatMessage {
        role: "assistant".to_string(),
        content: MessageContent::Text(text),
        name: None,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls.clone()) },
        tool_call_id: None,
        annotations: if annotations.is_empty() { None } else { Some(annotations) },
    };

    let usage = resp.usage().map(|u| Usage {
        prompt_tokens: u.prompt_token_count as u64,
        completion_tokens: u.candidates_token_count as u64,
        total_tokens: u.total_token_count as u64,
    });

    ChatCompletionResponse {
        id: id.to_string(),
        object: "chat.completion".to_string(),
        created,
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message,
            finish_reason: map_finish_reason(candidate.finish_reason.as_deref(), !tool_calls.is_empty()),
            logprobs: None,
        }],
        usage,
    }
}

/// Translates one upstream SSE frame into zero or more OpenAI chunk events.
/// A buffered text run is flushed (emitted as a `content` delta) before any
/// non-text part so tool-call deltas never interleave with unflushed text.
pub fn chunk_from_internal(resp: &InternalResponse, model: &str, id: &str, created: u64, first: bool) -> Vec<ChatCompletionChunk> {
    let candidates = resp.candidates();
    let candidate = match candidates.into_iter().next() {
        Some(c) => c,
        None => return vec![],
    };

    let mut chunks = Vec::new();
    let mut pending_text = String::new();
    let mut tool_index: u32 = 0;

    let flush_text = |pending: &mut String, chunks: &mut Vec<ChatCompletionChunk>| {
        if !pending.is_empty() {
            chunks.push(make_chunk(model, id, created, Delta { role: None, content: Some(pending.clone()), tool_calls: None }, None));
            pending.clear();
        }
    };

    for part in &candidate.content.parts {
        match part {
            Part::Text { text, thought, .. } if !*thought => pending_text.push_str(text),
            Part::FunctionCall { function_call, .. } => {
                flush_text(&mut pending_text, &mut chunks);
                let delta = Delta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![ToolCallDelta {
                        index: tool_index,
                        id: Some(generate_tool_use_id(&function_call.name)),
                        tool_type: Some("function".to_string()),
                        function: Some(FunctionCallDelta {
                            name: Some(function_call.name.clone()),
                            arguments: Some(serde_json::to_string(&function_call.args).unwrap_or_else(|_| "{}".to_string())),
                        }),
                    }]),
                };
                tool_index += 1;
                chunks.push(make_chunk(model, id, created, delta, None));
            }
            _ => {}
        }
    }
    flush_text(&mut pending_text, &mut chunks);

    if let Some(reason) = &candidate.finish_reason {
        chunks.push(make_chunk(
            model,
            id,
            created,
            Delta { role: None, content: None, tool_calls: None },
            map_finish_reason(Some(reason), tool_index > 0),
        ));
    }

    if first {
        if let Some(c) = chunks.first_mut() {
            c.choices[0].delta.role = Some("assistant".to_string());
        } else {
            chunks.push(make_chunk(model, id, created, Delta { role: Some("assistant".to_string()), content: None, tool_calls: None }, None));
        }
    }

    chunks
}

fn make_chunk(model: &str, id: &str, created: u64, delta: Delta, finish_reason: Option<String>) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created,
        model: model.to_string(),
        choices: vec![ChunkChoice { index: 0, delta, finish_reason }],
        usage: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::envelope::{Candidate, Content, UsageMetadata};

    fn resp_with_text(text: &str) -> InternalResponse {
        InternalResponse {
            candidates: Some(vec![Candidate {
                content: Content { role: Some("model".to_string()), parts: vec![Part::text(text)] },
                finish_reason: Some("STOP".to_string()),
                grounding_metadata: vec![],
            }]),
            response: None,
            usage_metadata: Some(UsageMetadata { prompt_token_count: 3, candidates_token_count: 2, total_token_count: 5 }),
            trace_id: None,
        }
    }

    #[test]
    fn text_only_response_maps_to_stop_finish_reason() {
        let resp = resp_with_text("hello");
        let out = from_internal(&resp, "gpt-4o", "chatcmpl-1", 0);
        assert_eq!(out.choices[0].message.content.as_text(), Some("hello"));
        assert_eq!(out.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(out.usage.unwrap().total_tokens, 5);
    }

    #[test]
    fn grounding_metadata_becomes_url_citation_annotation() {
        let mut resp = resp_with_text("see the source");
        resp.candidates.as_mut().unwrap()[0].grounding_metadata = vec![serde_json::json!({
            "groundingChunks": [{"web": {"uri": "https://example.com/a", "title": "Example A"}}],
            "groundingSupports": [{
                "segment": {"startIndex": 4, "endIndex": 13},
                "groundingChunkIndices": [0]
            }]
        })];
        let out = from_internal(&resp, "gpt-4o", "chatcmpl-1", 0);
        let annotations = out.choices[0].message.annotations.as_ref().unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].url_citation.url, "https://example.com/a");
        assert_eq!(annotations[0].url_citation.title.as_deref(), Some("Example A"));
        assert_eq!(annotations[0].url_citation.start_index, 4);
        assert_eq!(annotations[0].url_citation.end_index, 13);
    }

    #[test]
    fn grounding_chunk_without_web_uri_is_skipped() {
        let mut resp = resp_with_text("no source");
        resp.candidates.as_mut().unwrap()[0].grounding_metadata = vec![serde_json::json!({
            "groundingChunks": [{"retrievedContext": {"uri": "internal://doc"}}],
            "groundingSupports": [{
                "segment": {"startIndex": 0, "endIndex": 9},
                "groundingChunkIndices": [0]
            }]
        })];
        let out = from_internal(&resp, "gpt-4o", "chatcmpl-1", 0);
        assert!(out.choices[0].message.annotations.is_none());
    }

    #[test]
    fn function_call_maps_to_tool_calls_finish_reason() {
        let mut resp = resp_with_text("");
        resp.candidates.as_mut().unwrap()[0].content.parts = vec![Part::FunctionCall {
            function_call: crate::dialect::envelope::FunctionCall { name: "get_weather".to_string(), args: serde_json::json!({}) },
            thought_signature: None,
        }];
        let out = from_internal(&resp, "gpt-4o", "chatcmpl-1", 0);
        assert_eq!(out.choices[0].finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(out.choices[0].message.tool_calls.as_ref().unwrap()[0].function.name, "get_weather");
    }
}
