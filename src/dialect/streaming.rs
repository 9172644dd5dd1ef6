//! Per-frame translation for client-facing SSE (spec §4.2.5): one upstream
//! frame becomes one OpenAI chunk ([`openai_out::chunk_from_internal`]) or a
//! handful of Anthropic stream events, emitted here. A buffered text run is
//! always flushed before any non-text part, matching the OpenAI-direction
//! rule so a tool-call delta never interleaves with unflushed text.

use crate::dialect::envelope::{InternalResponse, Part};
use crate::dialect::tool_ids::generate_tool_use_id;
use crate::models::anthropic::{Delta, MessageData, StreamEvent, TokenUsage};

pub fn message_start(model: &str, id: &str) -> StreamEvent {
    StreamEvent {
        event_type: "message_start".to_string(),
        message: Some(MessageData {
            id: id.to_string(),
            message_type: "message".to_string(),
            role: "assistant".to_string(),
            model: Some(model.to_string()),
            usage: Some(TokenUsage { input_tokens: 0, output_tokens: 0, cache_creation_input_tokens: None, cache_read_input_tokens: None }),
        }),
        index: None,
        content_block: None,
        delta: None,
        usage: None,
    }
}

/// Translates one upstream frame into the Anthropic stream events it maps
/// to: a `content_block_delta` per buffered text flush, a
/// `content_block_start`/`content_block_delta`/`content_block_stop` triple
/// per tool call, and a trailing `message_delta` carrying the stop reason.
pub fn anthropic_events_from_internal(resp: &InternalResponse, block_index_start: u32) -> (Vec<StreamEvent>, u32) {
    let candidates = resp.candidates();
    let candidate = match candidates.into_iter().next() {
        Some(c) => c,
        None => return (vec![], block_index_start),
    };

    let mut events = Vec::new();
    let mut index = block_index_start;
    let mut pending_text = String::new();
    let mut text_block_open = false;
    let mut had_tool_use = false;

    for part in &candidate.content.parts {
        match part {
            Part::Text { text, thought, .. } if !*thought => {
                if !text_block_open {
                    events.push(content_block_start_text(index));
                    text_block_open = true;
                }
                pending_text.push_str(text);
            }
            Part::FunctionCall { function_call, .. } => {
                if !pending_text.is_empty() {
                    events.push(text_delta(index, &pending_text));
                    pending_text.clear();
                }
                if text_block_open {
                    events.push(content_block_stop(index));
                    text_block_open = false;
                    index += 1;
                }
                had_tool_use = true;
                let tool_id = generate_tool_use_id(&function_call.name);
                events.push(tool_use_start(index, &tool_id, &function_call.name));
                events.push(tool_use_delta(index, &function_call.args));
                events.push(content_block_stop(index));
                index += 1;
            }
            _ => {}
        }
    }

    if !pending_text.is_empty() {
        events.push(text_delta(index, &pending_text));
    }
    if text_block_open {
        events.push(content_block_stop(index));
        index += 1;
    }

    if let Some(reason) = &candidate.finish_reason {
        events.push(message_delta(reason, had_tool_use));
    }

    (events, index)
}

fn content_block_start_text(index: u32) -> StreamEvent {
    StreamEvent {
        event_type: "content_block_start".to_string(),
        message: None,
        index: Some(index),
        content_block: Some(crate::models::anthropic::ContentBlock {
            block_type: "text".to_string(),
            text: Some(String::new()),
            source: None,
            id: None,
            name: None,
            input: None,
            tool_use_id: None,
            content: None,
            is_error: None,
            cache_control: None,
            thinking: None,
        }),
        delta: None,
        usage: None,
    }
}

fn text_delta(index: u32, text: &str) -> StreamEvent {
    StreamEvent {
        event_type: "content_block_delta".to_string(),
        message: None,
        index: Some(index),
        content_block: None,
        delta: Some(Delta { delta_type: Some("text_delta".to_string()), text: Some(text.to_string()), stop_reason: None, partial_json: None }),
        usage: None,
    }
}

fn tool_use_start(index: u32, id: &str, name: &str) -> StreamEvent {
    StreamEvent {
        event_type: "content_block_start".to_string(),
        message: None,
        index: Some(index),
        content_block: Some(crate::models::anthropic::ContentBlock {
            block_type: "tool_use".to_string(),
            text: None,
            source: None,
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            input: Some(serde_json::json!({})),
            tool_use_id: None,
            content: None,
            is_error: None,
            cache_control: None,
            thinking: None,
        }),
        delta: None,
        usage: None,
    }
}

fn tool_use_delta(index: u32, args: &serde_json::Value) -> StreamEvent {
    StreamEvent {
        event_type: "content_block_delta".to_string(),
        message: None,
        index: Some(index),
        content_block: None,
        delta: Some(Delta {
            delta_type: Some("input_json_delta".to_string()),
            text: None,
            stop_reason: None,
            partial_json: Some(serde_json::to_string(args).unwrap_or_else(|_| "{}".to_string())),
        }),
        usage: None,
    }
}

fn content_block_stop(index: u32) -> StreamEvent {
    StreamEvent { event_type: "content_block_stop".to_string(), message: None, index: Some(index), content_block: None, delta: None, usage: None }
}

fn message_delta(reason: &str, had_tool_use: bool) -> StreamEvent {
    let stop_reason = if had_tool_use {
        "tool_use"
    } else {
        match reason {
            "MAX_TOKENS" => "max_tokens",
            _ => "end_turn",
        }
    };
    StreamEvent {
        event_type: "message_delta".to_string(),
        message: None,
        index: None,
        content_block: None,
        delta: Some(Delta { delta_type: None, text: None, stop_reason: Some(stop_reason.to_string()), partial_json: None }),
        usage: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::envelope::{Candidate, Content, FunctionCall};

    #[test]
    fn text_flushes_before_tool_call_block() {
        let resp = InternalResponse {
            candidates: Some(vec![Candidate {
                content: Content {
                    role: Some("model".to_string()),
                    parts: vec![
                        Part::text("checking weather... "),
                        Part::FunctionCall {
                            function_call: FunctionCall { name: "get_weather".to_string(), args: serde_json::json!({}) },
                            thought_signature: None,
                        },
                    ],
                },
                finish_reason: Some("STOP".to_string()),
                grounding_metadata: vec![],
            }]),
            ..Default::default()
        };
        let (events, _) = anthropic_events_from_internal(&resp, 0);
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            types,
            vec![
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
            ]
        );
    }
}
