//! Internal envelope -> Anthropic Messages response (spec §4.2.4).
//!
//! `functionCall` parts become `tool_use` blocks with a minted id (same
//! mint/extract pair the OpenAI direction uses, so `ExtractFunctionName`
//! round-trips regardless of which client dialect is in play); finish
//! reason maps to `tool_use` whenever any tool call is present, else
//! `end_turn`/`max_tokens`.

use crate::dialect::envelope::{InternalResponse, Part};
use crate::dialect::tool_ids::generate_tool_use_id;
use crate::models::anthropic::{ContentBlock, MessagesResponse, TokenUsage};

fn map_stop_reason(reason: Option<&str>, had_tool_use: bool) -> Option<String> {
    if had_tool_use {
        return Some("tool_use".to_string());
    }
    match reason {
        Some("MAX_TOKENS") => Some("max_tokens".to_string()),
        Some("SAFETY") | Some("RECITATION") => Some("stop_sequence".to_string()),
        _ => Some("end_turn".to_string()),
    }
}

pub fn from_internal(resp: &InternalResponse, model: &str, id: &str) -> MessagesResponse {
    let candidates = resp.candidates();
    let candidate = candidates.into_iter().next().unwrap_or_default();

    let mut blocks = Vec::new();
    let mut had_tool_use = false;

    for part in &candidate.content.parts {
        match part {
            Part::Text { text, thought, .. } if !*thought => {
                blocks.push(ContentBlock {
                    block_type: "text".to_string(),
                    text: Some(text.clone()),
                    source: None,
                    id: None,
                    name: None,
                    input: None,
                    tool_use_id: None,
                    content: None,
                    is_error: None,
                    cache_control: None,
                    thinking: None,
                });
            }
            Part::FunctionCall { function_call, .. } => {
                had_tool_use = true;
                blocks.push(ContentBlock {
                    block_type: "tool_use".to_string(),
                    text: None,
                    source: None,
                    id: Some(generate_tool_use_id(&function_call.name)),
                    name: Some(function_call.name.clone()),
                    input: Some(function_call.args.clone()),
                    tool_use_id: None,
                    content: None,
                    is_error: None,
                    cache_control: None,
                    thinking: None,
                });
            }
            _ => {}
        }
    }

    let usage = resp.usage().unwrap_or_default();

    MessagesResponse {
        id: id.to_string(),
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        content: blocks,
        model: model.to_string(),
        stop_reason: map_stop_reason(candidate.finish_reason.as_deref(), had_tool_use),
        stop_sequence: None,
        usage: TokenUsage {
            input_tokens: usage.prompt_token_count as u64,
            output_tokens: usage.candidates_token_count as u64,
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
        },
    }
}
