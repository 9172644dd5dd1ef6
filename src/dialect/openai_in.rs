//! OpenAI Chat Completions request -> internal envelope (spec §4.2.1).
//!
//! System messages aggregate into a single `systemInstruction`, always
//! prefixed with the Antigravity identity string so upstream prompt caching
//! stays stable across requests. Tool schemas go through
//! [`schema::clean_json_schema`]; tool-call ids are minted via
//! [`tool_ids::generate_tool_use_id`] and threaded back onto the matching
//! `tool` message through a two-pass id -> name map so a later turn's
//! `tool_call_id` can be resolved back to a function name even though OpenAI
//! doesn't carry one.

use serde_json::{json, Value};
use std::collections::HashMap;

use crate::dialect::envelope::{
    Content, FunctionCall, FunctionCallingConfig, FunctionDeclaration, FunctionResponse,
    GenerationConfig, InternalEnvelope, InternalRequest, Part, ThinkingConfig, Tool, ToolConfig,
    ANTIGRAVITY_IDENTITY,
};
use crate::dialect::schema::clean_json_schema;
use crate::dialect::tool_ids::extract_smuggled_thought_signature;
use crate::models::openai::{ChatCompletionRequest, Tool as OaTool, ToolChoice as OaToolChoice};

/// Models whose `thinkingConfig.thinkingLevel` defaults when the client
/// didn't ask for a specific reasoning effort (Gemini 3 Pro only).
fn default_thinking_level(model: &str) -> Option<&'static str> {
    if model.to_lowercase().contains("gemini-3-pro") {
        Some("high")
    } else {
        None
    }
}

fn is_claude_family(model: &str) -> bool {
    model.to_lowercase().contains("claude")
}

/// Written to `thoughtSignature` for a Claude-family target model when a
/// tool call carries no recoverable signature, so upstream's validator
/// doesn't reject the turn outright.
const SKIP_THOUGHT_SIGNATURE_VALIDATOR: &str = "skip_thought_signature_validator";

/// `web_search`/`web_search_preview` tool types, and a `function` tool named
/// `google_search`, all become a `googleSearch: {}` tool rather than a
/// function declaration.
fn convert_tools(tools: &[OaTool]) -> Option<Vec<Tool>> {
    let mut function_declarations = Vec::new();
    let mut wants_search = false;

    for t in tools {
        match t.tool_type.as_str() {
            "web_search" | "web_search_preview" => wants_search = true,
            _ if t.function.name == "google_search" => wants_search = true,
            _ => function_declarations.push(FunctionDeclaration {
                name: t.function.name.clone(),
                description: t.function.description.clone().unwrap_or_default(),
                parameters: clean_json_schema(
                    t.function.parameters.as_ref().unwrap_or(&json!({"type": "object", "properties": {}})),
                ),
            }),
        }
    }

    let mut out = Vec::new();
    if !function_declarations.is_empty() {
        out.push(Tool { function_declarations: Some(function_declarations), google_search: None });
    }
    if wants_search {
        out.push(Tool { function_declarations: None, google_search: Some(json!({})) });
    }
    (!out.is_empty()).then_some(out)
}

pub fn to_internal(req: &ChatCompletionRequest, request_id: String, user_agent: &str) -> InternalEnvelope {
    // First pass: collect every id -> function-name mapping for tool_calls a
    // prior assistant turn emitted, so a subsequent `tool` message's
    // `tool_call_id` can be resolved even without its own name field.
    let mut id_to_name: HashMap<String, String> = HashMap::new();
    for msg in &req.messages {
        if let Some(calls) = &msg.tool_calls {
            for call in calls {
                // The function's own name is authoritative; `extract_function_name`
                // is the fallback for an id this gateway never minted a name for.
                // Keyed on the bare id: a client that smuggled a thought signature
                // into the id carries the `__thought__<sig>` suffix here, but the
                // paired `tool` message's `tool_call_id` always refers to the bare id.
                let (bare_id, _) = extract_smuggled_thought_signature(&call.id);
                id_to_name.insert(bare_id, call.function.name.clone());
            }
        }
    }

    let mut system_parts: Vec<String> = vec![ANTIGRAVITY_IDENTITY.to_string()];
    let mut contents = Vec::new();

    for msg in &req.messages {
        match msg.role.as_str() {
            "system" => system_parts.push(msg.content.extract_text()),
            "tool" => {
                let name = msg
                    .tool_call_id
                    .as_deref()
                    .map(|id| extract_smuggled_thought_signature(id).0)
                    .and_then(|id| id_to_name.get(&id).cloned())
                    .unwrap_or_else(|| "unknown".to_string());
                contents.push(Content {
                    role: Some("user".to_string()),
                    parts: vec![Part::FunctionResponse {
                        function_response: FunctionResponse {
                            name,
                            response: json!({ "result": msg.content.extract_text() }),
                        },
                    }],
                });
            }
            "assistant" => {
                let mut parts = Vec::new();
                let text = msg.content.extract_text();
                if !text.is_empty() {
                    parts.push(Part::text(text));
                }
                if let Some(calls) = &msg.tool_calls {
                    for call in calls {
                        let args: Value = serde_json::from_str(&call.function.arguments)
                            .unwrap_or_else(|_| json!({}));
                        let (_, smuggled_signature) = extract_smuggled_thought_signature(&call.id);
                        let thought_signature = smuggled_signature.or_else(|| {
                            is_claude_family(&req.model).then(|| SKIP_THOUGHT_SIGNATURE_VALIDATOR.to_string())
                        });
                        parts.push(Part::FunctionCall {
                            function_call: FunctionCall { name: call.function.name.clone(), args },
                            thought_signature,
                        });
                    }
                }
                contents.push(Content { role: Some("model".to_string()), parts });
            }
            _ => contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(msg.content.extract_text())],
            }),
        }
    }

    let system_instruction = Some(Content {
        role: None,
        parts: vec![Part::text(system_parts.join("\n\n"))],
    });

    let tools = req.tools.as_ref().and_then(|tools| convert_tools(tools));

    let tool_config = req.tool_choice.as_ref().map(|choice| match choice {
        OaToolChoice::String(s) if s == "none" => ToolConfig {
            function_calling_config: FunctionCallingConfig { mode: "NONE".to_string(), allowed_function_names: vec![] },
        },
        OaToolChoice::String(s) if s == "required" => ToolConfig {
            function_calling_config: FunctionCallingConfig { mode: "ANY".to_string(), allowed_function_names: vec![] },
        },
        OaToolChoice::String(_) => ToolConfig {
            function_calling_config: FunctionCallingConfig { mode: "AUTO".to_string(), allowed_function_names: vec![] },
        },
        OaToolChoice::Specific { function, .. } => ToolConfig {
            function_calling_config: FunctionCallingConfig {
                mode: "ANY".to_string(),
                allowed_function_names: vec![function.name.clone()],
            },
        },
    });

    let thinking_config = default_thinking_level(&req.model).map(|level| ThinkingConfig {
        thinking_level: Some(level.to_string()),
    });

    InternalEnvelope {
        project: None,
        request_id,
        model: req.model.clone(),
        user_agent: user_agent.to_string(),
        request_type: "openai.chat".to_string(),
        request: InternalRequest {
            contents,
            system_instruction,
            generation_config: Some(GenerationConfig {
                temperature: req.temperature.map(|t| t as f64),
                top_p: req.top_p.map(|t| t as f64),
                top_k: None,
                max_output_tokens: req.max_tokens,
                stop_sequences: req.stop.clone().unwrap_or_default(),
            }),
            tools,
            tool_config,
            thinking_config,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::openai::{ChatMessage, MessageContent};

    fn msg(role: &str, text: &str) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: MessageContent::Text(text.to_string()),
            name: None,
            tool_calls: None,
            tool_call_id: None,
            annotations: None,
        }
    }

    #[test]
    fn system_messages_aggregate_with_antigravity_identity_prefix() {
        let req = ChatCompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![msg("system", "Be terse."), msg("user", "hi")],
            max_tokens: None,
            temperature: None,
            top_p: None,
            n: None,
            stream: None,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            user: None,
            tools: None,
            tool_choice: None,
            response_format: None,
            seed: None,
            logprobs: None,
            top_logprobs: None,
            logit_bias: None,
            service_tier: None,
        };
        let env = to_internal(&req, "req-1".to_string(), "nexus-gateway");
        let sys = env.request.system_instruction.unwrap();
        let text = match &sys.parts[0] {
            Part::Text { text, .. } => text.clone(),
            _ => panic!("expected text part"),
        };
        assert!(text.starts_with(ANTIGRAVITY_IDENTITY));
        assert!(text.contains("Be terse."));
    }

    #[test]
    fn gemini_3_pro_gets_default_thinking_level() {
        assert_eq!(default_thinking_level("gemini-3-pro-preview"), Some("high"));
        assert_eq!(default_thinking_level("gemini-3-flash"), None);
    }

    #[test]
    fn web_search_preview_tool_becomes_google_search() {
        let tools = vec![OaTool {
            tool_type: "web_search_preview".to_string(),
            function: crate::models::openai::FunctionDefinition {
                name: "unused".to_string(),
                description: None,
                parameters: None,
            },
        }];
        let converted = convert_tools(&tools).unwrap();
        assert_eq!(converted.len(), 1);
        assert!(converted[0].google_search.is_some());
        assert!(converted[0].function_declarations.is_none());
    }

    #[test]
    fn function_tool_named_google_search_becomes_google_search() {
        let tools = vec![OaTool {
            tool_type: "function".to_string(),
            function: crate::models::openai::FunctionDefinition {
                name: "google_search".to_string(),
                description: None,
                parameters: None,
            },
        }];
        let converted = convert_tools(&tools).unwrap();
        assert!(converted[0].google_search.is_some());
    }

    #[test]
    fn smuggled_thought_signature_is_extracted_and_stripped_from_lookup() {
        let mut req_msg = msg("assistant", "");
        req_msg.tool_calls = Some(vec![crate::models::openai::ToolCall {
            id: "call_abc__thought__sig-1".to_string(),
            tool_type: "function".to_string(),
            function: crate::models::openai::FunctionCall {
                name: "get_weather".to_string(),
                arguments: "{}".to_string(),
            },
        }]);
        let mut tool_msg = msg("tool", "72F");
        tool_msg.tool_call_id = Some("call_abc__thought__sig-1".to_string());

        let req = ChatCompletionRequest {
            model: "claude-sonnet-4-5".to_string(),
            messages: vec![req_msg, tool_msg],
            max_tokens: None,
            temperature: None,
            top_p: None,
            n: None,
            stream: None,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            user: None,
            tools: None,
            tool_choice: None,
            response_format: None,
            seed: None,
            logprobs: None,
            top_logprobs: None,
            logit_bias: None,
            service_tier: None,
        };
        let env = to_internal(&req, "req-1".to_string(), "nexus-gateway");
        let assistant_content = &env.request.contents[0];
        match &assistant_content.parts[0] {
            Part::FunctionCall { thought_signature, .. } => {
                assert_eq!(thought_signature.as_deref(), Some("sig-1"));
            }
            _ => panic!("expected function call part"),
        }
        let tool_content = &env.request.contents[1];
        match &tool_content.parts[0] {
            Part::FunctionResponse { function_response } => {
                assert_eq!(function_response.name, "get_weather");
            }
            _ => panic!("expected function response part"),
        }
    }

    #[test]
    fn claude_family_missing_signature_gets_skip_sentinel() {
        let mut req_msg = msg("assistant", "");
        req_msg.tool_calls = Some(vec![crate::models::openai::ToolCall {
            id: "call_xyz".to_string(),
            tool_type: "function".to_string(),
            function: crate::models::openai::FunctionCall {
                name: "get_weather".to_string(),
                arguments: "{}".to_string(),
            },
        }]);
        let req = ChatCompletionRequest {
            model: "claude-sonnet-4-5".to_string(),
            messages: vec![req_msg],
            max_tokens: None,
            temperature: None,
            top_p: None,
            n: None,
            stream: None,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            user: None,
            tools: None,
            tool_choice: None,
            response_format: None,
            seed: None,
            logprobs: None,
            top_logprobs: None,
            logit_bias: None,
            service_tier: None,
        };
        let env = to_internal(&req, "req-1".to_string(), "nexus-gateway");
        match &env.request.contents[0].parts[0] {
            Part::FunctionCall { thought_signature, .. } => {
                assert_eq!(thought_signature.as_deref(), Some("skip_thought_signature_validator"));
            }
            _ => panic!("expected function call part"),
        }
    }
}
