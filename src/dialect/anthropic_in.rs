//! Anthropic Messages request -> internal envelope (spec §4.2.2).
//!
//! Anthropic's top-level `system` field becomes a `[System]: `-prefixed
//! leading user turn rather than a `systemInstruction` (Anthropic clients
//! that expect multi-turn system/user alternation otherwise see the system
//! text silently vanish); `max_tokens` defaults to 4096 when absent (the
//! Anthropic wire format technically requires it, but some clients omit it).

use serde_json::json;

use crate::dialect::envelope::{
    Content, FunctionCall, FunctionCallingConfig, FunctionDeclaration, FunctionResponse,
    GenerationConfig, InternalEnvelope, InternalRequest, Part, Tool, ToolConfig, ANTIGRAVITY_IDENTITY,
};
use crate::dialect::schema::clean_json_schema;
use crate::models::anthropic::{ContentBlock, Message, MessageContent, MessagesRequest, Tool as AnTool, ToolChoice as AnToolChoice};

/// Tool names Anthropic clients use for the server-side web search tool;
/// either becomes a `googleSearch: {}` tool rather than a function
/// declaration, the same convention the OpenAI mapper uses.
const WEB_SEARCH_TOOL_NAMES: &[&str] = &["web_search", "google_search"];

fn convert_tools(tools: &[AnTool]) -> Option<Vec<Tool>> {
    let mut function_declarations = Vec::new();
    let mut wants_search = false;

    for t in tools {
        if WEB_SEARCH_TOOL_NAMES.contains(&t.name.as_str()) {
            wants_search = true;
        } else {
            function_declarations.push(FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: clean_json_schema(&t.input_schema),
            });
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

pub fn to_internal(req: &MessagesRequest, request_id: String, user_agent: &str) -> InternalEnvelope {
    let mut contents = Vec::new();

    if let Some(system) = &req.system {
        let text = extract_content_text(system);
        if !text.is_empty() {
            contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(format!("[System]: {}", text))],
            });
        }
    }

    for msg in &req.messages {
        contents.push(convert_message(msg));
    }

    let tools = req.tools.as_ref().and_then(|tools| convert_tools(tools));

    let tool_config = req.tool_choice.as_ref().map(|choice| match choice {
        AnToolChoice::Auto { .. } => ToolConfig {
            function_calling_config: FunctionCallingConfig { mode: "AUTO".to_string(), allowed_function_names: vec![] },
        },
        AnToolChoice::Any { .. } => ToolConfig {
            function_calling_config: FunctionCallingConfig { mode: "ANY".to_string(), allowed_function_names: vec![] },
        },
        AnToolChoice::Tool { name, .. } => ToolConfig {
            function_calling_config: FunctionCallingConfig {
                mode: "ANY".to_string(),
                allowed_function_names: vec![name.clone()],
            },
        },
    });

    InternalEnvelope {
        project: None,
        request_id,
        model: req.model.clone(),
        user_agent: user_agent.to_string(),
        request_type: "anthropic.messages".to_string(),
        request: InternalRequest {
            contents,
            system_instruction: Some(Content { role: None, parts: vec![Part::text(ANTIGRAVITY_IDENTITY)] }),
            generation_config: Some(GenerationConfig {
                temperature: req.temperature.map(|t| t as f64),
                top_p: req.top_p.map(|t| t as f64),
                top_k: req.top_k.map(|t| t as f64),
                max_output_tokens: Some(req.max_tokens),
                stop_sequences: req.stop_sequences.clone().unwrap_or_default(),
            }),
            tools,
            tool_config,
            thinking_config: None,
        },
    }
}

fn convert_message(msg: &Message) -> Content {
    let role = if msg.role == "assistant" { "model" } else { "user" };
    let parts = match &msg.content {
        MessageContent::Text(text) => vec![Part::text(text.clone())],
        MessageContent::Blocks(blocks) => blocks.iter().map(convert_block).collect(),
    };
    Content { role: Some(role.to_string()), parts }
}

fn convert_block(block: &ContentBlock) -> Part {
    match block.block_type.as_str() {
        "tool_use" => Part::FunctionCall {
            function_call: FunctionCall {
                name: block.name.clone().unwrap_or_default(),
                args: block.input.clone().unwrap_or_else(|| json!({})),
            },
            thought_signature: None,
        },
        "tool_result" => Part::FunctionResponse {
            function_response: FunctionResponse {
                name: block.tool_use_id.clone().unwrap_or_default(),
                response: json!({ "result": block.content.clone().unwrap_or(json!("")) }),
            },
        },
        _ => Part::text(block.text.clone().unwrap_or_default()),
    }
}

fn extract_content_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(s) => s.clone(),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request(system: Option<MessageContent>, max_tokens: u32) -> MessagesRequest {
        MessagesRequest {
            model: "claude-sonnet-4-5".to_string(),
            system,
            messages: vec![Message { role: "user".to_string(), content: MessageContent::Text("hi".to_string()) }],
            max_tokens,
            temperature: None,
            top_p: None,
            top_k: None,
            stream: None,
            stop_sequences: None,
            tools: None,
            tool_choice: None,
            thinking: None,
            metadata: None,
        }
    }

    #[test]
    fn system_string_becomes_bracketed_leading_user_turn() {
        let req = base_request(Some(MessageContent::Text("Be terse.".to_string())), 1024);
        let env = to_internal(&req, "req-1".to_string(), "nexus-gateway");
        let first = &env.request.contents[0];
        assert_eq!(first.role.as_deref(), Some("user"));
        match &first.parts[0] {
            Part::Text { text, .. } => assert_eq!(text, "[System]: Be terse."),
            _ => panic!("expected text part"),
        }
    }

    #[test]
    fn assistant_role_maps_to_model() {
        let req = base_request(None, 1024);
        let mut req = req;
        req.messages.push(Message { role: "assistant".to_string(), content: MessageContent::Text("ok".to_string()) });
        let env = to_internal(&req, "req-1".to_string(), "nexus-gateway");
        assert_eq!(env.request.contents.last().unwrap().role.as_deref(), Some("model"));
    }

    #[test]
    fn web_search_tool_becomes_google_search_not_a_function_declaration() {
        let mut req = base_request(None, 1024);
        req.tools = Some(vec![AnTool {
            name: "web_search".to_string(),
            description: "unused".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
            cache_control: None,
        }]);
        let env = to_internal(&req, "req-1".to_string(), "nexus-gateway");
        let tools = env.request.tools.unwrap();
        assert_eq!(tools.len(), 1);
        assert!(tools[0].google_search.is_some());
        assert!(tools[0].function_declarations.is_none());
    }

    #[test]
    fn mixed_tools_split_into_function_and_search_entries() {
        let mut req = base_request(None, 1024);
        req.tools = Some(vec![
            AnTool {
                name: "get_weather".to_string(),
                description: "fetch weather".to_string(),
                input_schema: json!({"type": "object", "properties": {}}),
                cache_control: None,
            },
            AnTool {
                name: "google_search".to_string(),
                description: "unused".to_string(),
                input_schema: json!({"type": "object", "properties": {}}),
                cache_control: None,
            },
        ]);
        let env = to_internal(&req, "req-1".to_string(), "nexus-gateway");
        let tools = env.request.tools.unwrap();
        assert_eq!(tools.len(), 2);
        assert!(tools[0].function_declarations.is_some());
        assert!(tools[1].google_search.is_some());
    }
}
