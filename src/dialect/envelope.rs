//! The internal envelope: the Cloud-Code-shaped pivot structure every
//! dialect translation direction goes through. Matches the Cloud Code API
//! wire format (`{project, requestId, model, userAgent, requestType,
//! request:{...}}`), extended with thought/grounding part kinds the
//! untouched Gemini wire types don't carry (spec §9's dynamic-payload note:
//! tagged-variant part types, unknown fields carried through verbatim).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub request_id: String,
    pub model: String,
    pub user_agent: String,
    pub request_type: String,
    pub request: InternalRequest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalRequest {
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Tagged-variant part: `TextPart | FunctionCallPart | FunctionResponsePart |
/// InlineDataPart`. `thought`/`thoughtSignature` ride alongside text or
/// function-call parts rather than forming their own wire variant, matching
/// how the upstream actually emits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
        #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: FunctionResponse,
    },
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: InlineData,
    },
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "is_false")]
        thought: bool,
        #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text {
            text: text.into(),
            thought: false,
            thought_signature: None,
        }
    }

    pub fn is_thought(&self) -> bool {
        matches!(self, Part::Text { thought: true, .. })
    }

    pub fn thought_signature(&self) -> Option<&str> {
        match self {
            Part::Text { thought_signature, .. } => thought_signature.as_deref(),
            Part::FunctionCall { thought_signature, .. } => thought_signature.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    #[serde(default)]
    pub response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none", rename = "functionDeclarations")]
    pub function_declarations: Option<Vec<FunctionDeclaration>>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "googleSearch")]
    pub google_search: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    pub function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallingConfig {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_function_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<String>,
}

/// The internal-shaped response envelope (`{candidates?, response?{candidates}, usageMetadata?}`).
/// The mapper accepts both top-level `candidates` and a nested `response.candidates`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<Candidate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Box<InternalResponse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl InternalResponse {
    pub fn candidates(&self) -> Vec<Candidate> {
        if let Some(c) = &self.candidates {
            return c.clone();
        }
        if let Some(r) = &self.response {
            return r.candidates();
        }
        vec![]
    }

    pub fn usage(&self) -> Option<UsageMetadata> {
        self.usage_metadata
            .clone()
            .or_else(|| self.response.as_ref().and_then(|r| r.usage()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounding_metadata: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

/// The Antigravity identity string prepended to every aggregated system
/// instruction (required by upstream for premium models; always prepended
/// so upstream caching is stable).
pub const ANTIGRAVITY_IDENTITY: &str =
    "You are Antigravity, an AI coding assistant built on top of large language models.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_text_roundtrips() {
        let part = Part::text("hello");
        let json = serde_json::to_string(&part).unwrap();
        let back: Part = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Part::Text { text, .. } if text == "hello"));
    }

    #[test]
    fn inline_data_accepts_snake_case_alias() {
        let json = r#"{"inline_data":{"mimeType":"image/png","data":"abc"}}"#;
        let part: Part = serde_json::from_str(json).unwrap();
        assert!(matches!(part, Part::InlineData { .. }));
    }

    #[test]
    fn response_falls_back_to_nested_candidates() {
        let resp = InternalResponse {
            candidates: None,
            response: Some(Box::new(InternalResponse {
                candidates: Some(vec![Candidate::default()]),
                ..Default::default()
            })),
            ..Default::default()
        };
        assert_eq!(resp.candidates().len(), 1);
    }
}
