//! Dialect conversion throughput: OpenAI/Anthropic wire requests into the
//! internal pivot envelope.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nexus_gateway::dialect::{anthropic_in, openai_in};
use nexus_gateway::models::anthropic::{Message, MessageContent as AnthropicContent, MessagesRequest};
use nexus_gateway::models::openai::{ChatCompletionRequest, ChatMessage, MessageContent as OpenAiContent};

fn anthropic_request() -> MessagesRequest {
    MessagesRequest {
        model: "claude-3-5-sonnet".to_string(),
        system: None,
        messages: vec![Message {
            role: "user".to_string(),
            content: AnthropicContent::Text("Explain how routing works in this gateway.".to_string()),
        }],
        max_tokens: 1024,
        temperature: None,
        top_p: None,
        top_k: None,
        stream: Some(false),
        stop_sequences: None,
        tools: None,
        tool_choice: None,
        thinking: None,
        metadata: None,
    }
}

fn openai_request() -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: "gpt-4o".to_string(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: OpenAiContent::Text("Explain how routing works in this gateway.".to_string()),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }],
        max_tokens: None,
        temperature: None,
        top_p: None,
        n: None,
        stream: Some(false),
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
    }
}

fn bench_anthropic_to_internal(c: &mut Criterion) {
    let req = anthropic_request();
    c.bench_function("anthropic_in::to_internal", |b| {
        b.iter(|| {
            black_box(anthropic_in::to_internal(
                black_box(&req),
                "bench-request".to_string(),
                "bench-agent/1.0",
            ))
        });
    });
}

fn bench_openai_to_internal(c: &mut Criterion) {
    let req = openai_request();
    c.bench_function("openai_in::to_internal", |b| {
        b.iter(|| {
            black_box(openai_in::to_internal(
                black_box(&req),
                "bench-request".to_string(),
                "bench-agent/1.0",
            ))
        });
    });
}

criterion_group!(benches, bench_anthropic_to_internal, bench_openai_to_internal);
criterion_main!(benches);
