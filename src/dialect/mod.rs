//! Dialect mapper (C5): translates OpenAI Chat, Anthropic Messages, and
//! Google GenAI wire shapes to and from the internal Cloud-Code-shaped
//! envelope every upstream client speaks.

pub mod anthropic_in;
pub mod anthropic_out;
pub mod envelope;
pub mod openai_in;
pub mod openai_out;
pub mod schema;
pub mod streaming;
pub mod tool_ids;

pub use envelope::{InternalEnvelope, InternalResponse};
