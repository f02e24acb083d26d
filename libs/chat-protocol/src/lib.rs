//! OpenAI-compatible chat completion wire types.

pub mod models;

pub use models::{
    ChatCompletionChunk, ChatCompletionRequest, ChatMessage, ChatRole, ChunkChoice, ChunkDelta,
    ErrorResponse,
};
