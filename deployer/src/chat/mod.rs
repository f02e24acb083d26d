//! OpenAI-compatible client for deployed endpoints

pub mod client;
pub mod stream;
