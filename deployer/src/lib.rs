//! mldeploy library
//!
//! Provisions a managed online inference endpoint, routes traffic to a healthy
//! deployment and hands back what an OpenAI-compatible client needs.

pub mod app;
pub mod authn;
pub mod chat;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod platform;
pub mod session;
pub mod utils;
