//! Serving topology models

pub mod credentials;
pub mod deployment;
pub mod endpoint;
pub mod environment;
pub mod model;
pub mod operation;
pub mod traffic;
