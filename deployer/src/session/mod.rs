//! Workspace session

pub mod context;
