//! Deployer configuration

pub mod settings;
