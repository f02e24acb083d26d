//! Deployment module

pub mod credentials;
pub mod fsm;
pub mod orchestrator;
pub mod poller;
pub mod reconciler;
pub mod traffic;
