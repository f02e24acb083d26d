//! Endpoint traffic tables

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Total weight a committed traffic table must carry
pub const FULL_TRAFFIC: u32 = 100;

/// Mapping from deployment name to the percentage of requests it receives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafficTable(BTreeMap<String, u32>);

impl TrafficTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route all traffic to a single deployment
    pub fn single(deployment: impl Into<String>) -> Self {
        Self::new().with(deployment, FULL_TRAFFIC)
    }

    /// Set the weight of a deployment
    pub fn with(mut self, deployment: impl Into<String>, weight: u32) -> Self {
        self.0.insert(deployment.into(), weight);
        self
    }

    pub fn weight(&self, deployment: &str) -> Option<u32> {
        self.0.get(deployment).copied()
    }

    /// Sum of all weights
    pub fn total(&self) -> u64 {
        self.0.values().map(|w| u64::from(*w)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deployments that receive a non-zero share of traffic
    pub fn weighted(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0
            .iter()
            .filter(|(_, w)| **w > 0)
            .map(|(name, w)| (name.as_str(), *w))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, w)| (name.as_str(), *w))
    }

    /// Check the table before it is committed to an endpoint
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.0.keys().any(|name| name.trim().is_empty()) {
            return Err(DeployError::InvalidTrafficTable(
                "deployment names must not be empty".to_string(),
            ));
        }

        let total = self.total();
        if total != u64::from(FULL_TRAFFIC) {
            return Err(DeployError::InvalidTrafficTable(format!(
                "weights sum to {} instead of {}",
                total, FULL_TRAFFIC
            )));
        }

        Ok(())
    }
}

impl From<BTreeMap<String, u32>> for TrafficTable {
    fn from(weights: BTreeMap<String, u32>) -> Self {
        Self(weights)
    }
}
