//! Model references

use std::fmt;

use serde::{Deserialize, Serialize};

/// A model registered in the workspace catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub name: String,
    pub version: String,
    /// Fully qualified asset id the platform accepts in a deployment
    pub asset_id: String,
}

/// The model a deployment serves
///
/// Resolved once per run and never mutated afterwards. When the catalog has
/// no entry for the requested name, the raw identifier is carried through
/// unchanged and the serving image is trusted to know what to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelRef {
    Registered(RegisteredModel),
    Identifier { id: String },
}

impl ModelRef {
    pub fn identifier(id: impl Into<String>) -> Self {
        ModelRef::Identifier { id: id.into() }
    }

    /// Value placed in the deployment definition
    pub fn reference(&self) -> &str {
        match self {
            ModelRef::Registered(model) => &model.asset_id,
            ModelRef::Identifier { id } => id,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, ModelRef::Registered(_))
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRef::Registered(model) => write!(f, "{}:{}", model.name, model.version),
            ModelRef::Identifier { id } => write!(f, "{}", id),
        }
    }
}
