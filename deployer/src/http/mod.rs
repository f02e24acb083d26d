//! Azure Resource Manager REST client

pub mod arm;
pub mod assets;
pub mod client;
pub mod deployments;
pub mod endpoints;

use crate::session::context::WorkspaceIdentity;

/// Resource path of the Machine Learning workspace
pub fn workspace_path(identity: &WorkspaceIdentity) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
        identity.subscription_id, identity.resource_group, identity.workspace_name
    )
}
