//! Application configuration options

use std::collections::HashMap;
use std::path::PathBuf;

/// What the binary does on this invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Reconcile against the managed platform
    Deploy,

    /// Reconcile against the in-memory platform
    DryRun,

    /// Send one streamed chat to an already deployed endpoint
    Chat,
}

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub mode: RunMode,

    /// Settings file
    pub settings_path: PathBuf,

    /// Workspace `config.json`
    pub workspace_config_path: PathBuf,

    /// Where to write the client environment file after a deployment
    pub export_path: Option<PathBuf>,

    /// Run the validation chat even when the settings disable it
    pub force_validation: bool,

    /// Skip the validation chat even when the settings enable it
    pub skip_validation: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Deploy,
            settings_path: PathBuf::from("deploy.json"),
            workspace_config_path: PathBuf::from("config.json"),
            export_path: None,
            force_validation: false,
            skip_validation: false,
        }
    }
}

impl AppOptions {
    /// Build options from parsed `--key=value` and `--flag` arguments
    pub fn from_args(args: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str| args.get(key).is_some_and(|v| v != "false");

        let mode = if flag("chat") {
            RunMode::Chat
        } else if flag("dry-run") {
            RunMode::DryRun
        } else {
            RunMode::Deploy
        };

        Self {
            mode,
            settings_path: args
                .get("config")
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_path),
            workspace_config_path: args
                .get("workspace-config")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_config_path),
            export_path: args.get("export").map(PathBuf::from),
            force_validation: flag("validate"),
            skip_validation: flag("no-validate"),
        }
    }

    /// Whether the validation chat runs, given the settings' choice
    pub fn validation_enabled(&self, configured: bool) -> bool {
        if self.skip_validation {
            return false;
        }
        self.force_validation || configured
    }
}
