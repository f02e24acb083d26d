//! Settings file management

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chat::client::ChatOptions;
use crate::deploy::orchestrator::DeploymentPlan;
use crate::deploy::poller::PollerOptions;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::http::client::{DEFAULT_API_VERSION, DEFAULT_MANAGEMENT_URL};
use crate::logs::{LogLevel, LogOptions};
use crate::models::deployment::{DeploymentSpec, ProbePolicy, RequestLimits};
use crate::models::endpoint::{AuthMode, EndpointSpec};
use crate::models::environment::{BuildContext, EnvironmentSpec, InferenceContract, Route};

const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-R1-Distill-Qwen-1.5B";

/// Upper bound for any wait read from the settings file
const MAX_WAIT_SECS: u64 = 7 * 24 * 60 * 60;

/// Whole seconds in `1..=MAX_WAIT_SECS`
fn wait_secs(field: &str, secs: u64) -> Result<Duration, DeployError> {
    if secs == 0 {
        return Err(DeployError::ConfigError(format!("{} must be at least 1 second", field)));
    }
    if secs > MAX_WAIT_SECS {
        return Err(DeployError::ConfigError(format!(
            "{} must not exceed {} seconds",
            field, MAX_WAIT_SECS
        )));
    }
    Ok(Duration::from_secs(secs))
}

/// Deployer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for daily-rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Management API configuration
    #[serde(default)]
    pub platform: PlatformSettings,

    /// Model catalog name or raw identifier
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub environment: EnvironmentSettings,

    #[serde(default)]
    pub endpoint: EndpointSettings,

    #[serde(default)]
    pub deployment: DeploymentSettings,

    /// Bounded waits on provisioning operations
    #[serde(default)]
    pub polling: PollingSettings,

    /// Chat sent to the endpoint once it is serving
    #[serde(default)]
    pub validation: ValidationSettings,
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: None,
            log_json: false,
            platform: PlatformSettings::default(),
            model: default_model(),
            environment: EnvironmentSettings::default(),
            endpoint: EndpointSettings::default(),
            deployment: DeploymentSettings::default(),
            polling: PollingSettings::default(),
            validation: ValidationSettings::default(),
        }
    }
}

impl Settings {
    /// Read the settings file, or use the defaults when there is none
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DeployError> {
        let file = File::new(path.as_ref());
        if !file.exists().await {
            info!(
                "Settings file {} not found, using defaults",
                path.as_ref().display()
            );
            return Ok(Self::default());
        }

        let settings: Settings = file.read_json().await.map_err(|e| {
            DeployError::ConfigError(format!(
                "unable to read settings file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(settings)
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            json_format: self.log_json,
            ..Default::default()
        }
    }

    pub fn poller_options(&self) -> Result<PollerOptions, DeployError> {
        self.polling.to_options()
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            system_prompt: self.validation.system_prompt.clone(),
            user_prompt: self.validation.user_prompt.clone(),
            temperature: self.validation.temperature,
            max_tokens: self.validation.max_tokens,
        }
    }

    /// Build the serving topology described by these settings
    pub fn plan(&self) -> Result<DeploymentPlan, DeployError> {
        if self.model.trim().is_empty() {
            return Err(DeployError::ConfigError("model must not be empty".to_string()));
        }

        let env = &self.environment;
        let environment = EnvironmentSpec {
            name: env.name.clone(),
            version: env.version.clone(),
            description: env.description.clone(),
            build: BuildContext {
                context_uri: env.context_uri.clone(),
                dockerfile_path: env.dockerfile_path.clone(),
            },
            inference: InferenceContract {
                liveness: Route::new(env.liveness_path.clone(), env.port),
                readiness: Route::new(env.readiness_path.clone(), env.port),
                scoring: Route::new(env.scoring_path.clone(), env.port),
            },
        };
        environment.inference.validate()?;

        self.poller_options()?;

        let dep = &self.deployment;
        if dep.instance_count == 0 {
            return Err(DeployError::ConfigError(
                "deployment.instance_count must be at least 1".to_string(),
            ));
        }

        let mut environment_variables = dep.environment_variables.clone();
        environment_variables
            .entry("MODEL_NAME".to_string())
            .or_insert_with(|| self.model.clone());

        Ok(DeploymentPlan {
            model: self.model.clone(),
            environment,
            endpoint: EndpointSpec {
                name: self.endpoint.name.clone(),
                description: self.endpoint.description.clone(),
                auth_mode: self.endpoint.auth_mode,
            },
            deployment: DeploymentSpec {
                name: dep.name.clone(),
                instance_type: dep.instance_type.clone(),
                instance_count: dep.instance_count,
                environment_variables,
                request_limits: RequestLimits {
                    max_concurrent_requests_per_instance: dep.max_concurrent_requests_per_instance,
                    request_timeout: Duration::from_millis(dep.request_timeout_ms),
                    max_queue_wait: Duration::from_millis(dep.max_queue_wait_ms),
                },
                liveness_probe: dep.liveness_probe.to_policy("liveness_probe")?,
                readiness_probe: dep.readiness_probe.to_policy("readiness_probe")?,
            },
        })
    }
}

/// Management API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// Resource Manager host
    #[serde(default = "default_management_url")]
    pub management_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_management_url() -> String {
    DEFAULT_MANAGEMENT_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            management_url: default_management_url(),
            api_version: default_api_version(),
        }
    }
}

/// Serving environment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    #[serde(default = "default_environment_name")]
    pub name: String,

    #[serde(default = "default_environment_version")]
    pub version: String,

    #[serde(default = "default_environment_description")]
    pub description: Option<String>,

    /// Location of the Docker build context
    #[serde(default = "default_context_uri")]
    pub context_uri: String,

    /// Dockerfile path relative to the build context
    #[serde(default = "default_dockerfile_path")]
    pub dockerfile_path: String,

    /// Port shared by every inference route
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_health_path")]
    pub liveness_path: String,

    #[serde(default = "default_health_path")]
    pub readiness_path: String,

    #[serde(default = "default_scoring_path")]
    pub scoring_path: String,
}

fn default_environment_name() -> String {
    "vllm-custom".to_string()
}

fn default_environment_version() -> String {
    "1".to_string()
}

fn default_environment_description() -> Option<String> {
    Some("Environment created from a Docker context.".to_string())
}

fn default_context_uri() -> String {
    "environment".to_string()
}

fn default_dockerfile_path() -> String {
    "Dockerfile".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_scoring_path() -> String {
    "/".to_string()
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            name: default_environment_name(),
            version: default_environment_version(),
            description: default_environment_description(),
            context_uri: default_context_uri(),
            dockerfile_path: default_dockerfile_path(),
            port: default_port(),
            liveness_path: default_health_path(),
            readiness_path: default_health_path(),
            scoring_path: default_scoring_path(),
        }
    }
}

/// Online endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSettings {
    #[serde(default = "default_endpoint_name")]
    pub name: String,

    #[serde(default = "default_endpoint_description")]
    pub description: Option<String>,

    #[serde(default)]
    pub auth_mode: AuthMode,
}

fn default_endpoint_name() -> String {
    "deepseek-quen-15B-endpoint".to_string()
}

fn default_endpoint_description() -> Option<String> {
    Some("Test endpoint for deepseek".to_string())
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            name: default_endpoint_name(),
            description: default_endpoint_description(),
            auth_mode: AuthMode::Key,
        }
    }
}

/// Online deployment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSettings {
    #[serde(default = "default_deployment_name")]
    pub name: String,

    /// Machine SKU
    #[serde(default = "default_instance_type")]
    pub instance_type: String,

    #[serde(default = "default_instance_count")]
    pub instance_count: u32,

    /// Variables passed to the serving container. `MODEL_NAME` defaults to
    /// the model setting.
    #[serde(default = "default_environment_variables")]
    pub environment_variables: BTreeMap<String, String>,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests_per_instance: u32,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_queue_wait_ms")]
    pub max_queue_wait_ms: u64,

    #[serde(default = "ProbeSettings::liveness")]
    pub liveness_probe: ProbeSettings,

    #[serde(default = "ProbeSettings::readiness")]
    pub readiness_probe: ProbeSettings,
}

fn default_deployment_name() -> String {
    "deepseek-quen-15b-deployment".to_string()
}

fn default_instance_type() -> String {
    "Standard_NC24ads_A100_v4".to_string()
}

fn default_instance_count() -> u32 {
    1
}

fn default_environment_variables() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "VLLM_ARGS".to_string(),
        "--max-model-len 32768 --enforce-eager".to_string(),
    )])
}

fn default_max_concurrent_requests() -> u32 {
    RequestLimits::default().max_concurrent_requests_per_instance
}

fn default_request_timeout_ms() -> u64 {
    RequestLimits::default().request_timeout.as_millis() as u64
}

fn default_max_queue_wait_ms() -> u64 {
    RequestLimits::default().max_queue_wait.as_millis() as u64
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            name: default_deployment_name(),
            instance_type: default_instance_type(),
            instance_count: default_instance_count(),
            environment_variables: default_environment_variables(),
            max_concurrent_requests_per_instance: default_max_concurrent_requests(),
            request_timeout_ms: default_request_timeout_ms(),
            max_queue_wait_ms: default_max_queue_wait_ms(),
            liveness_probe: ProbeSettings::liveness(),
            readiness_probe: ProbeSettings::readiness(),
        }
    }
}

/// Probe settings, durations in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_secs: u64,
    pub period_secs: u64,
    pub initial_delay_secs: u64,
}

impl ProbeSettings {
    fn from_policy(policy: ProbePolicy) -> Self {
        Self {
            failure_threshold: policy.failure_threshold,
            success_threshold: policy.success_threshold,
            timeout_secs: policy.timeout.as_secs(),
            period_secs: policy.period.as_secs(),
            initial_delay_secs: policy.initial_delay.as_secs(),
        }
    }

    pub fn liveness() -> Self {
        Self::from_policy(ProbePolicy::liveness())
    }

    pub fn readiness() -> Self {
        Self::from_policy(ProbePolicy::readiness())
    }

    pub fn to_policy(&self, probe: &str) -> Result<ProbePolicy, DeployError> {
        if self.initial_delay_secs > MAX_WAIT_SECS {
            return Err(DeployError::ConfigError(format!(
                "{}.initial_delay_secs must not exceed {} seconds",
                probe, MAX_WAIT_SECS
            )));
        }
        Ok(ProbePolicy {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout: wait_secs(&format!("{}.timeout_secs", probe), self.timeout_secs)?,
            period: wait_secs(&format!("{}.period_secs", probe), self.period_secs)?,
            initial_delay: Duration::from_secs(self.initial_delay_secs),
        })
    }
}

/// Polling settings, durations in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_environment_timeout")]
    pub environment_timeout_secs: u64,

    #[serde(default = "default_endpoint_timeout")]
    pub endpoint_timeout_secs: u64,

    #[serde(default = "default_deployment_timeout")]
    pub deployment_timeout_secs: u64,

    #[serde(default = "default_readiness_timeout")]
    pub readiness_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    PollerOptions::default().interval.as_secs()
}

fn default_environment_timeout() -> u64 {
    PollerOptions::default().environment_timeout.as_secs()
}

fn default_endpoint_timeout() -> u64 {
    PollerOptions::default().endpoint_timeout.as_secs()
}

fn default_deployment_timeout() -> u64 {
    PollerOptions::default().deployment_timeout.as_secs()
}

fn default_readiness_timeout() -> u64 {
    PollerOptions::default().readiness_timeout.as_secs()
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            environment_timeout_secs: default_environment_timeout(),
            endpoint_timeout_secs: default_endpoint_timeout(),
            deployment_timeout_secs: default_deployment_timeout(),
            readiness_timeout_secs: default_readiness_timeout(),
        }
    }
}

impl PollingSettings {
    pub fn to_options(&self) -> Result<PollerOptions, DeployError> {
        Ok(PollerOptions {
            interval: wait_secs("polling.interval_secs", self.interval_secs)?,
            environment_timeout: wait_secs(
                "polling.environment_timeout_secs",
                self.environment_timeout_secs,
            )?,
            endpoint_timeout: wait_secs("polling.endpoint_timeout_secs", self.endpoint_timeout_secs)?,
            deployment_timeout: wait_secs(
                "polling.deployment_timeout_secs",
                self.deployment_timeout_secs,
            )?,
            readiness_timeout: wait_secs(
                "polling.readiness_timeout_secs",
                self.readiness_timeout_secs,
            )?,
        })
    }
}

/// Validation chat settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Send a chat once the endpoint is serving
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_user_prompt")]
    pub user_prompt: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_system_prompt() -> String {
    ChatOptions::default().system_prompt
}

fn default_user_prompt() -> String {
    ChatOptions::default().user_prompt
}

fn default_temperature() -> f32 {
    ChatOptions::default().temperature
}

fn default_max_tokens() -> u32 {
    ChatOptions::default().max_tokens
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            system_prompt: default_system_prompt(),
            user_prompt: default_user_prompt(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}
