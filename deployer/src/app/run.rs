//! Main application run

use std::env;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, RunMode};
use crate::app::ui;
use crate::authn::token_mngr::{Credential, TokenManager};
use crate::chat::client::ChatClient;
use crate::config::settings::Settings;
use crate::deploy::orchestrator::Orchestrator;
use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::http::client::HttpClient;
use crate::models::credentials::ClientConfig;
use crate::platform::azure::AzureMlPlatform;
use crate::platform::memory::InMemoryPlatform;
use crate::platform::ServingPlatform;
use crate::session::context::{SessionContext, WorkspaceIdentity};

/// Run the deployer until it finishes or the shutdown signal fires
///
/// An interrupted run leaves remote resources as they are; the next run's
/// lookups pick up from whatever was created.
pub async fn run(
    options: AppOptions,
    settings: Settings,
    shutdown_signal: impl Future<Output = ()> + Send,
) -> Result<(), DeployError> {
    tokio::select! {
        result = execute(&options, &settings) => result,
        _ = shutdown_signal => {
            warn!("Shutdown signal received; remote operations keep running on the platform");
            Err(DeployError::Interrupted)
        }
    }
}

async fn execute(options: &AppOptions, settings: &Settings) -> Result<(), DeployError> {
    match options.mode {
        RunMode::Chat => run_chat(settings).await,
        RunMode::Deploy | RunMode::DryRun => run_deploy(options, settings).await,
    }
}

async fn run_deploy(options: &AppOptions, settings: &Settings) -> Result<(), DeployError> {
    let plan = settings.plan()?;
    let (platform, session) = match options.mode {
        RunMode::DryRun => dry_run_session(options).await?,
        _ => platform_session(options, settings).await?,
    };

    let orchestrator = Orchestrator::new(platform, settings.poller_options()?);
    let outcome = orchestrator.deploy(&session, &plan).await?;
    ui::print_outcome(&outcome);

    if let Some(path) = &options.export_path {
        export_client(path, &outcome.client).await?;
        ui::print_success(&format!("Client settings written to {}", path.display()));
    }

    if !options.validation_enabled(settings.validation.enabled) {
        return Ok(());
    }
    if options.mode == RunMode::DryRun {
        info!("Skipping validation chat in dry-run mode");
        return Ok(());
    }
    validate(&outcome.client, settings).await
}

/// Session and platform for the real workspace
async fn platform_session(
    options: &AppOptions,
    settings: &Settings,
) -> Result<(Arc<dyn ServingPlatform>, SessionContext), DeployError> {
    let identity = WorkspaceIdentity::from_config(&options.workspace_config_path).await?;
    let tokens = TokenManager::new(Credential::from_env()?)?;
    let session = SessionContext::connect(identity, Arc::new(tokens)).await?;

    let http = HttpClient::new(&settings.platform.management_url)?
        .with_api_version(settings.platform.api_version.clone());
    let platform: Arc<dyn ServingPlatform> = Arc::new(AzureMlPlatform::with_client(http));
    Ok((platform, session))
}

/// Session and platform that never leave the process
async fn dry_run_session(
    options: &AppOptions,
) -> Result<(Arc<dyn ServingPlatform>, SessionContext), DeployError> {
    let identity = match WorkspaceIdentity::from_config(&options.workspace_config_path).await {
        Ok(identity) => identity,
        Err(_) => WorkspaceIdentity {
            subscription_id: "00000000-0000-0000-0000-000000000000".to_string(),
            resource_group: "dry-run".to_string(),
            workspace_name: "dry-run".to_string(),
        },
    };
    let tokens = TokenManager::new(Credential::Static(SecretString::from(
        "dry-run".to_string(),
    )))?;
    let session = SessionContext::connect(identity, Arc::new(tokens)).await?;

    warn!("Dry run: no resources are created on the platform");
    let platform: Arc<dyn ServingPlatform> =
        Arc::new(InMemoryPlatform::new().with_operation_polls(0));
    Ok((platform, session))
}

async fn export_client(path: &Path, client: &ClientConfig) -> Result<(), DeployError> {
    File::new(path).write_private(&client.to_env_file()).await
}

async fn validate(client: &ClientConfig, settings: &Settings) -> Result<(), DeployError> {
    ui::print_section("Validation chat");
    let chat = ChatClient::new(client)?;
    let request = chat.request(&settings.chat_options());

    match chat.stream_chat(&request, ui::print_delta).await {
        Ok(text) => {
            println!();
            if text.is_empty() {
                ui::print_warning("Endpoint answered with an empty completion.");
            }
            Ok(())
        }
        Err(e) => {
            println!();
            error!("Validation chat failed: {}", e);
            Err(e)
        }
    }
}

/// Stream one chat against an endpoint named by the environment
async fn run_chat(settings: &Settings) -> Result<(), DeployError> {
    let api_key = env::var("OPENAI_API_KEY")
        .map_err(|_| DeployError::ConfigError("OPENAI_API_KEY is not set".to_string()))?;
    let scoring_url = env::var("SCORING_URL")
        .map_err(|_| DeployError::ConfigError("SCORING_URL is not set".to_string()))?;
    let model = env::var("MODEL_NAME").unwrap_or_else(|_| settings.model.clone());

    let client = ClientConfig::new(scoring_url, api_key, model);
    validate(&client, settings).await
}
