//! Reconciliation and end-to-end deployment tests

use std::sync::Arc;

use secrecy::ExposeSecret;

use mldeploy::deploy::orchestrator::Orchestrator;
use mldeploy::deploy::poller::Poller;
use mldeploy::deploy::reconciler::Reconciler;
use mldeploy::errors::DeployError;
use mldeploy::models::model::{ModelRef, RegisteredModel};
use mldeploy::models::operation::{ProvisioningState, ResourceKind};
use mldeploy::platform::memory::{CallCounts, InMemoryPlatform};
use mldeploy::platform::PlatformError;

use crate::support::{plan, poller_options, session};

fn registered_qwen() -> RegisteredModel {
    RegisteredModel {
        name: "qwen".to_string(),
        version: "3".to_string(),
        asset_id: "azureml:qwen:3".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_fresh_workspace_deploys_and_routes_traffic() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_location("westus3"));
    let orchestrator = Orchestrator::new(platform.clone(), poller_options());
    let plan = plan();

    let outcome = orchestrator.deploy(&session, &plan).await.unwrap();

    assert_eq!(
        outcome.credentials.scoring_url,
        "https://deepseek-quen-15b-endpoint.westus3.inference.ml.azure.com/v1"
    );
    assert_eq!(outcome.client.scoring_url, outcome.credentials.scoring_url);
    assert_eq!(
        outcome.client.api_key.expose_secret(),
        outcome.credentials.primary_key.expose_secret()
    );
    assert_eq!(outcome.client.model, "deepseek-ai/DeepSeek-R1-Distill-Qwen-1.5B");
    assert!(!outcome.model.is_registered());

    let endpoint = platform.endpoint(&plan.endpoint.name).unwrap();
    assert_eq!(endpoint.traffic.weight(&plan.deployment.name), Some(100));
    assert_eq!(endpoint.provisioning_state, ProvisioningState::Succeeded);

    let deployment = platform
        .deployment(&plan.endpoint.name, &plan.deployment.name)
        .unwrap();
    assert_eq!(deployment.provisioning_state, ProvisioningState::Succeeded);
    assert_eq!(deployment.model, "deepseek-ai/DeepSeek-R1-Distill-Qwen-1.5B");
    assert_eq!(deployment.environment, "azureml:vllm-custom:1");

    let calls = platform.calls();
    assert_eq!(calls.environment_creates, 1);
    assert_eq!(calls.endpoint_creates, 1);
    assert_eq!(calls.deployment_creates, 1);
    assert_eq!(calls.deployment_updates, 0);
    assert_eq!(calls.traffic_updates, 1);
    assert_eq!(calls.key_reads, 1);
}

#[tokio::test(start_paused = true)]
async fn test_named_topology_end_to_end() {
    let session = session().await;
    let platform = Arc::new(
        InMemoryPlatform::new()
            .with_operation_polls(2)
            .with_readiness_after(2),
    );
    let orchestrator = Orchestrator::new(platform.clone(), poller_options());
    let mut plan = plan();
    plan.environment.name = "env-v1".to_string();
    plan.endpoint.name = "ep-1".to_string();
    plan.deployment.name = "dep-1".to_string();
    plan.deployment.instance_count = 1;

    let outcome = orchestrator.deploy(&session, &plan).await.unwrap();

    assert_eq!(outcome.deployment.name, "dep-1");
    assert_eq!(outcome.deployment.instance_count, 1);
    assert_eq!(outcome.endpoint.traffic.weight("dep-1"), Some(100));
    assert!(!outcome.credentials.primary_key.expose_secret().is_empty());
    assert_eq!(
        outcome.credentials.scoring_url,
        "https://ep-1.eastus.inference.ml.azure.com/v1"
    );
    // Readiness passed on the third probe cycle
    assert_eq!(platform.calls().probes, 3);
}

#[tokio::test(start_paused = true)]
async fn test_second_run_reuses_environment_and_endpoint() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new());
    let orchestrator = Orchestrator::new(platform.clone(), poller_options());
    let plan = plan();

    let first = orchestrator.deploy(&session, &plan).await.unwrap();
    let after_first = platform.calls();
    let second = orchestrator.deploy(&session, &plan).await.unwrap();
    let after_second = platform.calls();

    // Only the deployment is re-submitted, as an update
    assert_eq!(after_second.environment_creates, after_first.environment_creates);
    assert_eq!(after_second.endpoint_creates, after_first.endpoint_creates);
    assert_eq!(after_second.deployment_creates, 1);
    assert_eq!(after_second.deployment_updates, 1);
    assert_eq!(after_second.traffic_updates, 2);
    assert_eq!(first.credentials.scoring_url, second.credentials.scoring_url);
    assert_eq!(first.endpoint.name, second.endpoint.name);
    // Finished operations are not retained between runs
    assert_eq!(platform.pending_operations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_registered_model_is_referenced_by_asset_id() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_model(registered_qwen()));
    let orchestrator = Orchestrator::new(platform.clone(), poller_options());
    let mut plan = plan();
    plan.model = "qwen".to_string();

    let outcome = orchestrator.deploy(&session, &plan).await.unwrap();

    assert_eq!(outcome.model, ModelRef::Registered(registered_qwen()));
    let deployment = platform
        .deployment(&plan.endpoint.name, &plan.deployment.name)
        .unwrap();
    assert_eq!(deployment.model, "azureml:qwen:3");
}

#[tokio::test]
async fn test_unregistered_model_falls_back_to_identifier() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new());
    let reconciler = Reconciler::new(
        platform.clone(),
        Arc::new(Poller::new(platform.clone(), poller_options())),
    );

    let model = reconciler
        .resolve_model(&session, "deepseek-ai/DeepSeek-R1-Distill-Qwen-1.5B")
        .await
        .unwrap();

    assert_eq!(
        model,
        ModelRef::identifier("deepseek-ai/DeepSeek-R1-Distill-Qwen-1.5B")
    );
    assert_eq!(platform.calls().model_lookups, 1);
}

#[tokio::test]
async fn test_failed_model_lookup_is_not_a_fallback() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_lookup_failures(ResourceKind::Model, 1));
    let reconciler = Reconciler::new(
        platform.clone(),
        Arc::new(Poller::new(platform.clone(), poller_options())),
    );

    let err = reconciler.resolve_model(&session, "qwen").await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::ResourceLookupFailed {
            kind: ResourceKind::Model,
            source: PlatformError::Api { status: 503, .. },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_transient_endpoint_lookup_never_creates() {
    let session = session().await;
    let platform = Arc::new(
        InMemoryPlatform::new().with_lookup_failures(ResourceKind::Endpoint, 1),
    );
    let orchestrator = Orchestrator::new(platform.clone(), poller_options());

    let err = orchestrator.deploy(&session, &plan()).await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::ResourceLookupFailed { kind: ResourceKind::Endpoint, .. }
    ));
    let calls = platform.calls();
    assert_eq!(calls.endpoint_creates, 0);
    assert_eq!(calls.deployment_creates, 0);
    assert_eq!(calls.traffic_updates, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_deployment_never_receives_traffic() {
    let session = session().await;
    let diagnostic = r#"{"status":"Failed","error":{"code":"DeploymentFailed","details":[{"code":"OutOfQuota"}]}}"#;
    let platform = Arc::new(InMemoryPlatform::new().with_deployment_failure(diagnostic));
    let orchestrator = Orchestrator::new(platform.clone(), poller_options());
    let plan = plan();

    let err = orchestrator.deploy(&session, &plan).await.unwrap_err();

    match &err {
        DeployError::ProvisioningFailed { kind, diagnostic: got, .. } => {
            assert_eq!(*kind, ResourceKind::Deployment);
            assert_eq!(got, diagnostic);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("OutOfQuota"));

    let calls = platform.calls();
    assert_eq!(calls.traffic_updates, 0);
    assert_eq!(calls.key_reads, 0);
    assert_eq!(calls.probes, 0);
    assert_eq!(platform.pending_operations(), 0);
    let endpoint = platform.endpoint(&plan.endpoint.name).unwrap();
    assert!(endpoint.traffic.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_deployment_is_reported() {
    let session = session().await;
    let platform = Arc::new(
        InMemoryPlatform::new().with_deployment_rejection("instance type is not available"),
    );
    let orchestrator = Orchestrator::new(platform.clone(), poller_options());

    let err = orchestrator.deploy(&session, &plan()).await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::Platform(PlatformError::Api { status: 400, .. })
    ));
    // Environment and endpoint operations only
    assert_eq!(platform.calls().status_queries, 4);
    assert_eq!(platform.calls().traffic_updates, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deployment_timeout_is_retryable() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_never_terminate());
    let orchestrator = Orchestrator::new(platform.clone(), poller_options());

    let err = orchestrator.deploy(&session, &plan()).await.unwrap_err();

    // The environment create is the first operation to be awaited
    assert!(matches!(
        err,
        DeployError::ProvisioningTimedOut { kind: ResourceKind::Environment, .. }
    ));
    assert!(err.is_retryable());
    assert_eq!(platform.calls().endpoint_creates, 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_readiness_still_succeeds() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_readiness_after(5));
    let orchestrator = Orchestrator::new(platform.clone(), poller_options());

    let outcome = orchestrator.deploy(&session, &plan()).await.unwrap();

    assert_eq!(outcome.deployment.provisioning_state, ProvisioningState::Succeeded);
    assert_eq!(platform.calls().probes, 6);
}

#[test]
fn test_call_counts_start_at_zero() {
    assert_eq!(InMemoryPlatform::new().calls(), CallCounts::default());
}
