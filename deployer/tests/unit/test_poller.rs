//! Poller unit tests

use std::sync::Arc;
use std::time::Duration;

use mldeploy::deploy::poller::Poller;
use mldeploy::errors::DeployError;
use mldeploy::models::deployment::ProbePolicy;
use mldeploy::models::environment::Environment;
use mldeploy::models::model::ModelRef;
use mldeploy::models::operation::{OperationHandle, ResourceKind};
use mldeploy::platform::memory::InMemoryPlatform;
use mldeploy::platform::ServingPlatform;
use mldeploy::session::context::SessionContext;

use crate::support::{plan, poller_options, session};

async fn create_endpoint(platform: &InMemoryPlatform, session: &SessionContext) -> OperationHandle {
    platform
        .create_endpoint(session, &plan().endpoint)
        .await
        .unwrap()
        .operation
}

/// Create the default endpoint and deployment, returning their names
async fn create_deployment(platform: &InMemoryPlatform, session: &SessionContext) -> (String, String) {
    let plan = plan();
    let endpoint = platform
        .create_endpoint(session, &plan.endpoint)
        .await
        .unwrap()
        .resource;
    let environment = Environment {
        name: "vllm-custom".to_string(),
        version: "1".to_string(),
        asset_id: "azureml:vllm-custom:1".to_string(),
    };
    platform
        .create_or_update_deployment(
            session,
            &endpoint,
            &plan.deployment,
            &ModelRef::identifier(plan.model.clone()),
            &environment,
        )
        .await
        .unwrap();
    (endpoint.name, plan.deployment.name)
}

fn policy(success_threshold: u32, failure_threshold: u32) -> ProbePolicy {
    ProbePolicy {
        failure_threshold,
        success_threshold,
        timeout: Duration::from_secs(2),
        period: Duration::from_secs(10),
        initial_delay: Duration::ZERO,
    }
}

#[tokio::test(start_paused = true)]
async fn test_operation_succeeds_after_polls() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_operation_polls(3));
    let poller = Poller::new(platform.clone(), poller_options());

    let operation = create_endpoint(&platform, &session).await;
    let terminal = poller
        .await_terminal(&session, &operation, Duration::from_secs(600))
        .await
        .unwrap();

    assert_eq!(terminal.polls, 4);
    assert_eq!(terminal.operation_id, operation.id);
    assert_eq!(terminal.elapsed, Duration::from_secs(15));
    assert_eq!(platform.calls().status_queries, 4);
}

#[tokio::test(start_paused = true)]
async fn test_completed_handle_needs_one_query() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new());
    let poller = Poller::new(platform.clone(), poller_options());

    let operation = OperationHandle::completed(ResourceKind::Endpoint, "ep");
    let terminal = poller
        .await_terminal(&session, &operation, Duration::from_secs(600))
        .await
        .unwrap();

    assert_eq!(terminal.polls, 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_queries_exactly_once() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_never_terminate());
    let poller = Poller::new(platform.clone(), poller_options());

    let operation = create_endpoint(&platform, &session).await;
    let err = poller
        .await_terminal(&session, &operation, Duration::ZERO)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::ProvisioningTimedOut { kind: ResourceKind::Endpoint, .. }
    ));
    assert_eq!(platform.calls().status_queries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_never_terminating_operation_times_out() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_never_terminate());
    let poller = Poller::new(platform.clone(), poller_options());

    let operation = create_endpoint(&platform, &session).await;
    let start = tokio::time::Instant::now();
    let err = poller
        .await_terminal(&session, &operation, Duration::from_secs(60))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(start.elapsed(), Duration::from_secs(60));
    // One query at t=0 and one after every 5s interval up to the deadline
    assert_eq!(platform.calls().status_queries, 13);
}

#[tokio::test(start_paused = true)]
async fn test_failed_operation_keeps_diagnostic() {
    let session = session().await;
    let diagnostic = r#"{"status":"Failed","error":{"code":"ResourceNotReady","message":"User container has crashed or terminated."}}"#;
    let platform = Arc::new(InMemoryPlatform::new().with_deployment_failure(diagnostic));
    let poller = Poller::new(platform.clone(), poller_options());

    let plan = plan();
    let endpoint = platform
        .create_endpoint(&session, &plan.endpoint)
        .await
        .unwrap()
        .resource;
    let environment = Environment {
        name: "vllm-custom".to_string(),
        version: "1".to_string(),
        asset_id: "azureml:vllm-custom:1".to_string(),
    };
    let accepted = platform
        .create_or_update_deployment(
            &session,
            &endpoint,
            &plan.deployment,
            &ModelRef::identifier(plan.model.clone()),
            &environment,
        )
        .await
        .unwrap();

    let err = poller
        .await_terminal(&session, &accepted.operation, Duration::from_secs(600))
        .await
        .unwrap_err();

    match err {
        DeployError::ProvisioningFailed { kind, diagnostic: got, .. } => {
            assert_eq!(kind, ResourceKind::Deployment);
            assert_eq!(got, diagnostic);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_readiness_passes_after_failing_probes() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_readiness_after(2));
    let poller = Poller::new(platform.clone(), poller_options());
    let (endpoint, deployment) = create_deployment(&platform, &session).await;

    let report = poller
        .await_ready(&session, &endpoint, &deployment, &policy(1, 30), Duration::from_secs(900))
        .await
        .unwrap();

    assert_eq!(report.cycles, 3);
    assert_eq!(report.elapsed, Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_readiness_needs_consecutive_passes() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new());
    let poller = Poller::new(platform.clone(), poller_options());
    let (endpoint, deployment) = create_deployment(&platform, &session).await;

    let report = poller
        .await_ready(&session, &endpoint, &deployment, &policy(3, 30), Duration::from_secs(900))
        .await
        .unwrap();

    assert_eq!(report.cycles, 3);
    assert_eq!(platform.calls().probes, 3);
}

#[tokio::test(start_paused = true)]
async fn test_readiness_failure_threshold() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_readiness_after(10));
    let poller = Poller::new(platform.clone(), poller_options());
    let (endpoint, deployment) = create_deployment(&platform, &session).await;

    let err = poller
        .await_ready(&session, &endpoint, &deployment, &policy(1, 3), Duration::from_secs(900))
        .await
        .unwrap_err();

    match err {
        DeployError::ProvisioningFailed { diagnostic, .. } => {
            assert!(diagnostic.contains("3 consecutive times"));
            assert!(diagnostic.contains("GET /health returned 503"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(platform.calls().probes, 3);
}

#[tokio::test(start_paused = true)]
async fn test_readiness_times_out() {
    let session = session().await;
    let platform = Arc::new(InMemoryPlatform::new().with_readiness_after(100));
    let poller = Poller::new(platform.clone(), poller_options());
    let (endpoint, deployment) = create_deployment(&platform, &session).await;

    let err = poller
        .await_ready(&session, &endpoint, &deployment, &policy(1, 100), Duration::from_secs(30))
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::ProvisioningTimedOut { .. }));
    assert_eq!(platform.calls().probes, 4);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_timeout_is_rejected() {
    let session = session().await;

    let platform = Arc::new(InMemoryPlatform::new());
    let poller = Poller::new(platform.clone(), poller_options());
    let operation = create_endpoint(&platform, &session).await;
    let err = poller
        .await_terminal(&session, &operation, Duration::from_secs(u64::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ConfigError(_)));
    assert_eq!(platform.calls().status_queries, 0);

    let platform = Arc::new(InMemoryPlatform::new());
    let poller = Poller::new(platform.clone(), poller_options());
    let (endpoint, deployment) = create_deployment(&platform, &session).await;
    let err = poller
        .await_ready(&session, &endpoint, &deployment, &policy(1, 3), Duration::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::ConfigError(_)));
    assert_eq!(platform.calls().probes, 0);
}
