//! Resource Manager platform tests against a mock server

use secrecy::ExposeSecret;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mldeploy::models::endpoint::{AuthMode, Endpoint};
use mldeploy::models::environment::Environment;
use mldeploy::models::model::ModelRef;
use mldeploy::models::operation::{OperationHandle, OperationStatus, ProbeOutcome, ResourceKind};
use mldeploy::platform::azure::AzureMlPlatform;
use mldeploy::platform::{Lookup, PlatformError, ServingPlatform};

use crate::support::{plan, session};

const WORKSPACE: &str = "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/rg-test/providers/Microsoft.MachineLearningServices/workspaces/ws-test";

fn workspace_path(suffix: &str) -> String {
    format!("{}{}", WORKSPACE, suffix)
}

fn endpoint_body(provisioning_state: &str) -> serde_json::Value {
    json!({
        "name": "deepseek-quen-15B-endpoint",
        "location": "eastus",
        "properties": {
            "authMode": "Key",
            "scoringUri": "https://deepseek-quen-15b-endpoint.eastus.inference.ml.azure.com/score",
            "traffic": { "deepseek-quen-15b-deployment": 100 },
            "provisioningState": provisioning_state
        }
    })
}

fn deployment_body(provisioning_state: &str) -> serde_json::Value {
    json!({
        "name": "deepseek-quen-15b-deployment",
        "location": "eastus",
        "sku": { "name": "Default", "capacity": 1 },
        "properties": {
            "endpointComputeType": "Managed",
            "model": "deepseek-ai/DeepSeek-R1-Distill-Qwen-1.5B",
            "environmentId": "azureml:vllm-custom:1",
            "instanceType": "Standard_NC24ads_A100_v4",
            "provisioningState": provisioning_state
        }
    })
}

fn platform(server: &MockServer) -> AzureMlPlatform {
    AzureMlPlatform::new(&server.uri()).unwrap()
}

#[tokio::test]
async fn test_missing_endpoint_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(workspace_path("/onlineEndpoints/deepseek-quen-15B-endpoint")))
        .and(query_param("api-version", "2023-10-01"))
        .and(header("authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "ResourceNotFound", "message": "not found" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = platform(&server)
        .get_endpoint(&session().await, "deepseek-quen-15B-endpoint")
        .await;

    assert!(matches!(lookup, Lookup::NotFound));
}

#[tokio::test]
async fn test_existing_endpoint_is_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(workspace_path("/onlineEndpoints/deepseek-quen-15B-endpoint")))
        .respond_with(ResponseTemplate::new(200).set_body_json(endpoint_body("Succeeded")))
        .mount(&server)
        .await;

    let lookup = platform(&server)
        .get_endpoint(&session().await, "deepseek-quen-15B-endpoint")
        .await;

    let Lookup::Found(endpoint) = lookup else {
        panic!("expected the endpoint to be found");
    };
    assert_eq!(endpoint.location, "eastus");
    assert_eq!(endpoint.auth_mode, AuthMode::Key);
    assert_eq!(endpoint.traffic.weight("deepseek-quen-15b-deployment"), Some(100));
    assert!(endpoint.scoring_uri.unwrap().ends_with("/score"));
}

#[tokio::test]
async fn test_forbidden_lookup_is_a_failure_not_absence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("AuthorizationFailed"))
        .mount(&server)
        .await;

    let lookup = platform(&server)
        .get_endpoint(&session().await, "deepseek-quen-15B-endpoint")
        .await;

    assert!(matches!(lookup, Lookup::Failed(PlatformError::Unauthorized(_))));
}

#[tokio::test]
async fn test_throttled_lookup_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string("TooManyRequests"))
        .mount(&server)
        .await;

    let lookup = platform(&server)
        .get_deployment(&session().await, "ep", "blue")
        .await;

    assert!(matches!(
        lookup,
        Lookup::Failed(PlatformError::Api { status: 429, .. })
    ));
}

#[tokio::test]
async fn test_raw_identifier_skips_the_catalog() {
    let server = MockServer::start().await;

    let lookup = platform(&server)
        .get_model(&session().await, "deepseek-ai/DeepSeek-R1-Distill-Qwen-1.5B")
        .await;

    assert!(matches!(lookup, Lookup::NotFound));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_registered_model_resolves_latest_version() {
    let server = MockServer::start().await;
    let id = workspace_path("/models/qwen");
    Mock::given(method("GET"))
        .and(path(id.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "name": "qwen",
            "properties": { "latestVersion": "3" }
        })))
        .mount(&server)
        .await;

    let lookup = platform(&server).get_model(&session().await, "qwen").await;

    let Lookup::Found(model) = lookup else {
        panic!("expected the model to be found");
    };
    assert_eq!(model.version, "3");
    assert_eq!(model.asset_id, format!("{}/versions/3", id));
}

#[tokio::test]
async fn test_create_endpoint_returns_async_operation() {
    let server = MockServer::start().await;
    let operation_url = format!("{}/operations/op-1", server.uri());

    Mock::given(method("GET"))
        .and(path(WORKSPACE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "location": "swedencentral" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(workspace_path("/onlineEndpoints/deepseek-quen-15B-endpoint")))
        .and(body_partial_json(json!({
            "location": "swedencentral",
            "properties": { "authMode": "Key" }
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Azure-AsyncOperation", operation_url.as_str())
                .set_body_json(endpoint_body("Creating")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let accepted = platform(&server)
        .create_endpoint(&session().await, &plan().endpoint)
        .await
        .unwrap();

    assert_eq!(accepted.operation.kind, ResourceKind::Endpoint);
    assert_eq!(accepted.operation.status_url.as_deref(), Some(operation_url.as_str()));
    assert_eq!(accepted.resource.name, "deepseek-quen-15B-endpoint");
}

#[tokio::test]
async fn test_operation_status_progression() {
    let server = MockServer::start().await;
    let operation_url = format!("{}/operations/op-2", server.uri());

    Mock::given(method("GET"))
        .and(path("/operations/op-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "InProgress" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Succeeded" })))
        .mount(&server)
        .await;

    let platform = platform(&server);
    let session = session().await;
    let operation = OperationHandle::pending(ResourceKind::Deployment, "blue", operation_url);

    assert_eq!(
        platform.operation_status(&session, &operation).await.unwrap(),
        OperationStatus::InProgress
    );
    assert_eq!(
        platform.operation_status(&session, &operation).await.unwrap(),
        OperationStatus::Succeeded
    );
}

#[tokio::test]
async fn test_failed_operation_body_is_verbatim() {
    let server = MockServer::start().await;
    let body = r#"{"status":"Failed","error":{"code":"ResourceNotReady","message":"User container has crashed or terminated"}}"#;

    Mock::given(method("GET"))
        .and(path("/operations/op-3"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let operation = OperationHandle::pending(
        ResourceKind::Deployment,
        "blue",
        format!("{}/operations/op-3", server.uri()),
    );
    let status = platform(&server)
        .operation_status(&session().await, &operation)
        .await
        .unwrap();

    assert_eq!(status, OperationStatus::Failed(body.to_string()));
}

#[tokio::test]
async fn test_location_operation_accepted_is_in_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/operations/op-4"))
        .respond_with(ResponseTemplate::new(202).insert_header("Retry-After", "15"))
        .mount(&server)
        .await;

    let operation = OperationHandle::pending(
        ResourceKind::Endpoint,
        "ep",
        format!("{}/operations/op-4", server.uri()),
    );
    let status = platform(&server)
        .operation_status(&session().await, &operation)
        .await
        .unwrap();

    assert_eq!(status, OperationStatus::InProgress);
}

#[tokio::test]
async fn test_readiness_follows_provisioning_state() {
    let server = MockServer::start().await;
    let deployment_path = workspace_path(
        "/onlineEndpoints/deepseek-quen-15B-endpoint/deployments/deepseek-quen-15b-deployment",
    );
    Mock::given(method("GET"))
        .and(path(deployment_path.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(deployment_body("Updating")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(deployment_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(deployment_body("Succeeded")))
        .mount(&server)
        .await;

    let platform = platform(&server);
    let session = session().await;

    let first = platform
        .probe_readiness(&session, "deepseek-quen-15B-endpoint", "deepseek-quen-15b-deployment")
        .await
        .unwrap();
    assert_eq!(first, ProbeOutcome::Fail("deployment is updating".to_string()));

    let second = platform
        .probe_readiness(&session, "deepseek-quen-15B-endpoint", "deepseek-quen-15b-deployment")
        .await
        .unwrap();
    assert_eq!(second, ProbeOutcome::Pass);
}

#[tokio::test]
async fn test_list_keys() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(workspace_path(
            "/onlineEndpoints/deepseek-quen-15B-endpoint/listKeys",
        )))
        .and(query_param("api-version", "2023-10-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "primaryKey": "pk-123",
            "secondaryKey": "sk-456"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let keys = platform(&server)
        .get_keys(&session().await, "deepseek-quen-15B-endpoint")
        .await
        .unwrap();

    assert_eq!(keys.primary_key.expose_secret(), "pk-123");
    assert_eq!(keys.secondary_key.expose_secret(), "sk-456");
}

#[tokio::test]
async fn test_deployment_put_carries_probe_settings() {
    let server = MockServer::start().await;
    let plan = plan();
    Mock::given(method("PUT"))
        .and(path(workspace_path(
            "/onlineEndpoints/deepseek-quen-15B-endpoint/deployments/deepseek-quen-15b-deployment",
        )))
        .and(body_partial_json(json!({
            "sku": { "name": "Default", "capacity": 1 },
            "properties": {
                "endpointComputeType": "Managed",
                "instanceType": "Standard_NC24ads_A100_v4",
                "requestSettings": {
                    "maxConcurrentRequestsPerInstance": 2,
                    "requestTimeout": "PT20S",
                    "maxQueueWait": "PT60S"
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(deployment_body("Updating")))
        .expect(1)
        .mount(&server)
        .await;

    let platform = platform(&server);
    let session = session().await;
    let endpoint = Endpoint {
        name: "deepseek-quen-15B-endpoint".to_string(),
        location: "eastus".to_string(),
        auth_mode: AuthMode::Key,
        description: None,
        scoring_uri: None,
        traffic: Default::default(),
        provisioning_state: Default::default(),
    };
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

    // No operation header on a synchronous answer
    assert!(accepted.operation.status_url.is_none());
}
