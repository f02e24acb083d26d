//! FSM unit tests

use mldeploy::deploy::fsm::{DeploymentEvent, DeploymentFsm, DeploymentState};
use mldeploy::models::deployment::Deployment;
use mldeploy::models::operation::ProvisioningState;
use proptest::prelude::*;

fn deployment() -> Deployment {
    Deployment {
        name: "blue".to_string(),
        endpoint_name: "ep".to_string(),
        model: "azureml:qwen:1".to_string(),
        environment: "azureml:vllm-custom:1".to_string(),
        instance_type: "Standard_NC24ads_A100_v4".to_string(),
        instance_count: 1,
        provisioning_state: ProvisioningState::Succeeded,
    }
}

#[test]
fn test_fsm_initial_state() {
    let fsm = DeploymentFsm::new();
    assert_eq!(fsm.state(), &DeploymentState::Absent);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.attempts(), 0);
    assert!(fsm.certify(deployment()).is_err());
}

#[test]
fn test_fsm_deploy_success_flow() {
    let mut fsm = DeploymentFsm::new();

    // Absent -> Creating
    fsm.process(DeploymentEvent::Submit).unwrap();
    assert_eq!(fsm.state(), &DeploymentState::Creating);

    // Creating -> Provisioning
    fsm.process(DeploymentEvent::Accepted).unwrap();
    assert_eq!(fsm.state(), &DeploymentState::Provisioning);

    // Provisioning -> Healthy
    fsm.process(DeploymentEvent::Ready).unwrap();
    assert!(fsm.is_healthy());

    let healthy = fsm.certify(deployment()).unwrap();
    assert_eq!(healthy.name(), "blue");
}

#[test]
fn test_fsm_rejected_submission() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Submit).unwrap();
    fsm.process(DeploymentEvent::Rejected("quota exceeded".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), &DeploymentState::Failed);
    assert_eq!(fsm.error(), Some("quota exceeded"));
}

#[test]
fn test_fsm_probe_failure() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Submit).unwrap();
    fsm.process(DeploymentEvent::Accepted).unwrap();
    fsm.process(DeploymentEvent::ProbeFailed("GET /health returned 503".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), &DeploymentState::Failed);
    assert!(fsm.certify(deployment()).is_err());
}

#[test]
fn test_fsm_timeout_then_resubmit() {
    let mut fsm = DeploymentFsm::new();

    fsm.process(DeploymentEvent::Submit).unwrap();
    fsm.process(DeploymentEvent::Accepted).unwrap();
    fsm.process(DeploymentEvent::TimedOut).unwrap();
    assert_eq!(fsm.state(), &DeploymentState::TimedOut);
    assert!(fsm.error().is_some());

    // Retry
    fsm.process(DeploymentEvent::Submit).unwrap();
    assert_eq!(fsm.state(), &DeploymentState::Creating);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.attempts(), 2);
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = DeploymentFsm::new();

    // Cannot become ready before anything was submitted
    assert!(fsm.process(DeploymentEvent::Ready).is_err());
    assert_eq!(fsm.state(), &DeploymentState::Absent);

    // Cannot skip acceptance
    fsm.process(DeploymentEvent::Submit).unwrap();
    assert!(fsm.process(DeploymentEvent::Ready).is_err());
    assert_eq!(fsm.state(), &DeploymentState::Creating);
}

fn any_event() -> impl Strategy<Value = DeploymentEvent> {
    prop_oneof![
        Just(DeploymentEvent::Submit),
        Just(DeploymentEvent::Accepted),
        Just(DeploymentEvent::Ready),
        Just(DeploymentEvent::TimedOut),
        "[a-z]{1,8}".prop_map(DeploymentEvent::Rejected),
        "[a-z]{1,8}".prop_map(DeploymentEvent::ProvisioningFailed),
        "[a-z]{1,8}".prop_map(DeploymentEvent::ProbeFailed),
    ]
}

proptest! {
    #[test]
    fn healthy_is_only_reached_from_provisioning_on_ready(
        events in proptest::collection::vec(any_event(), 0..40)
    ) {
        let mut fsm = DeploymentFsm::new();
        for event in events {
            let before = fsm.state().clone();
            let ready = event == DeploymentEvent::Ready;
            if fsm.process(event).is_err() {
                prop_assert_eq!(fsm.state(), &before);
                continue;
            }
            if fsm.is_healthy() {
                prop_assert_eq!(before, DeploymentState::Provisioning);
                prop_assert!(ready);
            }
            prop_assert_eq!(fsm.certify(deployment()).is_ok(), fsm.is_healthy());
        }
    }
}
