//! Adapter ordering checks against scripted adapter reports

mod common;

use std::time::Duration;

use common::*;
use hyperfleet_e2e::error::E2eError;
use hyperfleet_e2e::model::{AdapterStatus, ConditionStatus, ResourceRef};
use hyperfleet_e2e::sequence::SequenceError;
use hyperfleet_e2e::suite::registry;

use ConditionStatus::{False, True, Unknown};

fn report(name: &str, applied: ConditionStatus, available: ConditionStatus) -> AdapterStatus {
    adapter_with(
        name,
        vec![cond("Applied", applied), cond("Available", available)],
    )
}

#[tokio::test(start_paused = true)]
async fn test_dependent_waits_for_dependency() {
    let api = FakeApi::new();
    let k8s = FakeLister::new();
    let target = ResourceRef::cluster("c1");
    api.script_adapters(
        target.clone(),
        vec![
            vec![report("cl-job", True, Unknown)],
            vec![
                report("cl-job", True, True),
                report("cl-deployment", Unknown, Unknown),
            ],
            // dependency flapping back does not reset the sequence
            vec![
                report("cl-job", True, False),
                report("cl-deployment", True, False),
            ],
            vec![
                report("cl-job", True, True),
                report("cl-deployment", True, True),
            ],
        ],
    );

    let h = helper(&api, &k8s);
    let report = h
        .verify_adapter_sequence(&target, "cl-job", "cl-deployment", Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(report.polls, 4);
    assert_eq!(report.dependency_ready_at, 2);
    assert_eq!(api.adapter_calls(&target), 4);
}

#[tokio::test(start_paused = true)]
async fn test_dependent_applied_first_is_a_violation() {
    let api = FakeApi::new();
    let k8s = FakeLister::new();
    let target = ResourceRef::cluster("c1");
    api.script_adapters(
        target.clone(),
        vec![vec![
            report("cl-job", True, False),
            report("cl-deployment", True, Unknown),
        ]],
    );

    let h = helper(&api, &k8s);
    let err = h
        .verify_adapter_sequence(&target, "cl-job", "cl-deployment", Duration::from_secs(30))
        .await
        .unwrap_err();

    match &err {
        E2eError::Sequence(SequenceError::OrderingViolation {
            poll,
            dependent,
            condition,
            status,
            ..
        }) => {
            assert_eq!(*poll, 1);
            assert_eq!(dependent, "cl-deployment");
            assert_eq!(condition, "Applied");
            assert_eq!(*status, True);
        }
        other => panic!("expected ordering violation, got {other}"),
    }
    // fatal: no further polls
    assert_eq!(api.adapter_calls(&target), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dependent_available_false_before_dependency_is_a_violation() {
    let api = FakeApi::new();
    let k8s = FakeLister::new();
    let target = ResourceRef::cluster("c1");
    api.script_adapters(
        target.clone(),
        vec![
            vec![report("cl-job", False, Unknown)],
            vec![
                report("cl-job", True, Unknown),
                report("cl-deployment", False, False),
            ],
        ],
    );

    let h = helper(&api, &k8s);
    let err = h
        .verify_adapter_sequence(&target, "cl-job", "cl-deployment", Duration::from_secs(30))
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            E2eError::Sequence(SequenceError::OrderingViolation { poll: 2, .. })
        ),
        "got {err}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_dependency_never_ready_times_out() {
    let api = FakeApi::new();
    let k8s = FakeLister::new();
    let target = ResourceRef::cluster("c1");
    api.script_adapters(target.clone(), vec![vec![report("cl-job", True, False)]]);

    let h = helper(&api, &k8s);
    let err = h
        .verify_adapter_sequence(&target, "cl-job", "cl-deployment", Duration::from_secs(5))
        .await
        .unwrap_err();

    let E2eError::Timeout(wait) = &err else {
        panic!("expected timeout, got {err}");
    };
    assert!(wait.last_state.starts_with("WAITING"));
    assert!(wait.last_state.contains("cl-job[Applied=True Available=False]"));
    // 500ms interval over 5s
    assert_eq!(wait.attempts, 11);
}

#[tokio::test(start_paused = true)]
async fn test_registered_ordering_scenario() {
    let api = FakeApi::new();
    let k8s = FakeLister::new();
    let cluster = ResourceRef::cluster("cluster-1");
    api.script_adapters(
        cluster,
        vec![
            vec![report("clusters-job", Unknown, Unknown)],
            vec![report("clusters-job", True, True)],
            vec![
                report("clusters-job", True, True),
                report("clusters-deployment", True, True),
            ],
        ],
    );

    let spec = registry()
        .into_iter()
        .find(|s| s.name.contains("dependency ordering"))
        .unwrap();
    let result = (spec.run)(helper(&api, &k8s)).await;

    assert!(result.is_ok(), "scenario failed: {}", result.unwrap_err());
    assert_eq!(api.deleted_clusters(), vec!["cluster-1".to_string()]);
}
