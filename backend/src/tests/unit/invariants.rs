// Structural invariants checked after every operation of complete workflow runs

use chrono::DateTime;
use concierge_shared::{StepStatus, StepType, WorkflowInstance, WorkflowStatus};

use crate::tests::fixtures::{corporate_snapshot, group_snapshot, standard_snapshot, vip_snapshot};
use crate::tests::helpers::engine_with_clock;
use crate::workflows::{ManualClock, WorkflowEngine};

fn assert_invariants(instance: &WorkflowInstance) {
    assert!(
        instance.in_progress_count() <= 1,
        "more than one step in progress: {:?}",
        instance.steps.iter().map(|s| s.status).collect::<Vec<_>>()
    );

    for (k, pair) in instance.steps.windows(2).enumerate() {
        if pair[1].status == StepStatus::InProgress {
            assert!(pair[0].status.is_done(), "step {} started before step {} finished", k + 1, k);
        }
    }

    if instance.status != WorkflowStatus::Cancelled {
        assert_eq!(instance.status, instance.derived_status());
    }
    let all_done = instance.steps.iter().all(|s| s.status.is_done());
    assert_eq!(instance.status == WorkflowStatus::Completed, all_done && instance.status != WorkflowStatus::Cancelled);

    for step in &instance.steps {
        if let (Some(started), Some(completed)) = (step.started_at, step.completed_at) {
            assert!(completed >= started);
        }
    }
    assert!(instance.updated_at >= instance.created_at);
}

/// Approve or complete whatever the workflow is waiting on until it finishes
async fn drive_to_end(engine: &WorkflowEngine, clock: &ManualClock, mut instance: WorkflowInstance) -> WorkflowInstance {
    assert_invariants(&instance);
    let mut previous_update = instance.updated_at;

    while let Some(step) = instance.current_step().cloned() {
        clock.advance_minutes(7);
        instance = match step.step_type {
            StepType::Approval => engine
                .approve_step(instance.id, step.id, "manager", Some("ok".into()))
                .await
                .unwrap(),
            StepType::Manual => {
                let payload: serde_json::Map<String, serde_json::Value> = step
                    .required_fields
                    .iter()
                    .map(|f| (f.clone(), serde_json::json!(format!("{}-value", f))))
                    .collect();
                engine
                    .complete_manual_step(instance.id, step.id, "staff", payload.into())
                    .await
                    .unwrap()
            }
            StepType::Automatic => panic!("automatic step left suspended"),
        };

        assert_invariants(&instance);
        assert!(instance.updated_at >= previous_update);
        previous_update = instance.updated_at;
    }
    instance
}

#[tokio::test]
async fn test_every_template_runs_to_completion() {
    let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

    for snapshot in [
        standard_snapshot("inv-standard"),
        corporate_snapshot("inv-corporate"),
        vip_snapshot("inv-vip"),
        group_snapshot("inv-group"),
    ] {
        let clock = ManualClock::new(start);
        let engine = engine_with_clock(clock.clone());
        let created = engine.create_workflow(snapshot, "clerk").await.into_instance();

        let finished = drive_to_end(&engine, &clock, created).await;

        assert_eq!(finished.status, WorkflowStatus::Completed, "{:?}", finished.workflow_type);
        assert!(finished.steps.iter().all(|s| s.status == StepStatus::Completed));
        assert_eq!(engine.get_workflow(finished.id).await.unwrap(), finished);
    }
}

#[tokio::test]
async fn test_stats_track_population() {
    let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let clock = ManualClock::new(start);
    let engine = engine_with_clock(clock.clone());

    engine.create_workflow(standard_snapshot("st-1"), "clerk").await;
    let corporate = engine
        .create_workflow(corporate_snapshot("st-2"), "clerk")
        .await
        .into_instance();
    let vip = engine.create_workflow(vip_snapshot("st-3"), "clerk").await.into_instance();

    clock.advance_minutes(30);
    engine
        .reject_step(corporate.id, corporate.steps[1].id, "cfo", Some("over limit".into()))
        .await
        .unwrap();
    engine.cancel_workflow(vip.id, "guest", None).await.unwrap();

    let stats = engine.get_workflow_stats().await;
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.avg_completion_minutes, 0.0);
}
