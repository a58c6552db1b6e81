// Template-specific flows through the engine

use chrono::DateTime;
use concierge_shared::{NotificationType, Priority, Recipient, StepStatus, WorkflowStatus, WorkflowType};
use rust_decimal::Decimal;
use serde_json::json;

use crate::config::EngineConfig;
use crate::tests::fixtures::{corporate_snapshot, group_snapshot, standard_snapshot, vip_snapshot};
use crate::tests::helpers::{engine_with_clock, engine_with_config};
use crate::workflows::{
    Clock, EventSource, ManualClock, ReservationEvent, StepStateViolation, WorkflowError,
};

fn clock() -> ManualClock {
    ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
}

#[tokio::test]
async fn test_urgent_vip_alerts_duty_manager_before_approval() {
    let engine = engine_with_clock(clock());
    let mut snapshot = vip_snapshot("urgent-vip");
    snapshot.total_amount = Decimal::from(25_000);

    let workflow = engine.create_workflow(snapshot, "clerk").await.into_instance();

    assert_eq!(workflow.workflow_type, WorkflowType::Vip);
    assert_eq!(workflow.priority, Priority::Urgent);
    let keys: Vec<_> = workflow.steps.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "validate_reservation",
            "notify_duty_manager",
            "vip_welcome_approval",
            "assign_room",
            "send_confirmation"
        ]
    );
    assert_eq!(workflow.steps[1].status, StepStatus::Completed);
    assert_eq!(workflow.steps[2].status, StepStatus::InProgress);

    let alert = workflow
        .notifications
        .iter()
        .find(|n| n.notification_type == NotificationType::DutyManagerAlert)
        .expect("duty manager alerted");
    assert_eq!(alert.recipient, Recipient::Role("duty_manager".to_string()));
    assert!(alert.message.contains("BK-urgent-vip"));

    let assigned = workflow
        .notifications
        .iter()
        .find(|n| n.notification_type == NotificationType::StepAssigned)
        .expect("approver notified");
    assert_eq!(assigned.recipient, Recipient::Role("front_office_manager".to_string()));
    assert_eq!(assigned.step_id, Some(workflow.steps[2].id));
}

#[tokio::test]
async fn test_group_contract_review_can_be_skipped() {
    let engine = engine_with_clock(clock());
    let workflow = engine
        .create_workflow(group_snapshot("grp-1"), "clerk")
        .await
        .into_instance();

    assert_eq!(workflow.workflow_type, WorkflowType::Group);
    assert_eq!(workflow.steps[1].status, StepStatus::Completed);
    let review = workflow.current_step().expect("waiting on sales").clone();
    assert_eq!(review.key, "group_contract_review");
    assert_eq!(review.assigned_to_role.as_deref(), Some("sales"));

    let done = engine
        .skip_step(workflow.id, review.id, "olu", Some("framework contract".into()))
        .await
        .unwrap();

    assert_eq!(done.status, WorkflowStatus::Completed);
    assert_eq!(done.steps[2].status, StepStatus::Skipped);
    assert_eq!(done.steps[2].completed_by.as_deref(), Some("olu"));
    assert_eq!(done.steps[3].status, StepStatus::Completed);
    assert!(done
        .notifications
        .iter()
        .any(|n| n.notification_type == NotificationType::RoomBlockConfirmed));
}

#[tokio::test]
async fn test_vip_room_assignment_requires_room_number() {
    let clock = clock();
    let engine = engine_with_clock(clock.clone());
    let workflow = engine.create_workflow(vip_snapshot("vip-9"), "clerk").await.into_instance();

    let approval = workflow.steps[1].id;
    let workflow = engine
        .approve_step(workflow.id, approval, "marta", None)
        .await
        .unwrap();
    let assign = workflow.current_step().expect("room assignment open").clone();
    assert_eq!(assign.key, "assign_room");

    clock.advance_minutes(5);
    for payload in [json!({}), json!({ "room_number": null }), json!({ "room_number": "  " })] {
        let err = engine
            .complete_manual_step(workflow.id, assign.id, "sam", payload)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidStepState {
                reason: StepStateViolation::MissingFields(ref fields),
                ..
            } if fields == &vec!["room_number".to_string()]
        ));
    }

    let unchanged = engine.get_workflow(workflow.id).await.unwrap();
    assert_eq!(unchanged, workflow);

    let done = engine
        .complete_manual_step(workflow.id, assign.id, "sam", json!({ "room_number": "1204" }))
        .await
        .unwrap();
    assert_eq!(done.status, WorkflowStatus::Completed);
    assert_eq!(done.steps[2].payload, Some(json!({ "room_number": "1204" })));
}

#[tokio::test]
async fn test_approval_step_cannot_be_skipped_or_completed() {
    let engine = engine_with_clock(clock());
    let workflow = engine
        .create_workflow(corporate_snapshot("corp-3"), "clerk")
        .await
        .into_instance();
    let credit = workflow.steps[1].id;

    let skip = engine.skip_step(workflow.id, credit, "ana", None).await.unwrap_err();
    assert!(matches!(
        skip,
        WorkflowError::InvalidStepState {
            reason: StepStateViolation::NotSkippable,
            ..
        }
    ));

    let complete = engine
        .complete_manual_step(workflow.id, credit, "ana", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        complete,
        WorkflowError::InvalidStepState {
            reason: StepStateViolation::WrongStepType { .. },
            ..
        }
    ));

    let later = workflow.steps[2].id;
    let early = engine.approve_step(workflow.id, later, "ana", None).await.unwrap_err();
    assert!(matches!(
        early,
        WorkflowError::InvalidStepState {
            reason: StepStateViolation::WrongStatus {
                actual: StepStatus::Pending
            },
            ..
        }
    ));
}

#[tokio::test]
async fn test_explicit_type_overrides_classification() {
    let engine = engine_with_clock(clock());
    let outcome = engine
        .create_workflow_with(standard_snapshot("explicit-1"), "corporate", Priority::High, "api")
        .await
        .unwrap();

    let workflow = outcome.instance();
    assert_eq!(workflow.workflow_type, WorkflowType::Corporate);
    assert_eq!(workflow.priority, Priority::High);
    assert_eq!(workflow.current_role(), Some("finance"));
    assert_eq!(engine.assignees(workflow.id).await.unwrap(), vec!["ana", "li"]);
}

#[tokio::test]
async fn test_unknown_type_rejected_unless_fallback_enabled() {
    let strict = engine_with_clock(clock());
    let err = strict
        .create_workflow_with(standard_snapshot("odd-1"), "wedding", Priority::Low, "api")
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::UnknownTemplate("wedding".to_string()));
    assert!(strict.store().find_by_reservation("odd-1").await.is_none());

    let config = EngineConfig {
        fallback_to_standard: true,
        ..EngineConfig::default()
    };
    let lenient = engine_with_config(config, clock());
    let workflow = lenient
        .create_workflow_with(standard_snapshot("odd-1"), "wedding", Priority::Low, "api")
        .await
        .unwrap()
        .into_instance();
    assert_eq!(workflow.workflow_type, WorkflowType::Standard);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn test_reservation_events_drive_lifecycle() {
    let clock = clock();
    let engine = engine_with_clock(clock.clone());
    clock.advance_minutes(90);

    let event = ReservationEvent::created(
        corporate_snapshot("evt-1"),
        EventSource::BookingEngine,
        engine.clock(),
    );
    assert_eq!(event.timestamp, clock.now());

    let created = engine
        .process_event(event)
        .await
        .unwrap()
        .expect("workflow created");
    assert_eq!(created.created_by, "booking_engine");
    assert_eq!(created.status, WorkflowStatus::Active);
    assert_eq!(created.created_at, clock.now());

    let cancelled = engine
        .process_event(ReservationEvent::cancelled(
            "evt-1",
            Some("guest changed plans"),
            EventSource::Staff("kai".to_string()),
            engine.clock(),
        ))
        .await
        .unwrap()
        .expect("workflow cancelled");
    assert_eq!(cancelled.id, created.id);
    assert_eq!(cancelled.status, WorkflowStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("guest changed plans"));

    let cancel_note = cancelled.notifications.last().expect("cancel notification");
    assert_eq!(cancel_note.notification_type, NotificationType::WorkflowCancelled);
    assert_eq!(cancel_note.recipient, Recipient::Role("finance".to_string()));

    let unknown = engine
        .process_event(ReservationEvent::cancelled(
            "evt-404",
            None,
            EventSource::System,
            engine.clock(),
        ))
        .await
        .unwrap();
    assert!(unknown.is_none());
}
