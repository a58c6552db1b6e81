// Shared setup for the workflow scenario tests
#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::{DateTime, Utc};
use concierge_backend::config::{EngineConfig, RoleRoster};
use concierge_backend::notifications::{BroadcastGateway, NotificationGateway};
use concierge_backend::roles::StaticRoleDirectory;
use concierge_backend::workflows::{ManualClock, WorkflowEngine};
use concierge_shared::ReservationSnapshot;
use rust_decimal::Decimal;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("concierge_backend=debug")
            .try_init()
            .ok();
    });
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub struct Harness {
    pub engine: Arc<WorkflowEngine>,
    pub clock: ManualClock,
    pub gateway: BroadcastGateway,
}

pub fn harness() -> Harness {
    init_test_logging();

    let clock = ManualClock::new(start_time());
    let gateway = BroadcastGateway::new(256);
    let roster = RoleRoster::parse("finance=ana,li;front_office_manager=marta;front_desk=sam")
        .expect("valid roster");
    let engine = Arc::new(WorkflowEngine::new(
        EngineConfig::default(),
        Arc::new(gateway.clone()) as Arc<dyn NotificationGateway>,
        Arc::new(StaticRoleDirectory::new(&roster)),
        Arc::new(clock.clone()),
    ));

    Harness {
        engine,
        clock,
        gateway,
    }
}

pub fn snapshot(reservation_id: &str) -> ReservationSnapshot {
    ReservationSnapshot {
        reservation_id: reservation_id.to_string(),
        booking_number: format!("BK-{}", reservation_id),
        guest_name: "Katherine Johnson".to_string(),
        guest_tier: "regular".to_string(),
        room_type: "king".to_string(),
        total_amount: Decimal::from(380),
        room_count: 1,
        company_name: None,
        check_in: None,
    }
}

pub fn corporate(reservation_id: &str) -> ReservationSnapshot {
    ReservationSnapshot {
        company_name: Some("Initech".to_string()),
        total_amount: Decimal::from(2_400),
        ..snapshot(reservation_id)
    }
}
