use obdh_core::mission_manager::{MissionAction, MissionEvent, MissionManager, ModeChangeRequest};
use obdh_core::satellite_state::{OperationalMode, PayloadId, SatelliteState};

fn fresh_state() -> SatelliteState {
    let mut state = SatelliteState::default();
    state.mode = OperationalMode::StandBy;
    state.main_edc = PayloadId::EdcA;
    state
}

#[test]
fn region_entry_and_exit_drain_through_the_public_queue() {
    let mut mm = MissionManager::new();
    let mut state = fresh_state();
    let mut queue = MissionManager::make_queue();
    let (mut producer, mut consumer) = queue.split();

    producer.enqueue(MissionEvent::InRegion).unwrap();
    let actions = mm.drain_events(&mut consumer, &mut state, 1_000);

    assert_eq!(state.mode, OperationalMode::Normal);
    assert_eq!(actions, vec![MissionAction::PowerOnPayload(PayloadId::EdcA)]);

    producer.enqueue(MissionEvent::OutOfRegion).unwrap();
    let actions = mm.drain_events(&mut consumer, &mut state, 2_000);
    assert!(actions.contains(&MissionAction::PowerOffPayload(PayloadId::EdcA)));
    assert!(actions.iter().any(|a| matches!(a, MissionAction::PowerOnPayload(PayloadId::PayloadX))));
}

#[test]
fn multiple_queued_events_drain_in_order() {
    let mut mm = MissionManager::new();
    let mut state = fresh_state();
    let mut queue = MissionManager::make_queue();
    let (mut producer, mut consumer) = queue.split();

    producer.enqueue(MissionEvent::ModeChangeRequest(ModeChangeRequest::Hibernation { hours: 1 })).unwrap();
    producer.enqueue(MissionEvent::ActivatePayloadRequest(PayloadId::EdcB)).unwrap();

    let actions = mm.drain_events(&mut consumer, &mut state, 500);

    assert_eq!(state.mode, OperationalMode::Hibernation);
    assert_eq!(state.active_payload[0], PayloadId::EdcB);
    assert!(actions.contains(&MissionAction::SetTtcTxEnable { ttc0: false, ttc1: false }));
    assert!(actions.contains(&MissionAction::PowerOnPayload(PayloadId::EdcB)));
}

#[test]
fn hibernation_wakeup_chooses_mode_by_region_and_px_state() {
    let mut mm = MissionManager::new();
    let mut state = fresh_state();
    state.mode = OperationalMode::Hibernation;
    state.ts_last_mode_change = 0;
    state.mode_duration = 10;
    state.in_region = false;

    let event = mm.check_hibernation_timeout(&state, 10).unwrap();
    assert_eq!(event, MissionEvent::ModeChangeRequest(ModeChangeRequest::WakeUp));

    let mut queue = MissionManager::make_queue();
    let (mut producer, mut consumer) = queue.split();
    producer.enqueue(event).unwrap();
    mm.drain_events(&mut consumer, &mut state, 10);

    assert_eq!(state.mode, OperationalMode::StandBy);
}

#[test]
fn px_experiment_finished_powers_down_and_returns_to_standby() {
    let mut mm = MissionManager::new();
    let mut state = fresh_state();
    state.mode = OperationalMode::Normal;
    state.active_payload[1] = PayloadId::PayloadX;

    let mut queue = MissionManager::make_queue();
    let (mut producer, mut consumer) = queue.split();
    producer.enqueue(MissionEvent::PxExperimentFinished).unwrap();
    let actions = mm.drain_events(&mut consumer, &mut state, 3_000);

    assert_eq!(state.active_payload[1], PayloadId::None);
    assert_eq!(state.mode, OperationalMode::StandBy);
    assert_eq!(actions, vec![MissionAction::PowerOffPayload(PayloadId::PayloadX)]);
}

#[test]
fn standby_request_powers_down_every_active_payload() {
    let mut mm = MissionManager::new();
    let mut state = fresh_state();
    state.mode = OperationalMode::Normal;
    state.active_payload = [PayloadId::EdcA, PayloadId::PayloadX];
    state.edc_active = true;

    let mut queue = MissionManager::make_queue();
    let (mut producer, mut consumer) = queue.split();
    producer.enqueue(MissionEvent::ModeChangeRequest(ModeChangeRequest::StandBy)).unwrap();
    let actions = mm.drain_events(&mut consumer, &mut state, 4_000);

    assert_eq!(state.active_payload, [PayloadId::None, PayloadId::None]);
    assert!(!state.edc_active);
    assert_eq!(state.mode, OperationalMode::StandBy);
    assert_eq!(actions.len(), 2);
}
