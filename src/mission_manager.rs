//! Mission Manager: a blocking event-loop consumer over a bounded queue
//! that arbitrates operational mode and payload activation.
//!
//! Grounded on the origin's `mission_manager.c` event table and on the
//! teacher's `safety.rs` for the shape of an event-driven state manager
//! with a bounded event queue (`heapless::spsc::Queue` here standing in
//! for the origin's FreeRTOS queue, per the governing design note).

use heapless::spsc::{Consumer, Queue};
use thiserror::Error;
use tracing::{info, warn};

use crate::satellite_state::{OperationalMode, PayloadId, SatelliteState};

pub const EVENT_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChangeRequest {
    Normal,
    StandBy,
    Hibernation { hours: u16 },
    WakeUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionEvent {
    InRegion,
    OutOfRegion,
    PxExperimentFinished,
    ModeChangeRequest(ModeChangeRequest),
    ActivatePayloadRequest(PayloadId),
    DeactivatePayloadRequest(PayloadId),
}

#[derive(Debug, Error)]
pub enum MissionManagerError {
    #[error("event queue is full")]
    QueueFull,
}

/// Side effects the mission manager asks the rest of the system to carry
/// out; kept as data so tests can assert on them without needing real
/// device drivers, the same separation the teacher draws between a
/// subsystem's pure state transition and its `Subsystem::execute_command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionAction {
    PowerOnPayload(PayloadId),
    PowerOffPayload(PayloadId),
    SetTtcTxEnable { ttc0: bool, ttc1: bool },
    NotifyPxReaderStart { duration_ms: u32 },
}

pub struct MissionManager {
    px_active_time_ms: u32,
}

impl Default for MissionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionManager {
    #[must_use]
    pub fn new() -> Self {
        Self { px_active_time_ms: 0 }
    }

    /// Sets the PX-reader duration handed to `NotifyPxReaderStart`, per
    /// `SetParameter(Obdh, "px_duration_ms", _)` (§4.5). Zero (the default)
    /// means "reader runs until `PxExperimentFinished` arrives with no
    /// fixed timeout."
    pub fn set_px_duration_ms(&mut self, duration_ms: u32) {
        self.px_active_time_ms = duration_ms;
    }

    /// Builds a bounded event queue and splits it into the manager's
    /// consumer half and a cloneable-by-construction producer half.
    #[must_use]
    pub fn make_queue() -> Queue<MissionEvent, EVENT_QUEUE_CAPACITY> {
        Queue::new()
    }

    /// Processes every event currently queued, applying state transitions
    /// to `state` and returning the side effects each one requires.
    pub fn drain_events(
        &mut self,
        consumer: &mut Consumer<'_, MissionEvent, EVENT_QUEUE_CAPACITY>,
        state: &mut SatelliteState,
        now_s: u32,
    ) -> Vec<MissionAction> {
        let mut actions = Vec::new();
        while let Some(event) = consumer.dequeue() {
            actions.extend(self.handle_event(event, state, now_s));
        }
        actions
    }

    /// Hibernation-timeout housekeeping check: outside the event loop,
    /// synthesizes a `WakeUp` event once `now >= ts_last_mode_change +
    /// mode_duration` (§4.4, and the resolution of the `op_ctrl`
    /// dead-code open question: wake-up is the sole hibernation exit).
    pub fn check_hibernation_timeout(&mut self, state: &SatelliteState, now_s: u32) -> Option<MissionEvent> {
        if state.mode == OperationalMode::Hibernation
            && now_s >= state.ts_last_mode_change.saturating_add(state.mode_duration)
        {
            Some(MissionEvent::ModeChangeRequest(ModeChangeRequest::WakeUp))
        } else {
            None
        }
    }

    fn handle_event(&mut self, event: MissionEvent, state: &mut SatelliteState, now_s: u32) -> Vec<MissionAction> {
        match event {
            MissionEvent::InRegion => self.handle_in_region(state, now_s),
            MissionEvent::OutOfRegion => self.handle_out_of_region(state, now_s),
            MissionEvent::PxExperimentFinished => self.handle_px_finished(state, now_s),
            MissionEvent::ModeChangeRequest(req) => self.handle_mode_change(req, state, now_s),
            MissionEvent::ActivatePayloadRequest(id) => self.handle_activate_payload(id, state, now_s),
            MissionEvent::DeactivatePayloadRequest(id) => self.handle_deactivate_payload(id, state, now_s),
        }
    }

    fn handle_in_region(&mut self, state: &mut SatelliteState, now_s: u32) -> Vec<MissionAction> {
        info!(target: "mission_manager", "satellite in region");
        state.in_region = true;
        let mut actions = Vec::new();

        if !state.manual_mode_on && state.active_payload[0] == PayloadId::None && state.main_edc != PayloadId::None {
            let main = state.main_edc;
            state.active_payload[0] = main;
            state.current_edc = main;
            state.edc_active = true;
            actions.push(MissionAction::PowerOnPayload(main));

            if state.mode != OperationalMode::Hibernation {
                state.change_mode(OperationalMode::Normal, now_s);
            }
        }
        actions
    }

    fn handle_out_of_region(&mut self, state: &mut SatelliteState, now_s: u32) -> Vec<MissionAction> {
        info!(target: "mission_manager", "satellite out of region");
        state.in_region = false;
        let mut actions = Vec::new();

        if state.manual_mode_on {
            return actions;
        }

        if state.edc_active && state.active_payload[0] != PayloadId::None {
            actions.push(MissionAction::PowerOffPayload(state.active_payload[0]));
            state.active_payload[0] = PayloadId::None;
            state.edc_active = false;
        }

        if state.active_payload[1] == PayloadId::None {
            state.active_payload[1] = PayloadId::PayloadX;
            actions.push(MissionAction::PowerOnPayload(PayloadId::PayloadX));
            actions.push(MissionAction::NotifyPxReaderStart { duration_ms: self.px_active_time_ms });
            if state.mode != OperationalMode::Hibernation {
                state.change_mode(OperationalMode::Normal, now_s);
            }
        } else if state.mode != OperationalMode::Hibernation {
            state.change_mode(OperationalMode::StandBy, now_s);
        }
        actions
    }

    fn handle_px_finished(&mut self, state: &mut SatelliteState, now_s: u32) -> Vec<MissionAction> {
        let mut actions = Vec::new();
        if state.active_payload[1] == PayloadId::PayloadX {
            actions.push(MissionAction::PowerOffPayload(PayloadId::PayloadX));
            state.active_payload[1] = PayloadId::None;
            if state.mode != OperationalMode::Hibernation {
                state.change_mode(OperationalMode::StandBy, now_s);
            }
        }
        actions
    }

    fn handle_mode_change(
        &mut self,
        req: ModeChangeRequest,
        state: &mut SatelliteState,
        now_s: u32,
    ) -> Vec<MissionAction> {
        let mut actions = Vec::new();
        match req {
            ModeChangeRequest::Normal => {
                if state.mode == OperationalMode::Hibernation {
                    actions.push(MissionAction::SetTtcTxEnable { ttc0: true, ttc1: true });
                }
                if state.active_payload[0] == PayloadId::None && state.main_edc != PayloadId::None {
                    let main = state.main_edc;
                    state.active_payload[0] = main;
                    state.current_edc = main;
                    state.edc_active = true;
                    actions.push(MissionAction::PowerOnPayload(main));
                }
                state.change_mode(OperationalMode::Normal, now_s);
            }
            ModeChangeRequest::Hibernation { hours } => {
                state.mode_duration = u32::from(hours) * 3600;
                actions.push(MissionAction::SetTtcTxEnable { ttc0: false, ttc1: false });
                state.change_mode(OperationalMode::Hibernation, now_s);
            }
            ModeChangeRequest::StandBy => {
                for (slot, id) in state.active_payload.iter_mut().enumerate() {
                    if *id != PayloadId::None {
                        actions.push(MissionAction::PowerOffPayload(*id));
                        *id = PayloadId::None;
                        if slot == 0 {
                            state.edc_active = false;
                        }
                    }
                }
                state.change_mode(OperationalMode::StandBy, now_s);
            }
            ModeChangeRequest::WakeUp => {
                warn!(target: "mission_manager", "hibernation timeout: waking up");
                state.mode_duration = 0;
                let next = if state.in_region || state.active_payload[1] == PayloadId::PayloadX {
                    OperationalMode::Normal
                } else {
                    OperationalMode::StandBy
                };
                actions.push(MissionAction::SetTtcTxEnable { ttc0: true, ttc1: true });
                state.change_mode(next, now_s);
            }
        }
        actions
    }

    fn handle_activate_payload(
        &mut self,
        id: PayloadId,
        state: &mut SatelliteState,
        now_s: u32,
    ) -> Vec<MissionAction> {
        let slot = slot_for(id);
        state.active_payload[slot] = id;
        if slot == 0 {
            state.current_edc = id;
        }
        if state.mode != OperationalMode::Hibernation {
            state.change_mode(OperationalMode::Normal, now_s);
        }
        vec![MissionAction::PowerOnPayload(id)]
    }

    fn handle_deactivate_payload(
        &mut self,
        id: PayloadId,
        state: &mut SatelliteState,
        now_s: u32,
    ) -> Vec<MissionAction> {
        let slot = slot_for(id);
        let mut actions = Vec::new();
        if state.active_payload[slot] == id {
            actions.push(MissionAction::PowerOffPayload(id));
            state.active_payload[slot] = PayloadId::None;
            if slot == 0 {
                state.edc_active = false;
            }
            if state.active_payload == [PayloadId::None, PayloadId::None] && state.mode == OperationalMode::Normal {
                state.change_mode(OperationalMode::StandBy, now_s);
            }
        }
        actions
    }
}

fn slot_for(id: PayloadId) -> usize {
    match id {
        PayloadId::PayloadX => 1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_state() -> SatelliteState {
        let mut state = SatelliteState::default();
        state.mode = OperationalMode::StandBy;
        state.main_edc = PayloadId::EdcA;
        state
    }

    #[test]
    fn in_region_powers_main_edc_and_enters_normal() {
        let mut mm = MissionManager::new();
        let mut state = fresh_state();

        let actions = mm.handle_event(MissionEvent::InRegion, &mut state, 1_000);

        assert_eq!(state.mode, OperationalMode::Normal);
        assert_eq!(state.active_payload[0], PayloadId::EdcA);
        assert!(state.edc_active);
        assert_eq!(actions, vec![MissionAction::PowerOnPayload(PayloadId::EdcA)]);
    }

    #[test]
    fn in_region_is_noop_in_manual_mode() {
        let mut mm = MissionManager::new();
        let mut state = fresh_state();
        state.manual_mode_on = true;

        let actions = mm.handle_event(MissionEvent::InRegion, &mut state, 1_000);
        assert!(actions.is_empty());
        assert_eq!(state.active_payload[0], PayloadId::None);
    }

    #[test]
    fn hibernation_entry_sets_duration_and_disables_ttc() {
        let mut mm = MissionManager::new();
        let mut state = fresh_state();

        let actions = mm.handle_event(
            MissionEvent::ModeChangeRequest(ModeChangeRequest::Hibernation { hours: 0x1111 }),
            &mut state,
            5_000,
        );

        assert_eq!(state.mode_duration, 0x1111 * 3600);
        assert_eq!(state.mode, OperationalMode::Hibernation);
        assert_eq!(state.ts_last_mode_change, 5_000);
        assert_eq!(actions, vec![MissionAction::SetTtcTxEnable { ttc0: false, ttc1: false }]);
    }

    #[test]
    fn hibernation_timeout_synthesizes_wakeup() {
        let mut mm = MissionManager::new();
        let mut state = fresh_state();
        state.mode = OperationalMode::Hibernation;
        state.ts_last_mode_change = 1_000;
        state.mode_duration = 3_600;

        assert_eq!(mm.check_hibernation_timeout(&state, 4_000), None);
        assert_eq!(
            mm.check_hibernation_timeout(&state, 4_600),
            Some(MissionEvent::ModeChangeRequest(ModeChangeRequest::WakeUp))
        );
    }

    #[test]
    fn px_duration_feeds_the_notify_action() {
        let mut mm = MissionManager::new();
        mm.set_px_duration_ms(45_000);
        let mut state = fresh_state();

        let actions = mm.handle_event(MissionEvent::OutOfRegion, &mut state, 1_000);

        assert!(actions.contains(&MissionAction::NotifyPxReaderStart { duration_ms: 45_000 }));
    }

    #[test]
    fn deactivate_last_payload_returns_to_standby() {
        let mut mm = MissionManager::new();
        let mut state = fresh_state();
        state.mode = OperationalMode::Normal;
        state.active_payload[0] = PayloadId::EdcA;
        state.edc_active = true;

        let actions = mm.handle_event(MissionEvent::DeactivatePayloadRequest(PayloadId::EdcA), &mut state, 9_000);

        assert_eq!(state.mode, OperationalMode::StandBy);
        assert_eq!(state.active_payload[0], PayloadId::None);
        assert_eq!(actions, vec![MissionAction::PowerOffPayload(PayloadId::EdcA)]);
    }
}
