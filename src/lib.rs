//! # OBDH Core
//!
//! On-board data handling core for a small satellite: a mission manager
//! state machine, an authenticated telecommand processor, the NGHam
//! radio-link codec, a NOR/FRAM-backed telemetry store, and an
//! orbit/geofence task.
//!
//! ## Features
//!
//! - **NGHam framed-link codec**: seven fixed payload buckets,
//!   Reed-Solomon forward error correction, CRC-16 and CCSDS scrambling
//! - **Mission management**: an event-driven state machine arbitrating
//!   operational mode and payload activation
//! - **Authenticated telecommands**: per-command HMAC-SHA1 verification
//! - **Telemetry persistence**: a ring-buffered NOR log plus an atomic
//!   FRAM configuration mirror with corruption recovery
//! - **Orbit/geofence**: TLE accumulation and edge-transition region
//!   detection behind a pluggable propagator
//!
//! ## Quick Start
//!
//! ```rust
//! use obdh_core::mission_manager::{MissionEvent, MissionManager};
//! use obdh_core::satellite_state::SatelliteState;
//!
//! let mut mm = MissionManager::new();
//! let mut queue = MissionManager::make_queue();
//! let (mut producer, mut consumer) = queue.split();
//! let mut state = SatelliteState::default();
//!
//! producer.enqueue(MissionEvent::InRegion).ok();
//! let actions = mm.drain_events(&mut consumer, &mut state, 0);
//! println!("{} side effects", actions.len());
//! ```
//!
//! ## Architecture
//!
//! - [`ngham`] - radio-link framing, Reed-Solomon, CRC, scrambling
//! - [`mission_manager`] - mode/payload state machine
//! - [`tc_processor`] - telecommand parsing and authentication
//! - [`telemetry_store`] - NOR ring log and FRAM mirror
//! - [`orbit`] - TLE accumulation and geofence detection
//! - [`producers`] - periodic sensor/subsystem reads and the beacon
//! - [`watchdog`] - startup recovery and the watchdog kick
//! - [`spp`] - host-link serial packet framing
//! - [`satellite_state`] - the shared process-wide state struct
//! - [`config`] - compile-time wire and memory-map constants
//! - [`error`] - the crate-level error taxonomy

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod mission_manager;
pub mod ngham;
pub mod orbit;
pub mod producers;
pub mod satellite_state;
pub mod spp;
pub mod tc_processor;
pub mod telemetry_store;
pub mod watchdog;

pub use error::ObdhError;
pub use mission_manager::{MissionAction, MissionEvent, MissionManager};
pub use satellite_state::SatelliteState;
