//! Startup bring-up and the hardware watchdog kick.
//!
//! Grounded on the origin's `startup.c` FRAM-magic check / NOR reseed path
//! (mirrored into [`crate::telemetry_store::TelemetryStore::recover_or_default`])
//! and on the scheduling table's `Watchdog(1/100ms)` and
//! `SystemReset(2/36 000 000 ms)` tasks (§5).

use tracing::{error, info, warn};

use crate::satellite_state::{ResetReason, SatelliteState};
use crate::telemetry_store::TelemetryStore;

pub const WATCHDOG_KICK_PERIOD_MS: u64 = 100;
/// `SystemReset` task period in the origin scheduling table: 36 000 000 ms.
pub const FORCED_RESET_PERIOD_MS: u64 = 36_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    /// FRAM image was intact; state was loaded from it.
    WarmStart,
    /// FRAM was blank or corrupted; NOR was erased and defaults seeded.
    ColdStart,
}

/// Runs the bring-up sequence: checks the FRAM magic word, reseeding
/// persistent state on first boot or corruption, and records the reset
/// reason/counter the way `startup.c` threads it through to telemetry.
pub fn run_startup(store: &mut TelemetryStore, state: &mut SatelliteState, reset_reason: ResetReason) -> StartupOutcome {
    let reseeded = store.recover_or_default(state);
    state.reset_reason = reset_reason;
    state.reset_counter = state.reset_counter.wrapping_add(1);

    if reseeded {
        warn!(target: "watchdog", ?reset_reason, "FRAM corrupted or blank, reseeded defaults");
        StartupOutcome::ColdStart
    } else {
        info!(target: "watchdog", ?reset_reason, counter = state.reset_counter, "warm start, state recovered from FRAM");
        StartupOutcome::WarmStart
    }
}

/// A software watchdog counter: must be kicked at least once per
/// [`WATCHDOG_KICK_PERIOD_MS`] or it reports starvation, standing in for
/// the hardware timer the real watchdog task pets.
#[derive(Debug, Default)]
pub struct Watchdog {
    ticks_since_kick: u32,
    starved: bool,
}

/// Ticks tolerated between kicks before the watchdog is considered starved.
const STARVATION_TOLERANCE_TICKS: u32 = 3;

impl Watchdog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called on the watchdog task's own period; advances the starvation
    /// counter.
    pub fn tick(&mut self) {
        self.ticks_since_kick += 1;
        if self.ticks_since_kick > STARVATION_TOLERANCE_TICKS && !self.starved {
            self.starved = true;
            error!(target: "watchdog", "main loop appears starved, no kick received");
        }
    }

    /// Called by the main scheduling loop once per cycle to prove it's
    /// alive.
    pub fn kick(&mut self) {
        self.ticks_since_kick = 0;
        self.starved = false;
    }

    #[must_use]
    pub fn is_starved(&self) -> bool {
        self.starved
    }
}
