//! Crate-level error taxonomy.
//!
//! Each component keeps its own error type; [`ObdhError`] is the
//! coarse-grained taxonomy used when a task loop needs to log and count a
//! failure rather than propagate it, matching the recovery policy: retry
//! at the producer, drop the frame, skip the cycle, or enter a degraded
//! mode, never bubble an exception to an unrelated caller.

use thiserror::Error;

use crate::ngham::NghamError;
use crate::orbit::OrbitError;
use crate::tc_processor::TcError;
use crate::telemetry_store::TelemetryStoreError;

#[derive(Debug, Error)]
pub enum ObdhError {
    #[error("transient I/O failure: {0}")]
    TransientIo(String),

    #[error("telecommand authentication failed")]
    AuthFailure,

    #[error("link-layer protocol failure: {0}")]
    ProtocolFailure(#[from] NghamError),

    #[error("resource exhausted: {0}")]
    ResourceFull(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] TelemetryStoreError),

    #[error("fatal hardware fault: {0}")]
    Fatal(String),

    #[error("telecommand processing failure: {0}")]
    Tc(#[from] TcError),

    #[error("orbit propagation failure: {0}")]
    Orbit(#[from] OrbitError),
}
