//! Process-level helpers.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`sig_down`] | Termination signal handling |
//! | `telemetry` | Tracing subscriber and OpenTelemetry setup (requires the `telemetry` feature) |

pub mod sig_down;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use sig_down::*;
#[cfg(feature = "telemetry")]
pub use telemetry::*;
