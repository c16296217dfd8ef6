//! Mode control module
//!
//! Decides once per cycle which control mode the master is in and what reference and arbitrary
//! feed forward it is commanded with. Operator input is evaluated in a strict priority order, the
//! first match wins:
//!
//! 1. A set point button selects smart motion to the bound set point.
//! 2. Disable stops all output and releases the constant output latch.
//! 3. Run constant latches percent output at the configured constant.
//! 4. Otherwise the throttle axis (percent output) then the velocity axis (smart velocity) are
//!    used if they are outside the dead band. With both inside the dead band the latched constant
//!    output or held set point continues, if there is one, or the master is disabled.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;
use crate::params::ArmFeedForward;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during ModeCtrl operation.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ModeCtrlError {
    #[error("ModeCtrl has not been initialised")]
    NotInitialised,

    #[error("Dead band must be in [0, 1), got {0}")]
    InvalidDeadBand(f64),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Arbitrary feed forward for the given master position.
///
/// The base feed forward plus, for an arm, gravity compensation of
/// `magnitude * cos(position - offset)` with the position in degrees.
pub fn feed_forward(base_ff: f64, arm: Option<&ArmFeedForward>, position_deg: f64) -> f64 {
    match arm {
        Some(arm) => {
            let angle_rad = (position_deg - arm.center_of_mass_angle_offset).to_radians();
            base_ff + arm.arm_feed_forward_magnitude * angle_rad.cos()
        },
        None => base_ff
    }
}
