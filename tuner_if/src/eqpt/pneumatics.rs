//! # Pneumatics
//!
//! Solenoid valves and the compressor on the pneumatics module. Solenoids are addressed by their
//! channel on the module, which is independent of the CAN IDs used by motor controllers. There is
//! at most one compressor.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use super::{DeviceId, VendorCode};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A single acting solenoid valve. An unpowered valve is retracted.
pub trait Solenoid {
    /// Channel of the valve on the pneumatics module.
    fn channel(&self) -> DeviceId;

    /// Extend (true) or retract (false) the valve.
    fn set(&mut self, extended: bool) -> Result<(), VendorCode>;

    /// Whether the valve is currently extended.
    fn get(&self) -> bool;

    /// Release the channel, retracting the valve.
    fn close(&mut self);
}

/// The compressor charging the pneumatic system.
pub trait Compressor {
    /// Enable or disable closed loop control of the compressor from the pressure switch.
    fn set_closed_loop_control(&mut self, enabled: bool) -> Result<(), VendorCode>;

    /// Whether closed loop control is enabled.
    fn is_enabled(&self) -> bool;

    /// Release the compressor, stopping it.
    fn close(&mut self);
}
