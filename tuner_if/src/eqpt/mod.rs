//! # Equipment Interface
//!
//! This module defines the interface to the motor controller and pneumatics hardware. Each
//! vendor's SDK is modelled as a trait with one parameter-setting call per configuration step, so
//! that every step can fail independently with the vendor's status code.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

/// Device bus, used to open devices by ID.
pub mod bus;

/// SDK for CTRE-style controllers (Talon FX, Talon SRX, Victor SPX).
pub mod ctre;

/// Solenoid valves and compressor.
pub mod pneumatics;

/// SDK for REV-style controllers with onboard motion profiling (Spark MAX).
pub mod rev;

/// In-memory simulation of the bus and devices.
pub mod sim;

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use bus::*;
pub use ctre::*;
pub use pneumatics::*;
pub use rev::*;

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// CAN ID of a device on the bus.
pub type DeviceId = i32;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// Non-OK status code returned by a vendor SDK call.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VendorCode(pub i32);

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Direction of a soft limit.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitDirection {
    Forward,
    Reverse
}

/// The kind of a device as reported by the device itself.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Spark,
    Ctre(CtreModel)
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl std::fmt::Display for VendorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vendor code {}", self.0)
    }
}
