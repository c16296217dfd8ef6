//! # Tuner library.
//!
//! This library allows the executable (and tests) to access items defined inside the tuner crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Tuning configuration - the mechanism, gains and operator settings for a session
pub mod params;

/// Controller abstraction - one implementation per motor controller hardware family
pub mod controller;

/// Mode control - selects the control mode and reference each cycle from operator input
pub mod mode_ctrl;

/// Pneumatics - solenoids and compressor toggled by the operator
pub mod pneumatics;

/// Telemetry sinks
pub mod telem;

/// Tuner - wires the input, controllers, mode control and telemetry together each cycle
pub mod tuner;
