//! # Tuner interface crate.
//!
//! Provides the interfaces between the tuner and its external collaborators:
//! the vendor motor controller SDKs and the operator input device.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Vendor SDK and device bus definitions for motor controller equipment
pub mod eqpt;

/// Operator input definitions
pub mod input;
