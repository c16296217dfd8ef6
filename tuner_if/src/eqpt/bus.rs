//! # Device bus
//!
//! The bus is the entry point into the vendor SDKs: devices are opened from it by ID. Each
//! device may only have one live owner, it must be closed before it can be opened again.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use super::{Compressor, CtreDevice, CtreModel, DeviceId, DeviceKind, Solenoid, SparkDevice};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A bus on which motor controllers and the pneumatics module can be found.
pub trait Bus {
    /// Open the Spark with the given ID.
    fn open_spark(&mut self, id: DeviceId) -> Result<Box<dyn SparkDevice>, BusError>;

    /// Open the CTRE controller of the given model with the given ID.
    fn open_ctre(
        &mut self, 
        id: DeviceId, 
        model: CtreModel
    ) -> Result<Box<dyn CtreDevice>, BusError>;

    /// Open the solenoid on the given pneumatics module channel.
    fn open_solenoid(&mut self, channel: DeviceId) -> Result<Box<dyn Solenoid>, BusError>;

    /// Open the compressor.
    fn open_compressor(&mut self) -> Result<Box<dyn Compressor>, BusError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BusError {
    #[error("No device with ID {0} is present on the bus")]
    DeviceNotFound(DeviceId),

    #[error("Device {id} was expected to be a {expected:?} but is a {found:?}")]
    Misidentified {
        id: DeviceId,
        expected: DeviceKind,
        found: DeviceKind
    },

    #[error("Device {0} is already open")]
    AlreadyOpen(DeviceId),

    #[error("No solenoid on pneumatics channel {0}")]
    ChannelNotFound(DeviceId),

    #[error("Pneumatics channel {0} is already open")]
    ChannelAlreadyOpen(DeviceId),

    #[error("No compressor is present")]
    NoCompressor,

    #[error("The compressor is already open")]
    CompressorAlreadyOpen,
}
