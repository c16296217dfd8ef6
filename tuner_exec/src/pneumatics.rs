//! # Pneumatics
//!
//! Drives the configured solenoids together and the compressor from the operator's toggle
//! buttons. A solenoid press flips the valves between extended and retracted. A compressor press
//! flips the compressor between running and stopped, and is ignored in a cycle where the solenoid
//! button is also pressed.
//!
//! Disabling retracts the valves and stops the compressor. The compressor toggle is reset to
//! running, so it restarts on the next enabled cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, warn};

// Internal
use tuner_if::eqpt::{Bus, BusError, Compressor, DeviceId, Solenoid};
use tuner_if::input::OperatorInput;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The solenoids and compressor of a session. Empty when no solenoids are configured.
pub struct Pneumatics {
    solenoids: Vec<Box<dyn Solenoid>>,
    compressor: Option<Box<dyn Compressor>>,

    extend: bool,
    compressor_enabled: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PneumaticsError {
    #[error("Could not open the solenoid on channel {channel}: {source}")]
    OpenSolenoid {
        channel: DeviceId,
        #[source]
        source: BusError
    },

    #[error("Could not open the compressor: {0}")]
    OpenCompressor(BusError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for Pneumatics {
    fn default() -> Self {
        Self {
            solenoids: Vec::new(),
            compressor: None,
            extend: false,
            compressor_enabled: true,
        }
    }
}

impl Pneumatics {
    /// Open a solenoid on each channel and, if there are any, the compressor.
    ///
    /// On failure everything opened so far is closed again.
    pub fn open(bus: &mut dyn Bus, channels: &[DeviceId]) -> Result<Self, PneumaticsError> {
        let mut pneumatics = Self::default();

        for &channel in channels.iter() {
            match bus.open_solenoid(channel) {
                Ok(s) => pneumatics.solenoids.push(s),
                Err(source) => {
                    pneumatics.close();
                    return Err(PneumaticsError::OpenSolenoid { channel, source })
                }
            }
        }

        if !pneumatics.solenoids.is_empty() {
            match bus.open_compressor() {
                Ok(c) => pneumatics.compressor = Some(c),
                Err(e) => {
                    pneumatics.close();
                    return Err(PneumaticsError::OpenCompressor(e))
                }
            }

            debug!("Opened {} solenoid(s) and the compressor", pneumatics.solenoids.len());
        }

        Ok(pneumatics)
    }

    /// Apply the operator's toggle presses for this cycle.
    pub fn handle_input(&mut self, input: &OperatorInput) {
        if input.extend_solenoid_pressed {
            self.extend = !self.extend;
            debug!("Solenoids {}", if self.extend { "extended" } else { "retracted" });
        }
        else if input.toggle_compressor_pressed {
            self.compressor_enabled = !self.compressor_enabled;
            debug!(
                "Compressor {}",
                if self.compressor_enabled { "enabled" } else { "disabled" }
            );
        }
    }

    /// Drive the valves and compressor to the current toggle state.
    pub fn apply(&mut self) {
        let (extend, compressor_enabled) = (self.extend, self.compressor_enabled);
        self.drive(extend, compressor_enabled);
    }

    /// Retract the valves and stop the compressor.
    pub fn disable(&mut self) {
        self.extend = false;
        self.compressor_enabled = true;
        self.drive(false, false);
    }

    /// Close every valve and the compressor.
    pub fn close(&mut self) {
        for mut solenoid in self.solenoids.drain(..) {
            solenoid.close();
        }
        if let Some(mut compressor) = self.compressor.take() {
            compressor.close();
        }
    }

    pub fn is_extended(&self) -> bool {
        self.extend
    }

    pub fn is_compressor_enabled(&self) -> bool {
        self.compressor_enabled
    }

    /// Number of open valves.
    pub fn num_solenoids(&self) -> usize {
        self.solenoids.len()
    }

    fn drive(&mut self, extend: bool, compressor_enabled: bool) {
        for solenoid in self.solenoids.iter_mut() {
            if let Err(code) = solenoid.set(extend) {
                warn!("Could not set the solenoid on channel {}: {}", solenoid.channel(), code);
            }
        }

        if let Some(ref mut compressor) = self.compressor {
            if let Err(code) = compressor.set_closed_loop_control(compressor_enabled) {
                warn!("Could not set the compressor: {}", code);
            }
        }
    }
}
