//! Implementations for the ModeCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use serde::Serialize;

// Internal
use super::{feed_forward, ModeCtrlError, Params};
use crate::controller::ControlMode;
use tuner_if::input::OperatorInput;
use util::{maths::apply_dead_band, module::State};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Mode control module state
pub struct ModeCtrl {
    params: Option<Params>,

    mode: ControlMode,
    reference: f64,

    /// Constant percent output is latched
    constant_latched: bool,

    /// A set point is being held
    set_point_held: bool,
}

/// Input data to mode control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Operator input for this cycle
    pub input: OperatorInput,

    /// Measured master position in output units, used for gravity compensation
    pub position: f64,
}

/// Command for the master this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputData {
    pub mode: ControlMode,

    /// Percent output, position or velocity depending on the mode
    pub reference: f64,

    /// Arbitrary feed forward, zero when disabled
    pub arb_ff: f64,
}

/// Status report for ModeCtrl processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusReport {
    /// Both axes were inside the dead band
    pub axes_in_dead_band: bool,

    pub constant_latched: bool,
    pub set_point_held: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ModeCtrl {
    fn default() -> Self {
        Self {
            params: None,
            mode: ControlMode::Disabled,
            reference: 0.0,
            constant_latched: false,
            set_point_held: false,
        }
    }
}

impl Default for OutputData {
    fn default() -> Self {
        Self {
            mode: ControlMode::Disabled,
            reference: 0.0,
            arb_ff: 0.0,
        }
    }
}

impl State for ModeCtrl {
    type InitData = Params;
    type InitError = ModeCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = ModeCtrlError;

    /// Initialise the ModeCtrl module, starting in the disabled state.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        if !(init_data.dead_band >= 0.0 && init_data.dead_band < 1.0) {
            return Err(ModeCtrlError::InvalidDeadBand(init_data.dead_band))
        }

        *self = Self {
            params: Some(init_data),
            ..Self::default()
        };

        Ok(())
    }

    /// Perform cyclic processing of mode control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let params = self.params.as_ref().ok_or(ModeCtrlError::NotInitialised)?;
        let input = &input_data.input;

        let mut report = StatusReport::default();

        // Recomputed every cycle from the measured position
        let ff = feed_forward(
            params.base_ff,
            params.arm_feed_forward.as_ref(),
            input_data.position
        );

        let prev_mode = self.mode;

        if let Some(button) = input.set_point_pressed() {
            self.mode = ControlMode::SmartMotion;
            self.reference = params.set_point(button);
            self.constant_latched = false;
            self.set_point_held = params.hold_set_point;
        }
        else if input.disable_pressed {
            self.disable();
        }
        else if input.run_constant_pressed {
            self.mode = ControlMode::PercentOutput;
            self.reference = params.percent_output_run + ff;
            self.constant_latched = true;
            self.set_point_held = false;
        }
        else {
            let throttle = apply_dead_band(input.throttle_axis, params.dead_band);
            let velocity = apply_dead_band(input.velocity_axis, params.dead_band);

            if throttle != 0.0 {
                self.mode = ControlMode::PercentOutput;
                self.reference = throttle * params.percent_output_multiplier;
                self.constant_latched = false;
                self.set_point_held = false;
            }
            else if velocity != 0.0 {
                self.mode = ControlMode::SmartVelocity;
                self.reference = velocity * params.velocity_multiplier * params.max_velocity;
                self.constant_latched = false;
                self.set_point_held = false;
            }
            else {
                report.axes_in_dead_band = true;

                if self.constant_latched {
                    self.mode = ControlMode::PercentOutput;
                    self.reference = params.percent_output_run + ff;
                }
                else if !self.set_point_held {
                    self.mode = ControlMode::Disabled;
                    self.reference = 0.0;
                }
            }
        }

        if self.mode != prev_mode {
            debug!("ModeCtrl: {:?} -> {:?}", prev_mode, self.mode);
        }

        let output = OutputData {
            mode: self.mode,
            reference: self.reference,
            arb_ff: match self.mode {
                ControlMode::Disabled => 0.0,
                _ => ff
            }
        };

        trace!("ModeCtrl output: {:?}", output);

        report.constant_latched = self.constant_latched;
        report.set_point_held = self.set_point_held;

        Ok((output, report))
    }
}

impl ModeCtrl {
    /// Enter the disabled state, releasing any latch or held set point.
    ///
    /// Always succeeds, whether or not the module is initialised.
    pub fn disable(&mut self) -> OutputData {
        self.mode = ControlMode::Disabled;
        self.reference = 0.0;
        self.constant_latched = false;
        self.set_point_held = false;

        OutputData::default()
    }

    /// The current control mode.
    pub fn mode(&self) -> ControlMode {
        self.mode
    }
}
