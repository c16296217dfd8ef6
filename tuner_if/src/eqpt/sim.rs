//! # Simulated equipment
//!
//! An in-memory [`Bus`] whose devices implement the vendor SDK traits. Each device's state is
//! shared between the bus and the handle given out by `open_*`, so that the state applied through
//! a handle can be inspected from the bus. Failures can be injected per configuration parameter
//! to exercise error handling.
//!
//! Solenoids and the compressor only record their state. Closing either returns it to the
//! unpowered state, a retracted valve or a stopped compressor.
//!
//! The mechanism model is deliberately simple: the applied output drives the raw velocity
//! through a first order lag, and the raw position integrates the velocity. Closed loop modes use
//! the P and F gains configured on the device.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::trace;

use super::{
    Bus, BusError, Compressor, CtreControlMode, CtreDevice, CtreModel, CtreParam, DeviceId,
    DeviceKind, IdleMode, LimitDirection, NeutralMode, Solenoid, SparkControlType, SparkDevice,
    SparkParam, VendorCode,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Raw velocity reached at full output, in raw units per second.
pub const SIM_FREE_SPEED: f64 = 10.0;

/// Time constant of the velocity response.
pub const SIM_TIME_CONSTANT_S: f64 = 0.1;

/// Current drawn at full output.
pub const SIM_STALL_CURRENT_A: f64 = 40.0;

/// Code returned when a closed device is used.
pub const SIM_DEVICE_CLOSED: VendorCode = VendorCode(-2);

/// Name used to inject a failure into `follow`.
pub const FOLLOW_FAILURE: &str = "follow";

/// Name used to inject a failure into the command calls.
pub const COMMAND_FAILURE: &str = "command";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulated bus.
#[derive(Default)]
pub struct SimBus {
    devices: BTreeMap<DeviceId, Rc<RefCell<SimDeviceState>>>,
    solenoids: BTreeMap<DeviceId, Rc<RefCell<SimSolenoidState>>>,
    compressor: Option<Rc<RefCell<SimCompressorState>>>
}

/// State of a simulated solenoid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimSolenoidState {
    pub channel: DeviceId,
    pub open: bool,
    pub extended: bool,

    /// Number of times the valve has been set
    pub num_sets: u64,

    failure: Option<VendorCode>
}

/// State of the simulated compressor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimCompressorState {
    pub open: bool,
    pub enabled: bool
}

/// State of a simulated device.
#[derive(Debug, Clone)]
pub struct SimDeviceState {
    pub id: DeviceId,
    pub kind: DeviceKind,

    /// True while a handle to the device is open
    pub open: bool,

    /// Number of times the factory defaults have been restored
    pub factory_resets: u32,

    /// Every Spark parameter successfully applied, in order
    pub spark_params: Vec<SparkParam>,

    /// Every CTRE parameter successfully applied, in order
    pub ctre_params: Vec<CtreParam>,

    pub inverted: bool,
    pub brake: bool,
    pub kp: f64,
    pub kf: f64,
    pub output_range: (f64, f64),
    pub position_conversion: f64,
    pub velocity_conversion: f64,

    /// Soft limit enablement, `[forward, reverse]`
    pub soft_limit_enabled: [bool; 2],

    /// Soft limit thresholds in device units, `[forward, reverse]`
    pub soft_limit: [f64; 2],

    /// Leader being followed and whether the output is inverted relative to it
    pub leader: Option<(DeviceId, bool)>,

    pub last_command: Option<SimCommand>,

    /// Number of commands received
    pub num_commands: u64,

    pub raw_position: f64,
    pub raw_velocity: f64,
    pub applied_output: f64,
    pub current: f64,

    failures: BTreeMap<&'static str, VendorCode>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command received by a simulated device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimCommand {
    Spark {
        value: f64,
        control_type: SparkControlType,
        arb_ff: f64
    },
    Ctre {
        mode: CtreControlMode,
        value: f64,
        arb_ff: f64
    }
}

/// Vendor independent interpretation of a command.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SimMode {
    Neutral,
    Output,
    Position,
    Velocity
}

// ------------------------------------------------------------------------------------------------
// PRIVATE STRUCTS
// ------------------------------------------------------------------------------------------------

struct SimSpark {
    state: Rc<RefCell<SimDeviceState>>
}

struct SimCtre {
    state: Rc<RefCell<SimDeviceState>>,
    model: CtreModel
}

struct SimSolenoid {
    state: Rc<RefCell<SimSolenoidState>>
}

struct SimCompressor {
    state: Rc<RefCell<SimCompressorState>>
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device to the bus, replacing any device with the same ID.
    pub fn add_device(&mut self, id: DeviceId, kind: DeviceKind) -> &mut Self {
        self.devices.insert(id, Rc::new(RefCell::new(SimDeviceState::new(id, kind))));
        self
    }

    /// Snapshot of the device's current state.
    pub fn device(&self, id: DeviceId) -> Option<SimDeviceState> {
        self.devices.get(&id).map(|d| d.borrow().clone())
    }

    /// Make the named configuration step (see `SparkParam::name` and `CtreParam::name`, or
    /// `FOLLOW_FAILURE` and `COMMAND_FAILURE`) fail on the given device.
    ///
    /// Returns false if there is no such device.
    pub fn inject_failure(&mut self, id: DeviceId, step: &'static str, code: VendorCode) -> bool {
        match self.devices.get(&id) {
            Some(d) => {
                d.borrow_mut().failures.insert(step, code);
                true
            },
            None => false
        }
    }

    /// Add a solenoid on the given pneumatics channel.
    pub fn add_solenoid(&mut self, channel: DeviceId) -> &mut Self {
        self.solenoids.insert(channel, Rc::new(RefCell::new(SimSolenoidState {
            channel,
            ..Default::default()
        })));
        self
    }

    /// Add the compressor.
    pub fn add_compressor(&mut self) -> &mut Self {
        self.compressor = Some(Rc::new(RefCell::new(SimCompressorState::default())));
        self
    }

    /// Snapshot of a solenoid's current state.
    pub fn solenoid(&self, channel: DeviceId) -> Option<SimSolenoidState> {
        self.solenoids.get(&channel).map(|s| s.borrow().clone())
    }

    /// Snapshot of the compressor's current state.
    pub fn compressor(&self) -> Option<SimCompressorState> {
        self.compressor.as_ref().map(|c| c.borrow().clone())
    }

    /// Make every `set` on the given solenoid fail. Returns false if there is no such solenoid.
    pub fn inject_solenoid_failure(&mut self, channel: DeviceId, code: VendorCode) -> bool {
        match self.solenoids.get(&channel) {
            Some(s) => {
                s.borrow_mut().failure = Some(code);
                true
            },
            None => false
        }
    }

    /// Set the raw sensor position of a device, for example to place an arm at a known angle.
    pub fn set_raw_position(&mut self, id: DeviceId, raw_position: f64) {
        if let Some(d) = self.devices.get(&id) {
            d.borrow_mut().raw_position = raw_position;
        }
    }

    /// Number of devices, solenoids and compressors currently open.
    pub fn num_open(&self) -> usize {
        self.devices.values().filter(|d| d.borrow().open).count()
            + self.solenoids.values().filter(|s| s.borrow().open).count()
            + self.compressor.iter().filter(|c| c.borrow().open).count()
    }

    /// Advance the simulation by `dt_s` seconds.
    ///
    /// Leaders are stepped first so that followers mirror the output leaders apply in this step.
    pub fn step(&mut self, dt_s: f64) {
        let mut leader_outputs = BTreeMap::new();

        for dev in self.devices.values() {
            let mut s = dev.borrow_mut();
            if s.open && s.leader.is_none() {
                let out = s.demanded_output();
                s.integrate(out, dt_s);
                leader_outputs.insert(s.id, out);
            }
        }

        for dev in self.devices.values() {
            let mut s = dev.borrow_mut();
            if let (true, Some((leader, inverted))) = (s.open, s.leader) {
                let out = leader_outputs.get(&leader).copied().unwrap_or(0.0);
                s.integrate(if inverted { -out } else { out }, dt_s);
            }
        }
    }

    fn open(&mut self, id: DeviceId, kind: DeviceKind) -> Result<Rc<RefCell<SimDeviceState>>, BusError> {
        let dev = self.devices.get(&id).ok_or(BusError::DeviceNotFound(id))?;

        {
            let mut s = dev.borrow_mut();
            if s.kind != kind {
                return Err(BusError::Misidentified {
                    id,
                    expected: kind,
                    found: s.kind
                })
            }
            if s.open {
                return Err(BusError::AlreadyOpen(id))
            }
            s.open = true;
        }

        trace!("Opened simulated device {} ({:?})", id, kind);

        Ok(dev.clone())
    }
}

impl Bus for SimBus {
    fn open_spark(&mut self, id: DeviceId) -> Result<Box<dyn SparkDevice>, BusError> {
        let state = self.open(id, DeviceKind::Spark)?;
        Ok(Box::new(SimSpark { state }))
    }

    fn open_ctre(
        &mut self,
        id: DeviceId,
        model: CtreModel
    ) -> Result<Box<dyn CtreDevice>, BusError> {
        let state = self.open(id, DeviceKind::Ctre(model))?;
        Ok(Box::new(SimCtre { state, model }))
    }

    fn open_solenoid(&mut self, channel: DeviceId) -> Result<Box<dyn Solenoid>, BusError> {
        let state = self.solenoids.get(&channel).ok_or(BusError::ChannelNotFound(channel))?;

        {
            let mut s = state.borrow_mut();
            if s.open {
                return Err(BusError::ChannelAlreadyOpen(channel))
            }
            s.open = true;
        }

        trace!("Opened simulated solenoid {}", channel);

        Ok(Box::new(SimSolenoid { state: state.clone() }))
    }

    fn open_compressor(&mut self) -> Result<Box<dyn Compressor>, BusError> {
        let state = self.compressor.as_ref().ok_or(BusError::NoCompressor)?;

        {
            let mut c = state.borrow_mut();
            if c.open {
                return Err(BusError::CompressorAlreadyOpen)
            }
            c.open = true;
        }

        trace!("Opened simulated compressor");

        Ok(Box::new(SimCompressor { state: state.clone() }))
    }
}

impl SimDeviceState {
    fn new(id: DeviceId, kind: DeviceKind) -> Self {
        Self {
            id,
            kind,
            open: false,
            factory_resets: 0,
            spark_params: Vec::new(),
            ctre_params: Vec::new(),
            inverted: false,
            brake: false,
            kp: 0.0,
            kf: 0.0,
            output_range: (-1.0, 1.0),
            position_conversion: 1.0,
            velocity_conversion: 1.0,
            soft_limit_enabled: [false; 2],
            soft_limit: [0.0; 2],
            leader: None,
            last_command: None,
            num_commands: 0,
            raw_position: 0.0,
            raw_velocity: 0.0,
            applied_output: 0.0,
            current: 0.0,
            failures: BTreeMap::new(),
        }
    }

    /// Restore the configuration (but not the sensor state) to factory defaults.
    fn reset_config(&mut self) {
        self.inverted = false;
        self.brake = false;
        self.kp = 0.0;
        self.kf = 0.0;
        self.output_range = (-1.0, 1.0);
        self.position_conversion = 1.0;
        self.velocity_conversion = 1.0;
        self.soft_limit_enabled = [false; 2];
        self.soft_limit = [0.0; 2];
        self.leader = None;
        self.factory_resets += 1;
    }

    fn check(&self, step: &'static str) -> Result<(), VendorCode> {
        if !self.open {
            return Err(SIM_DEVICE_CLOSED)
        }
        match self.failures.get(step) {
            Some(code) => Err(*code),
            None => Ok(())
        }
    }

    fn apply_spark(&mut self, param: SparkParam) {
        match param {
            SparkParam::FactoryDefaults => self.reset_config(),
            SparkParam::Inverted(i) => self.inverted = i,
            SparkParam::IdleMode(m) => self.brake = m == IdleMode::Brake,
            SparkParam::SoftLimitEnabled(d, e) => self.soft_limit_enabled[limit_idx(d)] = e,
            SparkParam::SoftLimit(d, v) => self.soft_limit[limit_idx(d)] = v,
            SparkParam::P(v) => self.kp = v,
            SparkParam::Ff(v) => self.kf = v,
            SparkParam::OutputRange { min, max } => self.output_range = (min, max),
            SparkParam::PositionConversionFactor(v) => self.position_conversion = v,
            SparkParam::VelocityConversionFactor(v) => self.velocity_conversion = v,
            SparkParam::EncoderPosition(v) => {
                if self.position_conversion != 0.0 {
                    self.raw_position = v / self.position_conversion;
                }
            },
            _ => ()
        }
        self.spark_params.push(param);
    }

    fn apply_ctre(&mut self, param: CtreParam) {
        match param {
            CtreParam::FactoryDefault => self.reset_config(),
            CtreParam::Inverted(i) => self.inverted = i,
            CtreParam::NeutralMode(m) => self.brake = m == NeutralMode::Brake,
            CtreParam::SoftLimitEnable(d, e) => self.soft_limit_enabled[limit_idx(d)] = e,
            CtreParam::SoftLimitThreshold(d, v) => self.soft_limit[limit_idx(d)] = v as f64,
            CtreParam::KP(v) => self.kp = v,
            CtreParam::KF(v) => self.kf = v,
            CtreParam::PeakOutputForward(v) => self.output_range.1 = v,
            CtreParam::PeakOutputReverse(v) => self.output_range.0 = v,
            CtreParam::SelectedSensorPosition(v) => self.raw_position = v as f64,
            _ => ()
        }
        self.ctre_params.push(param);
    }

    fn command(&mut self, cmd: SimCommand) {
        // Any direct command stops following
        self.leader = None;
        self.last_command = Some(cmd);
        self.num_commands += 1;

        // Open loop output is applied immediately, closed loop output is only known after a step
        let (mode, value, arb_ff) = cmd.sim_mode();
        match mode {
            SimMode::Neutral => self.applied_output = 0.0,
            SimMode::Output => self.applied_output = self.limit_output(value + arb_ff),
            _ => ()
        }
    }

    /// Scale from raw units to the units the device is commanded in.
    fn device_scale(&self) -> (f64, f64) {
        match self.kind {
            DeviceKind::Spark => (self.position_conversion, self.velocity_conversion),
            DeviceKind::Ctre(_) => (1.0, 1.0)
        }
    }

    fn demanded_output(&self) -> f64 {
        let (mode, value, arb_ff) = match self.last_command {
            Some(c) => c.sim_mode(),
            None => return 0.0
        };

        let (pos_scale, vel_scale) = self.device_scale();

        let out = match mode {
            SimMode::Neutral => 0.0,
            SimMode::Output => value + arb_ff,
            SimMode::Position => self.kp * (value / pos_scale - self.raw_position) + arb_ff,
            SimMode::Velocity => {
                let target = value / vel_scale;
                self.kf * target + self.kp * (target - self.raw_velocity) + arb_ff
            }
        };

        self.limit_output(out)
    }

    /// Clamp to the output range and stop at enabled soft limits.
    fn limit_output(&self, out: f64) -> f64 {
        let out = out.max(self.output_range.0).min(self.output_range.1);
        let position = self.raw_position * self.device_scale().0;

        if self.soft_limit_enabled[0] && position >= self.soft_limit[0] && out > 0.0 {
            return 0.0
        }
        if self.soft_limit_enabled[1] && position <= self.soft_limit[1] && out < 0.0 {
            return 0.0
        }

        out
    }

    fn integrate(&mut self, out: f64, dt_s: f64) {
        let alpha = (dt_s / SIM_TIME_CONSTANT_S).min(1.0);

        self.applied_output = out;
        self.raw_velocity += (out * SIM_FREE_SPEED - self.raw_velocity) * alpha;
        self.raw_position += self.raw_velocity * dt_s;
        self.current = out.abs() * SIM_STALL_CURRENT_A;
    }
}

impl SimCommand {
    fn sim_mode(&self) -> (SimMode, f64, f64) {
        match *self {
            SimCommand::Spark { value, control_type, arb_ff } => (
                match control_type {
                    SparkControlType::DutyCycle => SimMode::Output,
                    SparkControlType::SmartMotion => SimMode::Position,
                    SparkControlType::SmartVelocity => SimMode::Velocity,
                },
                value,
                arb_ff
            ),
            SimCommand::Ctre { mode, value, arb_ff } => (
                match mode {
                    CtreControlMode::Disabled => SimMode::Neutral,
                    CtreControlMode::PercentOutput => SimMode::Output,
                    CtreControlMode::Position | CtreControlMode::MotionMagic => SimMode::Position,
                    CtreControlMode::Velocity => SimMode::Velocity,
                },
                value,
                arb_ff
            )
        }
    }
}

impl SparkDevice for SimSpark {
    fn device_id(&self) -> DeviceId {
        self.state.borrow().id
    }

    fn set_param(&mut self, param: SparkParam) -> Result<(), VendorCode> {
        let mut s = self.state.borrow_mut();
        s.check(param.name())?;
        s.apply_spark(param);
        Ok(())
    }

    fn follow(&mut self, leader: DeviceId, inverted: bool) -> Result<(), VendorCode> {
        let mut s = self.state.borrow_mut();
        s.check(FOLLOW_FAILURE)?;
        s.leader = Some((leader, inverted));
        Ok(())
    }

    fn set_reference(
        &mut self,
        value: f64,
        control_type: SparkControlType,
        arb_ff: f64
    ) -> Result<(), VendorCode> {
        let mut s = self.state.borrow_mut();
        s.check(COMMAND_FAILURE)?;
        s.command(SimCommand::Spark { value, control_type, arb_ff });
        Ok(())
    }

    fn output_current(&self) -> f64 {
        self.state.borrow().current
    }

    fn encoder_position(&self) -> f64 {
        let s = self.state.borrow();
        s.raw_position * s.position_conversion
    }

    fn encoder_velocity(&self) -> f64 {
        let s = self.state.borrow();
        s.raw_velocity * s.velocity_conversion
    }

    fn applied_output(&self) -> f64 {
        self.state.borrow().applied_output
    }

    fn position_conversion_factor(&self) -> f64 {
        self.state.borrow().position_conversion
    }

    fn velocity_conversion_factor(&self) -> f64 {
        self.state.borrow().velocity_conversion
    }

    fn is_soft_limit_enabled(&self, direction: LimitDirection) -> bool {
        self.state.borrow().soft_limit_enabled[limit_idx(direction)]
    }

    fn close(&mut self) {
        close(&self.state)
    }
}

impl CtreDevice for SimCtre {
    fn device_id(&self) -> DeviceId {
        self.state.borrow().id
    }

    fn model(&self) -> CtreModel {
        self.model
    }

    fn set_param(&mut self, param: CtreParam) -> Result<(), VendorCode> {
        let mut s = self.state.borrow_mut();
        s.check(param.name())?;
        s.apply_ctre(param);
        Ok(())
    }

    fn follow(&mut self, leader: DeviceId, inverted: bool) -> Result<(), VendorCode> {
        let mut s = self.state.borrow_mut();
        s.check(FOLLOW_FAILURE)?;
        s.leader = Some((leader, inverted));
        Ok(())
    }

    fn set(&mut self, mode: CtreControlMode, value: f64, arb_ff: f64) -> Result<(), VendorCode> {
        let mut s = self.state.borrow_mut();
        s.check(COMMAND_FAILURE)?;
        s.command(SimCommand::Ctre { mode, value, arb_ff });
        Ok(())
    }

    fn supply_current(&self) -> f64 {
        self.state.borrow().current
    }

    fn selected_sensor_position(&self) -> f64 {
        self.state.borrow().raw_position
    }

    fn selected_sensor_velocity(&self) -> f64 {
        self.state.borrow().raw_velocity
    }

    fn motor_output_percent(&self) -> f64 {
        self.state.borrow().applied_output
    }

    fn is_soft_limit_enabled(&self, direction: LimitDirection) -> bool {
        self.state.borrow().soft_limit_enabled[limit_idx(direction)]
    }

    fn close(&mut self) {
        close(&self.state)
    }
}

impl Solenoid for SimSolenoid {
    fn channel(&self) -> DeviceId {
        self.state.borrow().channel
    }

    fn set(&mut self, extended: bool) -> Result<(), VendorCode> {
        let mut s = self.state.borrow_mut();
        if !s.open {
            return Err(SIM_DEVICE_CLOSED)
        }
        if let Some(code) = s.failure {
            return Err(code)
        }
        s.extended = extended;
        s.num_sets += 1;
        Ok(())
    }

    fn get(&self) -> bool {
        self.state.borrow().extended
    }

    fn close(&mut self) {
        let mut s = self.state.borrow_mut();
        s.open = false;
        s.extended = false;
    }
}

impl Compressor for SimCompressor {
    fn set_closed_loop_control(&mut self, enabled: bool) -> Result<(), VendorCode> {
        let mut c = self.state.borrow_mut();
        if !c.open {
            return Err(SIM_DEVICE_CLOSED)
        }
        c.enabled = enabled;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    fn close(&mut self) {
        let mut c = self.state.borrow_mut();
        c.open = false;
        c.enabled = false;
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn limit_idx(direction: LimitDirection) -> usize {
    match direction {
        LimitDirection::Forward => 0,
        LimitDirection::Reverse => 1
    }
}

fn close(state: &Rc<RefCell<SimDeviceState>>) {
    let mut s = state.borrow_mut();
    if s.open {
        trace!("Closed simulated device {}", s.id);
    }
    s.open = false;
    s.leader = None;
    s.last_command = None;
    s.applied_output = 0.0;
    s.current = 0.0;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_open_checks_identity_and_ownership() {
        let mut bus = SimBus::new();
        bus.add_device(1, DeviceKind::Spark)
            .add_device(2, DeviceKind::Ctre(CtreModel::TalonFx));

        assert_eq!(bus.open_spark(3).err(), Some(BusError::DeviceNotFound(3)));
        assert_eq!(
            bus.open_spark(2).err(),
            Some(BusError::Misidentified {
                id: 2,
                expected: DeviceKind::Spark,
                found: DeviceKind::Ctre(CtreModel::TalonFx)
            })
        );

        let mut spark = bus.open_spark(1).unwrap();
        assert_eq!(bus.open_spark(1).err(), Some(BusError::AlreadyOpen(1)));
        assert_eq!(bus.num_open(), 1);

        spark.close();
        assert_eq!(bus.num_open(), 0);
        assert!(bus.open_spark(1).is_ok());
    }

    #[test]
    fn test_injected_failure() {
        let mut bus = SimBus::new();
        bus.add_device(1, DeviceKind::Spark);
        assert!(bus.inject_failure(1, "p", VendorCode(7)));
        assert!(!bus.inject_failure(9, "p", VendorCode(7)));

        let mut spark = bus.open_spark(1).unwrap();
        assert!(spark.set_param(SparkParam::I(0.1)).is_ok());
        assert_eq!(spark.set_param(SparkParam::P(0.1)), Err(VendorCode(7)));

        // Failed steps are not applied
        let s = bus.device(1).unwrap();
        assert_eq!(s.spark_params, vec![SparkParam::I(0.1)]);
        assert_eq!(s.kp, 0.0);
    }

    #[test]
    fn test_closed_device_rejects_calls() {
        let mut bus = SimBus::new();
        bus.add_device(4, DeviceKind::Ctre(CtreModel::VictorSpx));

        let mut victor = bus.open_ctre(4, CtreModel::VictorSpx).unwrap();
        victor.close();
        assert_eq!(
            victor.set(CtreControlMode::PercentOutput, 0.5, 0.0),
            Err(SIM_DEVICE_CLOSED)
        );
    }

    #[test]
    fn test_follower_mirrors_leader() {
        let mut bus = SimBus::new();
        bus.add_device(1, DeviceKind::Spark).add_device(2, DeviceKind::Spark);

        let mut leader = bus.open_spark(1).unwrap();
        let mut follower = bus.open_spark(2).unwrap();
        follower.follow(1, true).unwrap();

        leader.set_reference(0.5, SparkControlType::DutyCycle, 0.1).unwrap();
        bus.step(0.02);

        assert!((leader.applied_output() - 0.6).abs() < 1e-12);
        assert!((follower.applied_output() + 0.6).abs() < 1e-12);
        assert!(leader.encoder_position() > 0.0);
        assert!(follower.encoder_position() < 0.0);
    }

    #[test]
    fn test_spark_conversion_applied_onboard() {
        let mut bus = SimBus::new();
        bus.add_device(1, DeviceKind::Spark);

        let mut spark = bus.open_spark(1).unwrap();
        spark.set_param(SparkParam::PositionConversionFactor(360.0)).unwrap();
        spark.set_param(SparkParam::EncoderPosition(90.0)).unwrap();

        assert!((bus.device(1).unwrap().raw_position - 0.25).abs() < 1e-12);
        assert!((spark.encoder_position() - 90.0).abs() < 1e-12);
        assert_eq!(spark.position_conversion_factor(), 360.0);
    }

    #[test]
    fn test_soft_limit_stops_output() {
        let mut bus = SimBus::new();
        bus.add_device(2, DeviceKind::Ctre(CtreModel::TalonSrx));

        let mut talon = bus.open_ctre(2, CtreModel::TalonSrx).unwrap();
        talon.set_param(CtreParam::SoftLimitThreshold(LimitDirection::Forward, 10)).unwrap();
        talon.set_param(CtreParam::SoftLimitEnable(LimitDirection::Forward, true)).unwrap();
        talon.set_param(CtreParam::SelectedSensorPosition(10)).unwrap();

        talon.set(CtreControlMode::PercentOutput, 0.5, 0.0).unwrap();
        assert_eq!(talon.motor_output_percent(), 0.0);

        talon.set(CtreControlMode::PercentOutput, -0.5, 0.0).unwrap();
        assert_eq!(talon.motor_output_percent(), -0.5);
    }

    #[test]
    fn test_command_stops_following() {
        let mut bus = SimBus::new();
        bus.add_device(1, DeviceKind::Ctre(CtreModel::TalonFx))
            .add_device(2, DeviceKind::Ctre(CtreModel::TalonFx));

        let mut follower = bus.open_ctre(2, CtreModel::TalonFx).unwrap();
        follower.follow(1, false).unwrap();
        assert_eq!(bus.device(2).unwrap().leader, Some((1, false)));

        follower.set(CtreControlMode::Disabled, 0.0, 0.0).unwrap();
        assert_eq!(bus.device(2).unwrap().leader, None);
    }

    #[test]
    fn test_solenoid_retracts_on_close() {
        let mut bus = SimBus::new();
        bus.add_solenoid(0).add_solenoid(3);

        assert_eq!(bus.open_solenoid(1).err(), Some(BusError::ChannelNotFound(1)));

        let mut valve = bus.open_solenoid(3).unwrap();
        assert_eq!(bus.open_solenoid(3).err(), Some(BusError::ChannelAlreadyOpen(3)));
        assert_eq!(valve.channel(), 3);

        valve.set(true).unwrap();
        assert!(valve.get());
        assert!(bus.solenoid(3).unwrap().extended);
        assert!(!bus.solenoid(0).unwrap().extended);
        assert_eq!(bus.num_open(), 1);

        valve.close();
        assert!(!bus.solenoid(3).unwrap().extended);
        assert_eq!(valve.set(true), Err(SIM_DEVICE_CLOSED));
        assert_eq!(bus.num_open(), 0);

        assert!(bus.inject_solenoid_failure(0, VendorCode(3)));
        assert!(!bus.inject_solenoid_failure(5, VendorCode(3)));
        let mut failing = bus.open_solenoid(0).unwrap();
        assert_eq!(failing.set(true), Err(VendorCode(3)));
        assert!(!bus.solenoid(0).unwrap().extended);
    }

    #[test]
    fn test_single_compressor() {
        let mut bus = SimBus::new();
        assert_eq!(bus.open_compressor().err(), Some(BusError::NoCompressor));

        bus.add_compressor();
        let mut compressor = bus.open_compressor().unwrap();
        assert_eq!(bus.open_compressor().err(), Some(BusError::CompressorAlreadyOpen));

        compressor.set_closed_loop_control(true).unwrap();
        assert!(compressor.is_enabled());
        assert!(bus.compressor().unwrap().enabled);

        compressor.close();
        assert_eq!(bus.compressor(), Some(SimCompressorState::default()));
    }
}
