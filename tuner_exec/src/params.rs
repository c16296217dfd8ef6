//! # Tuning configuration
//!
//! The configuration describes one master mechanism (with its closed loop gains), any number of
//! slaves which follow it, and the operator settings used by mode control. It is read from a JSON
//! (or TOML) document, where every field is optional and falls back to its default.
//!
//! Arm gravity compensation may be given either as an `armFeedForward` object or as the flat
//! `armFf` and `armComOffset` fields on the master. The object takes precedence when both are
//! present. Saved configurations always use the object.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

// Internal
use tuner_if::eqpt::{CtreModel, DeviceId, DeviceKind};
use tuner_if::input::SetPointButton;
use crate::controller::Family;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The complete configuration of a tuning session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RobotTuningConfig {
    /// The actively commanded mechanism
    pub master: MasterConfig,

    /// Mechanisms coupled to the master, in the order they are brought up
    pub slaves: Vec<MechanismConfig>,

    /// ID of the operator input device
    #[serde(alias = "xboxId")]
    pub input_id: i32,

    pub a_set_point: f64,
    pub b_set_point: f64,
    pub x_set_point: f64,
    pub y_set_point: f64,

    /// Whether telemetry is recorded
    pub write_csv: bool,

    /// Half width of the axis dead band
    pub dead_band: f64,

    /// Scale applied to the throttle axis in percent output
    pub percent_output_multiplier: f64,

    /// Scale applied to the velocity axis, as a fraction of the master's max velocity
    pub velocity_multiplier: f64,

    /// Percent output commanded while the constant output is latched
    pub percent_output_run: f64,

    /// If true a set point is held until disabled or superseded. By default it is only commanded
    /// on the cycle its button is pressed, after which the master drops back to disabled.
    pub hold_set_point: bool,

    /// Pneumatics module channels of the solenoids, all driven together
    #[serde(alias = "solenoidId")]
    pub solenoid_ids: Vec<DeviceId>,

    /// Period of the control cycle
    ///
    /// Units: seconds
    pub cycle_period_s: f64,
}

/// Configuration of the master mechanism.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", from = "MasterConfigDoc")]
pub struct MasterConfig {
    #[serde(flatten)]
    pub mechanism: MechanismConfig,

    pub gains: SmartGains,

    /// Gravity compensation, for arm-like loads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arm_feed_forward: Option<ArmFeedForward>,
}

/// Configuration of a single motor and its sensor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MechanismConfig {
    /// Hardware type of the controller
    #[serde(rename = "type")]
    pub controller_type: ControllerType,

    /// CAN ID of the controller
    pub id: DeviceId,

    /// For the master, whether the motor direction is inverted. For a slave, whether it is
    /// inverted relative to the master.
    pub is_inverted: bool,

    /// Brake (true) or coast (false) when no output is commanded
    pub is_braked: bool,

    /// Units: volts
    pub voltage_compensation: f64,

    /// Time from neutral to full output
    ///
    /// Units: seconds
    #[serde(alias = "ramp")]
    pub ramp_rate: f64,

    /// Forward soft limit in output units, absent to disable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_limit: Option<f64>,

    /// Reverse soft limit in output units, absent to disable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse_limit: Option<f64>,

    /// Output units per raw sensor position unit
    pub position_conversion: f64,

    /// Output units per raw sensor velocity unit
    pub velocity_conversion: f64,

    /// Position the sensor is set to at startup, in output units
    pub starting_position: f64,

    pub minimum_output: f64,
    pub maximum_output: f64,
}

/// Closed loop gains and motion constraints, only applied to the master.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SmartGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,

    /// Closed loop velocity feed forward gain
    pub f: f64,

    /// Base arbitrary feed forward, in percent output
    pub ff: f64,

    pub i_zone: f64,
    pub i_max: f64,

    /// Units: output units per second per second
    #[serde(alias = "a")]
    pub max_acceleration: f64,

    /// Units: output units per second
    #[serde(alias = "v")]
    pub max_velocity: f64,

    #[serde(alias = "allowableError")]
    pub allowable_closed_loop_error: f64,
}

/// Gravity compensation for an arm.
///
/// The compensation is `arm_feed_forward_magnitude * cos(angle - center_of_mass_angle_offset)`,
/// where the angle is the master's position in degrees.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ArmFeedForward {
    pub arm_feed_forward_magnitude: f64,

    /// Units: degrees
    pub center_of_mass_angle_offset: f64,
}

/// The master as written in a configuration document, accepting both forms of the arm feed
/// forward.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct MasterConfigDoc {
    #[serde(flatten)]
    mechanism: MechanismConfig,

    gains: SmartGains,

    arm_feed_forward: Option<ArmFeedForward>,

    /// Flat form of `ArmFeedForward::arm_feed_forward_magnitude`, absent for no compensation
    arm_ff: Option<f64>,

    /// Flat form of `ArmFeedForward::center_of_mass_angle_offset`
    arm_com_offset: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Hardware type tag used in the configuration document.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerType {
    Spark,
    Falcon,
    Talon,
    Victor
}

/// Reasons a configuration is rejected.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ParamsError {
    #[error("Device {id}: minimum output ({min}) must be less than maximum output ({max})")]
    InvalidOutputRange {
        id: DeviceId,
        min: f64,
        max: f64
    },

    #[error("Device {id}: forward limit ({forward}) must be greater than reverse limit ({reverse})")]
    LimitsInverted {
        id: DeviceId,
        forward: f64,
        reverse: f64
    },

    #[error("Device {id}: starting position {start} is outside the soft limits")]
    StartOutsideLimits {
        id: DeviceId,
        start: f64
    },

    #[error("Device {id}: conversion factors must be finite and non-zero")]
    InvalidConversion {
        id: DeviceId
    },

    #[error("Dead band must be in [0, 1), got {0}")]
    InvalidDeadBand(f64),

    #[error("{0} must not be negative, got {1}")]
    NegativeConstraint(&'static str, f64),

    #[error("Cycle period must be positive and finite, got {0} s")]
    InvalidCyclePeriod(f64),

    #[error("Device ID {0} is used by more than one mechanism")]
    DuplicateId(DeviceId),

    #[error("Pneumatics channel {0} is listed more than once")]
    DuplicateSolenoid(DeviceId),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for RobotTuningConfig {
    fn default() -> Self {
        Self {
            master: MasterConfig::default(),
            slaves: Vec::new(),
            input_id: 0,
            a_set_point: 0.0,
            b_set_point: 0.0,
            x_set_point: 0.0,
            y_set_point: 0.0,
            write_csv: true,
            dead_band: 0.08,
            percent_output_multiplier: 0.9,
            velocity_multiplier: 0.9,
            percent_output_run: 0.0,
            hold_set_point: false,
            solenoid_ids: Vec::new(),
            cycle_period_s: 0.02,
        }
    }
}

impl From<MasterConfigDoc> for MasterConfig {
    fn from(doc: MasterConfigDoc) -> Self {
        let arm_feed_forward = doc.arm_feed_forward.or_else(|| {
            doc.arm_ff.map(|magnitude| ArmFeedForward {
                arm_feed_forward_magnitude: magnitude,
                center_of_mass_angle_offset: doc.arm_com_offset
            })
        });

        Self {
            mechanism: doc.mechanism,
            gains: doc.gains,
            arm_feed_forward
        }
    }
}

impl Default for MechanismConfig {
    fn default() -> Self {
        Self {
            controller_type: ControllerType::Spark,
            id: 1,
            is_inverted: false,
            is_braked: true,
            voltage_compensation: 12.0,
            ramp_rate: 0.0,
            forward_limit: None,
            reverse_limit: None,
            position_conversion: 1.0,
            velocity_conversion: 1.0,
            starting_position: 0.0,
            minimum_output: -1.0,
            maximum_output: 1.0,
        }
    }
}

impl RobotTuningConfig {
    /// Check the configuration is self consistent.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        self.master.mechanism.are_valid()?;
        for slave in self.slaves.iter() {
            slave.are_valid()?;
        }

        let mut ids = BTreeSet::new();
        for id in self.mechanisms().map(|m| m.id) {
            if !ids.insert(id) {
                return Err(ParamsError::DuplicateId(id))
            }
        }

        if !(self.dead_band >= 0.0 && self.dead_band < 1.0) {
            return Err(ParamsError::InvalidDeadBand(self.dead_band))
        }

        let gains = &self.master.gains;
        if gains.max_velocity < 0.0 {
            return Err(ParamsError::NegativeConstraint("maxVelocity", gains.max_velocity))
        }
        if gains.max_acceleration < 0.0 {
            return Err(ParamsError::NegativeConstraint(
                "maxAcceleration", gains.max_acceleration
            ))
        }
        if gains.allowable_closed_loop_error < 0.0 {
            return Err(ParamsError::NegativeConstraint(
                "allowableClosedLoopError", gains.allowable_closed_loop_error
            ))
        }

        let mut channels = BTreeSet::new();
        for &channel in self.solenoid_ids.iter() {
            if !channels.insert(channel) {
                return Err(ParamsError::DuplicateSolenoid(channel))
            }
        }

        if !(self.cycle_period_s > 0.0 && self.cycle_period_s.is_finite()) {
            return Err(ParamsError::InvalidCyclePeriod(self.cycle_period_s))
        }

        Ok(())
    }

    /// The set point bound to the given button.
    pub fn set_point(&self, button: SetPointButton) -> f64 {
        match button {
            SetPointButton::A => self.a_set_point,
            SetPointButton::B => self.b_set_point,
            SetPointButton::X => self.x_set_point,
            SetPointButton::Y => self.y_set_point,
        }
    }

    /// The master followed by the slaves.
    pub fn mechanisms(&self) -> impl Iterator<Item = &MechanismConfig> {
        std::iter::once(&self.master.mechanism).chain(self.slaves.iter())
    }
}

impl MechanismConfig {
    /// Check the mechanism's own invariants.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        if !(self.minimum_output < self.maximum_output) {
            return Err(ParamsError::InvalidOutputRange {
                id: self.id,
                min: self.minimum_output,
                max: self.maximum_output
            })
        }

        let valid_conversion = |c: f64| c.is_finite() && c != 0.0;
        if !valid_conversion(self.position_conversion)
            || !valid_conversion(self.velocity_conversion)
        {
            return Err(ParamsError::InvalidConversion { id: self.id })
        }

        if let (Some(forward), Some(reverse)) = (self.forward_limit, self.reverse_limit) {
            if forward <= reverse {
                return Err(ParamsError::LimitsInverted {
                    id: self.id,
                    forward,
                    reverse
                })
            }
        }

        let above_forward = self.forward_limit.map_or(false, |f| self.starting_position > f);
        let below_reverse = self.reverse_limit.map_or(false, |r| self.starting_position < r);
        if above_forward || below_reverse {
            return Err(ParamsError::StartOutsideLimits {
                id: self.id,
                start: self.starting_position
            })
        }

        Ok(())
    }

    /// The device kind expected on the bus for this mechanism.
    pub fn device_kind(&self) -> DeviceKind {
        self.controller_type.device_kind()
    }
}

impl ControllerType {
    /// The hardware family the type belongs to.
    pub fn family(self) -> Family {
        match self {
            ControllerType::Spark => Family::OnboardMotionProfile,
            ControllerType::Falcon | ControllerType::Talon => Family::SimpleClosedLoop,
            ControllerType::Victor => Family::OpenLoopOnly,
        }
    }

    pub fn device_kind(self) -> DeviceKind {
        match self {
            ControllerType::Spark => DeviceKind::Spark,
            ControllerType::Falcon => DeviceKind::Ctre(CtreModel::TalonFx),
            ControllerType::Talon => DeviceKind::Ctre(CtreModel::TalonSrx),
            ControllerType::Victor => DeviceKind::Ctre(CtreModel::VictorSpx),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CONFIG_JSON: &str = r#"{
        "master": {
            "type": "FALCON",
            "id": 3,
            "isInverted": true,
            "rampRate": 0.2,
            "forwardLimit": 90.0,
            "reverseLimit": -10.0,
            "positionConversion": 0.5,
            "gains": { "p": 0.1, "ff": 0.02, "v": 300.0, "a": 600.0, "allowableError": 1.0 },
            "armFf": 0.2,
            "armComOffset": 15.0
        },
        "slaves": [ { "type": "FALCON", "id": 4, "isInverted": true } ],
        "xboxId": 1,
        "solenoidId": [0, 2],
        "bSetPoint": 12.3,
        "writeCsv": false
    }"#;

    #[test]
    fn test_parse_legacy_field_names() {
        let config: RobotTuningConfig = serde_json::from_str(CONFIG_JSON).unwrap();

        let master = &config.master.mechanism;
        assert_eq!(master.controller_type, ControllerType::Falcon);
        assert_eq!(master.id, 3);
        assert!(master.is_inverted);
        assert!(master.is_braked);
        assert_eq!(master.ramp_rate, 0.2);
        assert_eq!(master.forward_limit, Some(90.0));
        assert_eq!(master.position_conversion, 0.5);
        assert_eq!(master.velocity_conversion, 1.0);
        assert_eq!(master.voltage_compensation, 12.0);

        assert_eq!(config.master.gains.max_velocity, 300.0);
        assert_eq!(config.master.gains.max_acceleration, 600.0);
        assert_eq!(config.master.gains.allowable_closed_loop_error, 1.0);
        assert_eq!(
            config.master.arm_feed_forward,
            Some(ArmFeedForward {
                arm_feed_forward_magnitude: 0.2,
                center_of_mass_angle_offset: 15.0
            })
        );

        assert_eq!(config.slaves.len(), 1);
        assert_eq!(config.slaves[0].minimum_output, -1.0);
        assert_eq!(config.input_id, 1);
        assert_eq!(config.set_point(SetPointButton::B), 12.3);
        assert!(!config.write_csv);
        assert_eq!(config.solenoid_ids, vec![0, 2]);

        // Unspecified operator settings take their defaults
        assert_eq!(config.dead_band, 0.08);
        assert_eq!(config.percent_output_multiplier, 0.9);
        assert!(!config.hold_set_point);

        assert_eq!(config.are_valid(), Ok(()));
    }

    #[test]
    fn test_flat_arm_feed_forward() {
        let config: RobotTuningConfig = serde_json::from_str(
            r#"{"master":{"type":"SPARK","id":1,"armFf":0.3,"armComOffset":25.0,"gains":{"ff":0.05}}}"#
        ).unwrap();

        assert_eq!(
            config.master.arm_feed_forward,
            Some(ArmFeedForward {
                arm_feed_forward_magnitude: 0.3,
                center_of_mass_angle_offset: 25.0
            })
        );
        assert_eq!(config.master.gains.ff, 0.05);
        assert_eq!(config.master.mechanism.id, 1);

        // An offset alone does not enable compensation
        let config: RobotTuningConfig = serde_json::from_str(
            r#"{"master":{"armComOffset":25.0}}"#
        ).unwrap();
        assert_eq!(config.master.arm_feed_forward, None);

        // The object form wins over the flat fields
        let config: RobotTuningConfig = serde_json::from_str(
            r#"{"master":{
                "armFf":0.3,
                "armFeedForward":{"armFeedForwardMagnitude":0.1,"centerOfMassAngleOffset":5.0}
            }}"#
        ).unwrap();
        assert_eq!(
            config.master.arm_feed_forward,
            Some(ArmFeedForward {
                arm_feed_forward_magnitude: 0.1,
                center_of_mass_angle_offset: 5.0
            })
        );
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: RobotTuningConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RobotTuningConfig::default());
        assert_eq!(config.are_valid(), Ok(()));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tuner.json");

        let mut config: RobotTuningConfig = serde_json::from_str(CONFIG_JSON).unwrap();
        config.slaves[0].reverse_limit = Some(-5.0);

        util::params::save_path(&config, &path).unwrap();
        let loaded: RobotTuningConfig = util::params::load_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = RobotTuningConfig::default();
        config.master.mechanism.minimum_output = 1.0;
        assert!(matches!(config.are_valid(), Err(ParamsError::InvalidOutputRange { .. })));

        let mut config = RobotTuningConfig::default();
        config.master.mechanism.forward_limit = Some(1.0);
        config.master.mechanism.reverse_limit = Some(2.0);
        config.master.mechanism.starting_position = 1.5;
        assert!(matches!(config.are_valid(), Err(ParamsError::LimitsInverted { .. })));

        let mut config = RobotTuningConfig::default();
        config.master.mechanism.forward_limit = Some(10.0);
        config.master.mechanism.starting_position = 11.0;
        assert!(matches!(config.are_valid(), Err(ParamsError::StartOutsideLimits { .. })));

        let mut config = RobotTuningConfig::default();
        config.slaves.push(MechanismConfig {
            velocity_conversion: 0.0,
            id: 2,
            ..Default::default()
        });
        assert!(matches!(config.are_valid(), Err(ParamsError::InvalidConversion { id: 2 })));

        let mut config = RobotTuningConfig::default();
        config.slaves.push(MechanismConfig::default());
        assert_eq!(config.are_valid(), Err(ParamsError::DuplicateId(1)));

        let mut config = RobotTuningConfig::default();
        config.dead_band = 1.0;
        assert_eq!(config.are_valid(), Err(ParamsError::InvalidDeadBand(1.0)));

        let mut config = RobotTuningConfig::default();
        config.master.gains.max_velocity = -1.0;
        assert!(matches!(config.are_valid(), Err(ParamsError::NegativeConstraint(..))));

        let mut config = RobotTuningConfig::default();
        config.solenoid_ids = vec![1, 0, 1];
        assert_eq!(config.are_valid(), Err(ParamsError::DuplicateSolenoid(1)));

        for period in [0.0, -0.02, f64::NAN, f64::INFINITY].iter() {
            let mut config = RobotTuningConfig::default();
            config.cycle_period_s = *period;
            assert!(matches!(config.are_valid(), Err(ParamsError::InvalidCyclePeriod(_))));
        }
    }

    #[test]
    fn test_families() {
        assert_eq!(ControllerType::Spark.family(), Family::OnboardMotionProfile);
        assert_eq!(ControllerType::Falcon.family(), Family::SimpleClosedLoop);
        assert_eq!(ControllerType::Talon.family(), Family::SimpleClosedLoop);
        assert_eq!(ControllerType::Victor.family(), Family::OpenLoopOnly);
        assert_eq!(
            ControllerType::Talon.device_kind(),
            DeviceKind::Ctre(CtreModel::TalonSrx)
        );
    }
}
