//! # Operator input script interpreter module
//!
//! This module provides an interpreter for operator input scripts, allowing a tuning session to be
//! replayed without an operator. A script is a list of timed input frames:
//!
//! ```text
//! 0.0 : {"throttleAxis": 0.5};
//! 2.0 : {"bPressed": true};
//! 4.5 : {"disablePressed": true};
//! ```
//!
//! Button presses in a frame are delivered once, on the first cycle at or after the frame's time.
//! Axes are held until the next frame changes them. The script clock advances by one cycle period
//! per poll, so replays do not depend on how quickly the loop actually runs.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::fs;
use log::debug;
use regex::RegexBuilder;
use thiserror::Error;

// Internal
use tuner_if::input::{InputDevice, OperatorInput};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An input frame which is scripted to occur at a specific time.
struct Frame {
    /// The time the frame is supposed to be delivered at
    exec_time_s: f64,

    input: OperatorInput
}

/// A script interpreter.
///
/// After initialising with the path to the script use `.poll` once per cycle to get the input for
/// that cycle.
pub struct ScriptInterpreter {
    script_path: PathBuf,
    frames: VecDeque<Frame>,

    /// Axes held from the last delivered frame
    held: OperatorInput,

    clock_s: f64,
    cycle_period_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid input frame at {0} s: {1}")]
    InvalidFrame(f64, serde_json::Error),

    #[error("Script contains an input frame at {0} s with axes outside [-1, 1]")]
    AxisOutOfRange(f64),

    #[error("Script frames must be in time order, but {1} s follows {0} s")]
    OutOfOrder(f64, f64),

    #[error("The cycle period must be positive and finite, got {0} s")]
    InvalidCyclePeriod(f64),

    #[error("Could not build the script pattern: {0}")]
    PatternError(regex::Error)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(
        script_path: P,
        cycle_period_s: f64
    ) -> Result<Self, ScriptError> {

        // Get the path in a buffer
        let path = PathBuf::from(script_path.as_ref());

        // Check that the script file exists.
        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        // Load the script into a string
        let script = fs::read_to_string(&path)
            .map_err(ScriptError::ScriptLoadError)?;

        let mut interp = Self::from_script(&script, cycle_period_s)?;
        interp.script_path = path;

        debug!(
            "Loaded script {:?}: {} frames over {} s",
            interp.script_path,
            interp.get_num_frames(),
            interp.get_duration()
        );

        Ok(interp)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_script(script: &str, cycle_period_s: f64) -> Result<Self, ScriptError> {
        if !(cycle_period_s > 0.0 && cycle_period_s.is_finite()) {
            return Err(ScriptError::InvalidCyclePeriod(cycle_period_s))
        }

        // Empty queue of frames
        let mut frames: VecDeque<Frame> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = RegexBuilder::
            new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(ScriptError::PatternError)?;

        for cap in re.captures_iter(script) {
            // Parse the exec time
            let exec_time_s: f64 = cap[1]
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            // Parse the frame from the payload. The scripts contain JSON only.
            let input = OperatorInput::from_json(&cap[3])
                .map_err(|e| ScriptError::InvalidFrame(exec_time_s, e))?;

            if !input.is_valid() {
                return Err(ScriptError::AxisOutOfRange(exec_time_s))
            }

            if let Some(prev) = frames.back() {
                if prev.exec_time_s > exec_time_s {
                    return Err(ScriptError::OutOfOrder(prev.exec_time_s, exec_time_s))
                }
            }

            frames.push_back(Frame {
                exec_time_s,
                input
            });
        }

        if frames.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter {
            script_path: PathBuf::new(),
            frames,
            held: OperatorInput::default(),
            clock_s: 0.0,
            cycle_period_s
        })
    }

    /// Get the number of frames left in the script
    pub fn get_num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.frames.back() {
            Some(f) => f.exec_time_s,
            None => 0f64
        }
    }
}

impl InputDevice for ScriptInterpreter {
    /// Get the input for this cycle, or `None` once every frame has been delivered.
    fn poll(&mut self) -> Option<OperatorInput> {

        // If the queue is empty the script is over
        if self.frames.is_empty() {
            return None
        }

        let mut input = self.held;

        // Pop every frame that is due. Presses accumulate, the latest axes win.
        while let Some(frame) = self.frames.front() {
            if frame.exec_time_s > self.clock_s {
                break
            }

            let f = frame.input;
            input.a_pressed |= f.a_pressed;
            input.b_pressed |= f.b_pressed;
            input.x_pressed |= f.x_pressed;
            input.y_pressed |= f.y_pressed;
            input.disable_pressed |= f.disable_pressed;
            input.run_constant_pressed |= f.run_constant_pressed;
            input.extend_solenoid_pressed |= f.extend_solenoid_pressed;
            input.toggle_compressor_pressed |= f.toggle_compressor_pressed;
            input.throttle_axis = f.throttle_axis;
            input.velocity_axis = f.velocity_axis;

            self.frames.pop_front();
        }

        self.held = input.without_presses();
        self.clock_s += self.cycle_period_s;

        Some(input)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    const SCRIPT: &str = "
        0.0 : {\"throttleAxis\": 0.5};
        0.1 : {\"bPressed\": true, \"throttleAxis\": 0.5};
        0.2 : {\"disablePressed\": true};
    ";

    #[test]
    fn test_presses_once_axes_held() {
        let mut interp = ScriptInterpreter::from_script(SCRIPT, 0.05).unwrap();
        assert_eq!(interp.get_num_frames(), 3);
        assert_eq!(interp.get_duration(), 0.2);

        // t = 0.0
        let i = interp.poll().unwrap();
        assert_eq!(i.throttle_axis, 0.5);
        assert!(!i.b_pressed);

        // t = 0.05, axis held
        let i = interp.poll().unwrap();
        assert_eq!(i.throttle_axis, 0.5);

        // t = 0.1, press delivered
        let i = interp.poll().unwrap();
        assert!(i.b_pressed);

        // t = 0.15, press not repeated
        let i = interp.poll().unwrap();
        assert!(!i.b_pressed);
        assert_eq!(i.throttle_axis, 0.5);

        // Drain until the end of the script
        let mut saw_disable = false;
        while let Some(i) = interp.poll() {
            saw_disable |= i.disable_pressed;
        }
        assert!(saw_disable);
        assert!(interp.poll().is_none());
    }

    #[test]
    fn test_coarse_cycle_merges_frames() {
        let mut interp = ScriptInterpreter::from_script(SCRIPT, 1.0).unwrap();

        let i = interp.poll().unwrap();
        assert!(!i.b_pressed);

        let i = interp.poll().unwrap();
        assert!(i.b_pressed);
        assert!(i.disable_pressed);
        assert_eq!(i.throttle_axis, 0.0);

        assert!(interp.poll().is_none());
    }

    #[test]
    fn test_pneumatic_presses_merged() {
        let script = "
            0.00 : {\"extendSolenoidPressed\": true};
            0.01 : {\"toggleCompressorPressed\": true};
        ";
        let mut interp = ScriptInterpreter::from_script(script, 0.05).unwrap();

        let i = interp.poll().unwrap();
        assert!(i.extend_solenoid_pressed);
        assert!(!i.toggle_compressor_pressed);

        let i = interp.poll().unwrap();
        assert!(!i.extend_solenoid_pressed);
        assert!(i.toggle_compressor_pressed);
    }

    #[test]
    fn test_invalid_scripts() {
        assert!(matches!(
            ScriptInterpreter::from_script("nothing here", 0.02),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::from_script("1.0 : {\"throttleAxis\": \"fast\"};", 0.02),
            Err(ScriptError::InvalidFrame(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::from_script("1.0 : {\"velocityAxis\": 2.0};", 0.02),
            Err(ScriptError::AxisOutOfRange(_))
        ));
        assert!(matches!(
            ScriptInterpreter::from_script("2.0 : {};\n1.0 : {};", 0.02),
            Err(ScriptError::OutOfOrder(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::from_script(SCRIPT, 0.0),
            Err(ScriptError::InvalidCyclePeriod(_))
        ));
        assert!(matches!(
            ScriptInterpreter::from_script(SCRIPT, f64::INFINITY),
            Err(ScriptError::InvalidCyclePeriod(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.pis");

        assert!(matches!(
            ScriptInterpreter::new(&path, 0.02),
            Err(ScriptError::ScriptNotFound(_))
        ));

        let mut file = fs::File::create(&path).unwrap();
        file.write_all(SCRIPT.as_bytes()).unwrap();
        drop(file);

        let interp = ScriptInterpreter::new(&path, 0.02).unwrap();
        assert_eq!(interp.get_num_frames(), 3);
    }
}
