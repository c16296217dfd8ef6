//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Environment variable pointing at the root of the tuner's software tree.
pub const SW_ROOT_ENV_VAR: &str = "PID_TUNER_ROOT";

/// Get the root directory of the tuner software, as given by the
/// `PID_TUNER_ROOT` environment variable.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
