//! Generic parameters functions
//!
//! Parameter files may be either JSON (`.json`) or TOML (`.toml`), the format
//! is chosen from the file extension.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, read_to_string};
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (PID_TUNER_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the TOML parameter file: {0}")]
    DeserialiseError(toml::de::Error),

    #[error("Cannot read the JSON parameter file: {0}")]
    JsonDeserialiseError(serde_json::Error),

    #[error("Unsupported parameter file extension {0:?}, expected json or toml")]
    UnsupportedExtension(Option<String>)
}

/// An error that occurs while writing a parameter file.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Cannot create the parameter directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("Cannot serialise the parameters: {0}")]
    SerialiseError(String),

    #[error("Cannot write the parameter file: {0}")]
    FileWriteError(std::io::Error),

    #[error("Unsupported parameter file extension {0:?}, expected json or toml")]
    UnsupportedExtension(Option<String>)
}

/// Supported parameter file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the "$PID_TUNER_ROOT/params" directory
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError> 
where
    P: DeserializeOwned
{
    load_path(params_dir()?.join(param_file_path))
}

/// Load a parameter file from an explicit path.
pub fn load_path<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>
{
    let format = format_of(path.as_ref())
        .ok_or_else(|| LoadError::UnsupportedExtension(extension_of(path.as_ref())))?;

    // Load the file into a string
    let params_str = read_to_string(path.as_ref())
        .map_err(LoadError::FileLoadError)?;

    // Parse the string into the parameter struct
    match format {
        Format::Json => serde_json::from_str(&params_str)
            .map_err(LoadError::JsonDeserialiseError),
        Format::Toml => toml::from_str(&params_str)
            .map_err(LoadError::DeserialiseError)
    }
}

/// Load a parameter file, falling back to the default parameters if the file
/// is missing or cannot be parsed.
///
/// When falling back the defaults are written to `path` so that they can be
/// edited for the next run. Failing to write the defaults is only a warning.
pub fn load_or_default<P, F>(path: F) -> P
where
    P: DeserializeOwned + Serialize + Default,
    F: AsRef<Path>
{
    let path = path.as_ref();

    match load_path(path) {
        Ok(p) => p,
        Err(LoadError::FileLoadError(e)) 
            if e.kind() == std::io::ErrorKind::NotFound => 
        {
            warn!("No parameter file found at {:?}, writing defaults", path);
            save_defaults(path)
        },
        Err(e) => {
            warn!("Could not load parameters from {:?}: {}", path, e);
            warn!("Falling back to default parameters");
            save_defaults(path)
        }
    }
}

/// Save the parameters into the given path.
///
/// Parent directories are created if they do not exist.
pub fn save_path<P, F>(params: &P, path: F) -> Result<(), SaveError>
where
    P: Serialize,
    F: AsRef<Path>
{
    let path = path.as_ref();

    let format = format_of(path)
        .ok_or_else(|| SaveError::UnsupportedExtension(extension_of(path)))?;

    let params_str = match format {
        Format::Json => serde_json::to_string_pretty(params)
            .map_err(|e| SaveError::SerialiseError(e.to_string()))?,
        Format::Toml => toml::to_string_pretty(params)
            .map_err(|e| SaveError::SerialiseError(e.to_string()))?
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(SaveError::CannotCreateDir)?;
    }

    fs::write(path, params_str).map_err(SaveError::FileWriteError)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn params_dir() -> Result<PathBuf, LoadError> {
    let mut path = crate::host::get_sw_root()
        .map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    Ok(path)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_string())
}

fn format_of(path: &Path) -> Option<Format> {
    match extension_of(path).as_deref() {
        Some("json") => Some(Format::Json),
        Some("toml") => Some(Format::Toml),
        _ => None
    }
}

fn save_defaults<P>(path: &Path) -> P
where
    P: Serialize + Default
{
    let defaults = P::default();

    match save_path(&defaults, path) {
        Ok(_) => info!("Wrote default parameters to {:?}", path),
        Err(e) => warn!("Could not write default parameters to {:?}: {}", path, e)
    }

    defaults
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Dummy {
        gain: f64,
        name: String
    }

    #[test]
    fn test_load_json_and_toml() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("dummy.json");
        fs::write(&json_path, r#"{ "gain": 1.5, "name": "arm" }"#).unwrap();
        let p: Dummy = load_path(&json_path).unwrap();
        assert_eq!(p, Dummy { gain: 1.5, name: "arm".into() });

        let toml_path = dir.path().join("dummy.toml");
        fs::write(&toml_path, "gain = 2.0\nname = \"lift\"\n").unwrap();
        let p: Dummy = load_path(&toml_path).unwrap();
        assert_eq!(p, Dummy { gain: 2.0, name: "lift".into() });
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dummy.yaml");
        fs::write(&path, "gain: 1.0").unwrap();

        match load_path::<Dummy, _>(&path) {
            Err(LoadError::UnsupportedExtension(Some(e))) => assert_eq!(e, "yaml"),
            r => panic!("Expected unsupported extension, got {:?}", r)
        }
    }

    #[test]
    fn test_load_or_default_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dummy.json");

        let p: Dummy = load_or_default(&path);
        assert_eq!(p, Dummy::default());
        assert!(path.exists());

        // Defaults written on the first call can be read back
        let p: Dummy = load_path(&path).unwrap();
        assert_eq!(p, Dummy::default());
    }

    #[test]
    fn test_load_or_default_on_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dummy.json");
        fs::write(&path, "{ not json").unwrap();

        let p: Dummy = load_or_default(&path);
        assert_eq!(p, Dummy::default());
    }
}
