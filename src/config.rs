// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{path::Path, time::Duration};

use ::config::{Config, Environment, File, FileFormat};
use duration_string::DurationString;
use tracing::info;

mod error;
mod settings;

pub use error::ConfigError;
pub use settings::Settings;

/// Environment variables with this prefix override settings, e.g. SIGSYNTH_FREQUENCY=440.
pub const ENV_PREFIX: &str = "SIGSYNTH";

/// Loads settings from the given YAML file, if any, with environment overrides on top.
pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        info!(path = path.display().to_string(), "Loading settings.");
        builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
    }

    let settings: Settings = builder
        .add_source(Environment::with_prefix(ENV_PREFIX))
        .build()?
        .try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

/// Parses a number of seconds, either as a bare number ("1.5") or as a duration string
/// ("1500ms", "2s").
pub fn parse_seconds(value: &str) -> Result<f64, ConfigError> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        return Ok(seconds);
    }

    let duration: Duration = DurationString::from_string(value.to_string())
        .map_err(|e| ConfigError::Duration(value.to_string(), e.to_string()))?
        .into();
    Ok(duration.as_secs_f64())
}

#[cfg(test)]
mod test {
    use std::{env, fs};

    use serial_test::serial;

    use super::*;
    use crate::synth::WaveformKind;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(1.5, parse_seconds("1.5").unwrap());
        assert_eq!(1.5, parse_seconds("1500ms").unwrap());
        assert_eq!(2.0, parse_seconds(" 2s ").unwrap());
        assert_eq!(-1.0, parse_seconds("-1").unwrap());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    #[serial]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigsynth.yaml");
        fs::write(&path, "device: mock-device\nwaveform: triangle\nduration: 250ms\n").unwrap();

        let settings = load(Some(&path)).unwrap();
        assert_eq!("mock-device", settings.device());
        assert_eq!(WaveformKind::Triangle, settings.waveform());
        assert_eq!(0.25, settings.duration().unwrap());
    }

    #[test]
    #[serial]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(Some(&dir.path().join("missing.yaml"))),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    #[serial]
    fn test_load_environment_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigsynth.yaml");
        fs::write(&path, "frequency: 220\namplitude: 0.3\n").unwrap();

        env::set_var("SIGSYNTH_FREQUENCY", "440");
        let result = load(Some(&path));
        env::remove_var("SIGSYNTH_FREQUENCY");

        let settings = result.unwrap();
        assert_eq!(440.0, settings.frequency());
        assert_eq!(0.3, settings.amplitude());
    }

    #[test]
    #[serial]
    fn test_load_rejects_invalid_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigsynth.yaml");
        fs::write(&path, "frequency: 0\n").unwrap();

        assert!(matches!(
            load(Some(&path)),
            Err(ConfigError::Synthesis(_))
        ));
    }
}
