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
use serde::Deserialize;

use super::{parse_seconds, ConfigError};
use crate::audio::DEFAULT_DEVICE;
use crate::synth::{
    SynthesisParameters, SynthesisRequest, WaveformKind, DEFAULT_AMPLITUDE, DEFAULT_DURATION,
    DEFAULT_FREQUENCY, DEFAULT_SAMPLE_RATE,
};

/// A YAML representation of the synthesizer settings. Every field is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Settings {
    /// The audio device to play through (default: the system default output).
    device: Option<String>,

    /// Sample rate in Hz for generated buffers (default: 44100)
    sample_rate: Option<u32>,

    /// Frequency in Hz for generated waveforms (default: 1000)
    frequency: Option<f64>,

    /// The waveform generated when none is given (default: sine)
    waveform: Option<WaveformKind>,

    /// Clip length, either a number of seconds or a duration string such as "1500ms" (default: 2s)
    duration: Option<String>,

    /// Peak amplitude between 0 and 1 (default: 0.5)
    amplitude: Option<f64>,

    /// Start playback as soon as a waveform is generated (default: false)
    autoplay: Option<bool>,
}

impl Settings {
    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the frequency (default: 1000)
    pub fn frequency(&self) -> f64 {
        self.frequency.unwrap_or(DEFAULT_FREQUENCY)
    }

    pub fn waveform(&self) -> WaveformKind {
        self.waveform.unwrap_or_default()
    }

    /// Returns the clip length in seconds (default: 2)
    pub fn duration(&self) -> Result<f64, ConfigError> {
        match &self.duration {
            Some(duration) => parse_seconds(duration),
            None => Ok(DEFAULT_DURATION),
        }
    }

    /// Returns the amplitude (default: 0.5)
    pub fn amplitude(&self) -> f64 {
        self.amplitude.unwrap_or(DEFAULT_AMPLITUDE)
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay.unwrap_or(false)
    }

    /// Builds the synthesis request used when the user doesn't override anything.
    pub fn request(&self) -> Result<SynthesisRequest, ConfigError> {
        Ok(SynthesisRequest {
            kind: self.waveform(),
            duration: self.duration()?,
            amplitude: self.amplitude(),
            frequency: self.frequency(),
            sample_rate: self.sample_rate(),
        })
    }

    /// Checks that the defaults describe a buffer that can actually be generated.
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        SynthesisParameters::try_from(self.request()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;
    use crate::synth::Parameter;

    fn parse(yaml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_settings_defaults() {
        let settings = parse("{}");

        assert_eq!("default", settings.device());
        assert_eq!(44100, settings.sample_rate());
        assert_eq!(1000.0, settings.frequency());
        assert_eq!(WaveformKind::Sine, settings.waveform());
        assert_eq!(2.0, settings.duration().unwrap());
        assert_eq!(0.5, settings.amplitude());
        assert!(!settings.autoplay());
        assert_eq!(SynthesisRequest::default(), settings.request().unwrap());
    }

    #[test]
    fn test_settings_deserialize() {
        let settings = parse(
            r#"
            device: mock-device
            sample_rate: 48000
            frequency: 440
            waveform: saw
            duration: 1500ms
            amplitude: 0.25
            autoplay: true
        "#,
        );

        assert_eq!("mock-device", settings.device());
        assert_eq!(48000, settings.sample_rate());
        assert_eq!(440.0, settings.frequency());
        assert_eq!(WaveformKind::Sawtooth, settings.waveform());
        assert_eq!(1.5, settings.duration().unwrap());
        assert_eq!(0.25, settings.amplitude());
        assert!(settings.autoplay());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_numeric_duration() {
        let settings = parse("duration: 0.75");
        assert_eq!(0.75, settings.duration().unwrap());
    }

    #[test]
    fn test_settings_invalid_values() {
        let settings = parse("amplitude: 1.5");
        match settings.validate() {
            Err(ConfigError::Synthesis(err)) => assert_eq!(Some(Parameter::Amplitude), err.field()),
            other => panic!("unexpected result {:?}", other),
        }

        let settings = parse("duration: forever");
        assert!(matches!(
            settings.duration(),
            Err(ConfigError::Duration(value, _)) if value == "forever"
        ));

        let result: Result<Settings, _> = Config::builder()
            .add_source(File::from_str("waveform: pulse", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize();
        assert!(result.is_err());
    }
}
