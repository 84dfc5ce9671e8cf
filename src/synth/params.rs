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
use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer};

use super::error::{Parameter, SynthError};

/// The sample rate every buffer is generated at unless configured otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_FREQUENCY: f64 = 1000.0;
pub const DEFAULT_DURATION: f64 = 2.0;
pub const DEFAULT_AMPLITUDE: f64 = 0.5;

/// The most samples a single buffer may hold, a little under 19 minutes at 44.1kHz.
pub const MAX_SAMPLES: usize = 50_000_000;

/// The closed set of waveforms the generator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WaveformKind {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
    WhiteNoise,
}

impl WaveformKind {
    /// All waveform kinds, in menu order.
    pub const ALL: [WaveformKind; 5] = [
        WaveformKind::Sine,
        WaveformKind::Square,
        WaveformKind::Sawtooth,
        WaveformKind::Triangle,
        WaveformKind::WhiteNoise,
    ];

    /// The short name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            WaveformKind::Sine => "sine",
            WaveformKind::Square => "square",
            WaveformKind::Sawtooth => "sawtooth",
            WaveformKind::Triangle => "triangle",
            WaveformKind::WhiteNoise => "noise",
        }
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WaveformKind::Sine => "Sine wave",
            WaveformKind::Square => "Square wave",
            WaveformKind::Sawtooth => "Sawtooth wave",
            WaveformKind::Triangle => "Triangle wave",
            WaveformKind::WhiteNoise => "White noise",
        })
    }
}

impl FromStr for WaveformKind {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sine" | "sin" => Ok(WaveformKind::Sine),
            "square" | "sq" => Ok(WaveformKind::Square),
            "sawtooth" | "saw" => Ok(WaveformKind::Sawtooth),
            "triangle" | "tri" => Ok(WaveformKind::Triangle),
            "noise" | "white-noise" | "white_noise" | "whitenoise" => Ok(WaveformKind::WhiteNoise),
            _ => Err(SynthError::UnknownWaveform(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for WaveformKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        WaveformKind::from_str(&name).map_err(serde::de::Error::custom)
    }
}

/// A validated request for one buffer of audio. Fields can't be changed after construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParameters {
    kind: WaveformKind,
    duration: f64,
    amplitude: f64,
    frequency: f64,
    sample_rate: u32,
}

impl SynthesisParameters {
    /// Creates a new set of parameters, rejecting any out of range value.
    pub fn new(
        kind: WaveformKind,
        duration: f64,
        amplitude: f64,
        frequency: f64,
        sample_rate: u32,
    ) -> Result<SynthesisParameters, SynthError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(SynthError::invalid(
                Parameter::Duration,
                "must be a positive number of seconds",
            ));
        }
        // NaN fails the range check as well.
        if !(0.0..=1.0).contains(&amplitude) {
            return Err(SynthError::invalid(
                Parameter::Amplitude,
                "must be between 0 and 1",
            ));
        }
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(SynthError::invalid(
                Parameter::Frequency,
                "must be a positive number of hertz",
            ));
        }
        if sample_rate == 0 {
            return Err(SynthError::invalid(
                Parameter::SampleRate,
                "must be greater than zero",
            ));
        }
        if sample_rate as f64 * duration > MAX_SAMPLES as f64 {
            return Err(SynthError::invalid(Parameter::Duration, "too long"));
        }

        Ok(SynthesisParameters {
            kind,
            duration,
            amplitude,
            frequency,
            sample_rate,
        })
    }

    /// Creates parameters at the default frequency and sample rate.
    pub fn with_defaults(
        kind: WaveformKind,
        duration: f64,
        amplitude: f64,
    ) -> Result<SynthesisParameters, SynthError> {
        SynthesisParameters::new(
            kind,
            duration,
            amplitude,
            DEFAULT_FREQUENCY,
            DEFAULT_SAMPLE_RATE,
        )
    }

    pub fn kind(&self) -> WaveformKind {
        self.kind
    }

    /// The clip length in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// The fundamental frequency in hertz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of samples a buffer for these parameters holds.
    pub fn sample_count(&self) -> usize {
        (self.sample_rate as f64 * self.duration).floor() as usize
    }
}

/// Unvalidated synthesis input, as typed by a user. Converting it into [SynthesisParameters]
/// performs validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisRequest {
    pub kind: WaveformKind,
    pub duration: f64,
    pub amplitude: f64,
    pub frequency: f64,
    pub sample_rate: u32,
}

impl SynthesisRequest {
    /// Creates a request for the given waveform at the default frequency and sample rate.
    pub fn new(kind: WaveformKind, duration: f64, amplitude: f64) -> SynthesisRequest {
        SynthesisRequest {
            kind,
            duration,
            amplitude,
            ..SynthesisRequest::default()
        }
    }
}

impl Default for SynthesisRequest {
    fn default() -> Self {
        SynthesisRequest {
            kind: WaveformKind::default(),
            duration: DEFAULT_DURATION,
            amplitude: DEFAULT_AMPLITUDE,
            frequency: DEFAULT_FREQUENCY,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl TryFrom<SynthesisRequest> for SynthesisParameters {
    type Error = SynthError;

    fn try_from(request: SynthesisRequest) -> Result<Self, Self::Error> {
        SynthesisParameters::new(
            request.kind,
            request.duration,
            request.amplitude,
            request.frequency,
            request.sample_rate,
        )
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_waveform_kind_from_str() {
        assert_eq!(WaveformKind::Sine, WaveformKind::from_str("sine").unwrap());
        assert_eq!(WaveformKind::Sine, WaveformKind::from_str(" SIN ").unwrap());
        assert_eq!(WaveformKind::Square, WaveformKind::from_str("sq").unwrap());
        assert_eq!(WaveformKind::Sawtooth, WaveformKind::from_str("Saw").unwrap());
        assert_eq!(WaveformKind::Triangle, WaveformKind::from_str("tri").unwrap());
        assert_eq!(
            WaveformKind::WhiteNoise,
            WaveformKind::from_str("white-noise").unwrap()
        );
        assert_eq!(
            Err(SynthError::UnknownWaveform("pulse".to_string())),
            WaveformKind::from_str("pulse")
        );
    }

    #[test]
    fn test_waveform_kind_names_parse_back() {
        for kind in WaveformKind::ALL {
            assert_eq!(kind, WaveformKind::from_str(kind.name()).unwrap());
        }
    }

    #[test]
    fn test_invalid_parameters() {
        let cases = [
            (0.0, 0.5, 440.0, Parameter::Duration),
            (-1.0, 0.5, 440.0, Parameter::Duration),
            (f64::NAN, 0.5, 440.0, Parameter::Duration),
            (1.0, 1.5, 440.0, Parameter::Amplitude),
            (1.0, -0.1, 440.0, Parameter::Amplitude),
            (1.0, f64::NAN, 440.0, Parameter::Amplitude),
            (1.0, 0.5, 0.0, Parameter::Frequency),
            (1.0, 0.5, -20.0, Parameter::Frequency),
        ];

        for (duration, amplitude, frequency, field) in cases {
            let err = SynthesisParameters::new(
                WaveformKind::Sine,
                duration,
                amplitude,
                frequency,
                DEFAULT_SAMPLE_RATE,
            )
            .expect_err("parameters should be rejected");
            assert_eq!(Some(field), err.field(), "{:?}", (duration, amplitude));
        }

        let err = SynthesisParameters::new(WaveformKind::Sine, 1.0, 0.5, 440.0, 0)
            .expect_err("zero sample rate should be rejected");
        assert_eq!(Some(Parameter::SampleRate), err.field());
    }

    #[test]
    fn test_duration_too_long() {
        for duration in [1e15, 1e9, 3600.0] {
            let err = SynthesisParameters::with_defaults(WaveformKind::Sine, duration, 0.5)
                .expect_err("duration should be rejected");
            assert_eq!(
                SynthError::InvalidParameter {
                    field: Parameter::Duration,
                    reason: "too long"
                },
                err
            );
        }

        // Exactly at the limit is fine.
        let params = SynthesisParameters::new(WaveformKind::Sine, 1000.0, 0.5, 440.0, 50_000)
            .expect("limit should be accepted");
        assert_eq!(MAX_SAMPLES, params.sample_count());
    }

    #[test]
    fn test_amplitude_bounds_are_inclusive() {
        assert!(SynthesisParameters::with_defaults(WaveformKind::Sine, 1.0, 0.0).is_ok());
        assert!(SynthesisParameters::with_defaults(WaveformKind::Sine, 1.0, 1.0).is_ok());
    }

    #[test]
    fn test_request_defaults() {
        let params = SynthesisParameters::try_from(SynthesisRequest::default()).unwrap();
        assert_eq!(WaveformKind::Sine, params.kind());
        assert_eq!(DEFAULT_DURATION, params.duration());
        assert_eq!(DEFAULT_AMPLITUDE, params.amplitude());
        assert_eq!(DEFAULT_FREQUENCY, params.frequency());
        assert_eq!(DEFAULT_SAMPLE_RATE, params.sample_rate());

        let request = SynthesisRequest::new(WaveformKind::Triangle, 2.0, 1.5);
        assert_eq!(
            Some(Parameter::Amplitude),
            SynthesisParameters::try_from(request).unwrap_err().field()
        );
    }

    #[test]
    fn test_sample_count() {
        let params = SynthesisParameters::with_defaults(WaveformKind::Sine, 2.0, 0.5).unwrap();
        assert_eq!(88200, params.sample_count());

        let params = SynthesisParameters::new(WaveformKind::Sine, 0.55, 0.5, 1.0, 10).unwrap();
        assert_eq!(5, params.sample_count());
    }
}
