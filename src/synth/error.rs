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
use std::fmt;

/// The synthesis parameter that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Duration,
    Amplitude,
    Frequency,
    SampleRate,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Parameter::Duration => "duration",
            Parameter::Amplitude => "amplitude",
            Parameter::Frequency => "frequency",
            Parameter::SampleRate => "sample rate",
        })
    }
}

/// Errors raised while validating parameters or synthesizing a buffer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthError {
    #[error("invalid {field}: {reason}")]
    InvalidParameter {
        field: Parameter,
        reason: &'static str,
    },

    #[error("unknown waveform '{0}'")]
    UnknownWaveform(String),
}

impl SynthError {
    pub(crate) fn invalid(field: Parameter, reason: &'static str) -> SynthError {
        SynthError::InvalidParameter { field, reason }
    }

    /// Returns the offending parameter if this is a validation failure.
    pub fn field(&self) -> Option<Parameter> {
        match self {
            SynthError::InvalidParameter { field, .. } => Some(*field),
            SynthError::UnknownWaveform(_) => None,
        }
    }
}
