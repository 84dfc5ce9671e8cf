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
use std::{error::Error, fmt, sync::Arc};

use crate::playsync::PlaybackSignal;
use crate::synth::SampleBuffer;

pub mod cpal;
pub mod mock;

/// The name that selects the system's default output device.
pub const DEFAULT_DEVICE: &str = "default";

/// Errors raised while handing audio to an output device.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("nothing to play, generate a waveform first")]
    NothingToPlay,

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("audio device busy: {0}")]
    DeviceBusy(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
}

pub trait Device: fmt::Display + Send + Sync {
    /// Starts playing the given buffer at its own sample rate and returns once output has begun.
    /// The device resolves the signal when it reaches the end of the buffer or fails, and must
    /// halt output as soon as the signal is cancelled.
    fn start(&self, buffer: SampleBuffer, signal: PlaybackSignal) -> Result<(), PlaybackError>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, PlaybackError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(cpal::Device::get(name)?))
}
