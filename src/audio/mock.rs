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
use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use crate::{audio::PlaybackError, playsync::PlaybackSignal, synth::SampleBuffer};

/// How a mock device misbehaves.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Behavior {
    /// Plays for the duration of the buffer.
    Normal,
    /// Refuses to open.
    Unavailable,
    /// Fails halfway through the buffer.
    FailMidStream,
}

/// A mock device. Doesn't actually play anything, but takes as long as the buffer would.
#[derive(Clone)]
pub struct Device {
    name: String,
    behavior: Behavior,
    current: Arc<Mutex<Option<PlaybackSignal>>>,
    starts: Arc<AtomicUsize>,
    /// The number of playback threads that haven't exited yet.
    running: Arc<AtomicUsize>,
}

impl Device {
    /// Gets the given mock device. Names containing "unavailable" refuse to open and names
    /// containing "failing" fail partway through playback.
    pub fn get(name: &str) -> Device {
        let behavior = if name.contains("unavailable") {
            Behavior::Unavailable
        } else if name.contains("failing") {
            Behavior::FailMidStream
        } else {
            Behavior::Normal
        };

        Device {
            name: name.to_string(),
            behavior,
            current: Arc::new(Mutex::new(None)),
            starts: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns true if the device is currently playing.
    pub fn is_playing(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|signal| !signal.is_resolved())
    }

    /// Returns the number of playbacks the device has started.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    /// Returns the number of playback threads still running.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }
}

impl crate::audio::Device for Device {
    /// A mock device that waits for the duration of the buffer before finishing.
    fn start(&self, buffer: SampleBuffer, signal: PlaybackSignal) -> Result<(), PlaybackError> {
        let span = span!(Level::INFO, "start playback (mock)");
        let _enter = span.enter();

        if self.behavior == Behavior::Unavailable {
            return Err(PlaybackError::DeviceUnavailable(self.name.clone()));
        }

        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|signal| !signal.is_resolved()) {
            return Err(PlaybackError::DeviceBusy(self.name.clone()));
        }

        info!(
            device = self.name,
            waveform = buffer.kind().name(),
            duration = format!("{:?}", buffer.duration()),
            "Playing buffer."
        );

        *current = Some(signal.clone());
        self.starts.fetch_add(1, Ordering::Relaxed);

        let behavior = self.behavior;
        let duration = buffer.duration();
        let running = self.running.clone();
        running.fetch_add(1, Ordering::AcqRel);
        thread::spawn(move || {
            // Returns early once the signal is cancelled.
            if behavior == Behavior::FailMidStream {
                if signal.wait_timeout(duration / 2).is_none() {
                    signal.fail(PlaybackError::Stream("mock device failure".to_string()));
                }
            } else if signal.wait_timeout(duration).is_none() {
                signal.finish();
            }
            running.fetch_sub(1, Ordering::AcqRel);
        });

        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
