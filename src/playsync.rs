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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::{Condvar, Mutex};

use crate::audio::PlaybackError;

/// How a single playback ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The device reached the end of the buffer.
    Finished,
    /// Playback was halted before the end of the buffer.
    Cancelled,
    /// The device failed while playing.
    Failed(PlaybackError),
}

/// A playback signal is shared between the transport and the device for one playback. It
/// resolves exactly once: whichever of finish, cancel or fail happens first wins and later calls
/// are ignored.
#[derive(Clone)]
pub struct PlaybackSignal {
    outcome: Arc<Mutex<Option<Outcome>>>,
    condvar: Arc<Condvar>,
    /// Mirrors of the outcome that can be read without locking, e.g. from an audio callback.
    resolved: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl PlaybackSignal {
    /// Creates a new, unresolved playback signal.
    pub fn new() -> PlaybackSignal {
        PlaybackSignal {
            outcome: Arc::new(Mutex::new(None)),
            condvar: Arc::new(Condvar::new()),
            resolved: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marks the playback as having reached the end of its buffer.
    pub fn finish(&self) -> bool {
        self.resolve(Outcome::Finished)
    }

    /// Requests that the playback stop. Devices are expected to watch for this.
    pub fn cancel(&self) -> bool {
        self.resolve(Outcome::Cancelled)
    }

    /// Marks the playback as having failed.
    pub fn fail(&self, err: PlaybackError) -> bool {
        self.resolve(Outcome::Failed(err))
    }

    /// Returns true if the playback was cancelled. Never blocks.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns true once the signal has been resolved in any way. Never blocks.
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// Blocks until the signal resolves and returns how the playback ended.
    pub fn wait(&self) -> Outcome {
        let mut outcome = self.outcome.lock();
        self.condvar.wait_while(&mut outcome, |outcome| outcome.is_none());
        outcome.clone().unwrap_or(Outcome::Cancelled)
    }

    /// Blocks until the signal resolves or the timeout passes. Returns None on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        let mut outcome = self.outcome.lock();
        self.condvar
            .wait_while_for(&mut outcome, |outcome| outcome.is_none(), timeout);
        outcome.clone()
    }

    /// Returns true if this call resolved the signal.
    fn resolve(&self, resolution: Outcome) -> bool {
        let mut outcome = self.outcome.lock();
        if outcome.is_some() {
            return false;
        }
        if resolution == Outcome::Cancelled {
            self.cancelled.store(true, Ordering::Release);
        }
        *outcome = Some(resolution);
        self.resolved.store(true, Ordering::Release);
        self.condvar.notify_all();
        true
    }
}

impl Default for PlaybackSignal {
    fn default() -> Self {
        Self::new()
    }
}
