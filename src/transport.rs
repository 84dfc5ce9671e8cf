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
use std::{fmt, sync::Arc, thread};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, span, Level, Span};

use crate::{
    audio::{self, PlaybackError},
    playsync::{Outcome, PlaybackSignal},
    synth::{self, SampleBuffer, SynthError, SynthesisParameters, SynthesisRequest, WaveformKind},
};

/// Errors returned by transport commands.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Synth(#[from] SynthError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// The playback state of the transport. Every state other than idle holds the most recently
/// generated buffer.
#[derive(Debug, Clone)]
pub enum TransportState {
    /// Nothing has been generated yet.
    Idle,
    /// A buffer is loaded and can be played. `finished` is set when the previous playback ran to
    /// the end of the buffer.
    Ready { buffer: SampleBuffer, finished: bool },
    /// The device is playing the buffer as the given attempt.
    Playing { buffer: SampleBuffer, attempt: u64 },
    /// Playback was halted before the end of the buffer.
    Stopped { buffer: SampleBuffer },
}

impl TransportState {
    /// Returns the loaded buffer, if any.
    pub fn buffer(&self) -> Option<&SampleBuffer> {
        match self {
            TransportState::Idle => None,
            TransportState::Ready { buffer, .. }
            | TransportState::Playing { buffer, .. }
            | TransportState::Stopped { buffer } => Some(buffer),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            TransportState::Idle => Status::Idle,
            TransportState::Ready {
                finished: false, ..
            } => Status::Ready,
            TransportState::Ready { finished: true, .. } => Status::Finished,
            TransportState::Playing { .. } => Status::Playing,
            TransportState::Stopped { .. } => Status::Stopped,
        }
    }
}

/// The status label shown to the user. Finished behaves exactly like ready and differs only in
/// how it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Ready,
    Playing,
    Stopped,
    Finished,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Idle => "idle",
            Status::Ready => "ready",
            Status::Playing => "playing",
            Status::Stopped => "stopped",
            Status::Finished => "finished",
        })
    }
}

/// Notifications published to transport subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A new buffer was installed.
    Loaded { kind: WaveformKind, samples: usize },
    /// Playback began.
    Started { attempt: u64 },
    /// Playback was halted before the end of the buffer.
    Stopped { attempt: u64 },
    /// Playback reached the end of the buffer.
    Finished { attempt: u64 },
    /// The device failed during playback.
    Failed { attempt: u64, error: PlaybackError },
}

/// Reported by the background wait for each playback attempt once the device is done with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub attempt: u64,
    pub outcome: Outcome,
}

const EVENT_CAPACITY: usize = 32;

/// Owns the current buffer and the output device. At most one buffer plays at a time, and all
/// state changes happen through `&mut self`, so the owner of the transport is the only writer.
/// Background waits never touch the state; they post a [Completion] that the owner applies
/// with [Transport::handle_completion].
pub struct Transport {
    /// The device to play audio through.
    device: Arc<dyn audio::Device>,
    /// The current playback state.
    state: TransportState,
    /// The signal for the playing attempt, if any.
    active: Option<PlaybackSignal>,
    /// The identifier the next playback attempt will get.
    next_attempt: u64,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    events: broadcast::Sender<TransportEvent>,
    /// The logging span.
    span: Span,
}

impl Transport {
    /// Creates a new, idle transport for the given device.
    pub fn new(device: Arc<dyn audio::Device>) -> Transport {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Transport {
            device,
            state: TransportState::Idle,
            active: None,
            next_attempt: 1,
            completion_tx,
            completion_rx,
            events,
            span: span!(Level::INFO, "transport"),
        }
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    /// Returns the loaded buffer, if any.
    pub fn buffer(&self) -> Option<&SampleBuffer> {
        self.state.buffer()
    }

    /// Subscribes to transport events.
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    /// Validates the request, generates a buffer and loads it. On failure nothing changes.
    pub fn generate_and_load(
        &mut self,
        request: SynthesisRequest,
    ) -> Result<SampleBuffer, TransportError> {
        let params = SynthesisParameters::try_from(request).inspect_err(|e| {
            let _enter = self.span.enter();
            info!(err = e.to_string(), "Rejected synthesis request.");
        })?;

        let buffer = synth::generate(params);
        self.set_buffer(buffer.clone());
        Ok(buffer)
    }

    /// Installs a new buffer, replacing the previous one. Any playback in progress is stopped
    /// first and the new buffer is not played automatically.
    pub fn set_buffer(&mut self, buffer: SampleBuffer) {
        let _enter = self.span.clone().entered();

        self.halt();

        info!(
            waveform = buffer.kind().name(),
            samples = buffer.len(),
            "Loaded buffer."
        );
        self.emit(TransportEvent::Loaded {
            kind: buffer.kind(),
            samples: buffer.len(),
        });
        self.state = TransportState::Ready {
            buffer,
            finished: false,
        };
    }

    /// Starts playing the loaded buffer and returns the attempt identifier. Returns immediately;
    /// completion is reported through [Transport::next_completion]. If something is already
    /// playing, it is stopped before the new attempt starts.
    pub fn play(&mut self) -> Result<u64, TransportError> {
        let _enter = self.span.clone().entered();

        let buffer = match self.state.buffer() {
            Some(buffer) => buffer.clone(),
            None => {
                info!("Nothing to play.");
                return Err(PlaybackError::NothingToPlay.into());
            }
        };

        self.halt();

        let attempt = self.next_attempt;
        self.next_attempt += 1;

        let signal = PlaybackSignal::new();
        if let Err(e) = self.device.start(buffer.clone(), signal.clone()) {
            error!(
                err = e.to_string(),
                device = self.device.to_string(),
                attempt,
                "Unable to start playback."
            );
            return Err(e.into());
        }

        {
            let signal = signal.clone();
            let completion_tx = self.completion_tx.clone();
            thread::spawn(move || {
                let outcome = signal.wait();
                // The transport may already be gone, in which case nobody cares.
                let _ = completion_tx.send(Completion { attempt, outcome });
            });
        }

        info!(
            attempt,
            waveform = buffer.kind().name(),
            duration = format!("{:?}", buffer.duration()),
            "Playback started."
        );
        self.active = Some(signal);
        self.state = TransportState::Playing { buffer, attempt };
        self.emit(TransportEvent::Started { attempt });

        Ok(attempt)
    }

    /// Stops playback if something is playing. Does nothing otherwise.
    pub fn stop(&mut self) {
        let _enter = self.span.clone().entered();

        if !self.halt() {
            debug!(status = self.status().to_string(), "Nothing to stop.");
        }
    }

    /// Waits for the next completion posted by a background playback wait.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completion_rx.recv().await
    }

    /// Returns a completion if one is waiting, without blocking.
    pub fn try_next_completion(&mut self) -> Option<Completion> {
        self.completion_rx.try_recv().ok()
    }

    /// Applies a completion. Completions for anything other than the playing attempt are stale
    /// and ignored. Returns the event published for the change, or None if nothing changed.
    pub fn handle_completion(&mut self, completion: Completion) -> Option<TransportEvent> {
        let _enter = self.span.clone().entered();

        let buffer = match &self.state {
            TransportState::Playing { buffer, attempt } if *attempt == completion.attempt => {
                buffer.clone()
            }
            _ => {
                debug!(
                    attempt = completion.attempt,
                    status = self.status().to_string(),
                    "Ignoring stale completion."
                );
                return None;
            }
        };

        self.active = None;
        let attempt = completion.attempt;
        let event = match completion.outcome {
            Outcome::Finished => {
                info!(attempt, "Playback finished.");
                self.state = TransportState::Ready {
                    buffer,
                    finished: true,
                };
                TransportEvent::Finished { attempt }
            }
            Outcome::Cancelled => {
                info!(attempt, "Playback halted by the device.");
                self.state = TransportState::Stopped { buffer };
                TransportEvent::Stopped { attempt }
            }
            Outcome::Failed(error) => {
                error!(attempt, err = error.to_string(), "Playback failed.");
                self.state = TransportState::Stopped { buffer };
                TransportEvent::Failed { attempt, error }
            }
        };
        self.emit(event.clone());
        Some(event)
    }

    /// Applies completions until nothing is playing. Returns the event that ended playback, or
    /// None if nothing was playing.
    pub async fn wait_until_idle(&mut self) -> Option<TransportEvent> {
        let mut last = None;
        while matches!(self.state, TransportState::Playing { .. }) {
            match self.next_completion().await {
                Some(completion) => {
                    if let Some(event) = self.handle_completion(completion) {
                        last = Some(event);
                    }
                }
                None => break,
            }
        }
        last
    }

    /// Cancels the playing attempt and moves to stopped. Returns false if nothing was playing.
    fn halt(&mut self) -> bool {
        let (buffer, attempt) = match &self.state {
            TransportState::Playing { buffer, attempt } => (buffer.clone(), *attempt),
            _ => return false,
        };

        // Drop the attempt before cancelling so its completion is already stale when it lands.
        if let Some(signal) = self.active.take() {
            signal.cancel();
        }
        info!(attempt, "Stopping playback.");
        self.state = TransportState::Stopped { buffer };
        self.emit(TransportEvent::Stopped { attempt });
        true
    }

    fn emit(&self, event: TransportEvent) {
        // Sending only fails when nobody is subscribed.
        let _ = self.events.send(event);
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(signal) = self.active.take() {
            signal.cancel();
        }
    }
}
