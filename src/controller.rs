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
use std::error::Error;
use std::io;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Instrument, Level};

use crate::config::Settings;
use crate::synth::{preview::PreviewWindow, SampleBuffer, SynthesisRequest, WaveformKind};
use crate::transport::{Completion, Status, Transport, TransportError, TransportEvent};

pub mod keyboard;

const PREVIEW_WIDTH: usize = 72;
const PREVIEW_HEIGHT: usize = 11;

/// Controller events that will trigger behavior in the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Generates and loads a new buffer. Anything left unset falls back to the configured
    /// defaults. Stops playback if something is playing.
    Generate {
        kind: Option<WaveformKind>,
        duration: Option<f64>,
        amplitude: Option<f64>,
        frequency: Option<f64>,
    },

    /// Plays the loaded buffer, restarting it if it is already playing.
    Play,

    /// Stops the playing buffer. If nothing is playing, does nothing.
    Stop,

    /// Prints the current status.
    Status,

    /// Prints a preview of the start of the loaded buffer.
    Preview,

    /// Stops playback and shuts the controller down.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// What the controller last reported to the user.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The transport status.
    pub status: Status,
    /// The loaded buffer, if any.
    pub buffer: Option<SampleBuffer>,
    /// The error from the most recent event or playback, if it failed.
    pub error: Option<TransportError>,
    /// The number of driver events handled so far.
    pub handled: u64,
}

/// What woke the controller up.
enum Wakeup {
    Event(Option<Event>),
    Completion(Option<Completion>),
}

/// Drives a transport from a driver's events.
pub struct Controller {
    handle: JoinHandle<()>,
    snapshot: watch::Receiver<Snapshot>,
}

impl Controller {
    /// Creates a new controller with the given driver. The controller takes ownership of the
    /// transport.
    pub fn new(
        transport: Transport,
        driver: Arc<dyn Driver>,
        settings: Settings,
    ) -> Result<Controller, Box<dyn Error>> {
        let defaults = settings.request()?;
        let (snapshot_tx, snapshot) = watch::channel(Snapshot {
            status: transport.status(),
            buffer: transport.buffer().cloned(),
            error: None,
            handled: 0,
        });
        let span = span!(Level::INFO, "controller");

        Ok(Controller {
            handle: tokio::spawn(
                Controller::trigger_events(
                    transport,
                    driver,
                    defaults,
                    settings.autoplay(),
                    snapshot_tx,
                )
                .instrument(span),
            ),
            snapshot,
        })
    }

    /// Returns the transport status as of the last handled event.
    pub fn status(&self) -> Status {
        self.snapshot.borrow().status
    }

    /// Returns everything the controller reported as of the last handled event.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers transport commands by watching the driver and getting events from it, and
    /// applies playback completions as they arrive.
    async fn trigger_events(
        mut transport: Transport,
        driver: Arc<dyn Driver>,
        defaults: SynthesisRequest,
        autoplay: bool,
        snapshot_tx: watch::Sender<Snapshot>,
    ) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(
            waveform = defaults.kind.name(),
            frequency = defaults.frequency,
            autoplay,
            "Controller started."
        );

        let mut handled = 0;
        let mut last_error: Option<TransportError> = None;
        loop {
            let wakeup = tokio::select! {
                event = events_rx.recv() => Wakeup::Event(event),
                completion = transport.next_completion() => Wakeup::Completion(completion),
            };

            let done = match wakeup {
                Wakeup::Completion(Some(completion)) => {
                    match transport.handle_completion(completion) {
                        Some(TransportEvent::Failed { error, .. }) => {
                            println!("Playback error: {}", error);
                            println!("Status: {}", transport.status());
                            last_error = Some(error.into());
                        }
                        Some(_) => println!("Status: {}", transport.status()),
                        None => {}
                    }
                    false
                }
                Wakeup::Completion(None) => false,
                Wakeup::Event(Some(Event::Quit)) => {
                    info!("Controller quitting.");
                    transport.stop();
                    handled += 1;
                    true
                }
                Wakeup::Event(Some(event)) => {
                    info!(event = format!("{:?}", event), "Received event.");
                    last_error =
                        Controller::apply(&mut transport, event, &defaults, autoplay).err();
                    handled += 1;
                    false
                }
                Wakeup::Event(None) => {
                    info!("Controller closing.");
                    transport.stop();
                    true
                }
            };

            let _ = snapshot_tx.send(Snapshot {
                status: transport.status(),
                buffer: transport.buffer().cloned(),
                error: last_error.clone(),
                handled,
            });

            if done {
                break;
            }
        }

        // Drivers finish on their own once they've sent quit or their sender has closed.
        if let Err(e) = join_handle.await {
            error!("Error waiting for event monitor to stop: {}", e);
        }
    }

    /// Applies a single event to the transport and reports the result to the user.
    fn apply(
        transport: &mut Transport,
        event: Event,
        defaults: &SynthesisRequest,
        autoplay: bool,
    ) -> Result<(), TransportError> {
        match event {
            Event::Generate {
                kind,
                duration,
                amplitude,
                frequency,
            } => {
                let request = SynthesisRequest {
                    kind: kind.unwrap_or(defaults.kind),
                    duration: duration.unwrap_or(defaults.duration),
                    amplitude: amplitude.unwrap_or(defaults.amplitude),
                    frequency: frequency.unwrap_or(defaults.frequency),
                    sample_rate: defaults.sample_rate,
                };
                let buffer = transport.generate_and_load(request).inspect_err(|e| {
                    error!(err = e.to_string(), "Unable to generate waveform.");
                    println!("Invalid input: {}", e);
                })?;
                println!(
                    "Generated {}: {} samples, peak {:.3}, rms {:.3}",
                    buffer.kind(),
                    buffer.len(),
                    buffer.peak(),
                    buffer.rms()
                );
                if autoplay {
                    Controller::play(transport)?;
                }
            }
            Event::Play => Controller::play(transport)?,
            Event::Stop => transport.stop(),
            Event::Status => println!("Status: {}", transport.status()),
            Event::Preview => match transport.buffer() {
                Some(buffer) => {
                    print!(
                        "{}",
                        PreviewWindow::new(buffer).render(PREVIEW_WIDTH, PREVIEW_HEIGHT)
                    )
                }
                None => println!("Nothing generated yet."),
            },
            // Handled by the event loop.
            Event::Quit => {}
        }
        Ok(())
    }

    fn play(transport: &mut Transport) -> Result<(), TransportError> {
        transport.play().inspect_err(|e| {
            error!(err = e.to_string(), "Unable to play.");
            println!("Playback error: {}", e);
        })?;
        if let Some(buffer) = transport.buffer() {
            println!("Playing {}...", buffer.kind());
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::{
        error::Error,
        io,
        sync::{Arc, Mutex},
    };

    use config::{Config, File, FileFormat};
    use tokio::{
        sync::mpsc::{self, Sender},
        task::JoinHandle,
    };

    use crate::{
        audio::{mock, PlaybackError},
        config::Settings,
        synth::{Parameter, SynthError, WaveformKind},
        testutil::eventually,
        transport::{Status, Transport, TransportError},
    };

    use super::{Controller, Driver, Event};

    /// A driver that forwards whatever the test sends it.
    struct TestDriver {
        events_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    }

    impl TestDriver {
        fn new() -> (Arc<TestDriver>, mpsc::UnboundedSender<Event>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(TestDriver {
                    events_rx: Mutex::new(Some(rx)),
                }),
                tx,
            )
        }
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let mut events_rx = self
                .events_rx
                .lock()
                .expect("failed to get lock")
                .take()
                .expect("driver monitored twice");
            tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    let quit = event == Event::Quit;
                    if events_tx.send(event).await.is_err() || quit {
                        break;
                    }
                }
                Ok(())
            })
        }
    }

    fn settings(yaml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    fn generate(kind: WaveformKind, duration: f64) -> Event {
        Event::Generate {
            kind: Some(kind),
            duration: Some(duration),
            amplitude: None,
            frequency: None,
        }
    }

    /// Waits until the controller has handled the given number of driver events.
    fn wait_for_handled(controller: &Controller, handled: u64) {
        eventually(
            || controller.snapshot().handled >= handled,
            &format!("Controller never handled {} events", handled),
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let (driver, events) = TestDriver::new();
        let device = Arc::new(mock::Device::get("mock-device"));
        let transport = Transport::new(device.clone());
        let mut controller = Controller::new(transport, driver, settings("{}"))?;

        // Nothing to play yet.
        events.send(Event::Play)?;
        events.send(Event::Status)?;
        events.send(Event::Preview)?;
        wait_for_handled(&controller, 3);
        let snapshot = controller.snapshot();
        assert_eq!(Status::Idle, snapshot.status);
        assert!(snapshot.buffer.is_none());
        assert_eq!(0, device.starts());
        assert!(!device.is_playing());

        // The play error was reported, but the later events succeeded.
        events.send(Event::Play)?;
        wait_for_handled(&controller, 4);
        assert_eq!(
            Some(TransportError::Playback(PlaybackError::NothingToPlay)),
            controller.snapshot().error
        );

        events.send(generate(WaveformKind::Square, 5.0))?;
        wait_for_handled(&controller, 5);
        let snapshot = controller.snapshot();
        assert_eq!(Status::Ready, snapshot.status);
        assert_eq!(None, snapshot.error);
        assert_eq!(
            Some(WaveformKind::Square),
            snapshot.buffer.map(|buffer| buffer.kind())
        );
        assert!(!device.is_playing());

        events.send(Event::Preview)?;
        events.send(Event::Play)?;
        wait_for_handled(&controller, 7);
        assert!(device.is_playing());
        assert_eq!(Status::Playing, controller.status());
        assert_eq!(1, device.starts());

        // Regenerating stops the old buffer and doesn't play the new one.
        events.send(generate(WaveformKind::Sawtooth, 5.0))?;
        wait_for_handled(&controller, 8);
        assert_eq!(Status::Ready, controller.status());
        eventually(|| !device.is_playing(), "Device never stopped playing");
        assert_eq!(1, device.starts());

        events.send(Event::Play)?;
        wait_for_handled(&controller, 9);
        assert!(device.is_playing());
        events.send(Event::Stop)?;
        wait_for_handled(&controller, 10);
        assert_eq!(Status::Stopped, controller.status());
        eventually(|| !device.is_playing(), "Device never stopped");

        events.send(Event::Quit)?;
        controller.join().await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_keeps_buffer_on_invalid_input() -> Result<(), Box<dyn Error>> {
        let (driver, events) = TestDriver::new();
        let device = Arc::new(mock::Device::get("mock-device"));
        let transport = Transport::new(device.clone());
        let mut controller = Controller::new(transport, driver, settings("autoplay: true"))?;

        // Autoplay starts the buffer as soon as it's generated.
        events.send(generate(WaveformKind::Sine, 0.1))?;
        eventually(
            || controller.status() == Status::Finished,
            "Controller never finished",
        );
        assert_eq!(1, device.starts());
        assert!(!device.is_playing());
        let before = controller.snapshot().buffer.expect("buffer should be loaded");

        events.send(Event::Generate {
            kind: Some(WaveformKind::Square),
            duration: Some(1.0),
            amplitude: Some(2.0),
            frequency: None,
        })?;
        events.send(generate(WaveformKind::Triangle, 1e15))?;
        wait_for_handled(&controller, 3);

        let snapshot = controller.snapshot();
        assert_eq!(Status::Finished, snapshot.status);
        assert_eq!(
            Some(TransportError::Synth(SynthError::InvalidParameter {
                field: Parameter::Duration,
                reason: "too long"
            })),
            snapshot.error
        );
        let after = snapshot.buffer.expect("buffer should still be loaded");
        assert!(after.ptr_eq(&before));
        assert_eq!(WaveformKind::Sine, after.kind());
        assert_eq!(4410, after.len());
        assert_eq!(1, device.starts());

        drop(events);
        controller.join().await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_reports_device_failure() -> Result<(), Box<dyn Error>> {
        let (driver, events) = TestDriver::new();
        let device = Arc::new(mock::Device::get("mock-failing"));
        let transport = Transport::new(device.clone());
        let mut controller = Controller::new(transport, driver, settings("{}"))?;

        events.send(generate(WaveformKind::Sine, 0.1))?;
        events.send(Event::Play)?;
        wait_for_handled(&controller, 2);
        eventually(
            || controller.status() == Status::Stopped,
            "Controller never noticed the failure",
        );

        let snapshot = controller.snapshot();
        assert_eq!(
            Some(TransportError::Playback(PlaybackError::Stream(
                "mock device failure".to_string()
            ))),
            snapshot.error
        );
        assert!(snapshot.buffer.is_some());

        events.send(Event::Quit)?;
        controller.join().await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller_quit_stops_playback() -> Result<(), Box<dyn Error>> {
        let (driver, events) = TestDriver::new();
        let device = Arc::new(mock::Device::get("mock-device"));
        let transport = Transport::new(device.clone());
        let mut controller = Controller::new(transport, driver, settings("{}"))?;

        events.send(generate(WaveformKind::Triangle, 5.0))?;
        events.send(Event::Play)?;
        eventually(|| device.is_playing(), "Device never started playing");

        events.send(Event::Quit)?;
        controller.join().await?;
        assert!(!device.is_playing());
        assert_eq!(Status::Stopped, controller.status());
        assert_eq!(3, controller.snapshot().handled);
        Ok(())
    }
}
