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
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sigsynth::audio;
use sigsynth::config::{self, parse_seconds};
use sigsynth::controller::{keyboard, Controller};
use sigsynth::synth::{self, preview::PreviewWindow, SynthesisRequest, WaveformKind};
use sigsynth::transport::{Transport, TransportEvent};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A waveform synthesizer for test signals."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

/// The waveform parameters shared by the one-shot commands.
#[derive(clap::Args)]
struct Waveform {
    /// The waveform to generate: sine, square, sawtooth, triangle or noise.
    kind: Option<WaveformKind>,
    /// The clip length, in seconds or as a duration string such as 1500ms.
    #[arg(short, long, value_parser = parse_duration)]
    duration: Option<f64>,
    /// The peak amplitude, between 0 and 1.
    #[arg(short, long)]
    amplitude: Option<f64>,
    /// The frequency in Hz.
    #[arg(short, long)]
    frequency: Option<f64>,
    /// The path to a settings file that provides the defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Waveform {
    /// Loads the settings and overlays the command line values on them.
    fn request(&self) -> Result<(config::Settings, SynthesisRequest), Box<dyn Error>> {
        let settings = config::load(self.config.as_deref())?;
        let defaults = settings.request()?;
        let request = SynthesisRequest {
            kind: self.kind.unwrap_or(defaults.kind),
            duration: self.duration.unwrap_or(defaults.duration),
            amplitude: self.amplitude.unwrap_or(defaults.amplitude),
            frequency: self.frequency.unwrap_or(defaults.frequency),
            sample_rate: defaults.sample_rate,
        };
        Ok((settings, request))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Generates a waveform and prints a summary and preview of it.
    Generate {
        #[command(flatten)]
        waveform: Waveform,
    },
    /// Generates a waveform and plays it through the audio interface.
    Play {
        #[command(flatten)]
        waveform: Waveform,
        /// The device name to play through.
        #[arg(long)]
        device: Option<String>,
    },
    /// Starts the interactive synthesizer, controlled from the keyboard.
    Start {
        /// The path to the settings file.
        config: Option<PathBuf>,
        /// The device name to play through, overriding the settings file.
        #[arg(long)]
        device: Option<String>,
    },
}

fn parse_duration(value: &str) -> Result<f64, String> {
    parse_seconds(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Generate { waveform } => {
            let (_, request) = waveform.request()?;
            let buffer = synth::generate(request.try_into()?);

            let preview = PreviewWindow::new(&buffer);
            println!(
                "{}: {} samples at {} Hz ({:?}), peak {:.3}, rms {:.3}",
                buffer.kind(),
                buffer.len(),
                buffer.sample_rate(),
                buffer.duration(),
                buffer.peak(),
                buffer.rms()
            );
            println!("Preview (first {:.4}s):", preview.seconds());
            print!("{}", preview.render(72, 11));
        }
        Commands::Play { waveform, device } => {
            let (settings, request) = waveform.request()?;
            let device = audio::get_device(device.as_deref().unwrap_or(settings.device()))?;
            let mut transport = Transport::new(device);

            transport.generate_and_load(request)?;
            transport.play()?;
            println!("Playing {}...", request.kind);

            let ended = tokio::select! {
                ended = transport.wait_until_idle() => Some(ended),
                _ = tokio::signal::ctrl_c() => None,
            };
            let ended = match ended {
                Some(ended) => ended,
                None => {
                    info!("Interrupted.");
                    transport.stop();
                    None
                }
            };
            println!("Status: {}", transport.status());
            if let Some(TransportEvent::Failed { error, .. }) = ended {
                return Err(error.into());
            }
        }
        Commands::Start { config, device } => {
            let settings = config::load(config.as_deref())?;
            let device = audio::get_device(device.as_deref().unwrap_or(settings.device()))?;
            let transport = Transport::new(device);
            let driver = Arc::new(keyboard::Driver::new());

            let mut controller = Controller::new(transport, driver, settings)?;
            controller.join().await?;
        }
    }

    Ok(())
}
