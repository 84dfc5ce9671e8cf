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
use std::{error::Error, fmt, thread};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, SizedSample,
};
use tracing::{error, info, span, Level};

use crate::{
    audio::{Device as AudioDevice, PlaybackError, DEFAULT_DEVICE},
    playsync::PlaybackSignal,
    synth::SampleBuffer,
};

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that can output audio.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let output_configs = match device.supported_output_configs() {
                    Ok(output_configs) => output_configs,
                    Err(_) => continue,
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. The name "default" selects the default output device of the
    /// default host.
    pub fn get(name: &str) -> Result<Device, PlaybackError> {
        if name == DEFAULT_DEVICE {
            return Device::default_output();
        }

        let devices = Device::list_cpal_devices()
            .map_err(|e| PlaybackError::DeviceUnavailable(e.to_string()))?;
        devices
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| {
                PlaybackError::DeviceUnavailable(format!("no device found with name {}", name))
            })
    }

    fn default_output() -> Result<Device, PlaybackError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            PlaybackError::DeviceUnavailable("no default output device".to_string())
        })?;
        let config = device
            .default_output_config()
            .map_err(|e| PlaybackError::DeviceUnavailable(e.to_string()))?;

        Ok(Device {
            name: device
                .name()
                .unwrap_or_else(|_| DEFAULT_DEVICE.to_string()),
            max_channels: config.channels(),
            host_id: host.id(),
            device,
        })
    }

    /// Builds an output stream that writes the buffer to every channel of the device.
    fn build_stream(
        device: &cpal::Device,
        buffer: SampleBuffer,
        signal: PlaybackSignal,
    ) -> Result<cpal::Stream, PlaybackError> {
        let default_config = device
            .default_output_config()
            .map_err(|e| PlaybackError::DeviceUnavailable(e.to_string()))?;
        let config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(buffer.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };

        match default_config.sample_format() {
            cpal::SampleFormat::I8 => make_stream::<i8>(device, &config, buffer, signal),
            cpal::SampleFormat::I16 => make_stream::<i16>(device, &config, buffer, signal),
            cpal::SampleFormat::I32 => make_stream::<i32>(device, &config, buffer, signal),
            cpal::SampleFormat::I64 => make_stream::<i64>(device, &config, buffer, signal),
            cpal::SampleFormat::U8 => make_stream::<u8>(device, &config, buffer, signal),
            cpal::SampleFormat::U16 => make_stream::<u16>(device, &config, buffer, signal),
            cpal::SampleFormat::U32 => make_stream::<u32>(device, &config, buffer, signal),
            cpal::SampleFormat::U64 => make_stream::<u64>(device, &config, buffer, signal),
            cpal::SampleFormat::F32 => make_stream::<f32>(device, &config, buffer, signal),
            cpal::SampleFormat::F64 => make_stream::<f64>(device, &config, buffer, signal),
            sample_format => Err(PlaybackError::UnsupportedFormat(sample_format.to_string())),
        }
    }
}

/// Walks a buffer one period at a time, writing each mono sample to every channel of a frame.
struct Cursor {
    buffer: SampleBuffer,
    position: usize,
    num_channels: usize,
    finished: bool,
}

impl Cursor {
    fn new(buffer: SampleBuffer, num_channels: usize) -> Cursor {
        Cursor {
            buffer,
            position: 0,
            num_channels: num_channels.max(1),
            finished: false,
        }
    }

    /// Fills one period, padding with silence once the buffer is exhausted or playback has been
    /// cancelled. Returns true exactly once: on the first period that starts after the last
    /// sample was written, so the tail of the buffer has been handed to the device a full period
    /// before playback is reported as finished.
    fn fill<T>(&mut self, data: &mut [T], cancelled: bool) -> bool
    where
        T: SizedSample + FromSample<f32>,
    {
        let samples = self.buffer.samples();
        let exhausted = self.position >= samples.len();

        for frame in data.chunks_mut(self.num_channels) {
            let value = if cancelled || self.position >= samples.len() {
                0.0
            } else {
                self.position += 1;
                samples[self.position - 1] as f32
            };
            frame
                .iter_mut()
                .for_each(|sample| *sample = T::from_sample(value));
        }

        if exhausted && !self.finished {
            self.finished = true;
            return true;
        }
        false
    }
}

/// Creates a typed output stream. The callback only reads lock-free state from the signal.
fn make_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    buffer: SampleBuffer,
    signal: PlaybackSignal,
) -> Result<cpal::Stream, PlaybackError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut cursor = Cursor::new(buffer, config.channels as usize);

    let data_signal = signal.clone();
    let error_signal = signal;
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if cursor.fill(data, data_signal.is_cancelled()) {
                    data_signal.finish();
                }
            },
            move |err| {
                error!(err = err.to_string(), "CPAL output stream error");
                error_signal.fail(PlaybackError::Stream(err.to_string()));
            },
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                PlaybackError::DeviceUnavailable(e.to_string())
            }
            cpal::BuildStreamError::StreamConfigNotSupported => {
                PlaybackError::UnsupportedFormat(format!(
                    "{} channels at {}Hz",
                    config.channels, config.sample_rate.0
                ))
            }
            e => PlaybackError::Stream(e.to_string()),
        })
}

impl AudioDevice for Device {
    /// Opens an output stream for the buffer on a dedicated thread. The stream lives on that
    /// thread until the signal resolves, since cpal streams can't move between threads.
    fn start(&self, buffer: SampleBuffer, signal: PlaybackSignal) -> Result<(), PlaybackError> {
        let span = span!(Level::INFO, "start playback (cpal)");
        let _enter = span.enter();

        info!(
            device = self.name,
            waveform = buffer.kind().name(),
            samples = buffer.len(),
            sample_rate = buffer.sample_rate(),
            "Playing buffer."
        );

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), PlaybackError>>(1);
        let device = self.device.clone();
        thread::spawn(move || {
            let stream = match Device::build_stream(&device, buffer, signal.clone())
                .and_then(|stream| {
                    stream
                        .play()
                        .map_err(|e| PlaybackError::Stream(e.to_string()))?;
                    Ok(stream)
                }) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if ready_tx.send(Ok(())).is_err() {
                return;
            }

            // Keep the stream alive until the buffer is done or playback is halted.
            signal.wait();
            drop(stream);
        });

        ready_rx.recv().map_err(|_| {
            PlaybackError::Stream("output thread exited before the stream started".to_string())
        })?
    }
}
