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
use std::{f64::consts::TAU, fmt, sync::Arc};

use rand::{
    distributions::{Distribution, Uniform},
    Rng,
};

mod error;
mod params;
pub mod preview;

pub use error::{Parameter, SynthError};
pub use params::{
    SynthesisParameters, SynthesisRequest, WaveformKind, DEFAULT_AMPLITUDE, DEFAULT_DURATION,
    DEFAULT_FREQUENCY, DEFAULT_SAMPLE_RATE, MAX_SAMPLES,
};
pub use preview::PreviewWindow;

/// A generated clip of mono audio. The samples are shared, so cloning a buffer is cheap, and a
/// buffer is never modified after it has been generated.
#[derive(Clone)]
pub struct SampleBuffer {
    samples: Arc<[f64]>,
    params: SynthesisParameters,
}

impl SampleBuffer {
    /// The samples, in playback order.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// The parameters the buffer was generated from.
    pub fn params(&self) -> &SynthesisParameters {
        &self.params
    }

    pub fn kind(&self) -> WaveformKind {
        self.params.kind()
    }

    pub fn sample_rate(&self) -> u32 {
        self.params.sample_rate()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The playback length of the buffer.
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.len() as f64 / self.sample_rate() as f64)
    }

    /// Returns the largest absolute sample value.
    pub fn peak(&self) -> f64 {
        self.samples.iter().fold(0.0_f64, |peak, s| peak.max(s.abs()))
    }

    /// Returns the root mean square of the buffer.
    pub fn rms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = self.samples.iter().map(|s| s * s).sum();
        (sum_squares / self.samples.len() as f64).sqrt()
    }

    /// Returns true if both buffers share the same underlying samples.
    pub fn ptr_eq(&self, other: &SampleBuffer) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("kind", &self.kind())
            .field("samples", &self.len())
            .field("sample_rate", &self.sample_rate())
            .finish()
    }
}

/// Generates a buffer for the given parameters. White noise draws from the thread local RNG.
pub fn generate(params: SynthesisParameters) -> SampleBuffer {
    generate_with_rng(params, &mut rand::thread_rng())
}

/// Generates a buffer for the given parameters, drawing white noise from the given RNG.
///
/// Sample `i` is taken at `t = i / sample_rate` for `i` in `0..floor(sample_rate * duration)`,
/// so the end of the clip is never sampled.
pub fn generate_with_rng<R: Rng + ?Sized>(
    params: SynthesisParameters,
    rng: &mut R,
) -> SampleBuffer {
    let amplitude = params.amplitude();
    let frequency = params.frequency();
    let sample_rate = params.sample_rate() as f64;
    let count = params.sample_count();

    let cycles = |i: usize| frequency * (i as f64 / sample_rate);

    let samples: Vec<f64> = match params.kind() {
        WaveformKind::Sine => (0..count)
            .map(|i| amplitude * (TAU * cycles(i)).sin())
            .collect(),
        WaveformKind::Square => (0..count)
            .map(|i| amplitude * square_sign(cycles(i)))
            .collect(),
        WaveformKind::Sawtooth => (0..count)
            .map(|i| amplitude * 2.0 * centered_fraction(cycles(i)))
            .collect(),
        WaveformKind::Triangle => (0..count)
            .map(|i| amplitude * 2.0 * (2.0 * centered_fraction(cycles(i))).abs() - amplitude)
            .collect(),
        WaveformKind::WhiteNoise => {
            let uniform = Uniform::new_inclusive(-1.0, 1.0);
            (0..count)
                .map(|_| amplitude * uniform.sample(rng))
                .collect()
        }
    };

    SampleBuffer {
        samples: samples.into(),
        params,
    }
}

/// Distance from the nearest whole cycle, in [-0.5, 0.5).
fn centered_fraction(cycles: f64) -> f64 {
    cycles - (cycles + 0.5).floor()
}

/// The sign of `sin(2π * cycles)`, with exact zero crossings mapping to 0.
///
/// `sin` of a multiple of π is rarely exactly zero in floating point, so the sign is taken from
/// the phase within the cycle instead.
fn square_sign(cycles: f64) -> f64 {
    let phase = cycles - cycles.floor();
    if phase == 0.0 || phase == 0.5 {
        0.0
    } else if phase < 0.5 {
        1.0
    } else {
        -1.0
    }
}
