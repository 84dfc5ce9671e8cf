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
use std::fmt::Write;

use super::SampleBuffer;

/// The longest span of audio a preview will ever cover.
const MAX_PREVIEW_SECONDS: f64 = 0.05;

/// The most cycles a preview will show.
const MAX_PREVIEW_CYCLES: f64 = 10.0;

/// A short view over the start of a buffer, for display only. Covers at most 10 cycles, 50ms or
/// the whole clip, whichever is shortest, so that long or high frequency clips stay readable.
pub struct PreviewWindow<'a> {
    seconds: f64,
    sample_rate: u32,
    samples: &'a [f64],
}

impl<'a> PreviewWindow<'a> {
    /// Computes the preview window for the given buffer.
    pub fn new(buffer: &'a SampleBuffer) -> PreviewWindow<'a> {
        let params = buffer.params();
        let seconds = MAX_PREVIEW_SECONDS
            .min(MAX_PREVIEW_CYCLES / params.frequency())
            .min(params.duration());

        let mut count = (params.sample_rate() as f64 * seconds).floor() as usize;
        if !buffer.is_empty() {
            count = count.max(1);
        }
        let samples = &buffer.samples()[..count.min(buffer.len())];

        PreviewWindow {
            seconds,
            sample_rate: params.sample_rate(),
            samples,
        }
    }

    /// The span of time the window covers, in seconds.
    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    pub fn samples(&self) -> &'a [f64] {
        self.samples
    }

    /// Returns (time in seconds, value) pairs for plotting.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + 'a {
        let sample_rate = self.sample_rate as f64;
        self.samples
            .iter()
            .enumerate()
            .map(move |(i, value)| (i as f64 / sample_rate, *value))
    }

    /// Renders the window as a character plot of the given size. The vertical axis always spans
    /// [-1, 1] so that the amplitude of different clips can be compared.
    pub fn render(&self, width: usize, height: usize) -> String {
        let width = width.max(1);
        let height = height.max(3);
        let mut grid = vec![vec![' '; width]; height];

        let zero_row = (height - 1) / 2;
        grid[zero_row].iter_mut().for_each(|cell| *cell = '-');

        if !self.samples.is_empty() {
            for column in 0..width {
                let index = column * self.samples.len() / width;
                let value = self.samples[index].clamp(-1.0, 1.0);
                let row = ((1.0 - value) / 2.0 * (height - 1) as f64).round() as usize;
                grid[row][column] = '*';
            }
        }

        let mut output = String::new();
        for row in grid {
            output.extend(row);
            output.push('\n');
        }
        let _ = write!(
            output,
            "0s{:>width$}",
            format!("{:.4}s", self.seconds),
            width = width.saturating_sub(2)
        );
        output
    }
}
