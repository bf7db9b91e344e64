//! Audio resampling
//!
//! Streaming sample rate conversion by linear interpolation over interleaved
//! full-scale `i32` samples. Input may arrive in chunks of any size; the last
//! input frames are held back until the next chunk or [`Resampler::flush`].

use crate::error::{Error, Result};

/// Streaming linear-interpolation resampler
pub struct Resampler {
    input_rate: f64,
    output_rate: f64,
    channels: usize,
    /// Input frames per output frame
    step: f64,
    /// Input frames not yet released (interleaved)
    history: Vec<i32>,
    /// Input frames dropped from the front of `history`
    consumed: u64,
    /// Output frames produced
    produced: u64,
}

impl Resampler {
    pub fn new(input_rate: f64, output_rate: f64, channels: usize) -> Result<Self> {
        for rate in [input_rate, output_rate] {
            if !(rate > 0.0) || !rate.is_finite() {
                return Err(Error::invalid_input(format!(
                    "Invalid resampling rate: {}",
                    rate
                )));
            }
        }
        if channels == 0 {
            return Err(Error::invalid_input("Resampler needs at least one channel"));
        }

        Ok(Resampler {
            input_rate,
            output_rate,
            channels,
            step: input_rate / output_rate,
            history: Vec::new(),
            consumed: 0,
            produced: 0,
        })
    }

    pub fn input_rate(&self) -> f64 {
        self.input_rate
    }

    pub fn output_rate(&self) -> f64 {
        self.output_rate
    }

    /// Input frames needed to produce `output_frames` more frames
    pub fn input_frames_for(&self, output_frames: usize) -> usize {
        let wanted = (output_frames as f64 * self.step).ceil() as usize + 1;
        wanted.saturating_sub(self.history.len() / self.channels)
    }

    /// Position of the next output frame, in input frames relative to the
    /// start of `history`
    fn position(&self) -> f64 {
        // Multiply before dividing so integer rates give exact positions
        self.produced as f64 * self.input_rate / self.output_rate - self.consumed as f64
    }

    fn interpolate(&self, index: usize, next: usize, fraction: f64, out: &mut Vec<i32>) {
        let a = &self.history[index * self.channels..(index + 1) * self.channels];
        let b = &self.history[next * self.channels..(next + 1) * self.channels];
        for (x, y) in a.iter().zip(b) {
            let value = *x as f64 + (*y as f64 - *x as f64) * fraction;
            out.push(value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32);
        }
    }

    /// Resample `input` and append the output frames that are now complete.
    /// Returns the number of frames appended.
    pub fn process(&mut self, input: &[i32], out: &mut Vec<i32>) -> Result<usize> {
        if input.len() % self.channels != 0 {
            return Err(Error::invalid_input(format!(
                "Resampler input of {} samples is not whole {}-channel frames",
                input.len(),
                self.channels
            )));
        }
        self.history.extend_from_slice(input);
        let frames = self.history.len() / self.channels;

        let mut emitted = 0;
        loop {
            let position = self.position();
            let index = position.floor() as usize;
            if index + 1 >= frames {
                break;
            }
            self.interpolate(index, index + 1, position - index as f64, out);
            self.produced += 1;
            emitted += 1;
        }

        // Keep the frame the next output interpolates from
        let keep_from = (self.position().floor() as usize).min(frames);
        if keep_from > 0 {
            self.history.drain(..keep_from * self.channels);
            self.consumed += keep_from as u64;
        }

        Ok(emitted)
    }

    /// Emit the tail held back for interpolation. Call once after the last
    /// `process`. Returns the number of frames appended.
    pub fn flush(&mut self, out: &mut Vec<i32>) -> usize {
        let frames = self.history.len() / self.channels;
        let mut emitted = 0;
        loop {
            let position = self.position();
            let index = position.floor() as usize;
            if index >= frames {
                break;
            }
            let next = (index + 1).min(frames - 1);
            self.interpolate(index, next, position - index as f64, out);
            self.produced += 1;
            emitted += 1;
        }

        self.consumed += frames as u64;
        self.history.clear();
        emitted
    }
}
