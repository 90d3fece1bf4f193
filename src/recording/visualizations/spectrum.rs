//! Frequency analysis of the live input using FFT.
//!
//! Produces byte magnitudes per bin the way a browser analyser node does, so the
//! intensity calibration (mean 50 ≈ speaking voice) carries over unchanged.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::recording::runtime::AmplitudeTap;

/// Transform size of the analysis tap. Yields 128 frequency bins.
pub const FFT_SIZE: usize = 256;

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
const TIME_SMOOTHING: f32 = 0.8;

#[derive(Debug, Default)]
struct FeedState {
    open: bool,
    capacity: usize,
    samples: VecDeque<f32>,
}

/// Ring of the most recent mono samples, written by the capture callback.
///
/// Closed feeds drop incoming audio and read back as silence.
#[derive(Debug, Clone, Default)]
pub struct AnalysisFeed {
    inner: Arc<Mutex<FeedState>>,
}

impl AnalysisFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open(&self, capacity: usize) {
        let mut state = self.state();
        state.open = true;
        state.capacity = capacity;
        state.samples.clear();
    }

    pub fn close(&self) {
        let mut state = self.state();
        state.open = false;
        state.samples.clear();
    }

    /// Appends mono i16 samples, keeping only the newest `capacity`.
    pub fn push(&self, samples: &[i16]) {
        let mut state = self.state();
        if !state.open {
            return;
        }
        for &s in samples {
            state.samples.push_back(s as f32 / 32768.0);
        }
        let excess = state.samples.len().saturating_sub(state.capacity);
        state.samples.drain(..excess);
    }

    /// Copies the newest samples into `out`, left-padded with silence.
    /// Returns false when the feed is closed.
    fn snapshot(&self, out: &mut [f32]) -> bool {
        let state = self.state();
        out.fill(0.0);
        if !state.open {
            return false;
        }
        let take = state.samples.len().min(out.len());
        let offset = out.len() - take;
        let skip = state.samples.len() - take;
        for (slot, &s) in out[offset..].iter_mut().zip(state.samples.iter().skip(skip)) {
            *slot = s;
        }
        true
    }
}

/// Analysis tap reading an [`AnalysisFeed`].
pub struct SpectrumTap {
    feed: AnalysisFeed,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    frame: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SpectrumTap {
    pub fn new(feed: AnalysisFeed, fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            feed,
            fft,
            window: blackman_window(fft_size),
            frame: vec![0.0; fft_size],
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; fft_size / 2],
        }
    }
}

impl AmplitudeTap for SpectrumTap {
    fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    fn byte_frequency_data(&mut self, bins: &mut [u8]) {
        if !self.feed.snapshot(&mut self.frame) {
            bins.fill(0);
            return;
        }

        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(&self.frame).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.buffer);

        let size = self.frame.len() as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for (k, (smoothed, out)) in self.smoothed.iter_mut().zip(bins.iter_mut()).enumerate() {
            let magnitude = self.buffer[k].norm() / size;
            *smoothed = TIME_SMOOTHING * *smoothed + (1.0 - TIME_SMOOTHING) * magnitude;

            let db = if *smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            *out = (255.0 * (db - MIN_DECIBELS) / range).clamp(0.0, 255.0) as u8;
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}
