//! Scrolling history of the smoothed pulse, drawn under the trigger.

use super::intensity::MAX_INTENSITY;

/// Fixed-width history of intensity samples scaled to 0-100.
#[derive(Debug, Clone)]
pub struct PulseHistory {
    values: Vec<u64>,
    width: usize,
}

impl PulseHistory {
    pub fn new(width: usize) -> Self {
        Self {
            values: vec![0; width],
            width,
        }
    }

    /// Pushes one sample, dropping the oldest once the width is reached.
    pub fn push(&mut self, intensity: f32) {
        let value = (intensity / MAX_INTENSITY * 100.0).clamp(0.0, 100.0);
        self.values.push(value as u64);
        if self.values.len() > self.width {
            self.values.remove(0);
        }
    }

    /// Resizes to `width`, trimming oldest samples or left-padding with silence.
    pub fn resize(&mut self, width: usize) {
        if self.values.len() > width {
            self.values.drain(..self.values.len() - width);
        } else {
            let missing = width - self.values.len();
            self.values.splice(0..0, std::iter::repeat(0).take(missing));
        }
        self.width = width;
    }

    pub fn clear(&mut self) {
        self.values.fill(0);
    }

    pub fn data(&self) -> &[u64] {
        &self.values
    }
}
