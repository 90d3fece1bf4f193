//! Amplitude to visual intensity mapping.
//!
//! The mean analyser magnitude is turned into a target intensity, then passed
//! through an 80/20 exponential filter so the indicator pulses without jitter.

/// Mean magnitude that maps to intensity 1.0 (typical speaking volume).
pub const CALIBRATION_LEVEL: f32 = 50.0;

/// Ceiling for the target intensity; loud input never pushes past this.
pub const MAX_INTENSITY: f32 = 1.5;

/// Weight of the previous smoothed value per frame.
pub const DECAY: f32 = 0.8;

/// Appearance parameters applied to the trigger control each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    /// Size multiplier, 1.0 at rest.
    pub scale: f32,
    /// Inner glow radius in pixels.
    pub glow_radius: f32,
    /// Outer glow spread in pixels.
    pub glow_spread: f32,
}

impl IndicatorParams {
    pub const REST: Self = Self {
        scale: 1.0,
        glow_radius: 0.0,
        glow_spread: 0.0,
    };

    pub fn from_intensity(smoothed: f32) -> Self {
        Self {
            scale: 1.0 + smoothed * 0.15,
            glow_radius: smoothed * 15.0,
            glow_spread: smoothed * 30.0,
        }
    }
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self::REST
    }
}

/// Arithmetic mean over all frequency bins.
pub fn mean_magnitude(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    sum as f32 / bins.len() as f32
}

/// Maps a mean magnitude to the intensity the filter moves toward.
pub fn target_intensity(average: f32) -> f32 {
    (average / CALIBRATION_LEVEL).min(MAX_INTENSITY)
}

/// Exponential smoothing filter. One instance per feedback loop.
#[derive(Debug, Default)]
pub struct IntensitySmoother {
    smoothed: f32,
}

impl IntensitySmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one frame's mean magnitude and returns the new smoothed intensity.
    pub fn push(&mut self, average: f32) -> f32 {
        let target = target_intensity(average);
        self.smoothed = self.smoothed * DECAY + target * (1.0 - DECAY);
        self.smoothed
    }

    #[cfg(test)]
    fn value(&self) -> f32 {
        self.smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_speaking_level_converges_geometrically() {
        let mut smoother = IntensitySmoother::new();
        let mut previous = 0.0;
        for n in 1..=20 {
            assert_eq!(target_intensity(50.0), 1.0);
            let smoothed = smoother.push(50.0);
            let expected = 1.0 - DECAY.powi(n);
            assert!(
                (smoothed - expected).abs() < 1e-5,
                "frame {n}: got {smoothed}, expected {expected}"
            );
            assert!(smoothed > previous);
            assert!(smoothed < 1.0);
            previous = smoothed;
        }
    }

    #[test]
    fn stays_within_bounds_for_any_input() {
        let mut smoother = IntensitySmoother::new();
        // Deterministic pseudo-random magnitudes covering silence and clipping.
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..5000 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let average = (seed >> 24) as f32;
            let smoothed = smoother.push(average);
            assert!((0.0..=MAX_INTENSITY).contains(&smoothed));
        }
    }

    #[test]
    fn loud_input_is_clamped() {
        assert_eq!(target_intensity(255.0), MAX_INTENSITY);
        let mut smoother = IntensitySmoother::new();
        for _ in 0..200 {
            smoother.push(255.0);
        }
        assert!((smoother.value() - MAX_INTENSITY).abs() < 1e-4);
    }

    #[test]
    fn mean_of_bins() {
        assert_eq!(mean_magnitude(&[]), 0.0);
        assert_eq!(mean_magnitude(&[0, 100, 50, 50]), 50.0);
    }

    #[test]
    fn params_scale_with_intensity() {
        assert_eq!(IndicatorParams::from_intensity(0.0), IndicatorParams::REST);
        let params = IndicatorParams::from_intensity(1.0);
        assert!((params.scale - 1.15).abs() < 1e-6);
        assert_eq!(params.glow_radius, 15.0);
        assert_eq!(params.glow_spread, 30.0);
    }
}
