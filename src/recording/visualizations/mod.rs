//! Amplitude-reactive feedback shown while recording.
//!
//! `spectrum` turns live input into analyser bins, `intensity` maps bins to a
//! smoothed pulse, `feedback` runs that mapping once per frame, and `waveform`
//! keeps the pulse history the terminal draws.

pub mod feedback;
pub mod intensity;
pub mod spectrum;
pub mod waveform;

pub use feedback::FeedbackLoop;
pub use intensity::IndicatorParams;
pub use spectrum::{AnalysisFeed, SpectrumTap, FFT_SIZE};
pub use waveform::PulseHistory;
