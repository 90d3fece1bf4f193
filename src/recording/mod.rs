//! Voice message recording for micnote.
//!
//! Microphone capture, encoding negotiation, chunk buffering, the amplitude
//! pulse on the trigger and hand-off of the finished clip.

pub mod audio;
pub mod clip;
pub mod controller;
pub mod encoder;
pub mod encoding;
pub mod ffmpeg;
pub mod runtime;
pub mod trigger;
pub mod ui;
pub mod visualizations;

pub use audio::CpalRuntime;
pub use clip::VoiceClip;
pub use controller::{CaptureController, CaptureSettings, PendingClip};
pub use trigger::TriggerControl;
pub use ui::{IndicatorState, TriggerCommand, TriggerTui};
