//! Interface to the control that starts and stops recordings.

use super::visualizations::IndicatorParams;

/// The interactive element the user toggles recording with.
///
/// The controller only ever changes its appearance and raises notices through
/// this trait; where and how the control is drawn is up to the implementor.
pub trait TriggerControl: Send + Sync {
    /// Switch to the "recording / stop" appearance.
    fn show_recording(&self);

    /// Switch back to the "idle / mic" appearance and clear any pulse.
    fn show_idle(&self);

    /// Apply one frame of the amplitude pulse.
    fn apply_intensity(&self, params: IndicatorParams);

    /// Surface a user-visible notice.
    fn notify(&self, message: &str);
}
