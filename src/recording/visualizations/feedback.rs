//! Frame-synchronous feedback loop driving the trigger's pulse.
//!
//! One loop per session: `Uninitialized -> Running -> Cancelled`. Cancellation is
//! a shared flag checked before each frame and again before the next tick is
//! awaited, so a cancel issued mid-frame never produces another frame.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::intensity::{mean_magnitude, IndicatorParams, IntensitySmoother};
use crate::recording::runtime::AmplitudeTap;
use crate::recording::trigger::TriggerControl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Running,
    Cancelled,
}

/// Cloneable cancellation token for a feedback loop.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct FeedbackLoop {
    state: LoopState,
    cancel: CancelHandle,
    frames: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl Default for FeedbackLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Uninitialized,
            cancel: CancelHandle::default(),
            frames: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    #[cfg(test)]
    fn state(&self) -> LoopState {
        self.state
    }

    #[cfg(test)]
    fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Starts rendering. The first frame runs right away, then one per `frame_interval`.
    ///
    /// Only valid from `Uninitialized`; otherwise ignored.
    pub fn start(
        &mut self,
        tap: Box<dyn AmplitudeTap>,
        frame_interval: Duration,
        trigger: Arc<dyn TriggerControl>,
    ) {
        if self.state != LoopState::Uninitialized {
            tracing::warn!("Feedback loop start ignored in state {:?}", self.state);
            return;
        }

        let cancel = self.cancel.clone();
        let frames = Arc::clone(&self.frames);
        self.task = Some(tokio::spawn(run_frames(
            tap,
            frame_interval,
            trigger,
            cancel,
            frames,
        )));
        self.state = LoopState::Running;
        tracing::debug!("Feedback loop running at {:?} per frame", frame_interval);
    }

    /// Stops the loop. Safe to call in any state and more than once.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.state == LoopState::Running {
            tracing::debug!("Feedback loop cancelled after {} frames", self.frames());
        }
        self.state = LoopState::Cancelled;
    }
}

impl Drop for FeedbackLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_frames(
    mut tap: Box<dyn AmplitudeTap>,
    frame_interval: Duration,
    trigger: Arc<dyn TriggerControl>,
    cancel: CancelHandle,
    frames: Arc<AtomicU64>,
) {
    let mut ticker = interval_at(Instant::now() + frame_interval, frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut bins = vec![0u8; tap.bin_count()];
    let mut smoother = IntensitySmoother::new();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        tap.byte_frequency_data(&mut bins);
        let smoothed = smoother.push(mean_magnitude(&bins));
        trigger.apply_intensity(IndicatorParams::from_intensity(smoothed));
        frames.fetch_add(1, Ordering::Relaxed);

        if cancel.is_cancelled() {
            break;
        }
        ticker.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct PulseRecorder {
        frames: Mutex<Vec<IndicatorParams>>,
    }

    impl TriggerControl for PulseRecorder {
        fn show_recording(&self) {}
        fn show_idle(&self) {}
        fn apply_intensity(&self, params: IndicatorParams) {
            self.frames.lock().unwrap().push(params);
        }
        fn notify(&self, _message: &str) {}
    }

    struct ConstantTap {
        level: u8,
        reads: usize,
        cancel_on_read: Option<(usize, CancelHandle)>,
    }

    impl AmplitudeTap for ConstantTap {
        fn bin_count(&self) -> usize {
            128
        }

        fn byte_frequency_data(&mut self, bins: &mut [u8]) {
            self.reads += 1;
            if let Some((at, handle)) = &self.cancel_on_read {
                if self.reads == *at {
                    handle.cancel();
                }
            }
            bins.fill(self.level);
        }
    }

    fn tap(level: u8) -> Box<ConstantTap> {
        Box::new(ConstantTap {
            level,
            reads: 0,
            cancel_on_read: None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn renders_one_frame_per_tick_until_cancelled() {
        let recorder = Arc::new(PulseRecorder::default());
        let mut feedback = FeedbackLoop::new();
        assert_eq!(feedback.state(), LoopState::Uninitialized);

        feedback.start(tap(50), Duration::from_millis(16), recorder.clone());
        assert_eq!(feedback.state(), LoopState::Running);

        tokio::time::sleep(Duration::from_millis(16 * 5 + 8)).await;
        let rendered = recorder.frames.lock().unwrap().len();
        assert!(rendered >= 5, "only {rendered} frames");

        let first = recorder.frames.lock().unwrap()[0];
        assert!((first.scale - (1.0 + 0.2 * 0.15)).abs() < 1e-6);

        feedback.cancel();
        assert_eq!(feedback.state(), LoopState::Cancelled);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(recorder.frames.lock().unwrap().len(), rendered);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_a_frame_schedules_nothing_further() {
        let recorder = Arc::new(PulseRecorder::default());
        let mut feedback = FeedbackLoop::new();
        let handle = feedback.cancel_handle();
        let tap = Box::new(ConstantTap {
            level: 50,
            reads: 0,
            cancel_on_read: Some((3, handle)),
        });

        feedback.start(tap, Duration::from_millis(16), recorder.clone());
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(recorder.frames.lock().unwrap().len(), 3);
        assert_eq!(feedback.frames(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_loop_cannot_restart() {
        let recorder = Arc::new(PulseRecorder::default());
        let mut feedback = FeedbackLoop::new();
        feedback.cancel();
        feedback.start(tap(50), Duration::from_millis(16), recorder.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(feedback.state(), LoopState::Cancelled);
        assert!(recorder.frames.lock().unwrap().is_empty());
    }
}
