//! Recording session lifecycle.
//!
//! [`CaptureController`] owns at most one [`RecordingSession`]. Starting acquires
//! the microphone, negotiates an encoding, starts the encoder and the feedback
//! loop. Stopping stops the encoder and tears everything else down immediately;
//! the encoder's flush and the upload hand-off finish on their own task.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use super::clip::VoiceClip;
use super::encoding::{self, DEFAULT_PREFERENCES};
use super::runtime::{Encoder, EncoderEvent, EncoderState, MediaRuntime, MicrophoneStream};
use super::trigger::TriggerControl;
use super::visualizations::{FeedbackLoop, FFT_SIZE};
use crate::errors::{SessionError, SessionResult};
use crate::upload::{Delivery, UploadSink};

/// Knobs for a capture controller.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Media types to try, best first.
    pub preferred_encodings: Vec<String>,
    /// Time between feedback frames.
    pub frame_interval: Duration,
    /// Transform size of the analysis tap.
    pub fft_size: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            preferred_encodings: DEFAULT_PREFERENCES.iter().map(|s| s.to_string()).collect(),
            frame_interval: Duration::from_micros(16_667),
            fft_size: FFT_SIZE,
        }
    }
}

/// Resources held by one active recording.
struct RecordingSession<S> {
    stream: S,
    encoder: Box<dyn Encoder>,
    selected_encoding: Option<String>,
    feedback: FeedbackLoop,
    handoff: JoinHandle<SessionResult<Delivery>>,
}

/// Resolves once a stopped session's clip has been handed off (or failed to be).
pub struct PendingClip {
    handle: JoinHandle<SessionResult<Delivery>>,
}

impl PendingClip {
    pub async fn wait(self) -> SessionResult<Delivery> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(SessionError::Upload(format!("hand-off task failed: {e}"))),
        }
    }
}

pub struct CaptureController<R: MediaRuntime> {
    runtime: R,
    trigger: Arc<dyn TriggerControl>,
    uploader: Arc<dyn UploadSink>,
    settings: CaptureSettings,
    session: Option<RecordingSession<R::Stream>>,
}

impl<R: MediaRuntime> CaptureController<R> {
    pub fn new(
        runtime: R,
        trigger: Arc<dyn TriggerControl>,
        uploader: Arc<dyn UploadSink>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            runtime,
            trigger,
            uploader,
            settings,
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Encoding negotiated for the active session. `None` also means "runtime default".
    pub fn selected_encoding(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|s| s.selected_encoding.as_deref())
    }

    pub fn encoder_state(&self) -> Option<EncoderState> {
        self.session.as_ref().map(|s| s.encoder.state())
    }

    /// Starts a recording session.
    ///
    /// Rejected with [`SessionError::AlreadyActive`] while a session is running.
    /// Any other failure releases what was acquired, resets the trigger and raises
    /// a notice before the error is returned.
    pub async fn start(&mut self) -> SessionResult<()> {
        if self.session.is_some() {
            tracing::warn!("Start requested while a session is active; ignoring");
            return Err(SessionError::AlreadyActive);
        }

        match self.open_session().await {
            Ok(session) => {
                tracing::info!(
                    "Recording started (encoding: {})",
                    session.selected_encoding.as_deref().unwrap_or("runtime default")
                );
                self.session = Some(session);
                self.trigger.show_recording();
                Ok(())
            }
            Err(err) => {
                tracing::error!("Failed to start recording: {err}");
                self.trigger.show_idle();
                self.trigger.notify(&err.notice());
                Err(err)
            }
        }
    }

    /// Stops the active session and tears it down.
    ///
    /// Returns `None` when nothing is recording. The returned handle resolves
    /// after the encoder has flushed and the clip has been handed off.
    pub fn stop(&mut self) -> Option<PendingClip> {
        let mut session = self.session.take()?;

        if session.encoder.state() == EncoderState::Recording {
            session.encoder.stop();
        }

        let handle = self.teardown(session);
        Some(PendingClip { handle })
    }

    async fn open_session(&self) -> SessionResult<RecordingSession<R::Stream>> {
        let mut stream = self.runtime.acquire_microphone().await?;
        tracing::info!("Microphone acquired: {}", stream.label());

        let tap = match stream.open_analysis(self.settings.fft_size) {
            Ok(tap) => tap,
            Err(err) => {
                stream.stop_tracks();
                return Err(err);
            }
        };

        let supported = self.runtime.supported_encodings();
        let selected_encoding = encoding::negotiate(&self.settings.preferred_encodings, &supported);
        if selected_encoding.is_none() {
            tracing::info!(
                "None of {:?} supported (runtime offers {:?}); using runtime default",
                self.settings.preferred_encodings,
                supported
            );
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let encoder = self
            .runtime
            .create_encoder(&mut stream, selected_encoding.as_deref())
            .and_then(|mut encoder| encoder.start(events_tx).map(|()| encoder));
        let encoder = match encoder {
            Ok(encoder) => encoder,
            Err(err) => {
                stream.close_analysis();
                stream.stop_tracks();
                return Err(err);
            }
        };

        let handoff = tokio::spawn(finalize(
            events_rx,
            Arc::clone(&self.uploader),
            Arc::clone(&self.trigger),
        ));

        let mut feedback = FeedbackLoop::new();
        feedback.start(tap, self.settings.frame_interval, Arc::clone(&self.trigger));

        Ok(RecordingSession {
            stream,
            encoder,
            selected_encoding,
            feedback,
            handoff,
        })
    }

    fn teardown(
        &self,
        mut session: RecordingSession<R::Stream>,
    ) -> JoinHandle<SessionResult<Delivery>> {
        session.feedback.cancel();
        session.stream.close_analysis();
        session.stream.stop_tracks();
        self.trigger.show_idle();
        tracing::debug!("Session torn down ({} feedback frames)", session.feedback.frames());
        session.handoff
    }
}

/// Collects encoder output into a clip and hands it off exactly once.
async fn finalize(
    mut events: UnboundedReceiver<EncoderEvent>,
    uploader: Arc<dyn UploadSink>,
    trigger: Arc<dyn TriggerControl>,
) -> SessionResult<Delivery> {
    let mut chunks: Vec<Vec<u8>> = Vec::new();

    let clip = loop {
        match events.recv().await {
            Some(EncoderEvent::Data(chunk)) => {
                if !chunk.is_empty() {
                    chunks.push(chunk);
                }
            }
            Some(EncoderEvent::Stopped { media_type }) => {
                break Ok(VoiceClip::assemble(std::mem::take(&mut chunks), media_type));
            }
            Some(EncoderEvent::Fault(reason)) => {
                break Err(SessionError::EncoderFault(reason));
            }
            None => {
                break Err(SessionError::EncoderFault(
                    "encoder closed without flushing".to_string(),
                ));
            }
        }
    };

    let result = match clip {
        Ok(clip) => {
            if clip.is_empty() {
                tracing::warn!("Clip finalized without audio data ({})", clip.media_type);
            } else {
                tracing::info!("Clip finalized: {} bytes ({})", clip.len(), clip.media_type);
            }
            // Delivery writes files and spawns clipboard tools; keep it off the UI thread.
            tokio::task::spawn_blocking(move || uploader.deliver(&clip))
                .await
                .unwrap_or_else(|e| Err(SessionError::Upload(format!("delivery task failed: {e}"))))
        }
        Err(err) => Err(err),
    };

    if let Err(err) = &result {
        tracing::error!("Voice message was not delivered: {err}");
        trigger.notify(&err.notice());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::runtime::AmplitudeTap;
    use crate::recording::visualizations::IndicatorParams;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedSender;

    #[derive(Default)]
    struct Probe {
        acquired: AtomicUsize,
        tracks_stopped: AtomicUsize,
        analysis_opened: AtomicUsize,
        analysis_closed: AtomicUsize,
        encoders_created: AtomicUsize,
        requested: Mutex<Vec<Option<String>>>,
        encoder_states: Mutex<Vec<EncoderState>>,
        events: Mutex<Option<UnboundedSender<EncoderEvent>>>,
    }

    impl Probe {
        fn emit(&self, event: EncoderEvent) {
            let events = self.events.lock().unwrap();
            events.as_ref().unwrap().send(event).unwrap();
        }
    }

    struct FakeRuntime {
        probe: Arc<Probe>,
        supported: Vec<String>,
        deny_microphone: bool,
        fail_analysis: bool,
        fail_encoder: bool,
    }

    impl FakeRuntime {
        fn new(probe: &Arc<Probe>, supported: &[&str]) -> Self {
            Self {
                probe: Arc::clone(probe),
                supported: supported.iter().map(|s| s.to_string()).collect(),
                deny_microphone: false,
                fail_analysis: false,
                fail_encoder: false,
            }
        }
    }

    struct FakeStream {
        probe: Arc<Probe>,
        fail_analysis: bool,
    }

    struct QuietTap;

    impl AmplitudeTap for QuietTap {
        fn bin_count(&self) -> usize {
            128
        }
        fn byte_frequency_data(&mut self, bins: &mut [u8]) {
            bins.fill(50);
        }
    }

    impl MicrophoneStream for FakeStream {
        fn label(&self) -> String {
            "fake microphone".into()
        }
        fn open_analysis(&mut self, _fft_size: usize) -> SessionResult<Box<dyn AmplitudeTap>> {
            if self.fail_analysis {
                return Err(SessionError::DeviceAccess("analysis graph unavailable".into()));
            }
            self.probe.analysis_opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(QuietTap))
        }
        fn close_analysis(&mut self) {
            self.probe.analysis_closed.fetch_add(1, Ordering::SeqCst);
        }
        fn stop_tracks(&mut self) {
            self.probe.tracks_stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeEncoder {
        probe: Arc<Probe>,
        state: EncoderState,
        media_type: String,
    }

    impl FakeEncoder {
        fn transition(&mut self, state: EncoderState) {
            self.state = state;
            self.probe.encoder_states.lock().unwrap().push(state);
        }
    }

    impl Encoder for FakeEncoder {
        fn state(&self) -> EncoderState {
            self.state
        }
        fn start(&mut self, events: UnboundedSender<EncoderEvent>) -> SessionResult<()> {
            *self.probe.events.lock().unwrap() = Some(events);
            self.transition(EncoderState::Recording);
            Ok(())
        }
        fn stop(&mut self) {
            self.transition(EncoderState::Stopped);
            if let Some(events) = self.probe.events.lock().unwrap().take() {
                let _ = events.send(EncoderEvent::Stopped {
                    media_type: Some(self.media_type.clone()),
                });
            }
        }
    }

    impl MediaRuntime for FakeRuntime {
        type Stream = FakeStream;

        async fn acquire_microphone(&self) -> SessionResult<FakeStream> {
            if self.deny_microphone {
                return Err(SessionError::DeviceAccess("permission denied".into()));
            }
            self.probe.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(FakeStream {
                probe: Arc::clone(&self.probe),
                fail_analysis: self.fail_analysis,
            })
        }

        fn supported_encodings(&self) -> Vec<String> {
            self.supported.clone()
        }

        fn create_encoder(
            &self,
            _stream: &mut FakeStream,
            encoding: Option<&str>,
        ) -> SessionResult<Box<dyn Encoder>> {
            self.probe
                .requested
                .lock()
                .unwrap()
                .push(encoding.map(str::to_string));
            if self.fail_encoder {
                return Err(SessionError::Encoder("codec exploded".into()));
            }
            self.probe.encoders_created.fetch_add(1, Ordering::SeqCst);
            let mut encoder = FakeEncoder {
                probe: Arc::clone(&self.probe),
                state: EncoderState::Idle,
                media_type: encoding.unwrap_or("audio/wav").to_string(),
            };
            encoder.transition(EncoderState::Idle);
            Ok(Box::new(encoder))
        }
    }

    #[derive(Default)]
    struct FakeTrigger {
        recording: AtomicBool,
        pulses: AtomicUsize,
        notices: Mutex<Vec<String>>,
    }

    impl TriggerControl for FakeTrigger {
        fn show_recording(&self) {
            self.recording.store(true, Ordering::SeqCst);
        }
        fn show_idle(&self) {
            self.recording.store(false, Ordering::SeqCst);
        }
        fn apply_intensity(&self, _params: IndicatorParams) {
            self.pulses.fetch_add(1, Ordering::SeqCst);
        }
        fn notify(&self, message: &str) {
            self.notices.lock().unwrap().push(message.to_string());
        }
    }

    #[derive(Default)]
    struct FakeUpload {
        missing: bool,
        clips: Mutex<Vec<VoiceClip>>,
    }

    impl UploadSink for FakeUpload {
        fn deliver(&self, clip: &VoiceClip) -> SessionResult<Delivery> {
            if self.missing {
                return Err(SessionError::UploadSurfaceMissing("no file input".into()));
            }
            self.clips.lock().unwrap().push(clip.clone());
            Ok(Delivery {
                location: "memory".into(),
                bytes: clip.len(),
                media_type: clip.media_type.clone(),
            })
        }
    }

    struct Harness {
        probe: Arc<Probe>,
        trigger: Arc<FakeTrigger>,
        upload: Arc<FakeUpload>,
        controller: CaptureController<FakeRuntime>,
    }

    fn harness_with(runtime: impl FnOnce(&Arc<Probe>) -> FakeRuntime, upload: FakeUpload) -> Harness {
        let probe = Arc::new(Probe::default());
        let trigger = Arc::new(FakeTrigger::default());
        let upload = Arc::new(upload);
        let controller = CaptureController::new(
            runtime(&probe),
            trigger.clone(),
            upload.clone(),
            CaptureSettings::default(),
        );
        Harness {
            probe,
            trigger,
            upload,
            controller,
        }
    }

    fn harness(supported: &[&str]) -> Harness {
        harness_with(|p| FakeRuntime::new(p, supported), FakeUpload::default())
    }

    #[tokio::test]
    async fn records_chunks_in_order_and_hands_off_once() {
        let mut h = harness(&DEFAULT_PREFERENCES);
        h.controller.start().await.unwrap();
        assert!(h.controller.is_active());
        assert!(h.trigger.recording.load(Ordering::SeqCst));
        assert_eq!(h.controller.selected_encoding(), Some("audio/ogg; codecs=opus"));
        assert_eq!(h.controller.encoder_state(), Some(EncoderState::Recording));

        h.probe.emit(EncoderEvent::Data(vec![1; 600]));
        h.probe.emit(EncoderEvent::Data(Vec::new()));
        h.probe.emit(EncoderEvent::Data(vec![2; 400]));

        let delivery = h.controller.stop().unwrap().wait().await.unwrap();
        assert_eq!(delivery.bytes, 1000);

        let clips = h.upload.clips.lock().unwrap();
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].bytes[..600], [1u8; 600][..]);
        assert_eq!(clips[0].bytes[600..], [2u8; 400][..]);
        assert_eq!(clips[0].media_type, "audio/ogg; codecs=opus");

        assert_eq!(
            *h.probe.encoder_states.lock().unwrap(),
            vec![EncoderState::Idle, EncoderState::Recording, EncoderState::Stopped]
        );
        assert_eq!(h.probe.tracks_stopped.load(Ordering::SeqCst), 1);
        assert_eq!(h.probe.analysis_closed.load(Ordering::SeqCst), 1);
        assert!(!h.controller.is_active());
        assert!(!h.trigger.recording.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn denied_microphone_leaves_nothing_behind() {
        let mut h = harness_with(
            |p| FakeRuntime {
                deny_microphone: true,
                ..FakeRuntime::new(p, &DEFAULT_PREFERENCES)
            },
            FakeUpload::default(),
        );

        let err = h.controller.start().await.unwrap_err();
        assert!(matches!(err, SessionError::DeviceAccess(_)));
        tokio::task::yield_now().await;

        assert!(!h.controller.is_active());
        assert_eq!(h.probe.analysis_opened.load(Ordering::SeqCst), 0);
        assert_eq!(h.probe.encoders_created.load(Ordering::SeqCst), 0);
        assert_eq!(h.probe.tracks_stopped.load(Ordering::SeqCst), 0);
        assert_eq!(h.trigger.pulses.load(Ordering::SeqCst), 0);
        assert!(!h.trigger.recording.load(Ordering::SeqCst));
        assert_eq!(h.trigger.notices.lock().unwrap().len(), 1);
        assert!(h.controller.stop().is_none());
    }

    #[tokio::test]
    async fn analysis_failure_releases_acquired_stream() {
        let mut h = harness_with(
            |p| FakeRuntime {
                fail_analysis: true,
                ..FakeRuntime::new(p, &DEFAULT_PREFERENCES)
            },
            FakeUpload::default(),
        );

        let err = h.controller.start().await.unwrap_err();
        assert!(matches!(err, SessionError::DeviceAccess(_)));
        assert_eq!(h.probe.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(h.probe.tracks_stopped.load(Ordering::SeqCst), 1);
        assert_eq!(h.probe.analysis_closed.load(Ordering::SeqCst), 0);
        assert_eq!(h.probe.encoders_created.load(Ordering::SeqCst), 0);
        assert_eq!(h.trigger.notices.lock().unwrap().len(), 1);
        assert!(!h.trigger.recording.load(Ordering::SeqCst));
        assert!(!h.controller.is_active());
    }

    #[tokio::test]
    async fn encoder_failure_releases_stream_once() {
        let mut h = harness_with(
            |p| FakeRuntime {
                fail_encoder: true,
                ..FakeRuntime::new(p, &DEFAULT_PREFERENCES)
            },
            FakeUpload::default(),
        );

        let err = h.controller.start().await.unwrap_err();
        assert!(matches!(err, SessionError::Encoder(_)));
        assert_eq!(h.probe.analysis_opened.load(Ordering::SeqCst), 1);
        assert_eq!(h.probe.analysis_closed.load(Ordering::SeqCst), 1);
        assert_eq!(h.probe.tracks_stopped.load(Ordering::SeqCst), 1);
        assert_eq!(h.trigger.notices.lock().unwrap().len(), 1);
        assert!(!h.controller.is_active());
    }

    #[tokio::test]
    async fn second_stop_is_a_no_op() {
        let mut h = harness(&DEFAULT_PREFERENCES);
        h.controller.start().await.unwrap();
        h.probe.emit(EncoderEvent::Data(vec![9; 10]));

        let pending = h.controller.stop().unwrap();
        assert!(h.controller.stop().is_none());
        pending.wait().await.unwrap();

        assert_eq!(h.probe.tracks_stopped.load(Ordering::SeqCst), 1);
        assert_eq!(h.probe.analysis_closed.load(Ordering::SeqCst), 1);
        assert_eq!(h.upload.clips.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_active() {
        let mut h = harness(&DEFAULT_PREFERENCES);
        h.controller.start().await.unwrap();

        let err = h.controller.start().await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyActive));
        assert_eq!(h.probe.acquired.load(Ordering::SeqCst), 1);
        assert!(h.controller.is_active());

        h.controller.stop().unwrap().wait().await.unwrap();
        h.controller.start().await.unwrap();
        assert_eq!(h.probe.acquired.load(Ordering::SeqCst), 2);
        h.controller.stop().unwrap().wait().await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_preferences_use_runtime_default() {
        let mut h = harness(&[]);
        h.controller.start().await.unwrap();
        assert_eq!(h.controller.selected_encoding(), None);
        assert_eq!(*h.probe.requested.lock().unwrap(), vec![None]);

        h.probe.emit(EncoderEvent::Data(vec![0; 44]));
        let delivery = h.controller.stop().unwrap().wait().await.unwrap();
        assert_eq!(delivery.media_type, "audio/wav");
    }

    #[tokio::test]
    async fn negotiation_follows_preference_order() {
        let mut h = harness(&["audio/webm", "audio/ogg"]);
        h.controller.start().await.unwrap();
        assert_eq!(
            *h.probe.requested.lock().unwrap(),
            vec![Some("audio/ogg".to_string())]
        );
        h.controller.stop().unwrap().wait().await.unwrap();
    }

    #[tokio::test]
    async fn missing_upload_surface_is_notified() {
        let mut h = harness_with(
            |p| FakeRuntime::new(p, &DEFAULT_PREFERENCES),
            FakeUpload {
                missing: true,
                ..FakeUpload::default()
            },
        );
        h.controller.start().await.unwrap();
        h.probe.emit(EncoderEvent::Data(vec![1; 8]));

        let err = h.controller.stop().unwrap().wait().await.unwrap_err();
        assert!(matches!(err, SessionError::UploadSurfaceMissing(_)));
        assert_eq!(h.trigger.notices.lock().unwrap().len(), 1);
        assert!(!h.controller.is_active());
    }

    #[tokio::test]
    async fn encoder_fault_discards_the_clip() {
        let mut h = harness(&DEFAULT_PREFERENCES);
        h.controller.start().await.unwrap();
        h.probe.emit(EncoderEvent::Data(vec![1; 8]));
        h.probe.emit(EncoderEvent::Fault("device unplugged".into()));

        let err = h.controller.stop().unwrap().wait().await.unwrap_err();
        assert!(matches!(err, SessionError::EncoderFault(_)));
        assert!(h.upload.clips.lock().unwrap().is_empty());
        assert_eq!(h.trigger.notices.lock().unwrap().len(), 1);
        assert_eq!(h.probe.tracks_stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn encoder_vanishing_without_flush_discards_the_clip() {
        let mut h = harness(&DEFAULT_PREFERENCES);
        h.controller.start().await.unwrap();
        h.probe.emit(EncoderEvent::Data(vec![1; 8]));
        drop(h.probe.events.lock().unwrap().take());

        let err = h.controller.stop().unwrap().wait().await.unwrap_err();
        assert!(matches!(err, SessionError::EncoderFault(_)));
        assert!(h.upload.clips.lock().unwrap().is_empty());
        assert_eq!(h.trigger.notices.lock().unwrap().len(), 1);
        assert!(!h.controller.is_active());
    }

    #[tokio::test]
    async fn feedback_pulses_while_recording_and_stops_with_session() {
        let mut h = harness(&DEFAULT_PREFERENCES);
        h.controller.start().await.unwrap();
        tokio::task::yield_now().await;
        assert!(h.trigger.pulses.load(Ordering::SeqCst) >= 1);

        h.controller.stop().unwrap().wait().await.unwrap();
        let pulses = h.trigger.pulses.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(h.trigger.pulses.load(Ordering::SeqCst), pulses);
    }
}
