//! Seams between the session state machine and the media runtime.
//!
//! The capture controller only talks to these traits. [`super::audio::CpalRuntime`]
//! is the real implementation; tests substitute fakes without audio hardware.

use crate::errors::SessionResult;
use tokio::sync::mpsc::UnboundedSender;

/// Lifecycle of an encoder. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Idle,
    Recording,
    Stopped,
}

impl std::fmt::Display for EncoderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Events an encoder emits on its session channel.
///
/// All `Data` events precede the single terminal `Stopped` or `Fault`.
#[derive(Debug)]
pub enum EncoderEvent {
    /// One encoded chunk, in emission order.
    Data(Vec<u8>),
    /// The encoder flushed its last chunk. Carries the media type it actually produced.
    Stopped { media_type: Option<String> },
    /// The encoder died before flushing.
    Fault(String),
}

/// Encoding pipeline bound to a microphone stream.
pub trait Encoder: Send {
    fn state(&self) -> EncoderState;

    /// Moves `Idle -> Recording`. Events are sent on `events` until the terminal one.
    fn start(&mut self, events: UnboundedSender<EncoderEvent>) -> SessionResult<()>;

    /// Moves `Recording -> Stopped` and returns immediately.
    ///
    /// The flush finishes in the background and ends with [`EncoderEvent::Stopped`].
    fn stop(&mut self);
}

/// Frequency-domain view of the live input, read once per animation frame.
pub trait AmplitudeTap: Send {
    fn bin_count(&self) -> usize;

    /// Fills `bins` with byte magnitudes (0-255), one per frequency bin.
    fn byte_frequency_data(&mut self, bins: &mut [u8]);
}

/// Exclusively held live audio input.
pub trait MicrophoneStream {
    fn label(&self) -> String;

    /// Builds the analysis graph and returns a tap into it.
    fn open_analysis(&mut self, fft_size: usize) -> SessionResult<Box<dyn AmplitudeTap>>;

    /// Closes the analysis graph. Taps read silence afterwards.
    fn close_analysis(&mut self);

    /// Stops every input track and releases the device.
    fn stop_tracks(&mut self);
}

/// Audio runtime the controller acquires streams and encoders from.
#[allow(async_fn_in_trait)]
pub trait MediaRuntime {
    type Stream: MicrophoneStream;

    /// Acquires the microphone. Fails with [`crate::errors::SessionError::DeviceAccess`].
    async fn acquire_microphone(&self) -> SessionResult<Self::Stream>;

    /// Media types this runtime can encode, best first.
    fn supported_encodings(&self) -> Vec<String>;

    /// Creates an encoder fed by `stream`. `None` asks for the runtime default.
    fn create_encoder(
        &self,
        stream: &mut Self::Stream,
        encoding: Option<&str>,
    ) -> SessionResult<Box<dyn Encoder>>;
}
