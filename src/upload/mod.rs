//! Hand-off of finished clips to the host application.

pub mod attachment;

pub use attachment::AttachmentDrop;

use crate::errors::SessionResult;
use crate::recording::VoiceClip;

/// Where a delivered clip ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Human-readable location (a file path for the attachment drop).
    pub location: String,
    pub bytes: usize,
    pub media_type: String,
}

/// Receives exactly one clip per successful session.
///
/// Fails with [`crate::errors::SessionError::UploadSurfaceMissing`] when there is
/// nowhere to deliver to; the clip is then discarded.
pub trait UploadSink: Send + Sync {
    fn deliver(&self, clip: &VoiceClip) -> SessionResult<Delivery>;
}
