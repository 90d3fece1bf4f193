//! Attachment drop directory.
//!
//! The host application's upload surface is a directory it picks attachments up
//! from. Clips are written there as `voice-message.ogg` and, optionally, placed
//! on the clipboard so they can be pasted straight into the conversation.

use std::fs;
use std::path::PathBuf;

use super::{Delivery, UploadSink};
use crate::clipboard::copy_file_to_clipboard;
use crate::errors::{SessionError, SessionResult};
use crate::recording::VoiceClip;

pub struct AttachmentDrop {
    dir: PathBuf,
    copy_to_clipboard: bool,
}

impl AttachmentDrop {
    pub fn new(dir: impl Into<PathBuf>, copy_to_clipboard: bool) -> Self {
        Self {
            dir: dir.into(),
            copy_to_clipboard,
        }
    }

    /// `voice-message.ogg`, or a timestamped variant when that name is taken.
    fn target_path(&self, clip: &VoiceClip) -> PathBuf {
        let plain = self.dir.join(clip.file_name());
        if !plain.exists() {
            return plain;
        }
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
        self.dir.join(format!("voice-message-{stamp}.ogg"))
    }
}

impl UploadSink for AttachmentDrop {
    fn deliver(&self, clip: &VoiceClip) -> SessionResult<Delivery> {
        if !self.dir.is_dir() {
            return Err(SessionError::UploadSurfaceMissing(format!(
                "attachment directory {} does not exist",
                self.dir.display()
            )));
        }

        let path = self.target_path(clip);
        fs::write(&path, &clip.bytes)?;
        tracing::info!(
            "Voice message delivered: {} ({} bytes, {})",
            path.display(),
            clip.len(),
            clip.media_type
        );

        if self.copy_to_clipboard {
            if let Err(e) = copy_file_to_clipboard(&path) {
                tracing::warn!("Failed to copy clip to clipboard: {e}");
            }
        }

        Ok(Delivery {
            location: path.display().to_string(),
            bytes: clip.len(),
            media_type: clip.media_type.clone(),
        })
    }
}
