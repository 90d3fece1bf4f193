//! The finished voice clip handed to the upload collaborator.

use super::encoding::FALLBACK_MEDIA_TYPE;

/// File name the host application sees, regardless of the negotiated encoding.
pub const CLIP_FILE_NAME: &str = "voice-message.ogg";

/// Encoded audio plus the media type it was produced in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceClip {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl VoiceClip {
    /// Concatenates chunks in the order given.
    ///
    /// An empty or missing media type is replaced with [`FALLBACK_MEDIA_TYPE`].
    pub fn assemble(chunks: Vec<Vec<u8>>, media_type: Option<String>) -> Self {
        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in chunks {
            bytes.extend_from_slice(&chunk);
        }

        let media_type = media_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string());

        Self { bytes, media_type }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn file_name(&self) -> &'static str {
        CLIP_FILE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_in_emission_order() {
        let clip = VoiceClip::assemble(
            vec![vec![1, 2], vec![3], vec![4, 5, 6]],
            Some("audio/webm; codecs=opus".into()),
        );
        assert_eq!(clip.bytes, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(clip.media_type, "audio/webm; codecs=opus");
        assert_eq!(clip.file_name(), "voice-message.ogg");
    }

    #[test]
    fn blank_media_type_uses_fallback() {
        let clip = VoiceClip::assemble(vec![], Some("  ".into()));
        assert!(clip.is_empty());
        assert_eq!(clip.media_type, FALLBACK_MEDIA_TYPE);

        let clip = VoiceClip::assemble(vec![vec![0; 3]], None);
        assert_eq!(clip.len(), 3);
        assert_eq!(clip.media_type, FALLBACK_MEDIA_TYPE);
    }
}
