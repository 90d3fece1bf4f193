//! Error taxonomy for recording sessions.

use thiserror::Error;

/// Failures a recording session can run into.
///
/// Start-time variants abort the session after teardown. Hand-off variants are
/// terminal for the clip they concern. None of them are retried.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A recording session is already active")]
    AlreadyActive,

    #[error("Could not access microphone: {0}")]
    DeviceAccess(String),

    #[error("Could not start audio encoder: {0}")]
    Encoder(String),

    #[error("Audio encoder failed while recording: {0}")]
    EncoderFault(String),

    #[error("No upload surface available: {0}")]
    UploadSurfaceMissing(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Text shown to the user through the trigger control.
    pub fn notice(&self) -> String {
        match self {
            Self::DeviceAccess(_) => {
                "Could not access microphone. Please check your permissions.".to_string()
            }
            Self::UploadSurfaceMissing(_) => {
                "Could not find an attachment target. Please check the upload directory in micnote.toml."
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_access_notice_mentions_permissions() {
        let err = SessionError::DeviceAccess("permission denied".into());
        assert!(err.notice().contains("permissions"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SessionError = io.into();
        assert!(matches!(err, SessionError::Io(_)));
    }
}
