//! Encoding negotiation.
//!
//! Media types are matched against the runtime's capability list in preference
//! order. Nothing here fails: an empty match means "use the runtime default".

/// Preference order used when the config does not override it.
pub const DEFAULT_PREFERENCES: [&str; 4] = [
    "audio/ogg; codecs=opus",
    "audio/ogg",
    "audio/webm; codecs=opus",
    "audio/webm",
];

/// Tag used when an encoder does not report what it produced.
pub const FALLBACK_MEDIA_TYPE: &str = "audio/ogg; codecs=opus";

/// How a media type is produced with ffmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FfmpegProfile {
    /// Media type as requested by the preference list.
    pub media_type: &'static str,
    /// ffmpeg audio encoder name.
    pub codec: &'static str,
    /// ffmpeg muxer name.
    pub container: &'static str,
    /// Media type of the bytes ffmpeg actually writes.
    pub produces: &'static str,
}

const FFMPEG_PROFILES: [FfmpegProfile; 4] = [
    FfmpegProfile {
        media_type: "audio/ogg; codecs=opus",
        codec: "libopus",
        container: "ogg",
        produces: "audio/ogg; codecs=opus",
    },
    FfmpegProfile {
        media_type: "audio/ogg",
        codec: "libvorbis",
        container: "ogg",
        produces: "audio/ogg; codecs=vorbis",
    },
    FfmpegProfile {
        media_type: "audio/webm; codecs=opus",
        codec: "libopus",
        container: "webm",
        produces: "audio/webm; codecs=opus",
    },
    FfmpegProfile {
        media_type: "audio/webm",
        codec: "libopus",
        container: "webm",
        produces: "audio/webm; codecs=opus",
    },
];

/// Canonical form for comparison: lowercase, no whitespace.
pub fn normalize(media_type: &str) -> String {
    media_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Picks the first preferred media type the runtime supports.
///
/// Returns `None` when nothing matches; callers then fall back to the runtime default.
pub fn negotiate(preferred: &[String], supported: &[String]) -> Option<String> {
    let supported: Vec<String> = supported.iter().map(|s| normalize(s)).collect();
    preferred
        .iter()
        .find(|candidate| supported.contains(&normalize(candidate)))
        .cloned()
}

/// Looks up the ffmpeg profile for a media type.
pub fn ffmpeg_profile(media_type: &str) -> Option<FfmpegProfile> {
    let wanted = normalize(media_type);
    FFMPEG_PROFILES
        .iter()
        .find(|p| normalize(p.media_type) == wanted)
        .copied()
}

/// Media types ffmpeg can produce given its encoder and muxer lists.
pub fn ffmpeg_supported(encoders: &[String], muxers: &[String]) -> Vec<String> {
    FFMPEG_PROFILES
        .iter()
        .filter(|p| {
            encoders.iter().any(|e| e == p.codec) && muxers.iter().any(|m| m == p.container)
        })
        .map(|p| p.media_type.to_string())
        .collect()
}
