//! Show which preferred encodings this machine can record.

use crate::config::MicnoteConfig;
use crate::recording::encoder::WAV_MEDIA_TYPE;
use crate::recording::encoding::{self, normalize};
use crate::recording::runtime::MediaRuntime;
use crate::recording::CpalRuntime;

/// Prints the configured preference list with support markers and the encoding a
/// new recording would negotiate.
///
/// # Errors
/// - If the configuration cannot be loaded
pub fn handle_encodings() -> Result<(), anyhow::Error> {
    let config = MicnoteConfig::load_or_create()?;
    let runtime = CpalRuntime::new(config.recording.device.clone());
    let supported = runtime.supported_encodings();

    match runtime.ffmpeg_path() {
        Some(path) => println!("ffmpeg: {}", path.display()),
        None => println!("ffmpeg: not found (only {WAV_MEDIA_TYPE} is available)"),
    }
    println!();

    for line in preference_report(&config.recording.preferred_encodings, &supported) {
        println!("{line}");
    }
    println!();

    match encoding::negotiate(&config.recording.preferred_encodings, &supported) {
        Some(choice) => println!("Recording will use: {choice}"),
        None => println!("Recording will use the default encoder: {WAV_MEDIA_TYPE}"),
    }
    Ok(())
}

fn preference_report(preferred: &[String], supported: &[String]) -> Vec<String> {
    preferred
        .iter()
        .enumerate()
        .map(|(rank, media_type)| {
            let available = supported.iter().any(|s| normalize(s) == normalize(media_type));
            let mark = if available { "✓" } else { "✗" };
            format!("  {}. {mark} {media_type}", rank + 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_marks_supported_entries_in_order() {
        let preferred = vec!["audio/ogg; codecs=opus".to_string(), "audio/webm".to_string()];
        let supported = vec!["audio/webm".to_string()];
        assert_eq!(
            preference_report(&preferred, &supported),
            vec![
                "  1. ✗ audio/ogg; codecs=opus".to_string(),
                "  2. ✓ audio/webm".to_string(),
            ]
        );
    }
}
