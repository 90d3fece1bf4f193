//! FFmpeg discovery and capability probing.
//!
//! Standard installation locations are checked before PATH so ffmpeg is found
//! even when launched from a hotkey daemon with a minimal environment.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::encoding::ffmpeg_supported;

/// Locates the ffmpeg binary.
pub fn find_ffmpeg() -> Result<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/opt/homebrew/bin/ffmpeg",
            "/usr/local/bin/ffmpeg",
            "/usr/bin/ffmpeg",
        ]
    } else if cfg!(target_os = "linux") {
        &["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/snap/bin/ffmpeg"]
    } else if cfg!(target_os = "windows") {
        &[
            "C:\\ffmpeg\\bin\\ffmpeg.exe",
            "C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe",
        ]
    } else {
        &[]
    };

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        tracing::debug!("Found ffmpeg at: {}", path.display());
        return Ok(path);
    }

    let search_cmd = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };
    let output = Command::new(search_cmd)
        .arg("ffmpeg")
        .output()
        .map_err(|e| anyhow!("Failed to search PATH for ffmpeg: {e}"))?;

    let found = String::from_utf8_lossy(&output.stdout);
    let path = PathBuf::from(found.lines().next().unwrap_or_default().trim());
    if output.status.success() && !path.as_os_str().is_empty() {
        tracing::debug!("Found ffmpeg in PATH at: {}", path.display());
        return Ok(path);
    }

    Err(anyhow!(
        "ffmpeg not found; voice messages will be recorded as WAV.\n\
         macOS: brew install ffmpeg\n\
         Linux: apt install ffmpeg (Debian/Ubuntu) or dnf install ffmpeg (Fedora)"
    ))
}

/// What the local ffmpeg build can produce.
#[derive(Debug, Clone)]
pub struct FfmpegCapabilities {
    pub path: PathBuf,
    /// Supported media types in preference-table order.
    pub media_types: Vec<String>,
}

/// Finds ffmpeg and asks it which encoders and muxers it was built with.
///
/// Returns `None` when ffmpeg is missing or cannot be queried.
pub fn probe() -> Option<FfmpegCapabilities> {
    let path = match find_ffmpeg() {
        Ok(path) => path,
        Err(e) => {
            tracing::info!("{e}");
            return None;
        }
    };

    let encoders = match list_components(&path, "-encoders") {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!("Could not list ffmpeg encoders: {e}");
            return None;
        }
    };
    let muxers = match list_components(&path, "-muxers") {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!("Could not list ffmpeg muxers: {e}");
            return None;
        }
    };

    let media_types = ffmpeg_supported(&encoders, &muxers);
    tracing::debug!("ffmpeg at {} supports {:?}", path.display(), media_types);
    Some(FfmpegCapabilities { path, media_types })
}

fn list_components(ffmpeg: &Path, flag: &str) -> Result<Vec<String>> {
    let output = Command::new(ffmpeg).args(["-hide_banner", flag]).output()?;
    if !output.status.success() {
        return Err(anyhow!(
            "ffmpeg {flag} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(parse_component_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses `ffmpeg -encoders` / `-muxers` output.
///
/// Both print a legend, a dashed separator, then one `FLAGS name description`
/// row per component. Muxer rows may list several comma-separated names.
pub fn parse_component_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip_while(|line| {
            let line = line.trim();
            line.is_empty() || !line.chars().all(|c| c == '-')
        })
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .flat_map(|names| names.split(','))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_encoder_listing() {
        let listing = "Encoders:\n V..... = Video\n A..... = Audio\n ------\n \
                       A....D libopus              libopus Opus\n \
                       A..... libvorbis            libvorbis\n \
                       A....D aac                  AAC (Advanced Audio Coding)\n";
        assert_eq!(
            parse_component_list(listing),
            vec!["libopus", "libvorbis", "aac"]
        );
    }

    #[test]
    fn parses_muxer_listing_with_aliases() {
        let listing = "File formats:\n D. = Demuxing supported\n E = Muxing supported\n --\n  \
                       E ogg             Ogg\n  E webm            WebM\n  E mov,mp4,m4a     QuickTime\n";
        let muxers = parse_component_list(listing);
        assert!(muxers.contains(&"ogg".to_string()));
        assert!(muxers.contains(&"webm".to_string()));
        assert!(muxers.contains(&"mp4".to_string()));
    }

    #[test]
    fn find_ffmpeg_reports_either_way() {
        match find_ffmpeg() {
            Ok(path) => println!("Found ffmpeg at: {}", path.display()),
            Err(e) => println!("ffmpeg not found (expected on CI): {e}"),
        }
    }
}
