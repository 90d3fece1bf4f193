//! Clipboard hand-off for delivered clips.
//!
//! Publishes a file as a `text/uri-list` entry so chat applications paste it as an
//! attachment. Uses osascript (macOS), wl-copy (Wayland) or xclip (X11).

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Formats `path` as a `file://` URI, percent-encoding anything outside the
/// unreserved set.
pub fn file_uri(path: &Path) -> String {
    let mut uri = String::from("file://");
    for byte in path.to_string_lossy().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                uri.push(byte as char)
            }
            other => uri.push_str(&format!("%{other:02X}")),
        }
    }
    uri
}

/// Places `path` on the system clipboard as a file reference.
///
/// Returns `Ok(false)` when no clipboard tool is available; the clip has already
/// been delivered to disk by then, so this is never fatal.
pub fn copy_file_to_clipboard(path: &Path) -> anyhow::Result<bool> {
    #[cfg(target_os = "macos")]
    {
        let script = format!(
            "set the clipboard to (POSIX file \"{}\")",
            path.to_string_lossy().replace('"', "\\\"")
        );
        match Command::new("osascript").args(["-e", &script]).status() {
            Ok(status) if status.success() => {
                tracing::debug!("Clip copied to clipboard via osascript");
                return Ok(true);
            }
            Ok(status) => tracing::warn!("osascript exited with {status}"),
            Err(e) => tracing::debug!("osascript not available: {e}"),
        }
    }

    let uri_list = format!("{}\r\n", file_uri(path));

    if pipe_to("wl-copy", &["--type", "text/uri-list"], &uri_list) {
        tracing::debug!("Clip copied to clipboard via wl-copy");
        return Ok(true);
    }

    if pipe_to(
        "xclip",
        &["-selection", "clipboard", "-t", "text/uri-list", "-in", "-quiet"],
        &uri_list,
    ) {
        tracing::debug!("Clip copied to clipboard via xclip");
        return Ok(true);
    }

    tracing::warn!("No clipboard tool available; clip left at {}", path.display());
    Ok(false)
}

fn pipe_to(program: &str, args: &[&str], payload: &str) -> bool {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => {
            tracing::debug!("{program} not found or not executable");
            return false;
        }
    };

    let Some(mut stdin) = child.stdin.take() else {
        return false;
    };
    if let Err(e) = stdin.write_all(payload.as_bytes()) {
        tracing::warn!("Failed to write to {program} stdin: {e}");
        return false;
    }
    drop(stdin);

    // wl-copy and xclip -quiet fork to serve the selection; don't wait on them.
    true
}
