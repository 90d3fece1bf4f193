//! Configuration file editor command.

use anyhow::anyhow;
use std::process::Command;

use crate::config::{get_config_path, MicnoteConfig};

const FALLBACK_EDITORS: [&str; 2] = ["nano", "vi"];

/// Opens `micnote.toml` in `$EDITOR` (falling back to nano, then vi).
///
/// The file is written with defaults first if it does not exist yet, and is
/// parsed again after the editor exits so mistakes are reported right away.
///
/// # Errors
/// - If no editor can be found or it exits unsuccessfully
/// - If the edited file no longer parses
pub fn handle_config() -> anyhow::Result<()> {
    MicnoteConfig::load_or_create()?;
    let config_path = get_config_path()?;

    let (program, args) = resolve_editor(std::env::var("EDITOR").ok().as_deref())
        .ok_or_else(|| anyhow!("No editor found. Please set the $EDITOR environment variable."))?;
    tracing::info!("Opening {} with {program}", config_path.display());

    let status = Command::new(&program)
        .args(&args)
        .arg(&config_path)
        .status()
        .map_err(|e| anyhow!("Failed to open editor '{program}': {e}"))?;

    if !status.success() {
        return Err(anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    match MicnoteConfig::load() {
        Ok(_) => {
            tracing::info!("Config file edited successfully");
            Ok(())
        }
        Err(e) => {
            tracing::warn!("Edited config does not parse: {e}");
            Err(anyhow!("{} is not valid: {e}", config_path.display()))
        }
    }
}

/// Splits `$EDITOR` into program and arguments (so `code --wait` works),
/// or picks the first installed fallback editor.
fn resolve_editor(env_editor: Option<&str>) -> Option<(String, Vec<String>)> {
    if let Some(editor) = env_editor {
        let mut parts = editor.split_whitespace().map(str::to_string);
        if let Some(program) = parts.next() {
            return Some((program, parts.collect()));
        }
    }

    FALLBACK_EDITORS
        .iter()
        .find(|editor| is_editor_available(editor))
        .map(|editor| (editor.to_string(), Vec::new()))
}

fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
