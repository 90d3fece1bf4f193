//! List available audio input devices.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::config::MicnoteConfig;
use crate::recording::audio::suppress_alsa_warnings;

/// One enumerated input device.
struct DeviceInfo {
    name: String,
    config: Option<(u32, u16)>,
}

/// Lists all available audio input devices, marking the system default and the
/// one selected in `micnote.toml`.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    let (default_name, devices) = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices: Vec<DeviceInfo> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?
            .filter_map(|device| {
                let name = device.name().ok()?;
                let config = device
                    .default_input_config()
                    .ok()
                    .map(|c| (c.sample_rate().0, c.channels()));
                Some(DeviceInfo { name, config })
            })
            .collect();
        Ok((default_name, devices))
    })?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    let configured = MicnoteConfig::load()
        .map(|c| c.recording.device)
        .unwrap_or_else(|_| "default".to_string());

    println!();
    println!("Available audio input devices:");
    println!();

    for (index, device) in devices.iter().enumerate() {
        let mut tags = Vec::new();
        if default_name.as_deref() == Some(device.name.as_str()) {
            tags.push("DEFAULT");
        }
        if is_selected(&configured, index, &device.name, default_name.as_deref()) {
            tags.push("SELECTED");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };

        println!("  ID: {index}");
        println!("    Name: {}{tags}", device.name);
        match device.config {
            Some((rate, channels)) => println!("    Config: {rate}Hz, {channels} channels"),
            None => println!("    Config: unavailable"),
        }
        println!();
    }

    println!("Set [recording] device in micnote.toml to an ID or name.");
    Ok(())
}

/// Whether the `device` setting resolves to this device.
fn is_selected(setting: &str, index: usize, name: &str, default_name: Option<&str>) -> bool {
    match setting {
        "default" => default_name == Some(name),
        other => other.parse::<usize>().map_or(other == name, |i| i == index),
    }
}
