//! Configuration management for micnote.
//!
//! Settings live in `~/.config/micnote/micnote.toml`; every field has a default
//! so partial files are fine.

pub mod file;

pub use file::{get_config_path, MicnoteConfig};
