//! Application command handlers for micnote.
//!
//! # Commands
//! - `record`: Interactive voice message recording (default)
//! - `list_devices`: List available audio input devices
//! - `encodings`: Show supported encodings and the negotiated choice
//! - `config`: Open configuration file in user's preferred editor
//! - `logs`: Display recent log entries

pub mod config;
pub mod encodings;
pub mod list_devices;
pub mod logs;
pub mod record;

pub use config::handle_config;
pub use encodings::handle_encodings;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use record::handle_record;
