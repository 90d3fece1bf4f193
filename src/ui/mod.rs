//! Shared terminal UI pieces.

pub mod notice;

pub use notice::render_notice;
