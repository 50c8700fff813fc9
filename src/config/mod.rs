//! Typed, read-only access to vault settings (`config.toml`).

pub mod settings;

pub use settings::Settings;
