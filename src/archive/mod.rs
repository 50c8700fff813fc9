//! Archive module: the at-rest container of a vault.
//!
//! A vault archive is a zip file whose top-level members make up the
//! workspace layout below. The codec packs a workspace directory into
//! one archive file and unpacks it again.

pub mod codec;

use std::path::Path;

pub use codec::{digest, list_members, pack, unpack};

/// Key bundle (public recipients + passphrase-wrapped identities).
pub const KEYS_FILE: &str = "keys.json";

/// Human-editable vault settings.
pub const CONFIG_FILE: &str = "config.toml";

/// Zero-byte sentinel marking a directory as a vault workspace.
pub const MARKER_FILE: &str = ".passvault";

/// Credential records container.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Members that must be present after unpacking.
pub const REQUIRED_MEMBERS: [&str; 3] = [KEYS_FILE, CONFIG_FILE, MARKER_FILE];

/// Names of the required members absent from `dir`.
pub fn missing_members(dir: &Path) -> Vec<String> {
    REQUIRED_MEMBERS
        .iter()
        .filter(|member| !dir.join(member).is_file())
        .map(|member| member.to_string())
        .collect()
}
