//! Cryptographic primitives for passvault.
//!
//! This module provides:
//! - The key bundle schema and keypair generation (`keys`)
//! - The per-session crypto broker over age X25519 (`broker`)
//! - The `Cipher` seam the credential store encrypts through

pub mod broker;
pub mod keys;

pub use broker::CryptoBroker;
pub use keys::{generate_keypair, KeyBundle, KeyPair};

use crate::errors::CryptoError;

/// Payload-in, payload-out encryption boundary.
///
/// The credential store only ever sees this trait, never key material.
pub trait Cipher {
    /// Encrypt `plaintext` to the vault recipient.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt a payload produced by `encrypt`.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}
