use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by credential codecs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The blob was sealed under a different key.
    #[error("key mismatch: blob sealed with {found}, codec holds {expected}")]
    Key { expected: String, found: String },
    /// Tag did not verify, or the blob is malformed.
    #[error("integrity check failed: {reason}")]
    Integrity { reason: String },
    /// Encryption itself failed.
    #[error("encrypt failed: {reason}")]
    Encrypt { reason: String },
}

/// Encrypted password as persisted on an account.
///
/// All byte fields are base64url (no padding) so the blob embeds directly in
/// JSON documents. `key_id` is a fingerprint of the sealing key, never the key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SealedPassword {
    pub key_id: String,
    pub nonce: String,
    pub ciphertext: String,
    pub tag: String,
}

/// Symmetric, reversible transform applied to the password field.
///
/// This is encryption, not hashing: anyone holding the key recovers every
/// plaintext.
pub trait CredentialCodec: Send + Sync {
    /// Seal a plaintext under a fresh random nonce.
    fn encrypt(&self, plaintext: &str) -> Result<SealedPassword, CodecError>;

    /// Open a sealed blob back into its plaintext.
    fn decrypt(&self, sealed: &SealedPassword) -> Result<String, CodecError>;
}
