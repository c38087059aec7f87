use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use lockbox_core::codec::{CodecError, CredentialCodec, SealedPassword};
use tracing::instrument;

use crate::key_source::KeyMaterial;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// AES-256-GCM codec for the password field. Each call draws a fresh nonce
/// from the OS RNG; the GCM tag is split out so the blob carries it explicitly.
/// The key id is bound as associated data, so every field of the blob is
/// covered by the tag.
pub struct AesGcmCodec {
    cipher: Aes256Gcm,
    key_id: String,
}

impl AesGcmCodec {
    pub fn new(material: KeyMaterial) -> Result<Self, CodecError> {
        let cipher =
            Aes256Gcm::new_from_slice(&material.bytes).map_err(|e| CodecError::Encrypt {
                reason: format!("cipher init failed: {e}"),
            })?;
        Ok(Self {
            cipher,
            key_id: material.id.clone(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl CredentialCodec for AesGcmCodec {
    #[instrument(skip_all, fields(key_id = %self.key_id))]
    fn encrypt(&self, plaintext: &str) -> Result<SealedPassword, CodecError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut sealed = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: self.key_id.as_bytes(),
                },
            )
            .map_err(|e| CodecError::Encrypt {
                reason: e.to_string(),
            })?;
        if sealed.len() < TAG_LEN {
            return Err(CodecError::Encrypt {
                reason: "ciphertext shorter than authentication tag".to_string(),
            });
        }
        let tag_start = sealed.len() - TAG_LEN;
        let tag = sealed.split_off(tag_start);

        Ok(SealedPassword {
            key_id: self.key_id.clone(),
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(sealed),
            tag: URL_SAFE_NO_PAD.encode(tag),
        })
    }

    #[instrument(skip_all, fields(key_id = %self.key_id))]
    fn decrypt(&self, sealed: &SealedPassword) -> Result<String, CodecError> {
        let same_key = sealed.key_id == self.key_id;
        match self.open(sealed) {
            Ok(plaintext) if same_key => Ok(plaintext),
            // Verified under our own key id: only the blob's key id was altered.
            Ok(_) => Err(integrity("key id does not match authenticated data")),
            Err(err) if same_key => Err(err),
            Err(_) => Err(CodecError::Key {
                expected: self.key_id.clone(),
                found: sealed.key_id.clone(),
            }),
        }
    }
}

impl AesGcmCodec {
    /// Decode and verify a blob against this codec's key and key id.
    fn open(&self, sealed: &SealedPassword) -> Result<String, CodecError> {
        let nonce_bytes = decode_field("nonce", &sealed.nonce)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(integrity("nonce length mismatch"));
        }
        let tag = decode_field("tag", &sealed.tag)?;
        if tag.len() != TAG_LEN {
            return Err(integrity("tag length mismatch"));
        }
        let mut combined = decode_field("ciphertext", &sealed.ciphertext)?;
        combined.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &combined,
                    aad: self.key_id.as_bytes(),
                },
            )
            .map_err(|_| integrity("authentication tag did not verify"))?;

        String::from_utf8(plaintext).map_err(|_| integrity("plaintext is not utf-8"))
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CodecError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| integrity(&format!("{name} decode failed: {e}")))
}

fn integrity(reason: &str) -> CodecError {
    CodecError::Integrity {
        reason: reason.to_string(),
    }
}
