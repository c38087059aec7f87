use std::{fmt, path::PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the symmetric key in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Key material used for encryption at rest. Loaded once at startup and moved
/// into the codec; nothing mutates it afterwards. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    /// Fingerprint of the key bytes, stored alongside every sealed blob.
    pub id: String,
    /// 256-bit symmetric key.
    pub bytes: [u8; KEY_LEN],
}

impl KeyMaterial {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            id: fingerprint(&bytes),
            bytes,
        }
    }
}

// Never print key bytes.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("environment variable {0} is not set")]
    MissingEnv(String),
    #[error("key file unreadable: {0}")]
    Io(String),
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Where the credential key comes from. Never a literal in source.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn load(&self) -> Result<KeyMaterial, KeyError>;
}

/// Base64 key read from an environment variable.
pub struct EnvKeySource {
    var: String,
}

impl EnvKeySource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl KeySource for EnvKeySource {
    async fn load(&self) -> Result<KeyMaterial, KeyError> {
        let encoded =
            std::env::var(&self.var).map_err(|_| KeyError::MissingEnv(self.var.clone()))?;
        decode_key(&encoded)
    }
}

/// Base64 key read from a file (surrounding whitespace ignored).
pub struct FileKeySource {
    path: PathBuf,
}

impl FileKeySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KeySource for FileKeySource {
    async fn load(&self) -> Result<KeyMaterial, KeyError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| KeyError::Io(format!("{}: {e}", self.path.display())))?;
        decode_key(&contents)
    }
}

/// OS keyring-backed source. Creates and stores a key on first use.
pub struct KeyringKeySource {
    service: String,
    account: String,
}

impl KeyringKeySource {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

#[async_trait]
impl KeySource for KeyringKeySource {
    async fn load(&self) -> Result<KeyMaterial, KeyError> {
        // Keyring operations are synchronous; wrap in async for trait compatibility.
        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        if let Some(existing) = stored_key(entry.get_password())? {
            return Ok(existing);
        }

        let material = generate_key();
        entry
            .set_password(&encode_key(&material))
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        Ok(material)
    }
}

/// Only a missing entry means "no key yet". Any other keyring failure must
/// not lead to a new key overwriting the stored one.
fn stored_key(lookup: Result<String, keyring::Error>) -> Result<Option<KeyMaterial>, KeyError> {
    match lookup {
        Ok(secret) => decode_key(&secret).map(Some),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(KeyError::Keyring(err.to_string())),
    }
}

/// Fixed key held in memory, for tests and ephemeral runs.
#[derive(Debug, Clone)]
pub struct StaticKeySource {
    material: KeyMaterial,
}

impl StaticKeySource {
    pub fn new(material: KeyMaterial) -> Self {
        Self { material }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn load(&self) -> Result<KeyMaterial, KeyError> {
        Ok(self.material.clone())
    }
}

/// Fresh random key from the OS RNG.
pub fn generate_key() -> KeyMaterial {
    let mut bytes = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut bytes);
    let material = KeyMaterial::from_bytes(bytes);
    bytes.zeroize();
    material
}

pub fn encode_key(material: &KeyMaterial) -> String {
    general_purpose::STANDARD.encode(material.bytes)
}

pub fn decode_key(secret: &str) -> Result<KeyMaterial, KeyError> {
    let mut bytes = general_purpose::STANDARD
        .decode(secret.trim())
        .map_err(|e| KeyError::Decode(e.to_string()))?;

    if bytes.len() != KEY_LEN {
        return Err(KeyError::Decode(format!(
            "expected {KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&bytes);
    let material = KeyMaterial::from_bytes(out);
    bytes.zeroize();
    out.zeroize();
    Ok(material)
}

/// First 8 bytes of SHA-256 over the key, hex encoded.
fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_returns_its_key() {
        let material = generate_key();
        let source = StaticKeySource::new(material.clone());
        let first = source.load().await.unwrap();
        let second = source.load().await.unwrap();

        assert_eq!(first, material);
        assert_eq!(second, material);
    }

    #[test]
    fn missing_keyring_entry_means_no_key_yet() {
        let found = stored_key(Err(keyring::Error::NoEntry)).expect("no entry is not an error");
        assert!(found.is_none());
    }

    #[test]
    fn keyring_failures_are_not_treated_as_missing() {
        let err = stored_key(Err(keyring::Error::PlatformFailure("locked".into())))
            .expect_err("platform failure must surface");
        assert!(matches!(err, KeyError::Keyring(_)));

        let err = stored_key(Err(keyring::Error::NoStorageAccess("denied".into())))
            .expect_err("no storage access must surface");
        assert!(matches!(err, KeyError::Keyring(_)));
    }

    #[test]
    fn stored_keyring_secret_is_decoded() {
        let material = generate_key();
        let found = stored_key(Ok(encode_key(&material)))
            .expect("decode")
            .expect("present");
        assert_eq!(found, material);

        let err = stored_key(Ok("short".into())).expect_err("bad secret");
        assert!(matches!(err, KeyError::Decode(_)));
    }

    #[test]
    fn zeroize_wipes_key_bytes() {
        let mut material = KeyMaterial::from_bytes([0x5A; KEY_LEN]);
        material.zeroize();
        assert_eq!(material.bytes, [0u8; KEY_LEN]);
        assert!(material.id.is_empty());
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode_key("abcd").expect_err("should reject wrong length");
        assert!(matches!(err, KeyError::Decode(_)));
    }

    #[test]
    fn encode_decode_preserves_key_and_fingerprint() {
        let material = generate_key();
        let decoded = decode_key(&format!("{}\n", encode_key(&material))).expect("decode");
        assert_eq!(decoded, material);
        assert_eq!(decoded.id.len(), 16);
    }

    #[test]
    fn distinct_keys_have_distinct_fingerprints() {
        let a = KeyMaterial::from_bytes([1u8; KEY_LEN]);
        let b = KeyMaterial::from_bytes([2u8; KEY_LEN]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn debug_output_hides_key_bytes() {
        let material = KeyMaterial::from_bytes([0xAB; KEY_LEN]);
        let printed = format!("{material:?}");
        assert!(printed.contains(&material.id));
        assert!(!printed.contains("171"));
    }

    #[tokio::test]
    async fn file_source_reads_base64_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key");
        let material = generate_key();
        std::fs::write(&path, encode_key(&material)).expect("write key");

        let loaded = FileKeySource::new(&path).load().await.expect("load");
        assert_eq!(loaded, material);
    }

    #[tokio::test]
    async fn file_source_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = FileKeySource::new(dir.path().join("absent"))
            .load()
            .await
            .expect_err("missing file");
        assert!(matches!(err, KeyError::Io(_)));
    }

    #[tokio::test]
    async fn env_source_reports_missing_variable() {
        let err = EnvKeySource::new("LOCKBOX_TEST_KEY_THAT_IS_NEVER_SET")
            .load()
            .await
            .expect_err("unset variable");
        assert!(matches!(err, KeyError::MissingEnv(_)));
    }
}
