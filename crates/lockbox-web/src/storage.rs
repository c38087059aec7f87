use std::path::PathBuf;

use crate::config::{Config, SecretConfig, DEFAULT_KEY_ENV};
use color_eyre::Result;
use dirs::data_dir;
use lockbox_auth::Authenticator;
use lockbox_storage::{
    account_file_store::AccountFileStore,
    aes_codec::AesGcmCodec,
    key_source::{EnvKeySource, FileKeySource, KeySource, KeyringKeySource},
};
use tracing::{debug, info};

pub type FileAuthenticator = Authenticator<AccountFileStore, AesGcmCodec>;

/// Resolve the default data directory for Lockbox.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("lockbox"))
}

/// Account store rooted at the configured (or default) data directory.
pub fn store_from_config(config: &Config) -> Result<AccountFileStore> {
    let root = match &config.data_dir {
        Some(root) => root.clone(),
        None => default_data_dir()?,
    };
    debug!(?root, "initializing account store");
    Ok(AccountFileStore::new(root))
}

pub fn key_source_from_config(config: &Config) -> Box<dyn KeySource> {
    match config.secret() {
        SecretConfig::Env { env_var } => Box::new(EnvKeySource::new(
            env_var.unwrap_or_else(|| DEFAULT_KEY_ENV.to_string()),
        )),
        SecretConfig::File { path } => Box::new(FileKeySource::new(path)),
        SecretConfig::Keyring { service, account } => Box::new(KeyringKeySource::new(
            service.unwrap_or_else(|| "lockbox".to_string()),
            account.unwrap_or_else(|| "credential-key".to_string()),
        )),
    }
}

/// Load the key once and wire the codec and store into an authenticator.
pub async fn authenticator_from_config(config: &Config) -> Result<FileAuthenticator> {
    let source = key_source_from_config(config);
    authenticator_with_key(source.as_ref(), store_from_config(config)?).await
}

pub async fn authenticator_with_key(
    source: &dyn KeySource,
    store: AccountFileStore,
) -> Result<FileAuthenticator> {
    let material = source.load().await?;
    info!(key_id = %material.id, "credential key loaded");
    let codec = AesGcmCodec::new(material)?;
    Ok(Authenticator::new(store, codec))
}

/// Helper for tests to construct an authenticator over a temp dir with a fresh key.
#[cfg(test)]
pub async fn test_authenticator(root: impl Into<PathBuf>) -> FileAuthenticator {
    use lockbox_storage::key_source::{generate_key, StaticKeySource};

    let source = StaticKeySource::new(generate_key());
    authenticator_with_key(&source, AccountFileStore::new(root))
        .await
        .expect("authenticator")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_storage::key_source::{encode_key, generate_key, StaticKeySource};

    #[tokio::test]
    async fn builds_authenticator_from_key_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key_path = dir.path().join("key");
        let material = generate_key();
        std::fs::write(&key_path, encode_key(&material)).expect("write key");

        let config = Config {
            data_dir: Some(dir.path().join("data")),
            secret: Some(SecretConfig::File { path: key_path }),
            ..Config::default()
        };
        let auth = authenticator_from_config(&config).await.expect("build");
        assert_eq!(auth.codec().key_id(), material.id);
        assert_eq!(
            auth.store().collection_path(),
            dir.path().join("data").join("accounts.json")
        );
    }

    #[tokio::test]
    async fn missing_env_key_fails_startup() {
        let config = Config {
            secret: Some(SecretConfig::Env {
                env_var: Some("LOCKBOX_TEST_UNSET_SECRET".into()),
            }),
            ..Config::default()
        };
        assert!(authenticator_from_config(&config).await.is_err());
    }

    #[tokio::test]
    async fn codec_uses_the_supplied_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let material = generate_key();
        let source = StaticKeySource::new(material.clone());

        let auth = authenticator_with_key(&source, AccountFileStore::new(dir.path()))
            .await
            .expect("build");
        assert_eq!(auth.codec().key_id(), material.id);
    }
}
