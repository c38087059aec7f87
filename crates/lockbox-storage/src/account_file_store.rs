use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use lockbox_core::{
    accounts::{Account, AccountStore, StoreError},
    codec::SealedPassword,
};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

const COLLECTION_FILE: &str = "accounts.json";

/// File-backed account collection: one JSON array under the data directory.
/// Every write replaces the file atomically via a temp file and rename, so a
/// reader never observes a half-written collection.
pub struct AccountFileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl AccountFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn collection_path(&self) -> PathBuf {
        self.root.join(COLLECTION_FILE)
    }
}

#[async_trait]
impl AccountStore for AccountFileStore {
    #[instrument(skip(self, password))]
    async fn create(&self, email: &str, password: SealedPassword) -> Result<Account, StoreError> {
        let _guard = self.write_lock.lock().await;

        let path = self.collection_path();
        let mut accounts = read_collection(&path)?;
        let account = Account::new(email, password);
        accounts.push(account.clone());
        write_collection(&path, &accounts)?;

        debug!(id = %account.id, total = accounts.len(), "account appended");
        Ok(account)
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = read_collection(&self.collection_path())?;
        Ok(accounts.into_iter().find(|a| a.email == email))
    }
}

fn write_collection(path: &Path, accounts: &[Account]) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| StoreError::Storage {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    let json = serde_json::to_vec_pretty(accounts).map_err(storage_err)?;
    tmp.write_all(&json).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

fn read_collection(path: &Path) -> Result<Vec<Account>, StoreError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(storage_err(err)),
    };

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(storage_err)?;
    if buf.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buf).map_err(storage_err)
}

fn storage_err<E: ToString>(err: E) -> StoreError {
    StoreError::Storage {
        reason: err.to_string(),
    }
}
