use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::codec::SealedPassword;

/// Errors produced by account store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying storage failure (read, write, or parse).
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// Persisted credential record. The password is only ever held sealed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password: SealedPassword,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: impl Into<String>, password: SealedPassword) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password,
            created_at: Utc::now(),
        }
    }
}

/// Append-only contract for account persistence.
///
/// Emails are not unique: `create` never checks for an existing record, and
/// `find_by_email` returns the earliest one when several share an email.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Append a new account record.
    async fn create(&self, email: &str, password: SealedPassword) -> Result<Account, StoreError>;

    /// First account (insertion order) whose email matches exactly.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
}

/// In-memory account store for tests and smoke runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAccountStore {
    inner: Arc<Mutex<Vec<Account>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        let guard = self.inner.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create(&self, email: &str, password: SealedPassword) -> Result<Account, StoreError> {
        let mut guard = self.inner.lock().map_err(poisoned)?;
        let account = Account::new(email, password);
        guard.push(account.clone());
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let guard = self.inner.lock().map_err(poisoned)?;
        Ok(guard.iter().find(|a| a.email == email).cloned())
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Storage {
        reason: format!("lock poisoned: {err}"),
    }
}
