//! Signup and login over an [`AccountStore`] and a [`CredentialCodec`].
//!
//! Passwords are sealed with reversible encryption, not a one-way hash. A real
//! deployment should store salted password hashes instead.

use std::sync::Arc;

use lockbox_core::{
    accounts::{Account, AccountStore, StoreError},
    codec::{CodecError, CredentialCodec},
};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result of a login attempt that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Granted,
    /// Unknown email and wrong password are deliberately indistinguishable.
    InvalidCredentials,
}

pub struct Authenticator<S: AccountStore, C: CredentialCodec> {
    store: Arc<S>,
    codec: Arc<C>,
}

impl<S: AccountStore, C: CredentialCodec> Clone for Authenticator<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<S: AccountStore, C: CredentialCodec> Authenticator<S, C> {
    pub fn new(store: S, codec: C) -> Self {
        Self {
            store: Arc::new(store),
            codec: Arc::new(codec),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Seal the password and append a new account. Duplicate emails are
    /// accepted; nothing about the input is validated.
    #[instrument(skip(self, password))]
    pub async fn signup(&self, email: &str, password: &str) -> Result<Account, AuthError> {
        let sealed = self.codec.encrypt(password)?;
        let account = self.store.create(email, sealed).await?;
        debug!(id = %account.id, "account created");
        Ok(account)
    }

    /// Check a submitted email/password pair against the first stored
    /// account with that email.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let Some(account) = self.store.find_by_email(email).await? else {
            debug!("no account for email");
            return Ok(LoginOutcome::InvalidCredentials);
        };

        let stored = self.codec.decrypt(&account.password)?;
        if constant_time_eq(stored.as_bytes(), password.as_bytes()) {
            Ok(LoginOutcome::Granted)
        } else {
            debug!(id = %account.id, "password mismatch");
            Ok(LoginOutcome::InvalidCredentials)
        }
    }
}

/// Byte comparison whose running time depends only on the lengths. Unequal
/// lengths return early, so the length of the stored password is not hidden.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
