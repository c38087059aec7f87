//! Core abstractions for Lockbox: the account model, the credential store
//! contract, and the credential codec contract.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod accounts;
pub mod codec;
