//! Concrete credential storage with the password field encrypted at rest.
//! Uses AES-GCM with keys sourced from the environment, a key file, or the OS
//! keyring (or test doubles).

pub mod account_file_store;
pub mod aes_codec;
pub mod key_source;
