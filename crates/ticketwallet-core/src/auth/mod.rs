//! Credential storage for the signed-in session.
//!
//! This module provides:
//! - `CredentialPair`: the access/refresh token pair issued by the backend
//! - `CredentialStore`: get/set/clear contract every store implements
//! - `MemoryStore`, `KeyringStore`, `FileStore`: in-process, OS keychain and
//!   on-disk implementations
//!
//! A session is "authenticated" exactly when the store holds a pair.

pub mod credentials;
pub mod session;

pub use credentials::{CredentialPair, CredentialStore, KeyringStore, MemoryStore, StoreError};
pub use session::{FileStore, SessionData};
