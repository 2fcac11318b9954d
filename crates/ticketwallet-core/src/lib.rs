//! Core library for ticketwallet.
//!
//! Provides the authenticated API client, credential stores, wire models
//! and configuration shared by the ticketwallet front ends.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{AccountService, ApiError, AuthClient, Outcome, SignIn};
pub use auth::{CredentialPair, CredentialStore};
pub use config::Config;
