//! Authenticated access to the ticketwallet account API.
//!
//! This module provides the `AuthClient`, which attaches the stored access
//! token to outgoing requests and transparently refreshes it once when the
//! server answers 401, and the `AccountService` built on top of it.
//!
//! The backend issues a rotating access/refresh bearer token pair on sign-in.

pub mod client;
pub mod error;
pub mod service;
pub mod transport;

pub use client::{AuthClient, Outcome, DEFAULT_REFRESH_PATH};
pub use error::ApiError;
pub use service::{AccountService, SignIn};
pub use transport::{ApiResponse, HttpTransport, RequestContext, Transport};
