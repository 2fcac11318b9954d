//! Authenticated client for the account API.
//!
//! `AuthClient` attaches the stored access token to every request. A 401 is
//! answered by refreshing the credential pair and resending the request
//! once; if that is not possible the store is cleared and the caller gets
//! `ApiError::SessionExpired`.

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::auth::{CredentialPair, CredentialStore};
use crate::models::{DeviceVerification, RefreshRequest, TokenResponse};

use super::transport::{ApiResponse, HttpTransport, RequestContext, Transport};
use super::ApiError;

/// Endpoint that exchanges a refresh token for a new pair
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh-token";

/// Result of a request that reached the server and was accepted.
#[derive(Debug, Clone)]
pub enum Outcome {
    Response(ApiResponse),
    /// Accepted, but the device has to be verified before a session is issued
    VerificationRequired(DeviceVerification),
}

impl Outcome {
    /// The response, treating a verification request as unexpected
    pub fn into_response(self) -> Result<ApiResponse, ApiError> {
        match self {
            Outcome::Response(response) => Ok(response),
            Outcome::VerificationRequired(_) => Err(ApiError::InvalidResponse(
                "Unexpected device verification request".into(),
            )),
        }
    }
}

/// Why a refresh did not produce a new pair. Never leaves this module.
#[derive(Error, Debug)]
enum RefreshFailure {
    #[error("refresh rejected with status {0}")]
    Rejected(StatusCode),

    #[error("refresh response is missing a token")]
    Malformed,

    #[error("refresh request failed: {0}")]
    Transport(#[from] ApiError),
}

pub struct AuthClient<T = HttpTransport> {
    transport: T,
    store: Arc<dyn CredentialStore>,
    refresh_path: String,
    /// Held for the duration of a refresh so concurrent 401s share one
    refresh_lock: Mutex<()>,
}

impl<T: Transport> AuthClient<T> {
    pub fn new(transport: T, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            transport,
            store,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// A session exists while the store holds a pair
    pub fn is_authenticated(&self) -> Result<bool, ApiError> {
        Ok(self.store.get()?.is_some())
    }

    /// Start a session with a freshly issued pair
    pub fn store_credentials(&self, pair: &CredentialPair) -> Result<(), ApiError> {
        self.store.set(pair)?;
        Ok(())
    }

    pub fn sign_out(&self) -> Result<(), ApiError> {
        self.store.clear()?;
        info!("Signed out");
        Ok(())
    }

    /// Send a request with the current access token.
    ///
    /// A 401 triggers at most one refresh and one resend. 401/403 that
    /// cannot be recovered from clear the store and return `SessionExpired`.
    /// Other error statuses and transport failures are returned unchanged
    /// without touching the store.
    pub async fn send(&self, mut request: RequestContext) -> Result<Outcome, ApiError> {
        let mut token = self.store.get()?.map(|pair| pair.access_token);

        loop {
            request.set_bearer(token.as_deref())?;
            debug!(
                method = %request.method,
                path = %request.path,
                authenticated = token.is_some(),
                retried = request.retried,
                "Sending request"
            );

            let response = self.transport.execute(&request).await?;
            let status = response.status;

            if status.is_success() {
                if let Some(verification) = DeviceVerification::detect(response.body.as_ref()) {
                    info!(path = %request.path, "Device verification required");
                    return Ok(Outcome::VerificationRequired(verification));
                }
                return Ok(Outcome::Response(response));
            }

            if status == StatusCode::UNAUTHORIZED && !request.retried {
                request.retried = true;
                let pair = self.recover(token.as_deref()).await?;
                token = Some(pair.access_token);
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                warn!(
                    path = %request.path,
                    status = status.as_u16(),
                    retried = request.retried,
                    "Authentication rejected"
                );
                return Err(self.expire_session());
            }

            debug!(path = %request.path, status = status.as_u16(), "Request failed");
            return Err(ApiError::from_status(status, response.body.as_ref()));
        }
    }

    /// Obtain a pair to resend with after `rejected` got a 401.
    ///
    /// Runs under the refresh lock. If another request rotated the pair
    /// while this one waited, the stored pair is reused without a refresh.
    async fn recover(&self, rejected: Option<&str>) -> Result<CredentialPair, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        let current = match self.store.get()? {
            Some(pair) => pair,
            None => {
                debug!("No refresh token stored");
                return Err(self.expire_session());
            }
        };

        if rejected != Some(current.access_token.as_str()) {
            debug!("Credentials already rotated, reusing stored pair");
            return Ok(current);
        }

        let pair = match self.refresh(&current.refresh_token).await {
            Ok(pair) => pair,
            Err(reason) => {
                warn!(%reason, "Credential refresh failed");
                return Err(self.expire_session());
            }
        };

        // The old refresh token is spent, so an unsaved pair ends the session
        if let Err(e) = self.store.set(&pair) {
            error!(error = %e, "Failed to store refreshed credentials");
            return Err(self.expire_session());
        }

        info!("Credentials refreshed");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair. Never retried.
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, RefreshFailure> {
        let request =
            RequestContext::post(self.refresh_path.as_str()).with_body(&RefreshRequest { refresh_token })?;

        let response = self.transport.execute(&request).await?;
        if !response.status.is_success() {
            return Err(RefreshFailure::Rejected(response.status));
        }

        TokenResponse::from_body(response.body.as_ref())
            .into_pair()
            .ok_or(RefreshFailure::Malformed)
    }

    /// Clear the store and produce the error that ends the session
    fn expire_session(&self) -> ApiError {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, credentials_retained = true, "Failed to clear credentials");
        }
        info!("Session expired");
        ApiError::SessionExpired
    }
}
