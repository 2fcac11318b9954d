//! Account operations built on `AuthClient`.
//!
//! Each method maps one backend endpoint to a plain value. Session handling
//! (token attachment, refresh, expiry) is entirely the client's job.

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{
    ApiMessage, ChangePasswordRequest, DeviceVerification, NewAccount, ResetPasswordRequest,
    SignInRequest, TelephoneRequest, TokenResponse, VerifyPhoneRequest,
};

use super::client::{AuthClient, Outcome};
use super::transport::{HttpTransport, RequestContext, Transport};
use super::ApiError;

const SIGN_IN_PATH: &str = "/user/sign-in";
const SIGN_UP_PATH: &str = "/user/sign-up";
const VERIFY_PHONE_PATH: &str = "/verify/phone";
const RESEND_SMS_PATH: &str = "/resend-sms";
const FORGOT_PASSWORD_PATH: &str = "/user/forgot-password";
const RESET_PASSWORD_PATH: &str = "/user/reset-password";
const CHANGE_PASSWORD_PATH: &str = "/user/change-password";
const PROFILE_PATH: &str = "/user/profile";

/// Result of a sign-in attempt that the server accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
    SignedIn,
    VerificationRequired(DeviceVerification),
}

pub struct AccountService<T = HttpTransport> {
    client: AuthClient<T>,
}

impl<T: Transport> AccountService<T> {
    pub fn new(client: AuthClient<T>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AuthClient<T> {
        &self.client
    }

    pub fn is_authenticated(&self) -> Result<bool, ApiError> {
        self.client.is_authenticated()
    }

    pub fn sign_out(&self) -> Result<(), ApiError> {
        self.client.sign_out()
    }

    /// Sign in with telephone and password.
    ///
    /// Stores the issued pair on success. When the backend asks for device
    /// verification the store is left untouched.
    pub async fn sign_in(&self, telephone: &str, password: &str) -> Result<SignIn, ApiError> {
        debug!(telephone, "Signing in");
        let request = RequestContext::post(SIGN_IN_PATH).with_body(&SignInRequest { telephone, password })?;

        let response = match self.client.send(request).await? {
            Outcome::Response(response) => response,
            Outcome::VerificationRequired(verification) => {
                return Ok(SignIn::VerificationRequired(verification));
            }
        };

        let pair = TokenResponse::from_body(response.body.as_ref())
            .into_pair()
            .ok_or_else(|| {
                let message = ApiMessage::from_body(response.body.as_ref()).message;
                ApiError::InvalidResponse(
                    message.unwrap_or_else(|| "Sign-in response did not include tokens".into()),
                )
            })?;

        self.client.store_credentials(&pair)?;
        info!("Signed in");
        Ok(SignIn::SignedIn)
    }

    /// Register a new account; the backend then sends an SMS code
    pub async fn sign_up(&self, account: &NewAccount) -> Result<ApiMessage, ApiError> {
        debug!(telephone = %account.telephone, "Registering account");
        let request = RequestContext::post(SIGN_UP_PATH).with_body(account)?;
        self.message(request).await
    }

    /// Confirm a telephone number with the SMS code.
    ///
    /// If the backend reports success together with a full token pair, the
    /// pair is stored and a session begins.
    pub async fn verify_phone(&self, code: &str, telephone: &str) -> Result<ApiMessage, ApiError> {
        let request =
            RequestContext::post(VERIFY_PHONE_PATH).with_body(&VerifyPhoneRequest { code, phone: telephone })?;
        let response = self.client.send(request).await?.into_response()?;

        let message = ApiMessage::from_body(response.body.as_ref());
        if message.success {
            if let Some(pair) = TokenResponse::from_body(response.body.as_ref()).into_pair() {
                self.client.store_credentials(&pair)?;
                info!("Telephone verified, session started");
            }
        }
        Ok(message)
    }

    pub async fn resend_sms_code(&self, telephone: &str) -> Result<ApiMessage, ApiError> {
        let request = RequestContext::post(RESEND_SMS_PATH).with_body(&TelephoneRequest { telephone })?;
        self.message(request).await
    }

    pub async fn forgot_password(&self, telephone: &str) -> Result<ApiMessage, ApiError> {
        let request = RequestContext::post(FORGOT_PASSWORD_PATH).with_body(&TelephoneRequest { telephone })?;
        self.message(request).await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<ApiMessage, ApiError> {
        let request = RequestContext::post(RESET_PASSWORD_PATH).with_body(&ResetPasswordRequest {
            token,
            password: new_password,
        })?;
        self.message(request).await
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<ApiMessage, ApiError> {
        let request = RequestContext::put(CHANGE_PASSWORD_PATH).with_body(&ChangePasswordRequest {
            old_password,
            new_password,
        })?;
        self.message(request).await
    }

    /// Profile of the signed-in user, passed through as JSON
    pub async fn profile(&self) -> Result<Value, ApiError> {
        let response = self.client.send(RequestContext::get(PROFILE_PATH)).await?.into_response()?;
        Ok(response.body.unwrap_or(Value::Null))
    }

    pub async fn update_profile(&self, profile: &Value) -> Result<Value, ApiError> {
        let request = RequestContext::put(PROFILE_PATH).with_body(profile)?;
        let response = self.client.send(request).await?.into_response()?;
        Ok(response.body.unwrap_or(Value::Null))
    }

    /// Check whether the backend is reachable.
    ///
    /// Goes straight to the transport: an auth rejection here only proves
    /// the server is up and must not end the session.
    pub async fn test_connection(&self) -> bool {
        match self.client.transport().execute(&RequestContext::options(SIGN_UP_PATH)).await {
            Ok(response) => {
                let status = response.status;
                let reachable = status.is_success()
                    || status == StatusCode::UNAUTHORIZED
                    || status == StatusCode::FORBIDDEN;
                debug!(status = status.as_u16(), reachable, "Connection test");
                reachable
            }
            Err(e) => {
                warn!(error = %e, "Connection test failed");
                false
            }
        }
    }

    async fn message(&self, request: RequestContext) -> Result<ApiMessage, ApiError> {
        let response = self.client.send(request).await?.into_response()?;
        Ok(ApiMessage::from_body(response.body.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::api::client::tests::{reply, tokens, FakeTransport};
    use crate::auth::{CredentialPair, CredentialStore, MemoryStore};

    fn service(transport: FakeTransport, store: &Arc<MemoryStore>) -> AccountService<FakeTransport> {
        AccountService::new(AuthClient::new(transport, store.clone()))
    }

    #[tokio::test]
    async fn test_sign_in_stores_pair() {
        let store = Arc::new(MemoryStore::new());
        let service = service(FakeTransport::new(|_| reply(200, tokens("A1", "R1"))), &store);

        let result = service.sign_in("05551234567", "hunter22").await.unwrap();
        assert_eq!(result, SignIn::SignedIn);
        assert_eq!(store.get().unwrap(), Some(CredentialPair::new("A1", "R1")));

        let sent = service.client().transport().calls_to(SIGN_IN_PATH);
        let body = sent[0].body.as_ref().unwrap();
        assert_eq!(body["telephone"], "05551234567");
        assert_eq!(body["password"], "hunter22");
        assert!(sent[0].bearer().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_new_device_leaves_store_empty() {
        let store = Arc::new(MemoryStore::new());
        let service = service(
            FakeTransport::new(|_| reply(200, json!({"newDevice": true, "telephone": "05551234567"}))),
            &store,
        );

        let result = service.sign_in("05551234567", "hunter22").await.unwrap();
        assert!(matches!(result, SignIn::VerificationRequired(ref v) if v.telephone.as_deref() == Some("05551234567")));
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_without_tokens() {
        let store = Arc::new(MemoryStore::new());
        let service = service(
            FakeTransport::new(|_| reply(200, json!({"message": "Account locked"}))),
            &store,
        );

        let err = service.sign_in("05551234567", "hunter22").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(ref m) if m == "Account locked"));
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let store = Arc::new(MemoryStore::new());
        let service = service(FakeTransport::new(|_| reply(401, json!({}))), &store);

        let err = service.sign_in("05551234567", "wrong").await.unwrap_err();
        assert!(err.is_session_expired());
        assert!(service.client().transport().calls_to("/auth/refresh-token").is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_reports_server_message() {
        let store = Arc::new(MemoryStore::new());
        let service = service(
            FakeTransport::new(|_| reply(409, json!({"message": "User already exists"}))),
            &store,
        );
        let account = NewAccount {
            first_name: "Ali".into(),
            last_name: "Demir".into(),
            telephone: "05551234567".into(),
            password: "hunter22".into(),
            device_uuid: "a1b2c3d4-e5f6-7890-abcd-1234567890ef".into(),
            fcm_token: "fcm".into(),
        };

        let err = service.sign_up(&account).await.unwrap_err();
        assert!(matches!(err, ApiError::Server { ref message, .. } if message == "User already exists"));
    }

    #[tokio::test]
    async fn test_verify_phone_starts_session() {
        let store = Arc::new(MemoryStore::new());
        let service = service(
            FakeTransport::new(|_| {
                let mut body = tokens("A1", "R1");
                body["success"] = json!(true);
                reply(200, body)
            }),
            &store,
        );

        let message = service.verify_phone("123456", "05551234567").await.unwrap();
        assert!(message.success);
        assert_eq!(store.get().unwrap(), Some(CredentialPair::new("A1", "R1")));

        let sent = service.client().transport().calls_to(VERIFY_PHONE_PATH);
        assert_eq!(sent[0].body.as_ref().unwrap(), &json!({"code": "123456", "phone": "05551234567"}));
    }

    #[tokio::test]
    async fn test_verify_phone_failure_stores_nothing() {
        let store = Arc::new(MemoryStore::new());
        let service = service(
            FakeTransport::new(|_| reply(200, json!({"success": false, "message": "Wrong code"}))),
            &store,
        );

        let message = service.verify_phone("000000", "05551234567").await.unwrap();
        assert!(!message.success);
        assert_eq!(message.message.as_deref(), Some("Wrong code"));
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password_is_authenticated_put() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("A1", "R1")));
        let service = service(FakeTransport::new(|_| reply(200, json!({"success": true}))), &store);

        let message = service.change_password("old", "new").await.unwrap();
        assert!(message.success);

        let sent = service.client().transport().calls_to(CHANGE_PASSWORD_PATH);
        assert_eq!(sent[0].method, reqwest::Method::PUT);
        assert_eq!(sent[0].bearer(), Some("A1"));
    }

    #[tokio::test]
    async fn test_profile_passthrough() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("A1", "R1")));
        let service = service(
            FakeTransport::new(|_| reply(200, json!({"firstName": "Ali", "balance": 120}))),
            &store,
        );

        let profile = service.profile().await.unwrap();
        assert_eq!(profile["balance"], 120);
    }

    #[tokio::test]
    async fn test_resend_sms_code_request() {
        let store = Arc::new(MemoryStore::new());
        let service = service(
            FakeTransport::new(|_| reply(200, json!({"success": true, "message": "Code sent"}))),
            &store,
        );

        let message = service.resend_sms_code("05551234567").await.unwrap();
        assert_eq!(message.message.as_deref(), Some("Code sent"));

        let sent = service.client().transport().calls_to(RESEND_SMS_PATH);
        assert_eq!(sent[0].method, reqwest::Method::POST);
        assert_eq!(sent[0].body.as_ref().unwrap(), &json!({"telephone": "05551234567"}));
    }

    #[tokio::test]
    async fn test_forgot_password_request() {
        let store = Arc::new(MemoryStore::new());
        let service = service(FakeTransport::new(|_| reply(200, json!({"success": true}))), &store);

        let message = service.forgot_password("05551234567").await.unwrap();
        assert!(message.success);

        let sent = service.client().transport().calls_to(FORGOT_PASSWORD_PATH);
        assert_eq!(sent[0].method, reqwest::Method::POST);
        assert_eq!(sent[0].body.as_ref().unwrap(), &json!({"telephone": "05551234567"}));
    }

    #[tokio::test]
    async fn test_reset_password_request() {
        let store = Arc::new(MemoryStore::new());
        let service = service(FakeTransport::new(|_| reply(200, json!({"success": true}))), &store);

        let message = service.reset_password("reset-token", "new-secret").await.unwrap();
        assert!(message.success);

        let sent = service.client().transport().calls_to(RESET_PASSWORD_PATH);
        assert_eq!(sent[0].method, reqwest::Method::POST);
        assert_eq!(
            sent[0].body.as_ref().unwrap(),
            &json!({"token": "reset-token", "password": "new-secret"})
        );
    }

    #[tokio::test]
    async fn test_update_profile_request() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("A1", "R1")));
        let service = service(
            FakeTransport::new(|req| reply(200, req.body.clone().unwrap_or(Value::Null))),
            &store,
        );

        let updated = service.update_profile(&json!({"firstName": "Veli"})).await.unwrap();
        assert_eq!(updated["firstName"], "Veli");

        let sent = service.client().transport().calls_to(PROFILE_PATH);
        assert_eq!(sent[0].method, reqwest::Method::PUT);
        assert_eq!(sent[0].bearer(), Some("A1"));
        assert_eq!(sent[0].body.as_ref().unwrap(), &json!({"firstName": "Veli"}));
    }

    #[tokio::test]
    async fn test_new_device_outside_sign_in_is_invalid() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("A1", "R1")));
        let service = service(FakeTransport::new(|_| reply(200, json!({"newDevice": true}))), &store);

        let err = service.profile().await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        assert!(store.get().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_connection_probe_keeps_session() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("A1", "R1")));
        let service = service(FakeTransport::new(|_| reply(403, json!({}))), &store);

        assert!(service.test_connection().await);
        assert!(store.get().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_connection_probe_failures() {
        let store = Arc::new(MemoryStore::new());
        let down = service(FakeTransport::new(|_| Err(ApiError::Network("refused".into()))), &store);
        assert!(!down.test_connection().await);

        let broken = service(FakeTransport::new(|_| reply(502, json!({}))), &store);
        assert!(!broken.test_connection().await);
    }

    #[test]
    fn test_sign_out() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("A1", "R1")));
        let service = service(FakeTransport::new(|_| reply(200, json!({}))), &store);

        assert!(service.is_authenticated().unwrap());
        service.sign_out().unwrap();
        assert!(!service.is_authenticated().unwrap());
    }
}
