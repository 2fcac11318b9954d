//! Request and response bodies exchanged with the account API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::CredentialPair;

/// Body field that marks a sign-in from an unrecognized device
const NEW_DEVICE_FIELD: &str = "newDevice";

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TokenField {
    pub token: String,
}

/// `{ accessToken: { token }, refreshToken: { token } }` as returned by
/// sign-in, refresh and phone verification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(rename = "accessToken")]
    pub access_token: Option<TokenField>,
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<TokenField>,
}

impl TokenResponse {
    /// Both tokens, or `None` if either is missing or empty
    pub fn into_pair(self) -> Option<CredentialPair> {
        let access = self.access_token?.token;
        let refresh = self.refresh_token?.token;
        if access.is_empty() || refresh.is_empty() {
            return None;
        }
        Some(CredentialPair::new(access, refresh))
    }

    /// Parse from a response body; anything that isn't the expected shape
    /// yields an empty response
    pub fn from_body(body: Option<&Value>) -> Self {
        body.and_then(|b| serde_json::from_value(b.clone()).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    pub refresh_token: &'a str,
}

// ============================================================================
// New-device verification
// ============================================================================

/// Sign-in accepted, but the backend wants the device verified first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceVerification {
    pub message: Option<String>,
    pub telephone: Option<String>,
}

impl DeviceVerification {
    /// Recognize the new-device marker in a success body
    pub fn detect(body: Option<&Value>) -> Option<Self> {
        let body = body?;
        if body.get(NEW_DEVICE_FIELD).and_then(Value::as_bool) != Some(true) {
            return None;
        }
        Some(Self {
            message: body.get("message").and_then(Value::as_str).map(str::to_string),
            telephone: body.get("telephone").and_then(Value::as_str).map(str::to_string),
        })
    }
}

// ============================================================================
// Account requests
// ============================================================================

#[derive(Serialize)]
pub struct SignInRequest<'a> {
    pub telephone: &'a str,
    pub password: &'a str,
}

/// Registration form sent to `/user/sign-up`
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub telephone: String,
    pub password: String,
    pub device_uuid: String,
    pub fcm_token: String,
}

#[derive(Serialize)]
pub struct VerifyPhoneRequest<'a> {
    pub code: &'a str,
    pub phone: &'a str,
}

#[derive(Serialize)]
pub struct TelephoneRequest<'a> {
    pub telephone: &'a str,
}

#[derive(Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub token: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
}

// ============================================================================
// Responses
// ============================================================================

/// Generic `{ success, message }` acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

impl ApiMessage {
    pub fn from_body(body: Option<&Value>) -> Self {
        body.and_then(|b| serde_json::from_value(b.clone()).ok())
            .unwrap_or_default()
    }
}
