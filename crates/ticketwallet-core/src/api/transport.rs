//! Transport boundary between the authenticated client and the network.
//!
//! A `Transport` turns a `RequestContext` into an `ApiResponse`. Every HTTP
//! status is a response; only a request that got no response at all is an
//! error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::ApiError;

/// Outgoing request descriptor.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    /// Set once the request has been resent after a credential refresh
    pub retried: bool,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn options(path: impl Into<String>) -> Self {
        Self::new(Method::OPTIONS, path)
    }

    /// Attach a JSON body
    pub fn with_body<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Unserializable body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Put `token` in the Authorization header, or drop the header when `None`
    pub(crate) fn set_bearer(&mut self, token: Option<&str>) -> Result<(), ApiError> {
        match token {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                    ApiError::InvalidRequest("Access token is not a valid header value".into())
                })?;
                self.headers.insert(header::AUTHORIZATION, value);
            }
            None => {
                self.headers.remove(header::AUTHORIZATION);
            }
        }
        Ok(())
    }

    /// Bearer token currently attached, if any
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Status and decoded body of a response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// `None` for an empty body; non-JSON text is kept as `Value::String`
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Option<Value>) -> Self {
        Self { status, body }
    }

    fn from_text(status: StatusCode, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
        };
        Self { status, body }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &RequestContext) -> Result<ApiResponse, ApiError>;
}

/// `Transport` over HTTP using reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Share an existing client and its connection pool
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &RequestContext) -> Result<ApiResponse, ApiError> {
        let url = self.url(&request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(method = %request.method, path = %request.path, status = status.as_u16(), "Response received");

        Ok(ApiResponse::from_text(status, &text))
    }
}
