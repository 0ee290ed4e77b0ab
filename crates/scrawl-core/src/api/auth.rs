//! Unauthenticated auth endpoints.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use super::envelope::ErrorBody;
use super::transport::{ApiRequest, Transport};
use crate::error::{Error, Result};
use crate::models::TokenPair;

/// Result of exchanging a refresh token.
///
/// Servers that rotate refresh tokens return a new one; otherwise the current
/// refresh token stays valid.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for RefreshGrant {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RefreshGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignInResponse {
    Wrapped { data: TokenPair },
    Bare(TokenPair),
    Failure(ErrorBody),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RefreshResponse {
    Wrapped { data: RefreshGrant },
    Bare(RefreshGrant),
}

/// Sign-in, sign-up and refresh. These requests never carry a bearer token.
#[derive(Clone)]
pub struct AuthApi {
    transport: Arc<dyn Transport>,
}

impl AuthApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<TokenPair> {
        let request = ApiRequest::post(
            "/auth/signin",
            json!({
                "email": email,
                "password": password,
            }),
        );
        let response = self.transport.send(request).await?;
        let status = response.status;
        match response.decode::<SignInResponse>() {
            Ok(SignInResponse::Wrapped { data } | SignInResponse::Bare(data))
                if response.is_success() =>
            {
                Ok(data)
            }
            Ok(SignInResponse::Failure(body)) => match body.message() {
                Some(message) => Err(sign_in_failure(message, status)),
                None if response.is_success() => Err(Error::MalformedResponse(
                    "sign-in response carried no tokens".to_string(),
                )),
                None => Err(response.into_error()),
            },
            Err(error) if response.is_success() => Err(error),
            _ => Err(response.into_error()),
        }
    }

    /// Register an account. Returns the server's confirmation message.
    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> Result<String> {
        let request = ApiRequest::post(
            "/auth/signup",
            json!({
                "username": username,
                "email": email,
                "password": password,
            }),
        );
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(response.into_error());
        }

        let body = response.decode::<ErrorBody>().unwrap_or_default();
        let message = body.message();
        if body.error.as_ref().is_some_and(is_truthy) {
            return Err(Error::Api {
                status: response.status,
                message: message.unwrap_or_else(|| "Sign-up failed".to_string()),
            });
        }
        Ok(message.unwrap_or_else(|| "Account created".to_string()))
    }

    /// Exchange `refresh_token` for a new access token. Any failure is
    /// returned as-is; the caller decides what it means for the session.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant> {
        let request = ApiRequest::post(
            "/auth/refresh",
            json!({
                "refreshToken": refresh_token,
            }),
        );
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        let grant = match response.decode::<RefreshResponse>()? {
            RefreshResponse::Wrapped { data } | RefreshResponse::Bare(data) => data,
        };
        if grant.access_token.trim().is_empty() {
            return Err(Error::MalformedResponse(
                "refresh response carried an empty access token".to_string(),
            ));
        }
        Ok(grant)
    }
}

fn sign_in_failure(message: String, status: u16) -> Error {
    match status {
        500..=599 => Error::TransientNetwork(message),
        200..=299 | 401 => Error::Auth(message),
        status => Error::Api { status, message },
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null | serde_json::Value::Bool(false) => false,
        serde_json::Value::String(text) => !text.is_empty(),
        _ => true,
    }
}
