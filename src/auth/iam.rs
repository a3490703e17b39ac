//! Low-level client for the IAM's OAuth2 endpoints.
//!
//! One method per grant: device authorization, device-code polling,
//! authorization-code exchange, refresh, RFC 8693 service token exchange,
//! and RFC 7662 introspection. Responses are parsed error-body-first so
//! IAM rejections surface with their `error_description` instead of a bare
//! status code.

use serde::Deserialize;

use crate::auth::token::TokenPair;
use crate::config::ClientConfig;
use crate::error::{AstroLakeError, Result};

const GRANT_DEVICE_CODE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const GRANT_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const SUBJECT_TOKEN_TYPE_ACCESS: &str = "urn:ietf:params:oauth:token-type:access_token";

/// Response from the device-authorization endpoint (RFC 8628)
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// Outcome of a single device-flow poll against the token endpoint
#[derive(Debug)]
pub(crate) enum DevicePoll {
    /// The user completed authorization; tokens were issued
    Complete(TokenPair),
    /// Authorization still pending, keep polling
    Pending,
    /// Authorization still pending and the IAM wants a longer interval
    SlowDown,
    /// The device code lapsed before the user finished
    Expired,
    /// The user rejected the authorization request
    Denied(String),
}

/// Success response from the token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// OAuth2 error response body
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ErrorResponse {
    fn message(self) -> String {
        self.error_description.unwrap_or(self.error)
    }
}

/// RFC 7662 introspection response (the subset the SDK reads)
#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
}

/// HTTP client for the IAM endpoints configured in [`ClientConfig`]
#[derive(Debug, Clone)]
pub(crate) struct IamClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl IamClient {
    pub fn new(config: ClientConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Start a device flow: request a device code and verification URI.
    ///
    /// The IAM rejects this while a still-valid access token exists for the
    /// user; that rejection arrives as a server error and is propagated as
    /// [`AstroLakeError::TokenExchangeFailed`] without retry.
    pub async fn device_authorize(&self) -> Result<DeviceAuthorization> {
        let response = self
            .http
            .post(&self.config.device_authorization_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", self.config.scopes.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AstroLakeError::token_exchange(format!(
                "device authorization rejected ({status}): {}",
                error_message(&body)
            )));
        }

        let device: DeviceAuthorization = serde_json::from_str(&body).map_err(|e| {
            AstroLakeError::invalid_response(format!(
                "failed to parse device authorization response: {e}"
            ))
        })?;
        tracing::debug!(
            verification_uri = %device.verification_uri,
            interval = device.interval,
            "device authorization obtained"
        );
        Ok(device)
    }

    /// Poll the token endpoint once for a device-flow result
    pub async fn poll_device_token(&self, device_code: &str) -> Result<DevicePoll> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", GRANT_DEVICE_CODE),
                ("device_code", device_code),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(DevicePoll::Complete(parse_token_body(&body)?));
        }

        if let Ok(err) = serde_json::from_str::<ErrorResponse>(&body) {
            let code = err.error.clone();
            return match code.as_str() {
                "authorization_pending" => Ok(DevicePoll::Pending),
                "slow_down" => Ok(DevicePoll::SlowDown),
                "expired_token" => Ok(DevicePoll::Expired),
                "access_denied" => Ok(DevicePoll::Denied(err.message())),
                _ => Err(AstroLakeError::token_exchange(format!(
                    "device token poll rejected ({status}): {}",
                    err.message()
                ))),
            };
        }

        Err(AstroLakeError::token_exchange(format!(
            "device token poll rejected ({status}): {body}"
        )))
    }

    /// Exchange an authorization code (plus PKCE verifier) for tokens
    pub async fn exchange_code(
        &self,
        code: &str,
        state: Option<&str>,
        code_verifier: &str,
    ) -> Result<TokenPair> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];
        if let Some(state) = state {
            params.push(("state", state));
        }

        self.token_request(&params, "authorization code exchange")
            .await
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// If the IAM omits a rotated refresh token the previous one is carried
    /// forward, since it remains valid.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let mut pair = self
            .token_request(
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", self.config.client_id.as_str()),
                ],
                "token refresh",
            )
            .await?;

        if pair.refresh_token.is_none() {
            pair.refresh_token = Some(refresh_token.to_string());
        }
        Ok(pair)
    }

    /// RFC 8693 token exchange: trade the home access token for one scoped
    /// to the given service audience.
    pub async fn exchange_for_service(
        &self,
        access_token: &str,
        audience: &str,
    ) -> Result<TokenPair> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", GRANT_TOKEN_EXCHANGE),
                ("subject_token", access_token),
                ("subject_token_type", SUBJECT_TOKEN_TYPE_ACCESS),
                ("audience", audience),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return parse_token_body(&body);
        }

        let message = error_message(&body);
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            // The home token authenticated fine; the user lacks entitlement
            // for this particular service.
            return Err(AstroLakeError::unauthorized(audience, message));
        }
        Err(AstroLakeError::token_exchange(format!(
            "service token exchange for '{audience}' rejected ({status}): {message}"
        )))
    }

    /// Ask the introspection endpoint whether a token is active.
    ///
    /// Returns `None` when no introspection endpoint is configured.
    pub async fn introspect(&self, token: &str) -> Result<Option<bool>> {
        let Some(url) = &self.config.introspection_url else {
            return Ok(None);
        };

        let response = self
            .http
            .post(url)
            .form(&[
                ("token", token),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AstroLakeError::invalid_response(format!(
                "introspection rejected ({status}): {}",
                error_message(&body)
            )));
        }

        let introspection: IntrospectionResponse = serde_json::from_str(&body).map_err(|e| {
            AstroLakeError::invalid_response(format!("failed to parse introspection response: {e}"))
        })?;
        Ok(Some(introspection.active))
    }

    /// Shared token-endpoint request: send form params, parse error-first
    async fn token_request(&self, params: &[(&str, &str)], operation: &str) -> Result<TokenPair> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AstroLakeError::token_exchange(format!(
                "{operation} rejected ({status}): {}",
                error_message(&body)
            )));
        }
        parse_token_body(&body)
    }
}

fn parse_token_body(body: &str) -> Result<TokenPair> {
    let token: TokenResponse = serde_json::from_str(body).map_err(|e| {
        AstroLakeError::invalid_response(format!("failed to parse token response: {e}"))
    })?;
    if token.access_token.is_empty() {
        return Err(AstroLakeError::invalid_response(
            "no access token found in response",
        ));
    }
    Ok(TokenPair::new(
        token.access_token,
        token.refresh_token,
        token.expires_in,
    ))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(ErrorResponse::message)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_body_full() {
        let pair = parse_token_body(
            r#"{"access_token":"abc","refresh_token":"def","token_type":"Bearer","expires_in":3600}"#,
        )
        .unwrap();
        assert_eq!(pair.access_token, "abc");
        assert_eq!(pair.refresh_token.as_deref(), Some("def"));
        assert_eq!(pair.expires_in, Some(3600));
    }

    #[test]
    fn test_parse_token_body_rejects_empty_access_token() {
        let result = parse_token_body(r#"{"access_token":""}"#);
        assert!(matches!(result, Err(AstroLakeError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_token_body_rejects_garbage() {
        assert!(parse_token_body("not json").is_err());
    }

    #[test]
    fn test_error_message_prefers_description() {
        let msg = error_message(
            r#"{"error":"invalid_grant","error_description":"refresh token revoked"}"#,
        );
        assert_eq!(msg, "refresh token revoked");
    }

    #[test]
    fn test_error_message_falls_back_to_error_code() {
        assert_eq!(error_message(r#"{"error":"invalid_grant"}"#), "invalid_grant");
    }

    #[test]
    fn test_error_message_passes_through_non_json() {
        assert_eq!(error_message("<html>502</html>"), "<html>502</html>");
    }

    #[test]
    fn test_device_authorization_defaults_interval() {
        let device: DeviceAuthorization = serde_json::from_str(
            r#"{"device_code":"dc","user_code":"uc","verification_uri":"https://iam/device"}"#,
        )
        .unwrap();
        assert_eq!(device.interval, 5);
        assert!(device.verification_uri_complete.is_none());
    }
}
