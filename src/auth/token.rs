//! Token pair representation and validity inspection

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds of leeway when comparing an expiry claim against the clock,
/// so a token is refreshed shortly before it actually lapses
const EXPIRY_LEEWAY_SECS: u64 = 60;

/// An access/refresh token pair issued by the IAM.
///
/// Pairs are replaced wholesale on login and refresh, never mutated in
/// place. The refresh token may be absent (e.g. when the access token was
/// supplied directly by the caller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Bearer credential attached to API calls
    pub access_token: String,

    /// Longer-lived credential used to renew the access token
    pub refresh_token: Option<String>,

    /// Unix timestamp at which this pair was obtained
    pub issued_at: u64,

    /// Access-token lifetime in seconds, when the IAM reported one
    pub expires_in: Option<u64>,
}

impl TokenPair {
    /// Create a pair freshly obtained from the IAM
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: Option<u64>) -> Self {
        Self {
            access_token,
            refresh_token,
            issued_at: unix_now(),
            expires_in,
        }
    }

    /// Assemble a pair from independently resolved token strings.
    ///
    /// Returns `None` when neither token is available. A refresh-only pair
    /// reports itself expired so the first validity check renews it.
    #[must_use]
    pub fn from_resolved(access_token: Option<String>, refresh_token: Option<String>) -> Option<Self> {
        if access_token.is_none() && refresh_token.is_none() {
            return None;
        }
        Some(Self {
            access_token: access_token.unwrap_or_default(),
            refresh_token,
            issued_at: unix_now(),
            expires_in: None,
        })
    }

    /// Check whether the access token should be considered expired.
    ///
    /// Prefers the embedded JWT `exp` claim, falls back to
    /// `issued_at + expires_in`, both with a 60 second leeway. A token with
    /// no expiry signal at all is not considered expired here; callers that
    /// need certainty introspect it remotely.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        let now = unix_now();
        if let Some(exp) = self.exp_claim() {
            return now + EXPIRY_LEEWAY_SECS >= exp;
        }
        if let Some(lifetime) = self.expires_in {
            return now + EXPIRY_LEEWAY_SECS >= self.issued_at + lifetime;
        }
        false
    }

    /// Whether this pair carries any local expiry signal (`exp` claim or a
    /// reported lifetime)
    #[must_use]
    pub fn has_expiry_signal(&self) -> bool {
        self.exp_claim().is_some() || self.expires_in.is_some()
    }

    /// Remaining access-token validity, if an expiry signal is present
    #[must_use]
    pub fn remaining_validity(&self) -> Option<Duration> {
        let expires_at = self
            .exp_claim()
            .or_else(|| self.expires_in.map(|l| self.issued_at + l))?;
        let now = unix_now();
        (expires_at > now).then(|| Duration::from_secs(expires_at - now))
    }

    /// Decode the payload segment of the access token as a JWT claims
    /// document. Returns `None` for opaque (non-JWT) tokens.
    #[must_use]
    pub fn claims(&self) -> Option<serde_json::Value> {
        let payload = self.access_token.split('.').nth(1)?;
        let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&decoded).ok()
    }

    /// The `aud` claim of the access token, if present
    #[must_use]
    pub fn audience(&self) -> Option<String> {
        self.claims()?
            .get("aud")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// The `exp` claim of the access token, if present
    fn exp_claim(&self) -> Option<u64> {
        self.claims()?.get("exp").and_then(serde_json::Value::as_u64)
    }

    /// Get the Authorization header value
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a JWT-shaped token whose payload carries the given claims
    pub(crate) fn fake_jwt(claims: &serde_json::Value) -> String {
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("header.{payload}.signature")
    }

    #[test]
    fn test_fresh_token_not_expired() {
        let exp = unix_now() + 3600;
        let token = fake_jwt(&serde_json::json!({"exp": exp}));
        let pair = TokenPair::new(token, Some("refresh".to_string()), None);
        assert!(!pair.is_expired());
        assert!(pair.has_expiry_signal());
        assert!(pair.remaining_validity().is_some());
    }

    #[test]
    fn test_expired_token_detected() {
        let exp = unix_now() - 100;
        let token = fake_jwt(&serde_json::json!({"exp": exp}));
        let pair = TokenPair::new(token, None, None);
        assert!(pair.is_expired());
        assert!(pair.remaining_validity().is_none());
    }

    #[test]
    fn test_token_within_leeway_treated_as_expired() {
        // 30 seconds of validity left is inside the 60 second leeway
        let exp = unix_now() + 30;
        let token = fake_jwt(&serde_json::json!({"exp": exp}));
        let pair = TokenPair::new(token, None, None);
        assert!(pair.is_expired());
    }

    #[test]
    fn test_opaque_token_uses_reported_lifetime() {
        let pair = TokenPair::new("opaque-token".to_string(), None, Some(3600));
        assert!(!pair.is_expired());

        let mut stale = TokenPair::new("opaque-token".to_string(), None, Some(3600));
        stale.issued_at = unix_now() - 7200;
        assert!(stale.is_expired());
    }

    #[test]
    fn test_opaque_token_without_signal_assumed_valid() {
        let pair = TokenPair::new("opaque-token".to_string(), None, None);
        assert!(!pair.is_expired());
        assert!(!pair.has_expiry_signal());
    }

    #[test]
    fn test_refresh_only_pair_expired() {
        let pair = TokenPair::from_resolved(None, Some("refresh".to_string())).unwrap();
        assert!(pair.access_token.is_empty());
        assert!(pair.is_expired());
    }

    #[test]
    fn test_from_resolved_empty_is_none() {
        assert!(TokenPair::from_resolved(None, None).is_none());
    }

    #[test]
    fn test_claims_decode() {
        let token = fake_jwt(&serde_json::json!({
            "sub": "123456",
            "preferred_username": "observer",
            "aud": "data-management-api"
        }));
        let pair = TokenPair::new(token, None, None);
        let claims = pair.claims().unwrap();
        assert_eq!(claims["sub"], "123456");
        assert_eq!(claims["preferred_username"], "observer");
        assert_eq!(pair.audience().as_deref(), Some("data-management-api"));
    }

    #[test]
    fn test_claims_of_opaque_token_is_none() {
        let pair = TokenPair::new("not-a-jwt".to_string(), None, None);
        assert!(pair.claims().is_none());
        assert!(pair.audience().is_none());
    }

    #[test]
    fn test_authorization_header() {
        let pair = TokenPair::new("access123".to_string(), None, None);
        assert_eq!(pair.authorization_header(), "Bearer access123");
    }
}
