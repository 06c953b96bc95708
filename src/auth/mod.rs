//! Shared-secret gate for roster mutations.
//!
//! The passphrase is a deterrent against accidental edits, not an access
//! control system. Comparison is constant-time over the raw bytes.

use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "x-roster-secret";

/// Holds the configured passphrase and checks candidates against it.
#[derive(Clone)]
pub struct SecretGate {
    secret: String,
}

impl SecretGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Exact match against the configured passphrase.
    pub fn allows(&self, candidate: &str) -> bool {
        constant_time_compare(candidate, &self.secret)
    }
}

impl std::fmt::Debug for SecretGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretGate").finish_non_exhaustive()
    }
}

/// Pull the secret from `x-roster-secret`, falling back to a bearer token.
/// A missing secret reads as the empty string, which the gate rejects unless
/// the configured passphrase is itself empty.
pub fn secret_from_headers(headers: &HeaderMap) -> String {
    if let Some(secret) = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok()) {
        return secret.to_string();
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("mrhs", "mrhs"));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("mrhs", "MRHS"));
        assert!(!constant_time_compare("mrhs ", "mrhs"));
    }

    #[test]
    fn test_constant_time_compare_empty() {
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("", "mrhs"));
    }

    #[test]
    fn test_gate_allows_only_exact_secret() {
        let gate = SecretGate::new("mrhs");
        assert!(gate.allows("mrhs"));
        assert!(!gate.allows("wrongsecret"));
        assert!(!gate.allows(""));
        assert!(!format!("{:?}", gate).contains("mrhs"));
    }

    #[test]
    fn test_secret_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(secret_from_headers(&headers), "");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer token"));
        assert_eq!(secret_from_headers(&headers), "token");

        headers.insert(SECRET_HEADER, HeaderValue::from_static("mrhs"));
        assert_eq!(secret_from_headers(&headers), "mrhs");
    }
}
