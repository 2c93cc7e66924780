//! Shared-token validation

use subtle::ConstantTimeEq;

/// Validates presented tokens against the gateway's shared secret.
///
/// Comparison is constant-time over the token bytes so the secret cannot be
/// probed one byte at a time through response latency.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    secret: String,
}

impl TokenValidator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Check a presented token against the shared secret.
    pub fn validate(&self, presented: &str) -> bool {
        let expected = self.secret.as_bytes();
        let presented = presented.as_bytes();

        if expected.len() != presented.len() {
            // Length is not secret; ct_eq requires equal-length slices.
            return false;
        }

        expected.ct_eq(presented).into()
    }
}
