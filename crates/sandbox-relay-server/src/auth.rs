//! Authentication hook.

use async_trait::async_trait;

/// Identity claim returned by a successful verification.
pub type Identity = String;

/// Trait for credential verification.
///
/// Token issuance lives elsewhere; the relay only asks whether a
/// credential is currently valid and who it belongs to.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify `credential`, returning the identity claim on success.
    async fn verify(&self, credential: &str) -> Option<Identity>;
}

/// Accepts exactly one shared secret.
pub struct SharedSecret {
    secret: String,
}

impl SharedSecret {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl Authenticator for SharedSecret {
    async fn verify(&self, credential: &str) -> Option<Identity> {
        constant_time_eq(self.secret.as_bytes(), credential.as_bytes())
            .then(|| "shared-secret".to_string())
    }
}

/// Accepts any credential. Used when no secret is configured.
#[derive(Debug, Default, Clone)]
pub struct AllowAll;

#[async_trait]
impl Authenticator for AllowAll {
    async fn verify(&self, credential: &str) -> Option<Identity> {
        Some(credential.chars().take(8).collect())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shared_secret() {
        let auth = SharedSecret::new("tok-1");
        assert_eq!(auth.verify("tok-1").await.as_deref(), Some("shared-secret"));
        assert_eq!(auth.verify("tok-2").await, None);
        assert_eq!(auth.verify("tok-10").await, None);
        assert_eq!(auth.verify("").await, None);
    }

    #[tokio::test]
    async fn test_allow_all_truncates_identity() {
        let id = AllowAll.verify("abcdefghijkl").await.unwrap();
        assert_eq!(id, "abcdefgh");
    }
}
