/**
 * Tokens
 * JWT access tokens, rotating refresh tokens and password hashing
 */
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Access token expiry in minutes
const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 15;

/// Refresh token expiry in days
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,   // User ID
    pub email: String, // User email
    pub role: String,  // User role
    pub exp: i64,      // Expiry timestamp
    pub iat: i64,      // Issued at timestamp
}

/// HS256 signer for access tokens.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(
        &self,
        user_id: &str,
        email: &str,
        role: &str,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES);

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(token_data.claims)
    }
}

/// Owner of a refresh token
#[derive(Debug, Clone)]
pub struct RefreshTokenData {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub expires_at: i64,
    pub revoked: bool,
}

/// Generate a random refresh token
fn generate_refresh_token() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 64)
}

/// Refresh tokens are stored by SHA-256 digest, never in the clear.
fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// In-memory refresh token registry.
#[derive(Clone, Default)]
pub struct RefreshTokens {
    tokens: Arc<RwLock<HashMap<String, RefreshTokenData>>>,
}

impl RefreshTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for a user. Expired entries are evicted on the way.
    pub async fn issue(&self, user_id: &str, email: &str, role: &str) -> String {
        let token = generate_refresh_token();
        let now = Utc::now();
        let expires_at = now + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);

        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, data| data.expires_at > now.timestamp());
        tokens.insert(
            hash_refresh_token(&token),
            RefreshTokenData {
                user_id: user_id.to_string(),
                email: email.to_string(),
                role: role.to_string(),
                expires_at: expires_at.timestamp(),
                revoked: false,
            },
        );
        token
    }

    /// Revoke `token` and hand back its owner with a replacement token.
    /// Unknown, revoked and expired tokens yield `None`.
    pub async fn rotate(&self, token: &str) -> Option<(RefreshTokenData, String)> {
        let owner = {
            let mut tokens = self.tokens.write().await;
            let data = tokens.get_mut(&hash_refresh_token(token))?;
            if data.revoked || data.expires_at <= Utc::now().timestamp() {
                return None;
            }
            data.revoked = true;
            data.clone()
        };

        let replacement = self.issue(&owner.user_id, &owner.email, &owner.role).await;
        Some((owner, replacement))
    }

    pub async fn revoke(&self, token: &str) {
        let mut tokens = self.tokens.write().await;
        if let Some(data) = tokens.get_mut(&hash_refresh_token(token)) {
            data.revoked = true;
        }
    }

    pub async fn revoke_all(&self, user_id: &str) {
        let mut tokens = self.tokens.write().await;
        for data in tokens.values_mut().filter(|d| d.user_id == user_id) {
            data.revoked = true;
        }
    }
}

/// bcrypt is CPU-bound; both helpers run it off the async executor.
pub async fn hash_password(plain: String) -> Result<String, bcrypt::BcryptError> {
    tokio::task::spawn_blocking(move || hash(plain, DEFAULT_COST))
        .await
        .unwrap_or_else(|e| Err(std::io::Error::other(e).into()))
}

pub async fn verify_password(plain: String, password_hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify(plain, &password_hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_round_trip_and_wrong_secret() {
        let signer = TokenSigner::new("secret-a");
        let token = signer.issue("id-1", "a@example.com", "admin").unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, "id-1");
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_EXPIRY_MINUTES * 60);

        assert!(TokenSigner::new("secret-b").verify(&token).is_err());
        assert!(signer.verify("invalid.jwt.token").is_err());
    }

    #[test]
    fn test_refresh_token_hash_is_stable_hex() {
        let digest = hash_refresh_token("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_refresh_token("abc"));
        assert_ne!(digest, hash_refresh_token("abd"));
        assert_eq!(generate_refresh_token().len(), 64);
    }

    #[tokio::test]
    async fn test_refresh_rotation_revokes_old_token() {
        let registry = RefreshTokens::new();
        let first = registry.issue("id-1", "a@example.com", "admin").await;

        let (owner, second) = registry.rotate(&first).await.unwrap();
        assert_eq!(owner.user_id, "id-1");
        assert!(registry.rotate(&first).await.is_none());

        registry.revoke_all("id-1").await;
        assert!(registry.rotate(&second).await.is_none());
        assert!(registry.rotate("never-issued").await.is_none());
    }

    #[tokio::test]
    async fn test_password_hash_and_verify() {
        let hashed = hash_password("correct horse".to_string()).await.unwrap();
        assert!(verify_password("correct horse".to_string(), hashed.clone()).await);
        assert!(!verify_password("wrong".to_string(), hashed).await);
    }
}
