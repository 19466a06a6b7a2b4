//! Token, password, and API-key protection primitives.
//!
//! Access/refresh tokens are HS256 JWTs carrying a `type` claim so a refresh
//! token can never pass an access-token check. Stored provider keys are
//! encrypted with AES-256-GCM (random 96-bit nonce prepended to the
//! ciphertext, base64 on the wire); refresh tokens are persisted only as
//! SHA-256 digests.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{AppError, Result};

/// Distinguishes the two JWT kinds issued by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT payload for both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Issued at, seconds since epoch
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

/// Issues and verifies access/refresh token pairs.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::minutes(config.access_token_expire_minutes),
            Duration::days(config.refresh_token_expire_days),
        )
    }

    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn create_access_token(&self, user_id: &str) -> Result<String> {
        self.create(user_id, TokenType::Access, self.access_ttl)
    }

    pub fn create_refresh_token(&self, user_id: &str) -> Result<String> {
        self.create(user_id, TokenType::Refresh, self.refresh_ttl)
    }

    fn create(&self, user_id: &str, token_type: TokenType, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            token_type,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify signature and expiry, then enforce the expected token kind.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        if data.claims.token_type != expected {
            return Err(AppError::Unauthorized(format!(
                "Expected {} token",
                expected
            )));
        }
        Ok(data.claims)
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}

/// Hash a password with bcrypt at the default cost.
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Crypto(format!("password hashing failed: {}", e)))
}

/// Verify a password against a stored bcrypt hash. Malformed hashes count as
/// a mismatch rather than an internal error so login failures stay uniform.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    bcrypt::verify(password, hashed).unwrap_or(false)
}

/// SHA-256 hex digest of a token for at-rest storage.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Masked display form of an API key.
///
/// Shapes: under 3 chars -> "***"; 3..8 chars -> "***" + last 2;
/// otherwise first 3 + "..." + last 4.
pub fn mask_api_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() < 8 {
        if chars.len() > 2 {
            let suffix: String = chars[chars.len() - 2..].iter().collect();
            return format!("***{}", suffix);
        }
        return "***".to_string();
    }
    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

/// AES-256-GCM cipher for provider API keys at rest.
///
/// The key comes from `API_KEY_ENCRYPTION_KEY`; construction is infallible
/// once `Config` has validated the key length. There is no plaintext
/// fallback: a decryption failure is a hard error.
#[derive(Clone)]
pub struct ApiKeyCipher {
    cipher: Aes256Gcm,
}

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

impl ApiKeyCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.api_key_encryption_key)
    }

    /// Encrypt a plaintext API key. Output is base64(nonce || ciphertext).
    pub fn encrypt(&self, api_key: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, api_key.as_bytes())
            .map_err(|_| AppError::Crypto("API key encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(out))
    }

    /// Decrypt a stored API key. Fails on tampered ciphertext or a wrong key.
    pub fn decrypt(&self, encrypted: &str) -> Result<String> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|_| AppError::Crypto("stored API key is not valid base64".to_string()))?;
        if raw.len() <= NONCE_LEN {
            return Err(AppError::Crypto("stored API key is truncated".to_string()));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::Crypto("API key decryption failed".to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|_| AppError::Crypto("decrypted API key is not UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            "unit-test-secret-with-enough-entropy",
            Duration::minutes(30),
            Duration::days(7),
        )
    }

    // -----------------------------------------------------------------------
    // JWT issuance and verification
    // -----------------------------------------------------------------------

    #[test]
    fn test_access_token_round_trip() {
        let issuer = issuer();
        let token = issuer.create_access_token("user-123").unwrap();
        let claims = issuer.verify(&token, TokenType::Access).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let issuer = issuer();
        let token = issuer.create_refresh_token("user-123").unwrap();
        let claims = issuer.verify(&token, TokenType::Refresh).unwrap();
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let issuer = issuer();
        let token = issuer.create_refresh_token("user-123").unwrap();
        assert!(issuer.verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let issuer = issuer();
        let token = issuer.create_access_token("user-123").unwrap();
        assert!(issuer.verify(&token, TokenType::Refresh).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issuer().create_access_token("user-123").unwrap();
        let other = TokenIssuer::new(
            "a-completely-different-signing-secret",
            Duration::minutes(30),
            Duration::days(7),
        );
        assert!(other.verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new(
            "unit-test-secret-with-enough-entropy",
            Duration::minutes(-5),
            Duration::days(7),
        );
        let token = issuer.create_access_token("user-123").unwrap();
        assert!(issuer.verify(&token, TokenType::Access).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(issuer().verify("not-a-jwt", TokenType::Access).is_err());
    }

    // -----------------------------------------------------------------------
    // Passwords
    // -----------------------------------------------------------------------

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert_ne!(hash, "correct horse battery staple");
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn test_malformed_hash_is_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }

    // -----------------------------------------------------------------------
    // Token digests
    // -----------------------------------------------------------------------

    #[test]
    fn test_token_digest_is_stable_hex() {
        let a = token_digest("some.jwt.token");
        let b = token_digest("some.jwt.token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, token_digest("other.jwt.token"));
    }

    // -----------------------------------------------------------------------
    // Masking
    // -----------------------------------------------------------------------

    #[test]
    fn test_mask_long_key() {
        assert_eq!(mask_api_key("sk-1234567890ABCD"), "sk-...ABCD");
    }

    #[test]
    fn test_mask_exactly_eight_chars() {
        assert_eq!(mask_api_key("abcdefgh"), "abc...efgh");
    }

    #[test]
    fn test_mask_short_key() {
        assert_eq!(mask_api_key("abcdefg"), "***fg");
        assert_eq!(mask_api_key("abc"), "***bc");
    }

    #[test]
    fn test_mask_tiny_key() {
        assert_eq!(mask_api_key("ab"), "***");
        assert_eq!(mask_api_key(""), "***");
    }

    // -----------------------------------------------------------------------
    // API-key encryption
    // -----------------------------------------------------------------------

    fn cipher() -> ApiKeyCipher {
        ApiKeyCipher::new(&[7u8; 32])
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let cipher = cipher();
        let encrypted = cipher.encrypt("sk-test-key-0001").unwrap();
        assert_ne!(encrypted, "sk-test-key-0001");
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "sk-test-key-0001");
    }

    #[test]
    fn test_encrypt_is_nondeterministic() {
        let cipher = cipher();
        let a = cipher.encrypt("sk-test-key-0001").unwrap();
        let b = cipher.encrypt("sk-test-key-0001").unwrap();
        // Fresh nonce per call
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let cipher = cipher();
        let encrypted = cipher.encrypt("sk-test-key-0001").unwrap();
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(&encrypted)
            .unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = base64::engine::general_purpose::STANDARD.encode(raw);
        assert!(cipher.decrypt(&tampered).is_err());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let encrypted = cipher().encrypt("sk-test-key-0001").unwrap();
        let other = ApiKeyCipher::new(&[8u8; 32]);
        assert!(other.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_truncated_input_rejected() {
        let cipher = cipher();
        assert!(cipher.decrypt("AAAA").is_err());
        assert!(cipher.decrypt("!!not-base64!!").is_err());
    }
}
