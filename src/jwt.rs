//! JWT token issuance and verification.
//!
//! Uses a dual-token system with a distinct secret per token class:
//! - Access tokens: short-lived (minutes), stateless, gate every protected request
//! - Refresh tokens: long-lived (days), only ever exchanged for new access tokens
//!
//! Verification never panics and never throws for expected outcomes: callers
//! get `Err(TokenRejection)` for anything short of a valid token. Errors are
//! reserved for issuance, which only fails on misconfiguration.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type embedded in claims, distinguishing access vs refresh tokens
/// on top of the per-class secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Identity claims carried by both token classes.
///
/// Deserialization is the validation boundary: a token whose payload does not
/// match this shape is rejected as invalid, never trusted structurally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    /// Account email
    pub email: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token TTL: 15 minutes.
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 15 * 60;

/// Default refresh token TTL: 7 days.
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// A freshly signed token with its lifetime.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT string
    pub token: String,
    /// Token duration in seconds (drives the cookie Max-Age)
    pub duration: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

/// Why a token failed verification.
///
/// Only expiry is distinguished from everything else; that is the one
/// difference clients act on (expired access tokens trigger renewal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// Signature and shape were fine but the token is past its expiry.
    Expired,
    /// Bad signature, malformed payload, wrong token type, wrong secret.
    Invalid,
}

/// Errors from token issuance. These indicate misconfiguration, not a
/// runtime path: a well-formed secret never fails to sign.
#[derive(Debug)]
pub enum TokenError {
    Encoding(jsonwebtoken::errors::Error),
    TimeError,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Signs and verifies both token classes. Stateless: validity is fully
/// determined by signature + expiry, with no server-side store.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenService {
    /// Create a token service from the two class secrets and default TTLs.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::with_ttls(
            access_secret,
            refresh_secret,
            DEFAULT_ACCESS_TTL_SECS,
            DEFAULT_REFRESH_TTL_SECS,
        )
    }

    /// Create a token service with explicit TTLs (seconds).
    pub fn with_ttls(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl_secs: u64,
        refresh_ttl_secs: u64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Access token TTL in seconds.
    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    /// Refresh token TTL in seconds.
    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl_secs
    }

    fn now() -> Result<u64, TokenError> {
        Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TokenError::TimeError)?
            .as_secs())
    }

    /// Issue a short-lived access token for the given identity.
    pub fn issue_access(&self, sub: &str, email: &str) -> Result<IssuedToken, TokenError> {
        self.issue(
            sub,
            email,
            TokenType::Access,
            self.access_ttl_secs,
            &self.access_encoding,
        )
    }

    /// Issue a long-lived refresh token for the given identity.
    pub fn issue_refresh(&self, sub: &str, email: &str) -> Result<IssuedToken, TokenError> {
        self.issue(
            sub,
            email,
            TokenType::Refresh,
            self.refresh_ttl_secs,
            &self.refresh_encoding,
        )
    }

    fn issue(
        &self,
        sub: &str,
        email: &str,
        token_type: TokenType,
        ttl_secs: u64,
        key: &EncodingKey,
    ) -> Result<IssuedToken, TokenError> {
        let now = Self::now()?;
        let exp = now + ttl_secs;

        let claims = Claims {
            sub: sub.to_string(),
            email: email.to_string(),
            token_type,
            iat: now,
            exp,
        };

        let token =
            jsonwebtoken::encode(&Header::default(), &claims, key).map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            duration: ttl_secs,
            expires_at: exp,
        })
    }

    /// Verify an access token. Any failure short of expiry collapses to
    /// `Invalid`; callers must treat both as unauthenticated.
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenRejection> {
        Self::verify(token, &self.access_decoding, TokenType::Access)
    }

    /// Verify a refresh token against the refresh secret.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenRejection> {
        Self::verify(token, &self.refresh_decoding, TokenType::Refresh)
    }

    fn verify(
        token: &str,
        key: &DecodingKey,
        expected: TokenType,
    ) -> Result<Claims, TokenRejection> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                _ => TokenRejection::Invalid,
            })?;

        if token_data.claims.token_type != expected {
            return Err(TokenRejection::Invalid);
        }

        Ok(token_data.claims)
    }

    /// Decode claims without checking signature or expiry.
    ///
    /// Only for the refresh path, where the access token is assumed expired
    /// but its subject is still needed to correlate with the refresh token.
    /// Never use the result for authorization decisions.
    pub fn decode_unverified(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(b"test-access-secret-key", b"test-refresh-secret-key")
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let svc = service();

        let issued = svc.issue_access("uuid-123", "alice@example.com").unwrap();
        assert_eq!(issued.duration, DEFAULT_ACCESS_TTL_SECS);

        let claims = svc.verify_access(&issued.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_issue_and_verify_refresh_token() {
        let svc = service();

        let issued = svc.issue_refresh("uuid-123", "alice@example.com").unwrap();
        assert_eq!(issued.duration, DEFAULT_REFRESH_TTL_SECS);

        let claims = svc.verify_refresh(&issued.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_secret_isolation() {
        let svc = service();

        // A refresh token never passes access verification and vice versa,
        // even though both carry the same claim shape.
        let refresh = svc.issue_refresh("uuid-123", "alice@example.com").unwrap();
        assert_eq!(
            svc.verify_access(&refresh.token),
            Err(TokenRejection::Invalid)
        );

        let access = svc.issue_access("uuid-123", "alice@example.com").unwrap();
        assert_eq!(
            svc.verify_refresh(&access.token),
            Err(TokenRejection::Invalid)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let svc1 = TokenService::new(b"access-secret-one", b"refresh-secret-one");
        let svc2 = TokenService::new(b"access-secret-two", b"refresh-secret-two");

        let issued = svc1.issue_access("uuid-123", "alice@example.com").unwrap();
        assert_eq!(
            svc2.verify_access(&issued.token),
            Err(TokenRejection::Invalid)
        );
    }

    #[test]
    fn test_expired_token_rejected_as_expired() {
        let secret = b"test-access-secret-key";
        let encoding_key = EncodingKey::from_secret(secret);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = Claims {
            sub: "uuid-123".to_string(),
            email: "alice@example.com".to_string(),
            token_type: TokenType::Access,
            iat: now - 100,
            exp: now - 50,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        let svc = TokenService::new(secret, b"test-refresh-secret-key");
        assert_eq!(svc.verify_access(&token), Err(TokenRejection::Expired));
    }

    #[test]
    fn test_malformed_token_invalid() {
        let svc = service();
        assert_eq!(
            svc.verify_access("not-a-token"),
            Err(TokenRejection::Invalid)
        );
    }

    #[test]
    fn test_wrong_claim_shape_rejected() {
        // A token signed with the right secret but without the expected
        // fields must not deserialize into Claims.
        #[derive(Serialize)]
        struct Alien {
            user: String,
            exp: u64,
        }

        let secret = b"test-access-secret-key";
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let token = jsonwebtoken::encode(
            &Header::default(),
            &Alien {
                user: "alice".to_string(),
                exp: now + 300,
            },
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let svc = TokenService::new(secret, b"test-refresh-secret-key");
        assert_eq!(svc.verify_access(&token), Err(TokenRejection::Invalid));
    }

    #[test]
    fn test_decode_unverified_ignores_expiry_and_signature() {
        let svc = service();
        let other = TokenService::new(b"some-other-access-secret", b"some-other-refresh-secret");

        let issued = other.issue_access("uuid-456", "bob@example.com").unwrap();

        // Wrong secret for `svc`, but decode still yields the claims.
        let claims = svc.decode_unverified(&issued.token).unwrap();
        assert_eq!(claims.sub, "uuid-456");
        assert_eq!(claims.email, "bob@example.com");

        assert!(svc.decode_unverified("garbage").is_none());
    }

    #[test]
    fn test_configured_ttls() {
        let svc = TokenService::with_ttls(b"access-secret", b"refresh-secret", 60, 3600);

        let access = svc.issue_access("uuid-1", "a@b.c").unwrap();
        let refresh = svc.issue_refresh("uuid-1", "a@b.c").unwrap();

        assert_eq!(access.duration, 60);
        assert_eq!(refresh.duration, 3600);
        assert!(refresh.expires_at > access.expires_at);
    }
}
