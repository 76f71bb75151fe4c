//! JWT token generation and validation.
//!
//! Tokens are HS256-signed and carry the username as subject. Decoding checks
//! structure and signature only; expiry is a separate question answered by
//! [`TokenService::is_expired`] against the wall clock at call time.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Token kind for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived token presented as `Authorization: Bearer`
    Access,
    /// Long-lived token only accepted by the refresh endpoint
    Refresh,
}

/// JWT claims shared by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Token kind
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token lifetime: 24 hours
pub const DEFAULT_ACCESS_TOKEN_SECS: u64 = 24 * 60 * 60;

/// Default refresh token lifetime: 7 days
pub const DEFAULT_REFRESH_TOKEN_SECS: u64 = 7 * 24 * 60 * 60;

/// Result of issuing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

/// Errors that can occur during JWT operations.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,
    #[error("token is malformed")]
    Malformed,
    #[error("token signing scheme is not supported")]
    Unsupported,
    #[error("token signature does not verify")]
    InvalidSignature,
    #[error("wrong token kind")]
    WrongKind,
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("system time error")]
    Time,
}

/// Issues and validates signed bearer tokens.
///
/// The secret and both lifetimes are fixed at construction and only read
/// afterwards, so one instance is shared across all requests behind an `Arc`.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Create a token service with the default lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_lifetimes(
            secret,
            Duration::from_secs(DEFAULT_ACCESS_TOKEN_SECS),
            Duration::from_secs(DEFAULT_REFRESH_TOKEN_SECS),
        )
    }

    pub fn with_lifetimes(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a token for `subject` that expires `ttl` from now.
    pub fn issue(
        &self,
        subject: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let now = unix_now()?;
        // Round sub-second lifetimes up so a positive ttl never yields exp == iat.
        let ttl_secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
        let exp = now + ttl_secs;

        let claims = Claims {
            sub: subject.to_string(),
            kind,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: exp,
        })
    }

    /// Issue an access token with the configured access lifetime.
    pub fn issue_access(&self, subject: &str) -> Result<IssuedToken, TokenError> {
        self.issue(subject, TokenKind::Access, self.access_ttl)
    }

    /// Issue a refresh token with the configured refresh lifetime.
    pub fn issue_refresh(&self, subject: &str) -> Result<IssuedToken, TokenError> {
        self.issue(subject, TokenKind::Refresh, self.refresh_ttl)
    }

    /// Verify structure and signature and return the claims.
    /// Expiry is deliberately not checked here.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Empty);
        }

        let header = jsonwebtoken::decode_header(token).map_err(classify)?;
        if header.alg != Algorithm::HS256 {
            return Err(TokenError::Unsupported);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(classify)?;

        Ok(token_data.claims)
    }

    /// Decode and require a specific token kind.
    pub fn decode_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.decode(token)?;
        if claims.kind != kind {
            return Err(TokenError::WrongKind);
        }
        Ok(claims)
    }

    /// Return the username the token was issued for.
    pub fn parse_subject(&self, token: &str) -> Result<String, TokenError> {
        self.decode(token).map(|claims| claims.sub)
    }

    /// True if the token's expiry is at or before the current time.
    pub fn is_expired(&self, token: &str) -> Result<bool, TokenError> {
        let claims = self.decode(token)?;
        Ok(claims_expired(&claims, unix_now()?))
    }

    /// True iff the subject matches `expected_username` and the token has not
    /// expired. Decode failures are returned, not folded into `false`.
    pub fn is_valid(&self, token: &str, expected_username: &str) -> Result<bool, TokenError> {
        let claims = self.decode(token)?;
        Ok(claims.sub == expected_username && !claims_expired(&claims, unix_now()?))
    }
}

/// Expiry is inclusive: a token whose `exp` equals `now` is already expired.
pub fn claims_expired(claims: &Claims, now: u64) -> bool {
    claims.exp <= now
}

pub fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::Time)
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => TokenError::Unsupported,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-for-testing-only-0123456789";

    fn encode_raw(claims: &Claims, secret: &[u8], alg: Algorithm) -> String {
        jsonwebtoken::encode(
            &Header::new(alg),
            claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_parse_subject() {
        let tokens = TokenService::new(SECRET);

        let issued = tokens.issue_access("alice").unwrap();

        assert_eq!(tokens.parse_subject(&issued.token).unwrap(), "alice");
        assert!(!tokens.is_expired(&issued.token).unwrap());
        assert_eq!(
            issued.expires_at - issued.issued_at,
            DEFAULT_ACCESS_TOKEN_SECS
        );
    }

    #[test]
    fn test_is_valid_after_issue() {
        let tokens = TokenService::new(SECRET);

        for ttl in [Duration::from_millis(1500), Duration::from_secs(60)] {
            let issued = tokens.issue("alice", TokenKind::Access, ttl).unwrap();
            assert!(tokens.is_valid(&issued.token, "alice").unwrap());
            assert!(!tokens.is_valid(&issued.token, "bob").unwrap());
        }
    }

    #[test]
    fn test_refresh_kind_and_lifetime() {
        let tokens = TokenService::with_lifetimes(
            SECRET,
            Duration::from_secs(60),
            Duration::from_secs(3600),
        );

        let refresh = tokens.issue_refresh("alice").unwrap();
        assert_eq!(refresh.expires_at - refresh.issued_at, 3600);

        let claims = tokens.decode_kind(&refresh.token, TokenKind::Refresh).unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(matches!(
            tokens.decode_kind(&refresh.token, TokenKind::Access),
            Err(TokenError::WrongKind)
        ));
    }

    #[test]
    fn test_zero_lifetime_is_expired() {
        let tokens = TokenService::new(SECRET);

        let issued = tokens
            .issue("alice", TokenKind::Access, Duration::ZERO)
            .unwrap();

        assert!(tokens.is_expired(&issued.token).unwrap());
        assert!(!tokens.is_valid(&issued.token, "alice").unwrap());
    }

    #[test]
    fn test_expired_token_still_decodes() {
        let now = unix_now().unwrap();
        let claims = Claims {
            sub: "alice".to_string(),
            kind: TokenKind::Access,
            iat: now - 100,
            exp: now - 50,
        };
        let token = encode_raw(&claims, SECRET, Algorithm::HS256);

        let tokens = TokenService::new(SECRET);
        assert_eq!(tokens.parse_subject(&token).unwrap(), "alice");
        assert!(tokens.is_expired(&token).unwrap());
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let claims = Claims {
            sub: "alice".to_string(),
            kind: TokenKind::Access,
            iat: 100,
            exp: 200,
        };
        assert!(claims_expired(&claims, 200));
        assert!(claims_expired(&claims, 201));
        assert!(!claims_expired(&claims, 199));
    }

    #[test]
    fn test_empty_token() {
        let tokens = TokenService::new(SECRET);
        assert!(matches!(tokens.parse_subject(""), Err(TokenError::Empty)));
        assert!(matches!(tokens.parse_subject("   "), Err(TokenError::Empty)));
    }

    #[test]
    fn test_malformed_token() {
        let tokens = TokenService::new(SECRET);
        assert!(matches!(
            tokens.parse_subject("invalid-token"),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            tokens.is_valid("a.b.c", "alice"),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let issuer = TokenService::new(b"secret-1-padded-to-a-reasonable-length");
        let verifier = TokenService::new(b"secret-2-padded-to-a-reasonable-length");

        let issued = issuer.issue_access("alice").unwrap();

        assert!(matches!(
            verifier.parse_subject(&issued.token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_unsupported_algorithm() {
        let now = unix_now().unwrap();
        let claims = Claims {
            sub: "alice".to_string(),
            kind: TokenKind::Access,
            iat: now,
            exp: now + 60,
        };
        let token = encode_raw(&claims, SECRET, Algorithm::HS512);

        let tokens = TokenService::new(SECRET);
        assert!(matches!(
            tokens.parse_subject(&token),
            Err(TokenError::Unsupported)
        ));
    }
}
