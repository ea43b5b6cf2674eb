use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::claims::{Claims, CredentialPair, Role, TokenKind};

pub const DEFAULT_COMMANDER_ACCESS_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_SOLDIER_ACCESS_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token expired")]
    Expired,
    #[error("expected {expected} token, got {found}")]
    WrongKind { expected: TokenKind, found: TokenKind },
    #[error("role {found} may not perform this action (requires {required})")]
    RoleMismatch { required: Role, found: Role },
    #[error("scope {found} is insufficient (requires {required})")]
    ScopeMismatch { required: String, found: String },
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Validity windows per token class.
///
/// The commander token is long-lived because it is rarely reissued; the
/// soldier token is short so the rotation path runs continuously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub commander_access_ttl: Duration,
    pub soldier_access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            commander_access_ttl: DEFAULT_COMMANDER_ACCESS_TTL,
            soldier_access_ttl: DEFAULT_SOLDIER_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        }
    }
}

impl TokenPolicy {
    pub fn access_ttl_for(&self, role: Role) -> Duration {
        match role {
            Role::Commander => self.commander_access_ttl,
            Role::Soldier => self.soldier_access_ttl,
        }
    }
}

/// HS256 credential engine keyed by a single shared secret.
pub struct CredentialEngine {
    encoding: EncodingKey,
    decoding: DecodingKey,
    policy: TokenPolicy,
}

impl CredentialEngine {
    pub fn new(secret: &[u8]) -> Self {
        Self::with_policy(secret, TokenPolicy::default())
    }

    pub fn with_policy(secret: &[u8], policy: TokenPolicy) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            policy,
        }
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Mint a pair whose access token lives for `access_ttl`.
    pub fn issue(&self, role: Role, access_ttl: Duration) -> Result<CredentialPair, AuthError> {
        self.issue_at(role, access_ttl, Utc::now())
    }

    /// Mint a pair using the policy window for `role`.
    pub fn issue_for(&self, role: Role) -> Result<CredentialPair, AuthError> {
        self.issue(role, self.policy.access_ttl_for(role))
    }

    /// Mint a pair as if the current time were `now`. Backdating is how
    /// callers obtain already-expired credentials.
    pub fn issue_at(
        &self,
        role: Role,
        access_ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<CredentialPair, AuthError> {
        let issued_at = now.timestamp();
        let access = Claims {
            subject_role: role,
            access_scope: role.scope().to_string(),
            issued_at,
            expires_at: issued_at + secs(access_ttl),
            token_kind: TokenKind::Access,
            jti: Uuid::new_v4().to_string(),
        };
        let refresh = Claims {
            expires_at: issued_at + secs(self.policy.refresh_ttl),
            token_kind: TokenKind::Refresh,
            jti: Uuid::new_v4().to_string(),
            ..access.clone()
        };
        Ok(CredentialPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|err| AuthError::Signing(err.to_string()))
    }

    /// Check signature and structure. Expiry is deliberately not checked so
    /// callers can tell "bad signature" apart from "expired".
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }

    /// Verify, then require an unexpired access token.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.verify(token)?;
        if claims.token_kind != TokenKind::Access {
            return Err(AuthError::WrongKind {
                expected: TokenKind::Access,
                found: claims.token_kind,
            });
        }
        if claims.is_expired_at(Utc::now().timestamp()) {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    /// Role-based access control. Both role and scope must match.
    pub fn authorize(
        claims: &Claims,
        required_role: Role,
        required_scope: &str,
    ) -> Result<(), AuthError> {
        if claims.subject_role != required_role {
            return Err(AuthError::RoleMismatch {
                required: required_role,
                found: claims.subject_role,
            });
        }
        if claims.access_scope != required_scope {
            return Err(AuthError::ScopeMismatch {
                required: required_scope.to_string(),
                found: claims.access_scope.clone(),
            });
        }
        Ok(())
    }

    /// Exchange a refresh token for a brand-new pair of the same role.
    pub fn refresh(&self, refresh_token: &str) -> Result<CredentialPair, AuthError> {
        let claims = self.verify(refresh_token)?;
        if claims.token_kind != TokenKind::Refresh {
            return Err(AuthError::WrongKind {
                expected: TokenKind::Refresh,
                found: claims.token_kind,
            });
        }
        if claims.is_expired_at(Utc::now().timestamp()) {
            return Err(AuthError::Expired);
        }
        self.issue_for(claims.subject_role)
    }
}

/// Decode claims without checking the signature.
pub fn decode_unverified(token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(map_decode_error)
}

/// Fail-closed expiry check: anything that does not decode counts as expired.
pub fn is_expired(token: &str) -> bool {
    match decode_unverified(token) {
        Ok(claims) => claims.is_expired_at(Utc::now().timestamp()),
        Err(_) => true,
    }
}

/// Time left before `token` expires; `None` when expired or undecodable.
pub fn remaining_validity(token: &str) -> Option<Duration> {
    let claims = decode_unverified(token).ok()?;
    let left = claims.expires_at - Utc::now().timestamp();
    (left > 0).then(|| Duration::from_secs(left as u64))
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX / 2)
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::ExpiredSignature => AuthError::Expired,
        other => AuthError::Malformed(format!("{other:?}")),
    }
}
