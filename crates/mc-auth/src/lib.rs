//! Role-scoped, time-bounded credentials.
//!
//! The [`CredentialEngine`] mints and checks HS256 token pairs; the
//! [`CredentialIssuer`] fronts it with api-key login and refresh exchanges;
//! [`AuthExchange`] is what an executor talks to when it needs a pair.

mod claims;
mod engine;
mod exchange;
pub mod wire;

pub use claims::{Claims, CredentialPair, Role, TokenKind};
pub use engine::{
    decode_unverified, is_expired, remaining_validity, AuthError, CredentialEngine, TokenPolicy,
    DEFAULT_COMMANDER_ACCESS_TTL, DEFAULT_REFRESH_TTL, DEFAULT_SOLDIER_ACCESS_TTL,
};
pub use exchange::{AuthExchange, CredentialIssuer, ExchangeError, LocalExchange};
pub use wire::extract_bearer;
