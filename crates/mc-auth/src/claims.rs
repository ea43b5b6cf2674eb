use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of principals that can hold a credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Commander,
    Soldier,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Commander, Role::Soldier];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Commander => "COMMANDER",
            Role::Soldier => "SOLDIER",
        }
    }

    /// Scope string carried in the `role` claim, e.g. `SOLDIER_ACCESS`.
    pub fn scope(&self) -> &'static str {
        match self {
            Role::Commander => "COMMANDER_ACCESS",
            Role::Soldier => "SOLDIER_ACCESS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "COMMANDER" => Some(Role::Commander),
            "SOLDIER" => Some(Role::Soldier),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Typed claim set. Wire names follow the compact JWT layout
/// (`user`, `role`, `iat`, `exp`, `type`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "user")]
    pub subject_role: Role,
    #[serde(rename = "role")]
    pub access_scope: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "type")]
    pub token_kind: TokenKind,
    /// Unique token id so two pairs minted in the same second still differ.
    #[serde(default)]
    pub jti: String,
}

impl Claims {
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        now_secs >= self.expires_at
    }
}

/// Access and refresh token minted together for one role.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}
