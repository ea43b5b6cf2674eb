use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use mc_auth::{Role, TokenPolicy};
use serde::{Deserialize, Serialize};

use crate::publisher::RetryPolicy;
use crate::rotation::RotationPolicy;
use crate::util::{env_parse, env_string};

/// Signing secret used when `JWT_SECRET` is not configured. Development only.
pub const DEV_JWT_SECRET: &str = "supersecretkey123";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub commander: CommanderConfig,
    #[serde(default)]
    pub soldier: SoldierConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub commander_api_key: Option<String>,
    #[serde(default)]
    pub soldier_api_key: Option<String>,
    #[serde(default = "default_commander_ttl")]
    pub commander_access_ttl_secs: u64,
    #[serde(default = "default_soldier_ttl")]
    pub soldier_access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            commander_api_key: None,
            soldier_api_key: None,
            commander_access_ttl_secs: default_commander_ttl(),
            soldier_access_ttl_secs: default_soldier_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportBackend {
    #[default]
    Local,
    Nats,
}

impl FromStr for TransportBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(TransportBackend::Local),
            "nats" => Ok(TransportBackend::Nats),
            other => Err(anyhow::anyhow!("unknown transport backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub backend: TransportBackend,
    /// NATS connection URL, e.g. <nats://127.0.0.1:4222>
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backend: TransportBackend::default(),
            nats_url: default_nats_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommanderConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_publish_attempts")]
    pub publish_attempts: u32,
    #[serde(default = "default_publish_backoff_ms")]
    pub publish_backoff_ms: u64,
}

impl Default for CommanderConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            publish_attempts: default_publish_attempts(),
            publish_backoff_ms: default_publish_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SoldierConfig {
    #[serde(default = "default_commander_url")]
    pub commander_url: String,
    #[serde(default = "default_rotation_check_secs")]
    pub rotation_check_secs: u64,
    #[serde(default = "default_rotation_margin_secs")]
    pub rotation_margin_secs: u64,
    #[serde(default = "default_login_attempts")]
    pub login_attempts: u32,
    #[serde(default = "default_login_backoff_secs")]
    pub login_backoff_secs: u64,
}

impl Default for SoldierConfig {
    fn default() -> Self {
        Self {
            commander_url: default_commander_url(),
            rotation_check_secs: default_rotation_check_secs(),
            rotation_margin_secs: default_rotation_margin_secs(),
            login_attempts: default_login_attempts(),
            login_backoff_secs: default_login_backoff_secs(),
        }
    }
}

fn default_commander_ttl() -> u64 {
    mc_auth::DEFAULT_COMMANDER_ACCESS_TTL.as_secs()
}
fn default_soldier_ttl() -> u64 {
    mc_auth::DEFAULT_SOLDIER_ACCESS_TTL.as_secs()
}
fn default_refresh_ttl() -> u64 {
    mc_auth::DEFAULT_REFRESH_TTL.as_secs()
}
fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".into()
}
fn default_bind() -> String {
    "0.0.0.0:8080".into()
}
fn default_publish_attempts() -> u32 {
    5
}
fn default_publish_backoff_ms() -> u64 {
    1_000
}
fn default_commander_url() -> String {
    "http://127.0.0.1:8080".into()
}
fn default_rotation_check_secs() -> u64 {
    10
}
fn default_rotation_margin_secs() -> u64 {
    15
}
fn default_login_attempts() -> u32 {
    5
}
fn default_login_backoff_secs() -> u64 {
    3
}

pub fn load_config(path: &str) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read config {path}: {e}"))?;
    let cfg: Config = toml::from_str(&content)?;
    Ok(cfg)
}

impl Config {
    /// File named by `MC_CONFIG` (when set), then environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match env_string("MC_CONFIG") {
            Some(path) => load_config(&path)?,
            None => Config::default(),
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_string("JWT_SECRET") {
            self.auth.jwt_secret = Some(v);
        }
        if let Some(v) = env_string("COMMANDER_API_KEY") {
            self.auth.commander_api_key = Some(v);
        }
        if let Some(v) = env_string("SOLDIER_API_KEY") {
            self.auth.soldier_api_key = Some(v);
        }
        if let Some(v) = env_string("MC_BIND") {
            self.commander.bind = v;
        }
        if let Some(v) = env_string("MC_TRANSPORT") {
            self.transport.backend = v.parse()?;
        }
        if let Some(v) = env_string("MC_NATS_URL") {
            self.transport.nats_url = v;
        }
        if let Some(v) = env_string("COMMANDER_URL") {
            self.soldier.commander_url = v;
        }
        if let Some(v) = env_parse("MC_ROTATION_CHECK_SECS") {
            self.soldier.rotation_check_secs = v;
        }
        if let Some(v) = env_parse("MC_ROTATION_MARGIN_SECS") {
            self.soldier.rotation_margin_secs = v;
        }
        Ok(())
    }

    /// Signing secret; falls back to [`DEV_JWT_SECRET`] with a warning.
    pub fn jwt_secret(&self) -> Vec<u8> {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
            _ => {
                tracing::warn!(target: "mc::config", "JWT_SECRET not set; using development secret");
                DEV_JWT_SECRET.as_bytes().to_vec()
            }
        }
    }

    pub fn api_key(&self, role: Role) -> Option<&str> {
        match role {
            Role::Commander => self.auth.commander_api_key.as_deref(),
            Role::Soldier => self.auth.soldier_api_key.as_deref(),
        }
    }

    pub fn token_policy(&self) -> TokenPolicy {
        TokenPolicy {
            commander_access_ttl: Duration::from_secs(self.auth.commander_access_ttl_secs),
            soldier_access_ttl: Duration::from_secs(self.auth.soldier_access_ttl_secs),
            refresh_ttl: Duration::from_secs(self.auth.refresh_ttl_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.commander.publish_attempts,
            initial_backoff: Duration::from_millis(self.commander.publish_backoff_ms),
        }
    }

    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy {
            check_interval: Duration::from_secs(self.soldier.rotation_check_secs.max(1)),
            margin: Duration::from_secs(self.soldier.rotation_margin_secs),
            login_attempts: self.soldier.login_attempts,
            login_backoff: Duration::from_secs(self.soldier.login_backoff_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env;
    use std::io::Write;

    const KEYS: &[&str] = &[
        "MC_CONFIG",
        "JWT_SECRET",
        "COMMANDER_API_KEY",
        "SOLDIER_API_KEY",
        "MC_BIND",
        "MC_TRANSPORT",
        "MC_NATS_URL",
        "COMMANDER_URL",
        "MC_ROTATION_CHECK_SECS",
        "MC_ROTATION_MARGIN_SECS",
    ];

    #[test]
    fn defaults_apply_when_unset() {
        let mut guard = env::guard();
        guard.clear_keys(KEYS);
        let cfg = Config::load().unwrap();
        assert_eq!(cfg.commander.bind, "0.0.0.0:8080");
        assert_eq!(cfg.transport.backend, TransportBackend::Local);
        assert_eq!(cfg.jwt_secret(), DEV_JWT_SECRET.as_bytes());
        assert_eq!(cfg.api_key(Role::Soldier), None);
        assert_eq!(cfg.rotation_policy(), RotationPolicy::default());
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
        assert_eq!(
            cfg.token_policy().soldier_access_ttl,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn env_overrides_file_values() {
        let mut guard = env::guard();
        guard.clear_keys(KEYS);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[commander]\nbind = \"127.0.0.1:9000\"\n\n[soldier]\nrotation_check_secs = 7\n\n[auth]\nsoldier_api_key = \"from-file\""
        )
        .unwrap();
        guard.set("MC_CONFIG", file.path().to_str().unwrap());
        guard.set("SOLDIER_API_KEY", "from-env");
        guard.set("MC_TRANSPORT", "NATS");

        let cfg = Config::load().unwrap();
        assert_eq!(cfg.commander.bind, "127.0.0.1:9000");
        assert_eq!(cfg.soldier.rotation_check_secs, 7);
        assert_eq!(cfg.soldier.rotation_margin_secs, 15);
        assert_eq!(cfg.api_key(Role::Soldier), Some("from-env"));
        assert_eq!(cfg.transport.backend, TransportBackend::Nats);
    }

    #[test]
    fn unknown_transport_is_an_error() {
        let mut guard = env::guard();
        guard.clear_keys(KEYS);
        guard.set("MC_TRANSPORT", "carrier-pigeon");
        assert!(Config::load().is_err());
    }
}
