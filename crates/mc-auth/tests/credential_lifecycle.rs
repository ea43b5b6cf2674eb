use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use mc_auth::{
    is_expired, AuthError, AuthExchange, Claims, CredentialEngine, CredentialIssuer,
    ExchangeError, LocalExchange, Role, TokenKind,
};

const SECRET: &[u8] = b"integration-secret";

fn issuer() -> CredentialIssuer {
    CredentialIssuer::new(Arc::new(CredentialEngine::new(SECRET)))
        .with_api_key(Role::Commander, "commander-key")
        .with_api_key(Role::Soldier, "soldier-key")
}

#[test]
fn login_then_verify_yields_live_access_token() {
    let issuer = issuer();
    for (role, key) in [(Role::Commander, "commander-key"), (Role::Soldier, "soldier-key")] {
        let pair = issuer.login(role, key).expect("login");
        let claims = issuer.engine().verify(&pair.access_token).expect("verify");
        assert_eq!(claims.subject_role, role);
        assert_eq!(claims.token_kind, TokenKind::Access);
        assert!(!is_expired(&pair.access_token));
    }
}

#[test]
fn login_rejects_wrong_api_key() {
    let err = issuer().login(Role::Soldier, "commander-key").unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidApiKey));
}

#[test]
fn past_expiry_is_expired_regardless_of_signature() {
    let past = Utc::now() - ChronoDuration::hours(3);
    let ours = CredentialEngine::new(SECRET)
        .issue_at(Role::Soldier, Duration::from_secs(30), past)
        .unwrap();
    let foreign = CredentialEngine::new(b"someone-else")
        .issue_at(Role::Soldier, Duration::from_secs(30), past)
        .unwrap();
    assert!(is_expired(&ours.access_token));
    assert!(is_expired(&foreign.access_token));
}

#[test]
fn verify_rejects_foreign_signature() {
    let foreign = CredentialEngine::new(b"someone-else")
        .issue_for(Role::Commander)
        .unwrap();
    let err = CredentialEngine::new(SECRET)
        .verify(&foreign.access_token)
        .unwrap_err();
    assert_eq!(err, AuthError::InvalidSignature);
}

#[test]
fn authorize_requires_exact_role_and_scope() {
    let claims_for = |role: Role, scope: &str| Claims {
        subject_role: role,
        access_scope: scope.to_string(),
        issued_at: 0,
        expires_at: i64::MAX,
        token_kind: TokenKind::Access,
        jti: String::new(),
    };
    let scopes = ["COMMANDER_ACCESS", "SOLDIER_ACCESS", "COMMANDER", "SOLDIER", ""];
    for held_role in Role::ALL {
        for held_scope in scopes {
            let claims = claims_for(held_role, held_scope);
            for required_role in Role::ALL {
                for required_scope in scopes {
                    let ok = CredentialEngine::authorize(&claims, required_role, required_scope)
                        .is_ok();
                    let expected = held_role == required_role && held_scope == required_scope;
                    assert_eq!(
                        ok, expected,
                        "held ({held_role}, {held_scope}) vs required ({required_role}, {required_scope})"
                    );
                }
            }
        }
    }
}

#[test]
fn refresh_rejects_access_tokens() {
    let issuer = issuer();
    let pair = issuer.login(Role::Soldier, "soldier-key").unwrap();
    let err = issuer.refresh(&pair.access_token).unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Rejected(AuthError::WrongKind {
            expected: TokenKind::Refresh,
            found: TokenKind::Access
        })
    ));
}

#[test]
fn refresh_rejects_expired_refresh_token() {
    let engine = CredentialEngine::new(SECRET);
    let stale = engine
        .issue_at(
            Role::Soldier,
            Duration::from_secs(30),
            Utc::now() - ChronoDuration::hours(25),
        )
        .unwrap();
    assert!(engine.verify(&stale.refresh_token).is_ok());
    assert_eq!(engine.refresh(&stale.refresh_token), Err(AuthError::Expired));
}

#[test]
fn refresh_yields_fresh_pair_for_same_role() {
    let issuer = issuer();
    let first = issuer.login(Role::Soldier, "soldier-key").unwrap();
    let second = issuer.refresh(&first.refresh_token).unwrap();
    assert_ne!(first, second);
    let claims = issuer.engine().verify(&second.access_token).unwrap();
    assert_eq!(claims.subject_role, Role::Soldier);
    assert_eq!(claims.access_scope, "SOLDIER_ACCESS");
}

#[test]
fn access_token_is_not_accepted_as_refresh_and_vice_versa() {
    let engine = CredentialEngine::new(SECRET);
    let pair = engine.issue_for(Role::Commander).unwrap();
    assert!(matches!(
        engine.verify_access(&pair.refresh_token),
        Err(AuthError::WrongKind { .. })
    ));
    assert!(matches!(
        engine.refresh(&pair.access_token),
        Err(AuthError::WrongKind { .. })
    ));
}

#[tokio::test]
async fn local_exchange_round_trip() {
    let exchange = LocalExchange::new(Arc::new(issuer()), Role::Soldier, "soldier-key");
    let pair = exchange.login().await.expect("login");
    let renewed = exchange.refresh(&pair.refresh_token).await.expect("refresh");
    assert!(!is_expired(&renewed.access_token));
}
