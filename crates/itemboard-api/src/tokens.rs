use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use itemboard_types::api::Claims;
use itemboard_types::models::Role;

use crate::config::ApiConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn secret<'a>(&self, config: &'a ApiConfig) -> &'a [u8] {
        match self {
            Self::Access => config.jwt_secret.as_bytes(),
            Self::Refresh => config.refresh_secret.as_bytes(),
        }
    }

    fn ttl(&self, config: &ApiConfig) -> chrono::Duration {
        let ttl = match self {
            Self::Access => config.access_ttl,
            Self::Refresh => config.refresh_ttl,
        };
        chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(3650))
    }
}

/// A signed token and the moment it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub fn issue(
    config: &ApiConfig,
    kind: TokenKind,
    user_id: Uuid,
    email: &str,
    role: Role,
) -> anyhow::Result<IssuedToken> {
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(kind.ttl(config))
        .ok_or_else(|| anyhow::anyhow!("{:?} token lifetime is out of range", kind))?;
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
        jti: Uuid::new_v4(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(kind.secret(config)),
    )?;

    Ok(IssuedToken { token, expires_at })
}

/// Check signature and expiry. Any failure yields `None`; callers answer
/// with a generic 401 either way.
pub fn verify(config: &ApiConfig, kind: TokenKind, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(kind.secret(config)),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            jwt_secret: "access-test-secret".into(),
            refresh_secret: "refresh-test-secret".into(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn access_token_roundtrip() {
        let config = config();
        let id = Uuid::new_v4();
        let issued = issue(&config, TokenKind::Access, id, "a@example.com", Role::Editor).unwrap();

        let claims = verify(&config, TokenKind::Access, &issued.token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.role, Role::Editor);
        assert_eq!(claims.exp, issued.expires_at.timestamp() as usize);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let config = config();
        let refresh = issue(&config, TokenKind::Refresh, Uuid::new_v4(), "a@example.com", Role::User).unwrap();
        assert!(verify(&config, TokenKind::Access, &refresh.token).is_none());
        assert!(verify(&config, TokenKind::Refresh, &refresh.token).is_some());
    }

    #[test]
    fn oversized_lifetime_is_an_error() {
        let config = ApiConfig {
            access_ttl: std::time::Duration::from_secs(9_000_000_000_000_000),
            ..config()
        };
        let res = issue(&config, TokenKind::Access, Uuid::new_v4(), "a@example.com", Role::User);
        assert!(res.is_err());
    }

    #[test]
    fn tokens_minted_together_differ() {
        let config = config();
        let id = Uuid::new_v4();
        let a = issue(&config, TokenKind::Refresh, id, "a@example.com", Role::User).unwrap();
        let b = issue(&config, TokenKind::Refresh, id, "a@example.com", Role::User).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn expired_and_tampered_tokens_fail() {
        let config = config();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "old@example.com".into(),
            role: Role::Admin,
            iat: (Utc::now().timestamp() - 7200) as usize,
            exp: (Utc::now().timestamp() - 3600) as usize,
            jti: Uuid::new_v4(),
        };
        let expired = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(verify(&config, TokenKind::Access, &expired).is_none());

        let good = issue(&config, TokenKind::Access, Uuid::new_v4(), "x@example.com", Role::User).unwrap();
        let mut tampered = good.token.clone();
        tampered.push('x');
        assert!(verify(&config, TokenKind::Access, &tampered).is_none());
    }
}
