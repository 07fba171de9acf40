use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use common::UserId;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// An access token together with the refresh token issued alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues signed, time-bounded tokens for a user and verifies them.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user_id: UserId, kind: TokenKind) -> Result<String, AuthError>;

    /// Returns the user the token was issued to if the signature, kind and
    /// expiry all check out.
    fn verify(&self, token: &str, kind: TokenKind) -> Result<UserId, AuthError>;

    fn issue_access(&self, user_id: UserId) -> Result<String, AuthError> {
        self.issue(user_id, TokenKind::Access)
    }

    fn issue_refresh(&self, user_id: UserId) -> Result<String, AuthError> {
        self.issue(user_id, TokenKind::Refresh)
    }

    fn issue_pair(&self, user_id: UserId) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue_access(user_id)?,
            refresh_token: self.issue_refresh(user_id)?,
        })
    }

    fn verify_access(&self, token: &str) -> Result<UserId, AuthError> {
        self.verify(token, TokenKind::Access)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: i64,
    kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<Uuid>,
}

/// Tokens of the form `base64url(claims).base64url(hmac_sha256(claims))`.
///
/// Access and refresh tokens are signed with different secrets. Refresh
/// tokens carry a random `jti` so two issued in the same second differ.
pub struct HmacTokenIssuer {
    access_secret: SecretString,
    refresh_secret: SecretString,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl HmacTokenIssuer {
    pub fn new(
        access_secret: SecretString,
        refresh_secret: SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_secret,
            refresh_secret,
            access_ttl,
            refresh_ttl,
        }
    }

    fn mac(&self, kind: TokenKind) -> Result<HmacSha256, AuthError> {
        let secret = match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        };
        HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

impl TokenIssuer for HmacTokenIssuer {
    fn issue(&self, user_id: UserId, kind: TokenKind) -> Result<String, AuthError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id.as_uuid(),
            exp: (Utc::now() + ttl).timestamp(),
            kind,
            jti: (kind == TokenKind::Refresh).then(Uuid::new_v4),
        };

        let payload = serde_json::to_vec(&claims).map_err(|e| AuthError::Signing(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac(kind)?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    fn verify(&self, token: &str, kind: TokenKind) -> Result<UserId, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let mut mac = self.mac(kind)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;

        if claims.kind != kind {
            return Err(AuthError::InvalidToken);
        }
        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(UserId::from_uuid(claims.sub))
    }
}
