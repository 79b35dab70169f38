//! Password hashing and bearer-token handling for the public API.
//!
//! Tokens are stateless: `base64(user_id.expiry.hmac_sha256(secret, "user_id.expiry"))`. Nothing about them is
//! stored server-side, so a restarted server with the same secret keeps accepting tokens it issued earlier.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use log::*;
use lps_common::Secret;
use sha2::Sha256;

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_LIFETIME_HOURS: i64 = 24;

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::HashingError(e.to_string()))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        warn!("🔑️ A stored password hash is not in PHC format. Treating the password as wrong.");
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Issues and validates the HMAC-signed bearer tokens used by every authenticated route.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Secret,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { secret: config.hmac_secret.clone() }
    }

    pub fn issue(&self, user_id: i64) -> Result<String, AuthError> {
        let expiry = (Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp();
        let payload = format!("{user_id}.{expiry}");
        let signature = self.sign(&payload)?;
        let token = base64::encode_config(format!("{payload}.{signature}"), base64::URL_SAFE_NO_PAD);
        trace!("🔑️ Issued access token for user {user_id}");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<i64, AuthError> {
        let raw = base64::decode_config(token, base64::URL_SAFE_NO_PAD)
            .map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        let raw =
            String::from_utf8(raw).map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        let mut parts = raw.splitn(3, '.');
        let (Some(user_id), Some(expiry), Some(signature)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AuthError::PoorlyFormattedToken("Expected 3 token segments".into()));
        };
        let payload = format!("{user_id}.{expiry}");
        self.verify(&payload, signature)?;
        let expiry: i64 =
            expiry.parse().map_err(|_| AuthError::PoorlyFormattedToken("Invalid expiry timestamp".into()))?;
        if expiry < Utc::now().timestamp() {
            return Err(AuthError::ValidationError("Token has expired".into()));
        }
        user_id.parse().map_err(|_| AuthError::PoorlyFormattedToken("Invalid user id".into()))
    }

    fn sign(&self, payload: &str) -> Result<String, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AuthError::HashingError(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(base64::encode_config(mac.finalize().into_bytes(), base64::URL_SAFE_NO_PAD))
    }

    fn verify(&self, payload: &str, signature: &str) -> Result<(), AuthError> {
        let signature = base64::decode_config(signature, base64::URL_SAFE_NO_PAD)
            .map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AuthError::HashingError(e.to_string()))?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| AuthError::ValidationError("Signature mismatch".into()))
    }
}

/// Extractor that resolves the calling user from the `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub id: i64,
}

impl FromRequest for AuthenticatedUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = authenticate(req);
        ready(result)
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, ServerError> {
    let issuer = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| ServerError::InitializeError("TokenIssuer is not configured".into()))?;
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::ValidationError("Missing Authorization header".into()))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::PoorlyFormattedToken("Expected a Bearer token".into()))?;
    let id = issuer.validate(token)?;
    Ok(AuthenticatedUser { id })
}

#[cfg(test)]
mod test {
    use super::*;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(&AuthConfig { hmac_secret: Secret::new(secret) })
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-hash"));
    }

    #[test]
    fn tokens_round_trip() {
        let issuer = issuer("s3cret");
        let token = issuer.issue(42).unwrap();
        assert_eq!(issuer.validate(&token).unwrap(), 42);
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let token = issuer("s3cret").issue(42).unwrap();
        let err = issuer("other").validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::ValidationError(_)));
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let issuer = issuer("s3cret");
        assert!(issuer.validate("not-base64-⚡️").is_err());
        let truncated = base64::encode_config("42.123", base64::URL_SAFE_NO_PAD);
        assert!(matches!(issuer.validate(&truncated).unwrap_err(), AuthError::PoorlyFormattedToken(_)));
    }
}
