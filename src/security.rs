use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use uuid::Uuid;

use crate::{
    config::JwtConfig,
    dto::auth::{Claims, TokenKind},
    error::{AppError, AppResult},
    models::UserRole,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn issue_token(
    jwt: &JwtConfig,
    user_id: Uuid,
    role: UserRole,
    kind: TokenKind,
) -> AppResult<String> {
    let ttl = match kind {
        TokenKind::Access => jwt.access_ttl,
        TokenKind::Refresh => jwt.refresh_ttl,
    };
    issue_token_with_ttl(jwt, user_id, role, kind, ttl)
}

fn issue_token_with_ttl(
    jwt: &JwtConfig,
    user_id: Uuid,
    role: UserRole,
    kind: TokenKind,
    ttl: Duration,
) -> AppResult<String> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        typ: kind,
        iat: now.timestamp().max(0) as usize,
        exp: expiration.timestamp().max(0) as usize,
    };

    encode(
        &Header::new(jwt.algorithm),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

/// Decode and validate a token, requiring it to be of the `expected` kind.
pub fn decode_token(jwt: &JwtConfig, token: &str, expected: TokenKind) -> AppResult<Claims> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt.secret.as_bytes()),
        &Validation::new(jwt.algorithm),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    if decoded.claims.typ != expected {
        return Err(AppError::Unauthorized("Wrong token type".into()));
    }
    Ok(decoded.claims)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::Algorithm;

    use super::*;

    fn jwt() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".into(),
            algorithm: Algorithm::HS256,
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(1),
        }
    }

    #[test]
    fn password_hash_verifies_only_the_hashed_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_internal_error() {
        let err = verify_password("whatever", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn access_token_round_trips_claims() {
        let config = jwt();
        let user_id = Uuid::new_v4();
        let token = issue_token(&config, user_id, UserRole::Admin, TokenKind::Access).unwrap();

        let claims = decode_token(&config, &token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_is_not_accepted_as_access_token() {
        let config = jwt();
        let token =
            issue_token(&config, Uuid::new_v4(), UserRole::User, TokenKind::Refresh).unwrap();

        let err = decode_token(&config, &token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(decode_token(&config, &token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = jwt();
        let token = issue_token_with_ttl(
            &config,
            Uuid::new_v4(),
            UserRole::User,
            TokenKind::Access,
            Duration::minutes(-10),
        )
        .unwrap();

        let err = decode_token(&config, &token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token =
            issue_token(&jwt(), Uuid::new_v4(), UserRole::User, TokenKind::Access).unwrap();
        let other = JwtConfig {
            secret: "another-secret".into(),
            ..jwt()
        };

        assert!(decode_token(&other, &token, TokenKind::Access).is_err());
        assert!(decode_token(&jwt(), "garbage", TokenKind::Access).is_err());
    }
}
