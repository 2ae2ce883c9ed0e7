//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs whose `sub` is the user id and whose `is_staff`
//! claim grants read access to every order. Issuing tokens to end users is
//! handled by a separate identity service; [`JwtKeys::issue`] exists for
//! operators and tests.

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::{web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::principal::Principal;
use crate::errors::AppError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication credentials were not provided.")]
    MissingToken,
    #[error("Given token not valid: {0}")]
    InvalidToken(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Unauthorized(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub is_staff: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn issue(&self, principal: &Principal, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: principal.user_id,
            is_staff: principal.is_staff,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(Principal::new(data.claims.sub, data.claims.is_staff))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken("malformed Authorization header".to_string()))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("Bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::MissingToken),
    }
}

/// Extractor for the authenticated caller. Rejects the request with 401 when
/// the bearer token is absent or does not verify.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Principal);

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    let keys = req
        .app_data::<web::Data<JwtKeys>>()
        .ok_or_else(|| AppError::Internal("JWT keys are not configured".to_string()))?;
    let token = bearer_token(req.headers())?;
    Ok(AuthUser(keys.verify(token)?))
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::header::HeaderValue;
    use actix_web::test::TestRequest;

    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::new(b"test-secret")
    }

    #[test]
    fn issued_token_verifies_to_the_same_principal() {
        let principal = Principal::new(Uuid::new_v4(), true);
        let token = keys().issue(&principal, Duration::minutes(60)).unwrap();
        assert_eq!(keys().verify(&token).unwrap(), principal);
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let principal = Principal::new(Uuid::new_v4(), false);
        let token = JwtKeys::new(b"other-secret")
            .issue(&principal, Duration::minutes(60))
            .unwrap();
        assert!(matches!(
            keys().verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let principal = Principal::new(Uuid::new_v4(), false);
        let token = keys().issue(&principal, Duration::hours(-2)).unwrap();
        assert!(keys().verify(&token).is_err());
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingToken)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingToken)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }

    #[actix_web::test]
    async fn extractor_yields_principal_from_valid_token() {
        let principal = Principal::new(Uuid::new_v4(), false);
        let token = keys().issue(&principal, Duration::minutes(5)).unwrap();
        let req = TestRequest::default()
            .app_data(web::Data::new(keys()))
            .insert_header((AUTHORIZATION, format!("Bearer {token}")))
            .to_http_request();

        let AuthUser(extracted) = AuthUser::extract(&req).await.unwrap();
        assert_eq!(extracted, principal);
    }

    #[actix_web::test]
    async fn extractor_rejects_missing_token() {
        let req = TestRequest::default()
            .app_data(web::Data::new(keys()))
            .to_http_request();

        let err = AuthUser::extract(&req).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
