use actix_web::{
    dev::ServiceRequest, error::ErrorUnauthorized, web, Error, HttpMessage,
};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    admin: bool,
    technician: bool,
    exp: i64,
}

// `is_technician` is only a resolution hint; the identity resolver
// remains the authority on roles.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub is_admin: bool,
    pub is_technician: bool,
}

pub fn issue_token(
    secret: &str,
    account_id: &str,
    is_admin: bool,
    is_technician: bool,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: account_id.to_string(),
        admin: is_admin,
        technician: is_technician,
        exp: (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| ApiError::Upstream(format!("token signing failed: {err}")))
}

pub fn verify_token(secret: &str, token: &str) -> Result<AuthUser, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("invalid or expired credential".to_string()))?;

    Ok(AuthUser {
        id: data.claims.sub,
        is_admin: data.claims.admin,
        is_technician: data.claims.technician,
    })
}

fn authenticate(req: &ServiceRequest, credentials: &BearerAuth) -> Result<AuthUser, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ErrorUnauthorized("Unauthorized"))?;
    verify_token(&state.jwt_secret, credentials.token())
        .map_err(|_| ErrorUnauthorized("Unauthorized"))
}

pub async fn bearer_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

pub async fn admin_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials) {
        Ok(user) => {
            if !user.is_admin {
                return Err((ErrorUnauthorized("Admin access required"), req));
            }
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_claims() {
        let token = issue_token("s3cret", "acct-1", true, false).unwrap();
        let user = verify_token("s3cret", &token).unwrap();
        assert_eq!(user.id, "acct-1");
        assert!(user.is_admin);
        assert!(!user.is_technician);
    }

    #[test]
    fn rejects_wrong_secret_and_garbage() {
        let token = issue_token("s3cret", "acct-1", false, true).unwrap();
        assert!(verify_token("other", &token).is_err());
        assert!(verify_token("s3cret", "not-a-token").is_err());
    }
}
