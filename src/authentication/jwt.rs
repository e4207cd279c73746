use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    error::ServiceError,
    schema::{Id, User, UserRole},
};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, role: UserRole, lifetime: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// The caller identity every service trusts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    /// Writes need a known caller; anonymous requests are rejected here.
    pub fn require(session: Option<&SessionData>) -> Result<&SessionData, ServiceError> {
        session.ok_or(ServiceError::NotAuthenticated)
    }

    pub fn authenticate(&self, action: ActionType) -> Result<(), ServiceError> {
        if !action.authenticate(self) {
            return Err(ServiceError::Permission(String::from(
                "You don't have permission to perform this action",
            )));
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, ServiceError> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|e| {
        log::error!("Invalid session signing key: {e}");
        ServiceError::NotAuthenticated
    })
}

pub fn generate_jwt_session(
    user: &User,
    secret: &str,
    lifetime_hours: i64,
) -> Result<String, ServiceError> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(
        user.id,
        user.username.to_owned(),
        user.role.to_owned(),
        Duration::hours(lifetime_hours),
    );

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign session: {e}");
        ServiceError::NotAuthenticated
    })
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, ServiceError> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token.verify_with_key(&key).map_err(|e| {
        log::debug!("Invalid session token: {e}");
        ServiceError::NotAuthenticated
    })?;

    if session.exp < Utc::now().timestamp() {
        log::debug!("Session of user {} expired", session.user_id);
        return Err(ServiceError::NotAuthenticated);
    }

    Ok(session)
}
