use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::error::unauthorized;
use crate::schema::{Id, User, UserRole};

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
        let now = Local::now();
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

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), potion::Error> {
        if !action.authenticate(self) {
            return Err(crate::database::error::forbidden(
                "You do not have permission to perform this action.",
            ));
        }
        Ok(())
    }

    /// Only the author may modify an object, whatever the role.
    pub fn authenticate_owner(&self, owner_id: Id, action: ActionType) -> Result<(), potion::Error> {
        self.authenticate(action)?;
        if owner_id != self.user_id {
            return Err(crate::database::error::forbidden(
                "You do not have permission to perform this action.",
            ));
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            role: value.role,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, potion::Error> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|_e| {
        log::error!("Invalid session signing key");
        potion::Error {
            code: 500,
            info: Some(String::from("Invalid session signing key")),
            redirect: None,
        }
    })
}

pub fn generate_jwt_session(
    user: &User,
    secret: &str,
    lifetime: Duration,
) -> Result<String, potion::Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(
        user.id,
        user.username.to_owned(),
        user.role.to_owned(),
        lifetime,
    );

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Failed to sign session: {e}");
        potion::Error {
            code: 500,
            info: Some(String::from("Failed to create session")),
            redirect: None,
        }
    })
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, potion::Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| unauthorized("Invalid token."))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(unauthorized("Token expired."));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 7,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Julia"),
            last_name: String::from("Child"),
            password: String::new(),
            role,
        }
    }

    #[test]
    fn round_trips_claims() {
        let token = generate_jwt_session(&user(UserRole::Admin), "secret", Duration::hours(1))
            .unwrap();
        let session: SessionData = verify_jwt_session(&token, "secret").unwrap().into();

        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "cook");
        assert_eq!(session.role, UserRole::Admin);
    }

    #[test]
    fn rejects_foreign_signature() {
        let token =
            generate_jwt_session(&user(UserRole::User), "secret", Duration::hours(1)).unwrap();

        assert!(verify_jwt_session(&token, "another secret").is_err());
        assert!(verify_jwt_session("garbage", "secret").is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let token =
            generate_jwt_session(&user(UserRole::User), "secret", Duration::hours(-1)).unwrap();

        assert!(verify_jwt_session(&token, "secret").is_err());
    }
}
