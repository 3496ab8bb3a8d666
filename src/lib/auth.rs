//! # auth.rs
//!
//! Session tokens for the dashboard. Access tokens are short lived and go in
//! the `Authorization` header; refresh tokens are signed with their own
//! secret and travel in an http-only cookie. The signing keys and the demo
//! password hash are built once at startup into `AuthKeys`, which is handed
//! to the HTTP layer as app data.

use argon2::{Argon2, PasswordHasher, PasswordVerifier, password_hash::PasswordHash};
use argon2::password_hash::SaltString;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::warn;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::lib::config::Config;
use crate::lib::constants::{ACCESS_TOKEN_TTL_MIN, REFRESH_TOKEN_TTL_DAYS};
use crate::lib::errors::AuthError;

pub const DEMO_USER_ID: &str = "demo";
const DEMO_USER_NAME: &str = "Demo User";
const MICROSOFT_USER_NAME: &str = "Microsoft User";


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
}

impl SessionUser {
    /// Display name for a subject when the token carries none.
    pub fn for_subject(sub: &str, name: Option<&str>) -> Self {
        let name = match name {
            Some(n) => n.to_string(),
            None if sub == DEMO_USER_ID => DEMO_USER_NAME.to_string(),
            None => MICROSOFT_USER_NAME.to_string(),
        };
        Self { id: sub.to_string(), name }
    }
}

impl From<&Claims> for SessionUser {
    fn from(c: &Claims) -> Self {
        Self::for_subject(&c.sub, c.name.as_deref())
    }
}


pub struct AuthKeys {
    access_secret: String,
    refresh_secret: String,
    demo_email: String,
    demo_hash: String,
}

impl std::fmt::Debug for AuthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKeys").field("demo_email", &self.demo_email).finish_non_exhaustive()
    }
}

fn random_secret() -> String {
    OsRng.sample_iter(&Alphanumeric).take(64).map(char::from).collect()
}

impl AuthKeys {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let access_secret = config.jwt_secret.clone().unwrap_or_else(|| {
            warn!("JWT_SECRET not set, access tokens will not survive a restart");
            random_secret()
        });
        let refresh_secret = config.refresh_secret.clone().unwrap_or_else(|| {
            warn!("REFRESH_SECRET not set, refresh tokens will not survive a restart");
            random_secret()
        });
        Self::new(access_secret, refresh_secret, &config.demo_email, &config.demo_password)
    }

    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        demo_email: &str,
        demo_password: &str,
    ) -> anyhow::Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let demo_hash = Argon2::default()
            .hash_password(demo_password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash demo password: {}", e))?
            .to_string();
        Ok(Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            demo_email: demo_email.trim().to_lowercase(),
            demo_hash,
        })
    }

    /// Checks a demo sign-in. The email comparison ignores case and
    /// surrounding whitespace.
    pub fn check_demo_credentials(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if email.trim().to_lowercase() != self.demo_email {
            return Err(AuthError::InvalidCredentials);
        }
        let parsed = PasswordHash::new(&self.demo_hash).map_err(|e| AuthError::Signing(e.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)
    }

    fn sign(&self, secret: &str, sub: &str, name: Option<&str>, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            name: name.map(String::from),
            iat: now.timestamp() as usize,
            exp: (now + ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn sign_access(&self, sub: &str, name: Option<&str>) -> Result<String, AuthError> {
        self.sign(&self.access_secret, sub, name, Duration::minutes(ACCESS_TOKEN_TTL_MIN))
    }

    pub fn sign_refresh(&self, sub: &str) -> Result<String, AuthError> {
        self.sign(&self.refresh_secret, sub, None, Duration::days(REFRESH_TOKEN_TTL_DAYS))
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &DecodingKey::from_secret(self.access_secret.as_bytes()), &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &DecodingKey::from_secret(self.refresh_secret.as_bytes()), &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidRefresh)
    }
}
