//! Credential checks. Runs once per websocket handshake and once per HTTP
//! request, never per socket event.

use std::{fmt, str::FromStr};

use axum::{
    extract::{FromRequestParts, Query},
    http::{HeaderMap, header, request::Parts},
};
use cookie::Cookie;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    AppError, AppState,
    db::{self, User},
    error::AuthError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// `Authorization: Bearer <token>`, or `?token=` on the handshake.
    #[default]
    Bearer,
    /// Token in a cookie.
    Cookie,
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bearer" => Ok(AuthMode::Bearer),
            "cookie" => Ok(AuthMode::Cookie),
            other => Err(format!("unknown auth mode {other:?}, expected bearer or cookie")),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthMode::Bearer => f.write_str("bearer"),
            AuthMode::Cookie => f.write_str("cookie"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: Option<String>,
    pub jti: Option<String>,
    pub exp: u64,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

pub struct Verifier {
    mode: AuthMode,
    cookie_name: String,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Verifier {
    pub fn new(secret: &str, mode: AuthMode, cookie_name: impl Into<String>) -> Verifier {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Verifier {
            mode,
            cookie_name: cookie_name.into(),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Pulls the raw token out of the request for the configured mode.
    pub fn credential(&self, headers: &HeaderMap, query_token: Option<&str>) -> Result<String, AuthError> {
        let token = match self.mode {
            AuthMode::Bearer => query_token
                .filter(|t| !t.trim().is_empty())
                .map(str::to_owned)
                .or_else(|| {
                    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
                    value.strip_prefix("Bearer ").map(str::to_owned)
                }),
            AuthMode::Cookie => headers
                .get_all(header::COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .flat_map(Cookie::split_parse)
                .filter_map(Result::ok)
                .find(|cookie| cookie.name() == self.cookie_name)
                .map(|cookie| cookie.value().to_owned()),
        };

        token
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)
    }

    /// Checks signature and expiry and returns the user id the token names.
    pub fn decode(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed,
            })?
            .claims;

        let (Some(id), Some(_jti)) = (claims.id, claims.jti) else {
            return Err(AuthError::Malformed);
        };
        Uuid::parse_str(&id).map_err(|_| AuthError::Malformed)
    }

    pub async fn verify(
        &self,
        db_pool: &SqlitePool,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<User, AuthError> {
        let user_id = self.decode(&self.credential(headers, query_token)?)?;
        let user = db::users::find_by_id(db_pool, user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;
        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }
        Ok(user)
    }
}

/// Signs a token the verifier accepts. Issuing belongs to the account
/// service; this serves seeding and tests.
pub fn issue(secret: &str, user_id: Uuid, ttl: time::Duration) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (time::OffsetDateTime::now_utc() + ttl).unix_timestamp().max(0) as u64;
    let claims = Claims {
        id: Some(user_id.to_string()),
        jti: Some(Uuid::now_v7().to_string()),
        exp,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// The authenticated caller of an HTTP route.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.token);
        let user = state
            .verifier
            .verify(&state.db_pool, &parts.headers, token.as_deref())
            .await?;
        Ok(CurrentUser(user))
    }
}
