use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use crate::db::entities::user;
use crate::web::error::AppError;
use crate::web::models::Claims;

/// Lifetime of a login session.
pub const SESSION_HOURS: i64 = 24;

/// Signs a session token for `user`.
pub fn create_session_token(user: &user::Model, secret: &str) -> Result<String, AppError> {
    let expiration = (Utc::now() + Duration::hours(SESSION_HOURS)).timestamp() as usize;

    let claims = Claims {
        sub: user.username.clone(),
        user_id: user.id,
        exp: expiration,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
        .map_err(|e| AppError::TokenCreationError(e.to_string()))
}

/// Claims of a valid, unexpired token; `None` for anything else.
pub fn verify_session_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_ref()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| debug!(error = ?e, "Rejected session token."))
        .ok()
}
