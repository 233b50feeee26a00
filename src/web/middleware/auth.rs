use axum::{
    body::Body as AxumBody,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::warn;

use crate::db::services::UserService;
use crate::services::auth_service;
use crate::web::models::AuthenticatedUser;
use crate::web::{flash, AppState, error::AppError};

pub const SESSION_COOKIE: &str = "token";

pub const LOGIN_REQUIRED: &str = "Por favor, inicia sesión para acceder a esta página.";

/// Resolves the session cookie to a user. The row is reloaded so a changed
/// admin flag or a vanished account takes effect immediately.
pub async fn current_user(state: &AppState, jar: &CookieJar) -> Result<Option<AuthenticatedUser>, AppError> {
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return Ok(None);
    };

    let Some(claims) = auth_service::verify_session_token(&token, &state.config.secret_key) else {
        return Ok(None);
    };

    let user = UserService::find_by_id(&state.db_pool, claims.user_id).await?;
    if user.is_none() {
        warn!(user_id = claims.user_id, "Session refers to a user that no longer exists.");
    }
    Ok(user.map(AuthenticatedUser::from))
}

/// Requires a logged-in user; anonymous requests are sent to `/login`.
pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    match current_user(&state, &jar).await? {
        Some(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        None => {
            let jar = flash::push(jar, "info", LOGIN_REQUIRED);
            Ok((jar, Redirect::to("/login")).into_response())
        }
    }
}

/// Attaches the user when there is a valid session and lets anonymous
/// requests through untouched.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(user) = current_user(&state, &jar).await? {
        req.extensions_mut().insert(user);
    }
    Ok(next.run(req).await)
}
