use axum::{
    extract::{Extension, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use tracing::info;

use crate::db::services::{UserService, UserServiceError};
use crate::services::auth_service;
use crate::web::middleware::auth::SESSION_COOKIE;
use crate::web::models::forms::{FormErrors, LoginForm, RegisterForm, USERNAME_TAKEN};
use crate::web::models::AuthenticatedUser;
use crate::web::templates::Page;
use crate::web::{flash, AppError, AppState};

/// Routes that are reachable without a session.
pub fn create_auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/register", get(register_page).post(register_submit))
        .route("/logout", get(logout))
}

fn session_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn render_login(
    app_state: &AppState,
    jar: CookieJar,
    form: &LoginForm,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let (jar, flashes) = flash::take(jar);
    let html = Page::new(None, flashes)
        .with("form", form)
        .with("errors", errors)
        .render(&app_state.templates, "login.html")?;
    Ok((jar, html).into_response())
}

fn render_register(
    app_state: &AppState,
    jar: CookieJar,
    form: &RegisterForm,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let (jar, flashes) = flash::take(jar);
    let html = Page::new(None, flashes)
        .with("form", form)
        .with("errors", errors)
        .render(&app_state.templates, "register.html")?;
    Ok((jar, html).into_response())
}

async fn login_page(
    State(app_state): State<Arc<AppState>>,
    user: Option<Extension<AuthenticatedUser>>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    render_login(
        &app_state,
        jar,
        &LoginForm::default(),
        &FormErrors::for_fields(&LoginForm::FIELDS),
    )
}

async fn login_submit(
    State(app_state): State<Arc<AppState>>,
    user: Option<Extension<AuthenticatedUser>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let form = form.trimmed();
    let errors = form.validate();
    if !errors.is_empty() {
        return render_login(&app_state, jar, &form, &errors);
    }

    let Some(user) = UserService::authenticate(&app_state.db_pool, &form.username, &form.password).await? else {
        info!(username = %form.username, "Rejected login attempt.");
        let jar = flash::push(jar, "danger", "Usuario o contraseña incorrectos.");
        return Ok((jar, Redirect::to("/login")).into_response());
    };

    let token = auth_service::create_session_token(&user, &app_state.config.secret_key)?;
    info!(user_id = user.id, "User logged in.");

    let jar = jar.add(session_cookie(token));
    let jar = flash::push(jar, "success", "¡Sesión iniciada con éxito!");
    Ok((jar, Redirect::to("/")).into_response())
}

async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(session_cookie(String::new()));
    (jar, Redirect::to("/"))
}

async fn register_page(
    State(app_state): State<Arc<AppState>>,
    user: Option<Extension<AuthenticatedUser>>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    render_register(
        &app_state,
        jar,
        &RegisterForm::default(),
        &FormErrors::for_fields(&RegisterForm::FIELDS),
    )
}

async fn register_submit(
    State(app_state): State<Arc<AppState>>,
    user: Option<Extension<AuthenticatedUser>>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let form = form.trimmed();
    let mut errors = form.validate();
    if errors.get("username").is_empty()
        && UserService::username_exists(&app_state.db_pool, &form.username).await?
    {
        errors.add("username", USERNAME_TAKEN);
    }
    if !errors.is_empty() {
        return render_register(&app_state, jar, &form, &errors);
    }

    let user = match UserService::register(
        &app_state.db_pool,
        &form.username,
        &form.password,
        app_state.config.bcrypt_cost,
    )
    .await
    {
        Ok(user) => user,
        Err(UserServiceError::UsernameTaken(_)) => {
            errors.add("username", USERNAME_TAKEN);
            return render_register(&app_state, jar, &form, &errors);
        }
        Err(e) => return Err(e.into()),
    };
    info!(user_id = user.id, username = %user.username, "Registered new user.");

    let jar = flash::push(
        jar,
        "success",
        "¡Te has registrado con éxito! Ahora puedes iniciar sesión.",
    );
    Ok((jar, Redirect::to("/login")).into_response())
}
