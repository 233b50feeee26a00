use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::entities::idea;
use crate::db::enums::IdeaStatus;
use crate::db::services::{IdeaFilter, IdeaService, StatusCounts};
use crate::services::image_service::{ImageError, ImageManager};
use crate::web::models::forms::{FormErrors, IdeaForm, UploadedFile};
use crate::web::models::{AuthenticatedUser, IdeaView};
use crate::web::templates::Page;
use crate::web::{flash, AppError, AppState};

/// `/` renders for anonymous visitors too.
pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add", get(add_idea_page).post(add_idea_submit))
        .route("/edit/{idea_id}", get(edit_idea_page).post(edit_idea_submit))
        .route("/delete/{idea_id}", get(delete_idea))
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    /// `all` lets an admin list every user's ideas.
    pub scope: Option<String>,
}

fn status_labels() -> Vec<&'static str> {
    IdeaStatus::ALL.iter().map(IdeaStatus::label).collect()
}

fn image_url(filename: &str) -> String {
    format!("/uploads/{}", urlencoding::encode(filename))
}

/// Public URL of the idea's image, if it has one and the file is still there.
async fn available_image(images: &ImageManager, idea: &idea::Model) -> Option<String> {
    let filename = idea.image_filename.as_deref()?;
    if images.exists(filename).await {
        Some(image_url(filename))
    } else {
        warn!(idea_id = idea.id, %filename, "Idea references a missing image file.");
        None
    }
}

async fn index(
    State(app_state): State<Arc<AppState>>,
    user: Option<Extension<AuthenticatedUser>>,
    jar: CookieJar,
    Query(query): Query<IndexQuery>,
) -> Result<Response, AppError> {
    let (jar, flashes) = flash::take(jar);

    let Some(Extension(user)) = user else {
        let html = Page::new(None, flashes)
            .with("ideas", &Vec::<IdeaView>::new())
            .with("counts", &None::<StatusCounts>)
            .with("search_query", &None::<String>)
            .with("status_filter", &None::<String>)
            .with("statuses", &status_labels())
            .with("show_all", &false)
            .render(&app_state.templates, "index.html")?;
        return Ok((jar, html).into_response());
    };

    let show_all = user.is_admin && query.scope.as_deref() == Some("all");
    let owner = (!show_all).then_some(user.id);
    let search = query.search.filter(|s| !s.trim().is_empty());
    let status_filter = query.status.filter(|s| !s.is_empty());

    let ideas = match status_filter.as_deref().map(str::parse::<IdeaStatus>).transpose() {
        Ok(status) => {
            let filter = IdeaFilter {
                owner,
                search: search.clone(),
                status,
            };
            IdeaService::list(&app_state.db_pool, &filter).await?
        }
        // no stored idea can carry an unknown status
        Err(()) => Vec::new(),
    };

    let mut views = Vec::with_capacity(ideas.len());
    for idea in ideas {
        let image_url = available_image(&app_state.images, &idea).await;
        views.push(IdeaView {
            tag_list: idea.tag_list().into_iter().map(str::to_owned).collect(),
            can_modify: user.can_modify(&idea),
            image_url,
            idea,
        });
    }

    let counts = IdeaService::count_by_status(&app_state.db_pool, owner).await?;

    let html = Page::new(Some(&user), flashes)
        .with("ideas", &views)
        .with("counts", &Some(counts))
        .with("search_query", &search)
        .with("status_filter", &status_filter)
        .with("statuses", &status_labels())
        .with("show_all", &show_all)
        .render(&app_state.templates, "index.html")?;
    Ok((jar, html).into_response())
}

fn render_add(
    app_state: &AppState,
    jar: CookieJar,
    user: &AuthenticatedUser,
    form: &IdeaForm,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let (jar, flashes) = flash::take(jar);
    let html = Page::new(Some(user), flashes)
        .with("form", form)
        .with("errors", errors)
        .with("statuses", &status_labels())
        .with("action", &"/add")
        .render(&app_state.templates, "add_idea.html")?;
    Ok((jar, html).into_response())
}

async fn render_edit(
    app_state: &AppState,
    jar: CookieJar,
    user: &AuthenticatedUser,
    idea: &idea::Model,
    form: &IdeaForm,
    errors: &FormErrors,
) -> Result<Response, AppError> {
    let (jar, flashes) = flash::take(jar);
    let image_url = available_image(&app_state.images, idea).await;
    let html = Page::new(Some(user), flashes)
        .with("form", form)
        .with("errors", errors)
        .with("statuses", &status_labels())
        .with("action", &format!("/edit/{}", idea.id))
        .with("idea", idea)
        .with("image_url", &image_url)
        .render(&app_state.templates, "edit_idea.html")?;
    Ok((jar, html).into_response())
}

/// Stores the uploaded image, if there is one.
async fn save_upload(images: &ImageManager, upload: Option<UploadedFile>) -> Result<Option<String>, ImageError> {
    match upload {
        Some(file) => images.save(&file.filename, file.bytes).await.map(Some),
        None => Ok(None),
    }
}

/// Turns an upload failure the user can fix into form errors; anything else
/// is a server error.
fn upload_errors(err: ImageError) -> Result<FormErrors, AppError> {
    match err {
        ImageError::DisallowedExtension | ImageError::Processing(_) => {
            let mut errors = FormErrors::for_fields(&IdeaForm::FIELDS);
            errors.add("image", err.to_string());
            Ok(errors)
        }
        other => Err(other.into()),
    }
}

/// Best-effort removal of a stored image. Failures only leave an orphaned file.
async fn discard_image(images: &ImageManager, filename: Option<&str>) {
    if let Some(filename) = filename {
        if let Err(e) = images.delete(filename).await {
            warn!(%filename, error = %e, "Failed to remove image file.");
        }
    }
}

/// Loads the idea for an edit or delete. `None` means the requester may not touch it.
async fn find_for_change(
    app_state: &AppState,
    user: &AuthenticatedUser,
    idea_id: i32,
) -> Result<Option<idea::Model>, AppError> {
    let idea = IdeaService::find(&app_state.db_pool, idea_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Idea {idea_id} not found")))?;

    if user.can_modify(&idea) {
        Ok(Some(idea))
    } else {
        warn!(idea_id, user_id = user.id, "Refused change to another user's idea.");
        Ok(None)
    }
}

fn deny(jar: CookieJar, message: &str) -> Response {
    let jar = flash::push(jar, "danger", message);
    (jar, Redirect::to("/")).into_response()
}

async fn add_idea_page(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    render_add(
        &app_state,
        jar,
        &user,
        &IdeaForm::empty(),
        &FormErrors::for_fields(&IdeaForm::FIELDS),
    )
}

async fn add_idea_submit(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = IdeaForm::from_multipart(multipart).await?;
    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => return render_add(&app_state, jar, &user, &form, &errors),
    };

    let new_image = match save_upload(&app_state.images, form.image.take()).await {
        Ok(name) => name,
        Err(e) => return render_add(&app_state, jar, &user, &form, &upload_errors(e)?),
    };

    let idea = match IdeaService::create(&app_state.db_pool, user.id, fields, new_image.clone()).await {
        Ok(idea) => idea,
        Err(e) => {
            discard_image(&app_state.images, new_image.as_deref()).await;
            return Err(e.into());
        }
    };
    info!(idea_id = idea.id, user_id = user.id, "Idea created.");

    let jar = flash::push(jar, "success", "¡Idea agregada con éxito!");
    Ok((jar, Redirect::to("/")).into_response())
}

async fn edit_idea_page(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: CookieJar,
    Path(idea_id): Path<i32>,
) -> Result<Response, AppError> {
    let Some(idea) = find_for_change(&app_state, &user, idea_id).await? else {
        return Ok(deny(jar, "No tienes permiso para editar esta idea."));
    };

    render_edit(
        &app_state,
        jar,
        &user,
        &idea,
        &IdeaForm::from_model(&idea),
        &FormErrors::for_fields(&IdeaForm::FIELDS),
    )
    .await
}

async fn edit_idea_submit(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: CookieJar,
    Path(idea_id): Path<i32>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let Some(idea) = find_for_change(&app_state, &user, idea_id).await? else {
        return Ok(deny(jar, "No tienes permiso para editar esta idea."));
    };

    let mut form = IdeaForm::from_multipart(multipart).await?;
    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => return render_edit(&app_state, jar, &user, &idea, &form, &errors).await,
    };

    // The replacement is written before the record changes and the old file
    // is removed only after the record points away from it.
    let new_image = match save_upload(&app_state.images, form.image.take()).await {
        Ok(name) => name,
        Err(e) => {
            let errors = upload_errors(e)?;
            return render_edit(&app_state, jar, &user, &idea, &form, &errors).await;
        }
    };

    if let Err(e) = IdeaService::update(&app_state.db_pool, idea.id, fields, new_image.clone()).await {
        discard_image(&app_state.images, new_image.as_deref()).await;
        return Err(e.into());
    }
    if new_image.is_some() {
        discard_image(&app_state.images, idea.image_filename.as_deref()).await;
    }
    info!(idea_id = idea.id, user_id = user.id, "Idea updated.");

    let jar = flash::push(jar, "success", "¡Idea actualizada con éxito!");
    Ok((jar, Redirect::to("/")).into_response())
}

async fn delete_idea(
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: CookieJar,
    Path(idea_id): Path<i32>,
) -> Result<Response, AppError> {
    let Some(idea) = find_for_change(&app_state, &user, idea_id).await? else {
        return Ok(deny(jar, "No tienes permiso para eliminar esta idea."));
    };

    // Record first, file second: a crash in between leaves an orphaned file
    // rather than a record pointing at nothing.
    let deleted = IdeaService::delete(&app_state.db_pool, idea.id).await?;
    discard_image(&app_state.images, deleted.image_filename.as_deref()).await;
    info!(idea_id = deleted.id, user_id = user.id, "Idea deleted.");

    let jar = flash::push(jar, "success", "¡Idea eliminada con éxito!");
    Ok((jar, Redirect::to("/")).into_response())
}
