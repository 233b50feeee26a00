use axum::response::Html;
use rust_embed::RustEmbed;
use serde::Serialize;
use tera::{Context, Tera};

use crate::web::error::AppError;
use crate::web::flash::FlashMessage;
use crate::web::models::AuthenticatedUser;

#[derive(RustEmbed)]
#[folder = "templates/"]
struct TemplateAssets;

/// Builds the Tera instance from the embedded `templates/` directory.
pub fn load_templates() -> Result<Tera, tera::Error> {
    let mut sources = Vec::new();
    for name in TemplateAssets::iter() {
        let Some(file) = TemplateAssets::get(&name) else {
            continue;
        };
        let body = String::from_utf8(file.data.into_owned())
            .map_err(|e| tera::Error::msg(format!("template {name} is not UTF-8: {e}")))?;
        sources.push((name.to_string(), body));
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(sources)?;
    Ok(tera)
}

/// Context shared by every page: the current user and pending notices.
pub struct Page {
    context: Context,
}

impl Page {
    pub fn new(current_user: Option<&AuthenticatedUser>, flashes: Vec<FlashMessage>) -> Self {
        let mut context = Context::new();
        context.insert("current_user", &current_user);
        context.insert("flashes", &flashes);
        Self { context }
    }

    pub fn with(mut self, key: &str, value: &impl Serialize) -> Self {
        self.context.insert(key, value);
        self
    }

    pub fn render(self, tera: &Tera, template: &str) -> Result<Html<String>, AppError> {
        Ok(Html(tera.render(template, &self.context)?))
    }
}
