//! Submitted forms and their validation rules. Errors are collected per field
//! so they can be shown next to the offending input.

use axum::extract::Multipart;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::entities::idea;
use crate::db::enums::IdeaStatus;
use crate::db::services::IdeaFields;
use crate::services::image_service::ImageManager;
use crate::web::error::AppError;

pub const REQUIRED: &str = "Este campo es obligatorio.";
pub const USERNAME_LENGTH: &str = "El usuario debe tener entre 4 y 25 caracteres.";
pub const PASSWORD_MISMATCH: &str = "Las contraseñas no coinciden.";
pub const USERNAME_TAKEN: &str = "Este nombre de usuario ya está en uso. Por favor, elige otro.";
pub const PASSWORD_TOO_LONG: &str = "La contraseña no puede superar los 71 bytes.";
pub const INVALID_STATUS: &str = "Estado no válido.";
pub const IMAGES_ONLY: &str = "Solo se permiten imágenes (JPG, PNG, JPEG)!";

/// bcrypt reads at most 72 bytes including its terminating NUL.
pub const PASSWORD_MAX_BYTES: usize = 71;

fn too_long(max: usize) -> String {
    format!("No puede superar los {max} caracteres.")
}

/// Field name to messages. Every field of the form is present, possibly with
/// no messages, so templates can index it unconditionally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn for_fields(fields: &[&'static str]) -> Self {
        Self(fields.iter().map(|f| (*f, Vec::new())).collect())
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl LoginForm {
    pub const FIELDS: [&'static str; 2] = ["username", "password"];

    /// Strips surrounding whitespace from the username.
    pub fn trimmed(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::for_fields(&Self::FIELDS);
        if is_blank(&self.username) {
            errors.add("username", REQUIRED);
        }
        if is_blank(&self.password) {
            errors.add("password", REQUIRED);
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub password2: String,
}

impl RegisterForm {
    pub const FIELDS: [&'static str; 3] = ["username", "password", "password2"];

    /// Strips surrounding whitespace from the username. The trimmed name is
    /// the one checked for uniqueness and stored.
    pub fn trimmed(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self
    }

    /// Checks that need no database access. Username uniqueness is verified
    /// separately by the handler.
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::for_fields(&Self::FIELDS);

        if is_blank(&self.username) {
            errors.add("username", REQUIRED);
        } else if !(4..=25).contains(&self.username.chars().count()) {
            errors.add("username", USERNAME_LENGTH);
        }

        if is_blank(&self.password) {
            errors.add("password", REQUIRED);
        } else if self.password.len() > PASSWORD_MAX_BYTES {
            errors.add("password", PASSWORD_TOO_LONG);
        }

        if is_blank(&self.password2) {
            errors.add("password2", REQUIRED);
        } else if self.password2 != self.password {
            errors.add("password2", PASSWORD_MISMATCH);
        }

        errors
    }
}

/// A file received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IdeaForm {
    pub title: String,
    pub description: String,
    pub format: String,
    pub tags: String,
    pub status: String,
    #[serde(skip)]
    pub image: Option<UploadedFile>,
}

impl IdeaForm {
    pub const FIELDS: [&'static str; 6] = ["title", "description", "format", "tags", "status", "image"];

    /// Blank form for the add page.
    pub fn empty() -> Self {
        Self {
            status: IdeaStatus::default().label().to_string(),
            ..Default::default()
        }
    }

    pub fn from_model(idea: &idea::Model) -> Self {
        Self {
            title: idea.title.clone(),
            description: idea.description.clone(),
            format: idea.format.clone(),
            tags: idea.tags.clone(),
            status: idea.status.label().to_string(),
            image: None,
        }
    }

    /// Reads the form out of a `multipart/form-data` body. A file input left
    /// empty by the browser yields `image: None`.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = IdeaForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if name == "image" {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await?;
                if !filename.is_empty() && !bytes.is_empty() {
                    form.image = Some(UploadedFile {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field.text().await?;
            match name.as_str() {
                "title" => form.title = value,
                "description" => form.description = value,
                "format" => form.format = value,
                "tags" => form.tags = value,
                "status" => form.status = value,
                _ => {}
            }
        }

        Ok(form)
    }

    /// Validates every field, including the image extension, and returns the
    /// columns to store.
    pub fn validate(&self) -> Result<IdeaFields, FormErrors> {
        let mut errors = FormErrors::for_fields(&Self::FIELDS);

        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("format", &self.format),
        ] {
            if is_blank(value) {
                errors.add(field, REQUIRED);
            }
        }

        // column widths of the ideas table
        for (field, value, max) in [("title", &self.title, 120), ("format", &self.format, 50), ("tags", &self.tags, 200)] {
            if value.trim().chars().count() > max {
                errors.add(field, too_long(max));
            }
        }

        let status = self.status.parse::<IdeaStatus>();
        if status.is_err() {
            errors.add("status", INVALID_STATUS);
        }

        if let Some(image) = &self.image {
            if ImageManager::allowed_extension(&image.filename).is_none() {
                errors.add("image", IMAGES_ONLY);
            }
        }

        match status {
            Ok(status) if errors.is_empty() => Ok(IdeaFields {
                title: self.title.trim().to_string(),
                description: self.description.trim().to_string(),
                format: self.format.trim().to_string(),
                tags: self.tags.trim().to_string(),
                status,
            }),
            _ => Err(errors),
        }
    }
}
