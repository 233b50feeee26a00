use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::db::services::{IdeaServiceError, UserServiceError};
use crate::services::image_service::ImageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Password hashing failed: {0}")]
    PasswordHashingError(String),
    #[error("JWT creation failed: {0}")]
    TokenCreationError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Image storage error: {0}")]
    ImageStorageError(String),
    #[error("Template error: {0}")]
    TemplateError(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::PayloadTooLarge(_) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "El archivo enviado es demasiado grande.".to_string(),
            ),
            AppError::PasswordHashingError(_)
            | AppError::TokenCreationError(_)
            | AppError::DatabaseError(_)
            | AppError::ImageStorageError(_)
            | AppError::TemplateError(_) => {
                error!(error = %self, "Request failed.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Se produjo un error interno.".to_string(),
                )
            }
        };

        let body = format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"><title>{code}</title></head>\
             <body><h1>{code}</h1><p>{message}</p><p><a href=\"/\">Volver al inicio</a></p></body></html>",
            code = status.as_u16(),
            message = tera::escape_html(&message),
        );
        (status, Html(body)).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        // the source chain carries the useful part of a render failure
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        AppError::TemplateError(message)
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::InvalidInput(err.body_text())
        }
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            UserServiceError::Hashing(e) => AppError::PasswordHashingError(e.to_string()),
            UserServiceError::NotFound(name) => AppError::NotFound(format!("User '{name}' not found")),
            UserServiceError::UsernameTaken(name) => {
                AppError::InvalidInput(format!("Username '{name}' is already in use"))
            }
        }
    }
}

impl From<IdeaServiceError> for AppError {
    fn from(err: IdeaServiceError) -> Self {
        match err {
            IdeaServiceError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            IdeaServiceError::NotFound(id) => AppError::NotFound(format!("Idea {id} not found")),
        }
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::DisallowedExtension | ImageError::Processing(_) => {
                AppError::InvalidInput(err.to_string())
            }
            ImageError::InvalidFilename(name) => AppError::NotFound(format!("Image '{name}' not found")),
            ImageError::Io(_) | ImageError::Task(_) => AppError::ImageStorageError(err.to_string()),
        }
    }
}
