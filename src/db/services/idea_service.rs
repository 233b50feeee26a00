use chrono::Utc;
use sea_orm::{
    sea_query::{BinOper, Expr, Func, SimpleExpr},
    ActiveModelTrait, ColumnTrait, Condition, DbConn, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;

use crate::db::entities::{idea, prelude::Idea};
use crate::db::enums::IdeaStatus;

#[derive(Debug, thiserror::Error)]
pub enum IdeaServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Idea not found: {0}")]
    NotFound(i32),
}

/// Editable columns of an idea, as submitted through the idea form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdeaFields {
    pub title: String,
    pub description: String,
    pub format: String,
    pub tags: String,
    pub status: IdeaStatus,
}

/// Selection applied by [`IdeaService::list`].
#[derive(Debug, Clone, Default)]
pub struct IdeaFilter {
    /// `None` selects every user's ideas.
    pub owner: Option<i32>,
    pub search: Option<String>,
    pub status: Option<IdeaStatus>,
}

impl IdeaFilter {
    pub fn owned_by(user_id: i32) -> Self {
        Self {
            owner: Some(user_id),
            ..Default::default()
        }
    }

    fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: u64,
    pub pendiente: u64,
    pub en_progreso: u64,
    pub completada: u64,
}

pub struct IdeaService;

impl IdeaService {
    pub async fn create(
        db: &DbConn,
        user_id: i32,
        fields: IdeaFields,
        image_filename: Option<String>,
    ) -> Result<idea::Model, IdeaServiceError> {
        let now = Utc::now();
        let new_idea = idea::ActiveModel {
            title: Set(fields.title),
            description: Set(fields.description),
            format: Set(fields.format),
            tags: Set(fields.tags),
            status: Set(fields.status),
            image_filename: Set(image_filename),
            user_id: Set(user_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(new_idea.insert(db).await?)
    }

    pub async fn find(db: &DbConn, idea_id: i32) -> Result<Option<idea::Model>, IdeaServiceError> {
        Ok(Idea::find_by_id(idea_id).one(db).await?)
    }

    /// Overwrites the editable fields. `new_image` replaces the stored filename
    /// when present and leaves it untouched otherwise.
    pub async fn update(
        db: &DbConn,
        idea_id: i32,
        fields: IdeaFields,
        new_image: Option<String>,
    ) -> Result<idea::Model, IdeaServiceError> {
        let idea = Idea::find_by_id(idea_id)
            .one(db)
            .await?
            .ok_or(IdeaServiceError::NotFound(idea_id))?;

        let mut active_idea: idea::ActiveModel = idea.into();
        active_idea.title = Set(fields.title);
        active_idea.description = Set(fields.description);
        active_idea.format = Set(fields.format);
        active_idea.tags = Set(fields.tags);
        active_idea.status = Set(fields.status);
        if let Some(filename) = new_image {
            active_idea.image_filename = Set(Some(filename));
        }
        active_idea.updated_at = Set(Utc::now());

        Ok(active_idea.update(db).await?)
    }

    /// Removes the row and hands back the deleted model so the caller can
    /// clean up its image.
    pub async fn delete(db: &DbConn, idea_id: i32) -> Result<idea::Model, IdeaServiceError> {
        let idea = Idea::find_by_id(idea_id)
            .one(db)
            .await?
            .ok_or(IdeaServiceError::NotFound(idea_id))?;

        idea.clone().delete(db).await?;
        Ok(idea)
    }

    /// Ideas matching `filter`, in insertion order.
    ///
    /// The search term is matched case-insensitively as a substring of the
    /// title, description or tags; the status filter is an exact match.
    pub async fn list(db: &DbConn, filter: &IdeaFilter) -> Result<Vec<idea::Model>, IdeaServiceError> {
        let mut query = Idea::find().order_by_asc(idea::Column::Id);

        if let Some(owner) = filter.owner {
            query = query.filter(idea::Column::UserId.eq(owner));
        }

        if let Some(term) = filter.search_term() {
            let pattern = format!("%{}%", escape_like(term));
            query = query.filter(
                Condition::any()
                    .add(lower_like(idea::Column::Title, &pattern))
                    .add(lower_like(idea::Column::Description, &pattern))
                    .add(lower_like(idea::Column::Tags, &pattern)),
            );
        }

        if let Some(status) = filter.status {
            query = query.filter(idea::Column::Status.eq(status));
        }

        Ok(query.all(db).await?)
    }

    pub async fn count_by_status(db: &DbConn, owner: Option<i32>) -> Result<StatusCounts, IdeaServiceError> {
        let base = || {
            let query = Idea::find();
            match owner {
                Some(user_id) => query.filter(idea::Column::UserId.eq(user_id)),
                None => query,
            }
        };

        Ok(StatusCounts {
            total: base().count(db).await?,
            pendiente: base()
                .filter(idea::Column::Status.eq(IdeaStatus::Pending))
                .count(db)
                .await?,
            en_progreso: base()
                .filter(idea::Column::Status.eq(IdeaStatus::InProgress))
                .count(db)
                .await?,
            completada: base()
                .filter(idea::Column::Status.eq(IdeaStatus::Completed))
                .count(db)
                .await?,
        })
    }
}

/// `LOWER(column) LIKE LOWER(pattern) ESCAPE '\'`. Both sides are folded by
/// the same database function so non-ASCII letters compare consistently.
fn lower_like(column: idea::Column, pattern: &str) -> SimpleExpr {
    let folded_pattern = Expr::expr(Func::lower(Expr::val(pattern.to_owned())))
        .binary(BinOper::Escape, SimpleExpr::Constant('\\'.into()));
    Expr::expr(Func::lower(Expr::col((idea::Entity, column)))).binary(BinOper::Like, folded_pattern)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
