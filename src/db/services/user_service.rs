use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, QueryFilter, Set};

use crate::db::entities::{prelude::User, user};

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Username '{0}' is already in use")]
    UsernameTaken(String),
    #[error("User not found: {0}")]
    NotFound(String),
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
}

pub struct UserService;

impl UserService {
    pub async fn find_by_id(db: &DbConn, user_id: i32) -> Result<Option<user::Model>, UserServiceError> {
        Ok(User::find_by_id(user_id).one(db).await?)
    }

    pub async fn find_by_username(
        db: &DbConn,
        username: &str,
    ) -> Result<Option<user::Model>, UserServiceError> {
        Ok(User::find()
            .filter(user::Column::Username.eq(username))
            .one(db)
            .await?)
    }

    pub async fn username_exists(db: &DbConn, username: &str) -> Result<bool, UserServiceError> {
        Ok(Self::find_by_username(db, username).await?.is_some())
    }

    /// Hashes `password` with the given bcrypt `cost` and inserts a new non-admin user.
    /// Passwords bcrypt would truncate are refused rather than shortened.
    pub async fn register(
        db: &DbConn,
        username: &str,
        password: &str,
        cost: u32,
    ) -> Result<user::Model, UserServiceError> {
        if Self::username_exists(db, username).await? {
            return Err(UserServiceError::UsernameTaken(username.to_string()));
        }

        let password_hash = bcrypt::non_truncating_hash(password, cost)?;
        let new_user = user::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            is_admin: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        new_user.insert(db).await.map_err(|e| {
            // a concurrent registration can slip past the lookup above
            if is_unique_violation(&e) {
                UserServiceError::UsernameTaken(username.to_string())
            } else {
                UserServiceError::DbErr(e)
            }
        })
    }

    /// Returns the user when `password` matches the stored hash.
    pub async fn authenticate(
        db: &DbConn,
        username: &str,
        password: &str,
    ) -> Result<Option<user::Model>, UserServiceError> {
        let Some(user) = Self::find_by_username(db, username).await? else {
            return Ok(None);
        };
        match bcrypt::non_truncating_verify(password, &user.password_hash) {
            Ok(true) => Ok(Some(user)),
            // too long to have been registered
            Ok(false) | Err(bcrypt::BcryptError::Truncation(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn set_admin(
        db: &DbConn,
        username: &str,
        is_admin: bool,
    ) -> Result<user::Model, UserServiceError> {
        let user = Self::find_by_username(db, username)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(username.to_string()))?;

        let mut active_user: user::ActiveModel = user.into();
        active_user.is_admin = Set(is_admin);
        Ok(active_user.update(db).await?)
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    match err {
        DbErr::Exec(sea_orm::RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))
        | DbErr::Query(sea_orm::RuntimeErr::SqlxError(sqlx::Error::Database(db_err))) => {
            db_err.is_unique_violation()
        }
        _ => false,
    }
}
