//! SeaORM entities mapping the `users` and `ideas` tables.

pub mod idea;
pub mod user;

pub mod prelude {
    pub use super::user::Entity as User;
    pub use super::user::Model as UserModel;
    pub use super::user::ActiveModel as UserActiveModel;
    pub use super::user::Column as UserColumn;

    pub use super::idea::Entity as Idea;
    pub use super::idea::Model as IdeaModel;
    pub use super::idea::ActiveModel as IdeaActiveModel;
    pub use super::idea::Column as IdeaColumn;
}
