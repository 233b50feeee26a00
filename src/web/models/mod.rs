use serde::{Deserialize, Serialize};

use crate::db::entities::{idea, user};

pub mod forms;

// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub user_id: i32,
    pub exp: usize,
}

/// The logged-in user, loaded fresh on every request and passed as a request extension.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub username: String,
    pub is_admin: bool,
}

impl AuthenticatedUser {
    /// Owners and admins may edit or delete an idea.
    pub fn can_modify(&self, idea: &idea::Model) -> bool {
        self.is_admin || idea.is_owned_by(self.id)
    }
}

impl From<user::Model> for AuthenticatedUser {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
        }
    }
}

/// An idea as shown in the listing.
#[derive(Debug, Serialize)]
pub struct IdeaView {
    #[serde(flatten)]
    pub idea: idea::Model,
    pub tag_list: Vec<String>,
    /// Set only when the stored file is actually present.
    pub image_url: Option<String>,
    pub can_modify: bool,
}
