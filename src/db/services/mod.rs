//! Data access for users and ideas. Handlers go through these services rather
//! than touching the entities directly.

pub mod idea_service;
pub mod user_service;

pub use idea_service::*;
pub use user_service::*;
