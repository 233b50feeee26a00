pub mod auth_routes;
pub mod idea_routes;
