//! Request handlers, one module per resource.

pub mod auth;
pub mod files;
pub mod repositories;
pub mod users;
