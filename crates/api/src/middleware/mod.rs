//! Request extractors.
//!
//! - [`auth::AuthUser`] -- the signed-in user, from a Bearer token bound
//!   to an active session.

pub mod auth;
