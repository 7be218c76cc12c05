//! Shared domain types and errors for the DevSpace backend.

pub mod error;
pub mod types;
pub mod validation;
