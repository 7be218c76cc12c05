//! Row structs and DTOs.
//!
//! Each submodule contains:
//! - The `FromRow` entity struct (list-valued fields are JSON columns)
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches
//!
//! JSON field names are camelCase to match the web client.

pub mod code_repository;
pub mod file;
pub mod session;
pub mod user;
