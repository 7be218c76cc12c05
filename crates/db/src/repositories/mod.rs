//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&DbPool` as the first argument.

pub mod code_repository_repo;
pub mod file_repo;
pub mod session_repo;
pub mod user_repo;

pub use code_repository_repo::CodeRepositoryRepo;
pub use file_repo::FileRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
