//! Login session document model.

use devspace_core::types::{DocId, Timestamp};
use sqlx::FromRow;

/// Server-side record of a signed-in session.
///
/// The session id is embedded as the `jti` claim of the access token, so
/// revoking the row invalidates the token.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: DocId,
    pub user_id: DocId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl Session {
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// DTO for creating a session.
#[derive(Debug)]
pub struct CreateSession {
    pub user_id: DocId,
    pub expires_at: Timestamp,
}
