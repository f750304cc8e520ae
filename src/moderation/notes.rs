//! Private moderator notes about members

use crate::models::{Note, Table};
use crate::moderation::ModerationResult;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Notes {
    table: Table<Note>,
}

impl Notes {
    #[must_use]
    pub const fn new(table: Table<Note>) -> Self {
        Self { table }
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn add(&self, user: u64, moderator: u64, content: String) -> ModerationResult<Note> {
        let note = Note {
            id: Uuid::new_v4().to_string(),
            user,
            moderator,
            content,
            date: Utc::now().timestamp(),
        };
        self.table.insert(&note).await?;
        info!(user, moderator, id = %note.id, "Note added");
        Ok(note)
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn for_user(&self, user: u64) -> ModerationResult<Vec<Note>> {
        Ok(self.table.find([Note::USER.equals(user)]).await?)
    }

    /// Delete a note by ID. Returns whether it existed.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn remove(&self, id: &str) -> ModerationResult<bool> {
        let removed = self.table.delete(Note::ID.equals(id)).await?;
        Ok(removed > 0)
    }
}
