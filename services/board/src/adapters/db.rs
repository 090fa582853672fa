//! services/board/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `NoteStore` port from the `core` crate. It handles all interactions with
//! the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use secretboard_core::domain::{
    short_id_for, Color, LikeToggle, NewNote, Note, NotePage, SessionId,
};
use secretboard_core::ports::{NoteStore, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

const NOTE_COLUMNS: &str = "id, short_id, message, color, recipient, from_sender, image_url, \
     replying_to_id, session_id, created_at, likes_count";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `NoteStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct NoteRecord {
    id: Uuid,
    short_id: String,
    message: String,
    color: String,
    recipient: Option<String>,
    from_sender: Option<String>,
    image_url: Option<String>,
    replying_to_id: Option<Uuid>,
    session_id: String,
    created_at: DateTime<Utc>,
    likes_count: i32,
}

impl NoteRecord {
    fn to_domain(self, replies_count: i64) -> PortResult<Note> {
        let color = self.color.parse::<Color>().map_err(|_| {
            PortError::Storage(format!("Note {} has unknown color '{}'", self.id, self.color))
        })?;
        Ok(Note {
            id: self.id,
            short_id: self.short_id,
            message: self.message,
            color,
            recipient: self.recipient,
            from_sender: self.from_sender,
            image_url: self.image_url,
            replying_to_id: self.replying_to_id,
            session_id: SessionId::new(self.session_id),
            created_at: self.created_at,
            likes_count: self.likes_count,
            replies_count,
        })
    }
}

/// Foreign key violations mean the referenced note is gone.
fn map_note_error(e: sqlx::Error, note_id: Uuid) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
            PortError::NotFound(format!("Note {} not found", note_id))
        }
        _ => PortError::Storage(e.to_string()),
    }
}

//=========================================================================================
// `NoteStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl NoteStore for DbAdapter {
    async fn list_top_level_notes(&self, page: usize, page_size: usize) -> PortResult<NotePage> {
        let records = sqlx::query_as::<_, NoteRecord>(&format!(
            "SELECT {} FROM notes WHERE replying_to_id IS NULL \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            NOTE_COLUMNS
        ))
        .bind(page_size as i64)
        .bind((page * page_size) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Storage(e.to_string()))?;

        let total_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE replying_to_id IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| PortError::Storage(e.to_string()))?;

        let notes = try_join_all(records.into_iter().map(|record| async move {
            let replies_count = self.replies_count(record.id).await?;
            record.to_domain(replies_count)
        }))
        .await?;

        debug!(page, page_size, total_count, "Fetched board page.");
        Ok(NotePage { notes, total_count })
    }

    async fn list_replies(&self, parent_id: Uuid) -> PortResult<Vec<Note>> {
        let records = sqlx::query_as::<_, NoteRecord>(&format!(
            "SELECT {} FROM notes WHERE replying_to_id = $1 ORDER BY created_at ASC, id ASC",
            NOTE_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Storage(e.to_string()))?;

        records.into_iter().map(|r| r.to_domain(0)).collect()
    }

    async fn get_note(&self, note_id: Uuid) -> PortResult<Option<Note>> {
        let record = sqlx::query_as::<_, NoteRecord>(&format!(
            "SELECT {} FROM notes WHERE id = $1",
            NOTE_COLUMNS
        ))
        .bind(note_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Storage(e.to_string()))?;

        match record {
            Some(record) => {
                let replies_count = self.replies_count(note_id).await?;
                record.to_domain(replies_count).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn create_note(&self, note: NewNote, session_id: &SessionId) -> PortResult<Note> {
        let id = Uuid::new_v4();
        let record = sqlx::query_as::<_, NoteRecord>(&format!(
            "INSERT INTO notes (id, short_id, message, color, recipient, from_sender, image_url, \
             replying_to_id, session_id) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            NOTE_COLUMNS
        ))
        .bind(id)
        .bind(short_id_for(id))
        .bind(&note.message)
        .bind(note.color.name())
        .bind(&note.recipient)
        .bind(&note.from_sender)
        .bind(&note.image_url)
        .bind(note.replying_to_id)
        .bind(session_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match note.replying_to_id {
            Some(parent_id) => map_note_error(e, parent_id),
            None => PortError::Storage(e.to_string()),
        })?;

        record.to_domain(0)
    }

    async fn delete_note(&self, note_id: Uuid, session_id: &SessionId) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND session_id = $2")
            .bind(note_id)
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Storage(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_like(&self, note_id: Uuid, session_id: &SessionId) -> PortResult<LikeToggle> {
        let (liked, likes_count): (bool, i32) =
            sqlx::query_as("SELECT now_liked, new_likes_count FROM toggle_like($1, $2)")
                .bind(note_id)
                .bind(session_id.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_note_error(e, note_id))?;
        Ok(LikeToggle { liked, likes_count })
    }

    async fn report_note(&self, note_id: Uuid, session_id: &SessionId) -> PortResult<()> {
        sqlx::query("INSERT INTO reports (note_id, session_id) VALUES ($1, $2)")
            .bind(note_id)
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_note_error(e, note_id))?;
        Ok(())
    }

    async fn replies_count(&self, note_id: Uuid) -> PortResult<i64> {
        let count: i32 = sqlx::query_scalar("SELECT get_note_replies_count($1)")
            .bind(note_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Storage(e.to_string()))?;
        Ok(i64::from(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = include_str!("../../migrations/20240501000000_create_board.sql");

    #[test]
    fn short_ids_may_repeat() {
        // Eight hex characters of a random id can collide; the full id is the key.
        let column = SCHEMA
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("short_id "))
            .unwrap();
        assert!(!column.to_uppercase().contains("UNIQUE"));
        assert!(SCHEMA.contains("id UUID PRIMARY KEY"));
    }

    #[test]
    fn unknown_color_is_a_storage_error() {
        let record = NoteRecord {
            id: Uuid::new_v4(),
            short_id: "0123abcd".to_string(),
            message: "hi".to_string(),
            color: "Teal".to_string(),
            recipient: None,
            from_sender: None,
            image_url: None,
            replying_to_id: None,
            session_id: "s".to_string(),
            created_at: Utc::now(),
            likes_count: 0,
        };
        assert!(matches!(record.to_domain(0), Err(PortError::Storage(_))));
    }
}
