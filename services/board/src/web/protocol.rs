//! services/board/src/web/protocol.rs
//!
//! The JSON shapes exchanged with the browser front-end, over REST and over
//! the WebSocket that pushes refreshed views.

use chrono::{DateTime, Utc};
use secretboard_core::domain::{LikeToggle, Note};
use secretboard_core::session::SessionContext;
use secretboard_core::view::{BoardEntry, BoardView, Pagination, ThreadView};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Views
//=========================================================================================

/// A note as rendered. The author's session id is never sent; `is_mine` is.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct NoteDto {
    pub id: Uuid,
    pub short_id: String,
    pub message: String,
    pub color: String,
    pub swatch: String,
    pub recipient: Option<String>,
    pub from_sender: Option<String>,
    pub image_url: Option<String>,
    pub replying_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub likes_count: i32,
    pub replies_count: i64,
    pub is_mine: bool,
}

impl NoteDto {
    pub fn from_note(note: &Note, session: &SessionContext) -> Self {
        Self {
            id: note.id,
            short_id: note.short_id.clone(),
            message: note.message.clone(),
            color: note.color.name().to_string(),
            swatch: note.color.swatch().to_string(),
            recipient: note.recipient.clone(),
            from_sender: note.from_sender.clone(),
            image_url: note.image_url.clone(),
            replying_to_id: note.replying_to_id,
            created_at: note.created_at,
            likes_count: note.likes_count,
            replies_count: note.replies_count,
            is_mine: session.owns(note),
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct BoardEntryDto {
    pub ordinal: i64,
    pub note: NoteDto,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct PaginationDto {
    pub page_index: usize,
    pub page_size: usize,
    pub total_count: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl From<Pagination> for PaginationDto {
    fn from(p: Pagination) -> Self {
        Self {
            page_index: p.page_index,
            page_size: p.page_size,
            total_count: p.total_count,
            has_previous: p.has_previous,
            has_next: p.has_next,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct BoardViewDto {
    pub entries: Vec<BoardEntryDto>,
    pub pagination: PaginationDto,
    pub search_query: String,
}

impl BoardViewDto {
    pub fn from_view(view: BoardView, session: &SessionContext) -> Self {
        Self {
            entries: view
                .entries
                .iter()
                .map(|BoardEntry { ordinal, note }| BoardEntryDto {
                    ordinal: *ordinal,
                    note: NoteDto::from_note(note, session),
                })
                .collect(),
            pagination: view.pagination.into(),
            search_query: view.search_query,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct ThreadViewDto {
    pub parent_id: Uuid,
    pub replies: Vec<NoteDto>,
}

impl ThreadViewDto {
    pub fn from_view(view: ThreadView, session: &SessionContext) -> Self {
        Self {
            parent_id: view.parent_id,
            replies: view
                .replies
                .iter()
                .map(|n| NoteDto::from_note(n, session))
                .collect(),
        }
    }
}

//=========================================================================================
// Requests and small responses
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes_count: i32,
}

impl From<LikeToggle> for LikeResponse {
    fn from(t: LikeToggle) -> Self {
        Self {
            liked: t.liked,
            likes_count: t.likes_count,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct DeleteResponse {
    /// `false` when the note was missing or owned by someone else.
    pub deleted: bool,
}

/// The human-readable message shown as a transient notification.
#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The board page as it should now be rendered.
    Board { view: BoardViewDto },

    /// The open reply thread as it should now be rendered.
    Thread { view: ThreadViewDto },

    ThreadClosed,

    /// A background refresh failed.
    Notice { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use secretboard_core::domain::{Color, SessionId};

    fn note(session: &str) -> Note {
        let id = Uuid::new_v4();
        Note {
            id,
            short_id: secretboard_core::domain::short_id_for(id),
            message: "hi".to_string(),
            color: Color::Blue,
            recipient: None,
            from_sender: None,
            image_url: None,
            replying_to_id: None,
            session_id: SessionId::new(session),
            created_at: Utc::now(),
            likes_count: 2,
            replies_count: 1,
        }
    }

    #[test]
    fn note_dto_marks_ownership_and_hides_session() {
        let me = SessionContext::new(SessionId::new("me"));

        let mine = serde_json::to_value(NoteDto::from_note(&note("me"), &me)).unwrap();
        let theirs = NoteDto::from_note(&note("them"), &me);

        assert_eq!(mine["is_mine"], true);
        assert_eq!(mine["color"], "blue");
        assert_eq!(mine["swatch"], "#bfdbfe");
        assert!(mine.get("session_id").is_none());
        assert!(!theirs.is_mine);
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMessage::Notice {
            message: "oops".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "notice");
        assert_eq!(json["message"], "oops");

        let closed = serde_json::to_value(ServerMessage::ThreadClosed).unwrap();
        assert_eq!(closed["type"], "thread_closed");
    }
}
