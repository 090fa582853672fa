//! crates/secretboard_core/src/ports.rs
//!
//! Defines the service contracts (traits) the board core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! view logic independent of the database, object storage and change transport.

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{ImageUpload, LikeToggle, NewNote, Note, NotePage, SessionId};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// Messages are human-readable; they are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("{0}")]
    Validation(String),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Image upload failed: {0}")]
    Upload(String),
    #[error("Item not found: {0}")]
    NotFound(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Top-level notes, newest first, with per-note reply counts resolved.
    async fn list_top_level_notes(&self, page: usize, page_size: usize) -> PortResult<NotePage>;

    /// Direct replies to `parent_id`, oldest first.
    async fn list_replies(&self, parent_id: Uuid) -> PortResult<Vec<Note>>;

    async fn get_note(&self, note_id: Uuid) -> PortResult<Option<Note>>;

    async fn create_note(&self, note: NewNote, session_id: &SessionId) -> PortResult<Note>;

    /// Returns whether a row was removed. Deleting a note the session does not own
    /// is a silent no-op, indistinguishable from deleting a missing note.
    async fn delete_note(&self, note_id: Uuid, session_id: &SessionId) -> PortResult<bool>;

    async fn toggle_like(&self, note_id: Uuid, session_id: &SessionId) -> PortResult<LikeToggle>;

    async fn report_note(&self, note_id: Uuid, session_id: &SessionId) -> PortResult<()>;

    async fn replies_count(&self, note_id: Uuid) -> PortResult<i64>;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the image in the public bucket and returns its public URL.
    async fn upload_image(&self, session_id: &SessionId, image: ImageUpload) -> PortResult<String>;
}

/// Persistent key/value storage local to one browser profile.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> PortResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> PortResult<()>;
}

//=========================================================================================
// Change Feed
//=========================================================================================

/// Which row-level changes on the notes table a subscriber cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFilter {
    AllNotes,
    RepliesTo(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single row-level change reported by the change transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowChange {
    pub kind: ChangeKind,
    pub note_id: Uuid,
    pub replying_to_id: Option<Uuid>,
}

impl FeedFilter {
    pub fn matches(&self, change: &RowChange) -> bool {
        match self {
            FeedFilter::AllNotes => true,
            FeedFilter::RepliesTo(parent_id) => change.replying_to_id == Some(*parent_id),
        }
    }
}

pub type SubscriptionId = u64;

pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, filter: FeedFilter) -> Subscription;
}

/// A live registration on a `ChangeFeed`.
///
/// Notifications carry no payload. Dropping the subscription unsubscribes it.
pub struct Subscription {
    id: SubscriptionId,
    filter: FeedFilter,
    events: mpsc::UnboundedReceiver<()>,
    release: Option<Arc<dyn Fn(SubscriptionId) + Send + Sync>>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        filter: FeedFilter,
        events: mpsc::UnboundedReceiver<()>,
        release: Arc<dyn Fn(SubscriptionId) + Send + Sync>,
    ) -> Self {
        Self {
            id,
            filter,
            events,
            release: Some(release),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn filter(&self) -> FeedFilter {
        self.filter
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Waits for the next matching change. Returns `false` once the feed is gone
    /// or the subscription was cancelled.
    pub async fn changed(&mut self) -> bool {
        if self.release.is_none() {
            return false;
        }
        if self.events.next().await.is_none() {
            return false;
        }
        // Collapse a burst into a single refetch.
        while let Ok(Some(())) = self.events.try_next() {}
        true
    }

    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
            self.events.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
