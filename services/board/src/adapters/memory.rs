//! services/board/src/adapters/memory.rs
//!
//! An in-process `NoteStore` with the same semantics as the Postgres adapter.
//! Used for local runs without a database and as the test double for the
//! board client. Every mutation is published to the change feed, mirroring
//! the table trigger.

use async_trait::async_trait;
use chrono::Utc;
use secretboard_core::domain::{short_id_for, LikeToggle, NewNote, Note, NotePage, SessionId};
use secretboard_core::ports::{ChangeKind, NoteStore, PortError, PortResult, RowChange};
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::adapters::feed::ChangeFeedDispatcher;

#[derive(Debug, Clone)]
pub struct StoredReport {
    pub note_id: Uuid,
    pub session_id: SessionId,
    pub created_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    /// Insertion order doubles as the tie-breaker for equal timestamps.
    notes: Vec<Note>,
    likes: HashSet<(Uuid, SessionId)>,
    reports: Vec<StoredReport>,
}

impl Tables {
    fn find_mut(&mut self, note_id: Uuid) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == note_id)
    }

    fn replies_count(&self, note_id: Uuid) -> i64 {
        self.notes
            .iter()
            .filter(|n| n.replying_to_id == Some(note_id))
            .count() as i64
    }
}

#[derive(Default)]
pub struct MemoryNoteStore {
    tables: RwLock<Tables>,
    feed: Option<ChangeFeedDispatcher>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(feed: ChangeFeedDispatcher) -> Self {
        Self {
            tables: RwLock::default(),
            feed: Some(feed),
        }
    }

    /// Reports recorded so far, oldest first.
    pub async fn reports(&self) -> Vec<StoredReport> {
        self.tables.read().await.reports.clone()
    }

    /// Whether a like row exists for the pair.
    pub async fn is_liked(&self, note_id: Uuid, session_id: &SessionId) -> bool {
        self.tables
            .read()
            .await
            .likes
            .contains(&(note_id, session_id.clone()))
    }

    fn publish(&self, kind: ChangeKind, note: &Note) {
        if let Some(feed) = &self.feed {
            feed.publish(RowChange {
                kind,
                note_id: note.id,
                replying_to_id: note.replying_to_id,
            });
        }
    }
}

fn not_found(note_id: Uuid) -> PortError {
    PortError::NotFound(format!("Note {} not found", note_id))
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn list_top_level_notes(&self, page: usize, page_size: usize) -> PortResult<NotePage> {
        let tables = self.tables.read().await;
        let mut top_level: Vec<&Note> = tables.notes.iter().filter(|n| n.is_top_level()).collect();
        // Newest first; among equal timestamps the later insert wins.
        top_level.reverse();
        top_level.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total_count = top_level.len() as i64;
        let notes = top_level
            .into_iter()
            .skip(page * page_size)
            .take(page_size)
            .map(|n| Note {
                replies_count: tables.replies_count(n.id),
                ..n.clone()
            })
            .collect();

        Ok(NotePage { notes, total_count })
    }

    async fn list_replies(&self, parent_id: Uuid) -> PortResult<Vec<Note>> {
        let tables = self.tables.read().await;
        let mut replies: Vec<Note> = tables
            .notes
            .iter()
            .filter(|n| n.replying_to_id == Some(parent_id))
            .cloned()
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(replies)
    }

    async fn get_note(&self, note_id: Uuid) -> PortResult<Option<Note>> {
        let tables = self.tables.read().await;
        Ok(tables.notes.iter().find(|n| n.id == note_id).map(|n| Note {
            replies_count: tables.replies_count(n.id),
            ..n.clone()
        }))
    }

    async fn create_note(&self, note: NewNote, session_id: &SessionId) -> PortResult<Note> {
        let mut tables = self.tables.write().await;
        if let Some(parent_id) = note.replying_to_id {
            if !tables.notes.iter().any(|n| n.id == parent_id) {
                return Err(not_found(parent_id));
            }
        }

        let id = Uuid::new_v4();
        let created = Note {
            id,
            short_id: short_id_for(id),
            message: note.message,
            color: note.color,
            recipient: note.recipient,
            from_sender: note.from_sender,
            image_url: note.image_url,
            replying_to_id: note.replying_to_id,
            session_id: session_id.clone(),
            created_at: Utc::now(),
            likes_count: 0,
            replies_count: 0,
        };
        tables.notes.push(created.clone());
        drop(tables);

        self.publish(ChangeKind::Insert, &created);
        Ok(created)
    }

    async fn delete_note(&self, note_id: Uuid, session_id: &SessionId) -> PortResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(position) = tables
            .notes
            .iter()
            .position(|n| n.id == note_id && &n.session_id == session_id)
        else {
            return Ok(false);
        };

        let removed = tables.notes.remove(position);
        // Cascade, as the foreign keys do.
        let replies: Vec<Note> = tables
            .notes
            .iter()
            .filter(|n| n.replying_to_id == Some(note_id))
            .cloned()
            .collect();
        tables
            .notes
            .retain(|n| n.replying_to_id != Some(note_id));
        let gone: HashSet<Uuid> = replies
            .iter()
            .map(|n| n.id)
            .chain(std::iter::once(note_id))
            .collect();
        tables.likes.retain(|(id, _)| !gone.contains(id));
        tables.reports.retain(|r| !gone.contains(&r.note_id));
        drop(tables);

        for reply in &replies {
            self.publish(ChangeKind::Delete, reply);
        }
        self.publish(ChangeKind::Delete, &removed);
        Ok(true)
    }

    async fn toggle_like(&self, note_id: Uuid, session_id: &SessionId) -> PortResult<LikeToggle> {
        // The write lock makes check-and-flip a single step.
        let mut tables = self.tables.write().await;
        if tables.find_mut(note_id).is_none() {
            return Err(not_found(note_id));
        }

        let key = (note_id, session_id.clone());
        let liked = if tables.likes.remove(&key) {
            false
        } else {
            tables.likes.insert(key);
            true
        };

        let note = tables.find_mut(note_id).ok_or_else(|| not_found(note_id))?;
        note.likes_count += if liked { 1 } else { -1 };
        let toggle = LikeToggle {
            liked,
            likes_count: note.likes_count,
        };
        let updated = note.clone();
        drop(tables);

        self.publish(ChangeKind::Update, &updated);
        Ok(toggle)
    }

    async fn report_note(&self, note_id: Uuid, session_id: &SessionId) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.notes.iter().any(|n| n.id == note_id) {
            return Err(not_found(note_id));
        }
        tables.reports.push(StoredReport {
            note_id,
            session_id: session_id.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn replies_count(&self, note_id: Uuid) -> PortResult<i64> {
        Ok(self.tables.read().await.replies_count(note_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secretboard_core::domain::NoteDraft;

    fn new_note(message: &str, replying_to_id: Option<Uuid>) -> NewNote {
        NoteDraft {
            message: message.to_string(),
            replying_to_id,
            ..NoteDraft::default()
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn top_level_listing_excludes_replies_and_counts_them() {
        let store = MemoryNoteStore::new();
        let session = SessionId::new("me");
        let parent = store.create_note(new_note("parent", None), &session).await.unwrap();
        store
            .create_note(new_note("child", Some(parent.id)), &session)
            .await
            .unwrap();

        let page = store.list_top_level_notes(0, 8).await.unwrap();

        assert_eq!(page.total_count, 1);
        assert_eq!(page.notes.len(), 1);
        assert_eq!(page.notes[0].id, parent.id);
        assert_eq!(page.notes[0].replies_count, 1);
    }

    #[tokio::test]
    async fn pages_are_newest_first_with_offsets() {
        let store = MemoryNoteStore::new();
        let session = SessionId::new("me");
        for i in 0..10 {
            store
                .create_note(new_note(&format!("note {}", i), None), &session)
                .await
                .unwrap();
        }

        let first = store.list_top_level_notes(0, 8).await.unwrap();
        let second = store.list_top_level_notes(1, 8).await.unwrap();

        assert_eq!(first.total_count, 10);
        assert_eq!(first.notes[0].message, "note 9");
        assert_eq!(
            second.notes.iter().map(|n| n.message.as_str()).collect::<Vec<_>>(),
            vec!["note 1", "note 0"]
        );
    }

    #[tokio::test]
    async fn replies_come_back_oldest_first() {
        let store = MemoryNoteStore::new();
        let session = SessionId::new("me");
        let parent = store.create_note(new_note("parent", None), &session).await.unwrap();
        for message in ["one", "two", "three"] {
            store
                .create_note(new_note(message, Some(parent.id)), &session)
                .await
                .unwrap();
        }

        let replies = store.list_replies(parent.id).await.unwrap();

        assert_eq!(
            replies.iter().map(|n| n.message.as_str()).collect::<Vec<_>>(),
            vec!["one", "two", "three"]
        );
        assert!(replies
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn reply_to_missing_parent_is_rejected() {
        let store = MemoryNoteStore::new();
        let result = store
            .create_note(new_note("orphan", Some(Uuid::new_v4())), &SessionId::new("me"))
            .await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn deleting_someone_elses_note_is_a_silent_no_op() {
        let store = MemoryNoteStore::new();
        let owner = SessionId::new("owner");
        let note = store.create_note(new_note("mine", None), &owner).await.unwrap();

        let removed = store
            .delete_note(note.id, &SessionId::new("intruder"))
            .await
            .unwrap();
        let missing = store.delete_note(Uuid::new_v4(), &owner).await.unwrap();

        assert!(!removed);
        assert!(!missing);
        assert_eq!(store.list_top_level_notes(0, 8).await.unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn deleting_a_parent_cascades_to_replies() {
        let store = MemoryNoteStore::new();
        let owner = SessionId::new("owner");
        let parent = store.create_note(new_note("parent", None), &owner).await.unwrap();
        let reply = store
            .create_note(new_note("reply", Some(parent.id)), &SessionId::new("other"))
            .await
            .unwrap();

        assert!(store.delete_note(parent.id, &owner).await.unwrap());

        assert!(store.get_note(reply.id).await.unwrap().is_none());
        assert!(store.list_replies(parent.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggle_like_is_its_own_inverse() {
        let store = MemoryNoteStore::new();
        let me = SessionId::new("me");
        let note = store.create_note(new_note("likeable", None), &me).await.unwrap();

        let on = store.toggle_like(note.id, &me).await.unwrap();
        assert_eq!(on, LikeToggle { liked: true, likes_count: 1 });
        assert!(store.is_liked(note.id, &me).await);

        let off = store.toggle_like(note.id, &me).await.unwrap();
        assert_eq!(off, LikeToggle { liked: false, likes_count: 0 });
        assert!(!store.is_liked(note.id, &me).await);
    }

    #[tokio::test]
    async fn likes_count_tracks_liking_sessions_under_concurrency() {
        let store = std::sync::Arc::new(MemoryNoteStore::new());
        let note = store
            .create_note(new_note("popular", None), &SessionId::new("author"))
            .await
            .unwrap();

        // Sessions 0..6 toggle once (like); sessions 0..2 toggle again (unlike).
        let mut handles = Vec::new();
        for i in 0..6 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .toggle_like(note.id, &SessionId::new(format!("s{}", i)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        for i in 0..2 {
            store
                .toggle_like(note.id, &SessionId::new(format!("s{}", i)))
                .await
                .unwrap();
        }

        let current = store.get_note(note.id).await.unwrap().unwrap();
        assert_eq!(current.likes_count, 4);
    }

    #[tokio::test]
    async fn duplicate_reports_are_all_recorded() {
        let store = MemoryNoteStore::new();
        let me = SessionId::new("me");
        let note = store.create_note(new_note("rude", None), &me).await.unwrap();

        store.report_note(note.id, &me).await.unwrap();
        store.report_note(note.id, &me).await.unwrap();

        assert_eq!(store.reports().await.len(), 2);
        assert_eq!(store.get_note(note.id).await.unwrap().unwrap().likes_count, 0);
    }
}
