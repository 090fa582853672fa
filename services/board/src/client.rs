//! services/board/src/client.rs
//!
//! The board client: owns the current page, the search query and the open
//! reply thread, and turns user intents and change notifications into
//! refetches. Every mutation is followed by a full refetch of the current page
//! (and of the open thread) rather than a local patch.
//!
//! Each fetch takes a sequence number. A response is dropped when a newer
//! fetch of the same view was issued before it resolved, so a slow page load
//! cannot overwrite a fresher one.

use secretboard_core::domain::{ImageUpload, LikeToggle, Note, NoteDraft, NotePage};
use secretboard_core::ports::{
    ChangeFeed, FeedFilter, ImageStore, NoteStore, PortError, PortResult, Subscription,
};
use secretboard_core::session::SessionContext;
use secretboard_core::view::{derive_board, derive_replies, BoardView, Pagination, ThreadView};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

//=========================================================================================
// View Events
//=========================================================================================

/// Pushed to the presentation layer whenever something it renders changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    BoardChanged,
    ThreadChanged(Uuid),
    ThreadClosed,
    /// A background refetch failed; shown as a transient notification.
    Notice(String),
}

//=========================================================================================
// Client State
//=========================================================================================

struct BoardState {
    notes: Vec<Note>,
    total_count: i64,
    page_index: usize,
    /// Page of the latest fetch issued; ahead of `page_index` while a
    /// navigation is in flight.
    requested_page: usize,
    page_size: usize,
    search_query: String,
}

impl BoardState {
    fn pagination(&self) -> Pagination {
        Pagination::new(
            self.page_index,
            self.page_size,
            self.notes.len(),
            self.total_count,
        )
    }

    fn view(&self) -> BoardView {
        BoardView {
            entries: derive_board(
                &self.notes,
                &self.search_query,
                self.page_index,
                self.page_size,
                self.total_count,
            ),
            pagination: self.pagination(),
            search_query: self.search_query.clone(),
        }
    }
}

struct ThreadState {
    parent_id: Uuid,
    replies: Vec<Note>,
    watcher: CancellationToken,
}

#[derive(Clone, Copy)]
enum WatchTarget {
    Board,
    Thread(Uuid),
}

//=========================================================================================
// BoardClient
//=========================================================================================

pub struct BoardClient {
    store: Arc<dyn NoteStore>,
    images: Arc<dyn ImageStore>,
    feed: Arc<dyn ChangeFeed>,
    session: SessionContext,
    board: Mutex<BoardState>,
    thread: Mutex<Option<ThreadState>>,
    board_seq: AtomicU64,
    thread_seq: AtomicU64,
    events: broadcast::Sender<ViewEvent>,
}

impl BoardClient {
    pub fn new(
        store: Arc<dyn NoteStore>,
        images: Arc<dyn ImageStore>,
        feed: Arc<dyn ChangeFeed>,
        session: SessionContext,
        page_size: usize,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            store,
            images,
            feed,
            session,
            board: Mutex::new(BoardState {
                notes: Vec::new(),
                total_count: 0,
                page_index: 0,
                requested_page: 0,
                page_size: page_size.max(1),
                search_query: String::new(),
            }),
            thread: Mutex::new(None),
            board_seq: AtomicU64::new(0),
            thread_seq: AtomicU64::new(0),
            events,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn subscribe_views(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: ViewEvent) {
        let _ = self.events.send(event);
    }

    // --- Views ---

    pub async fn board_view(&self) -> BoardView {
        self.board.lock().await.view()
    }

    pub async fn thread_view(&self) -> Option<ThreadView> {
        self.thread
            .lock()
            .await
            .as_ref()
            .map(|t| derive_replies(t.parent_id, t.replies.clone()))
    }

    // --- Board fetching and pagination ---

    /// Refetches the page currently shown, or the one a pending navigation asked for.
    pub async fn refresh_board(&self) -> PortResult<()> {
        let page_index = self.board.lock().await.requested_page;
        self.load_board_page(page_index).await.map(|_| ())
    }

    pub async fn next_page(&self) -> PortResult<BoardView> {
        let (target, allowed) = {
            let board = self.board.lock().await;
            (board.page_index + 1, board.pagination().has_next)
        };
        if allowed {
            self.load_board_page(target).await?;
        }
        Ok(self.board_view().await)
    }

    pub async fn previous_page(&self) -> PortResult<BoardView> {
        let current = self.board.lock().await.page_index;
        if current > 0 {
            self.load_board_page(current - 1).await?;
        }
        Ok(self.board_view().await)
    }

    /// Search narrows the loaded page; it never triggers a fetch.
    pub async fn set_search(&self, query: &str) -> BoardView {
        let view = {
            let mut board = self.board.lock().await;
            board.search_query = query.to_string();
            board.view()
        };
        self.notify(ViewEvent::BoardChanged);
        view
    }

    /// Returns `false` when the response was superseded and dropped.
    async fn load_board_page(&self, page_index: usize) -> PortResult<bool> {
        let (seq, page_size) = {
            let mut board = self.board.lock().await;
            board.requested_page = page_index;
            (self.board_seq.fetch_add(1, Ordering::SeqCst) + 1, board.page_size)
        };

        let (target, page) = match self.fetch_board_page(page_index, page_size).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let mut board = self.board.lock().await;
                if seq == self.board_seq.load(Ordering::SeqCst) {
                    board.requested_page = board.page_index;
                }
                return Err(e);
            }
        };

        if !self.apply_board_page(seq, target, page).await {
            debug!(seq, "Discarding superseded board page.");
            return Ok(false);
        }
        self.notify(ViewEvent::BoardChanged);
        Ok(true)
    }

    async fn fetch_board_page(
        &self,
        page_index: usize,
        page_size: usize,
    ) -> PortResult<(usize, NotePage)> {
        let mut target = page_index;
        loop {
            let page = self.store.list_top_level_notes(target, page_size).await?;
            // A delete can empty the last page; fall back to the new last page.
            let last = Pagination::last_page_index(page_size, page.total_count);
            if page.notes.is_empty() && target > last {
                debug!(target, last, "Requested page is past the end, stepping back.");
                target = last;
                continue;
            }
            return Ok((target, page));
        }
    }

    async fn apply_board_page(&self, seq: u64, page_index: usize, page: NotePage) -> bool {
        let mut board = self.board.lock().await;
        if seq != self.board_seq.load(Ordering::SeqCst) {
            return false;
        }
        board.notes = page.notes;
        board.total_count = page.total_count;
        board.page_index = page_index;
        board.requested_page = page_index;
        true
    }

    // --- Reply threads ---

    /// Opens the reply view for a top-level note and starts watching its replies.
    pub async fn open_thread(self: &Arc<Self>, parent_id: Uuid) -> PortResult<ThreadView> {
        let parent = self
            .store
            .get_note(parent_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Note {} not found", parent_id)))?;
        if !parent.is_top_level() {
            return Err(PortError::Validation(
                "Only top-level notes have a reply thread".to_string(),
            ));
        }

        // Subscribe before fetching so no change slips between the two. The
        // thread already open stays in place until the replies arrive.
        let subscription = self.feed.subscribe(FeedFilter::RepliesTo(parent_id));
        let seq = self.thread_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let replies = self.store.list_replies(parent_id).await?;

        let watcher = CancellationToken::new();
        {
            let mut thread = self.thread.lock().await;
            if let Some(previous) = thread.take() {
                previous.watcher.cancel();
            }
            *thread = Some(ThreadState {
                parent_id,
                replies: replies.clone(),
                watcher: watcher.clone(),
            });
        }
        debug!(seq, %parent_id, "Opened reply thread.");
        self.spawn_watcher(subscription, watcher, WatchTarget::Thread(parent_id));
        self.notify(ViewEvent::ThreadChanged(parent_id));

        Ok(derive_replies(parent_id, replies))
    }

    pub async fn close_thread(&self) {
        let closed = self.thread.lock().await.take();
        if let Some(thread) = closed {
            thread.watcher.cancel();
            debug!(parent_id = %thread.parent_id, "Closed reply thread.");
            self.notify(ViewEvent::ThreadClosed);
        }
    }

    /// Refetches the open thread, if any.
    pub async fn refresh_thread(&self) -> PortResult<()> {
        let open = self.thread.lock().await.as_ref().map(|t| t.parent_id);
        match open {
            Some(parent_id) => self.load_thread(parent_id).await,
            None => Ok(()),
        }
    }

    async fn load_thread(&self, parent_id: Uuid) -> PortResult<()> {
        let seq = self.thread_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let replies = self.store.list_replies(parent_id).await?;

        let applied = {
            let mut thread = self.thread.lock().await;
            let current = seq == self.thread_seq.load(Ordering::SeqCst);
            match thread.as_mut() {
                Some(open) if current && open.parent_id == parent_id => {
                    open.replies = replies;
                    true
                }
                _ => false,
            }
        };
        if applied {
            self.notify(ViewEvent::ThreadChanged(parent_id));
        } else {
            debug!(seq, %parent_id, "Discarding superseded thread replies.");
        }
        Ok(())
    }

    // --- Change feed watchers ---

    /// Refetches the current page on every change to the notes table until
    /// `shutdown` is cancelled.
    pub fn watch_board(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let subscription = self.feed.subscribe(FeedFilter::AllNotes);
        self.spawn_watcher(subscription, shutdown, WatchTarget::Board)
    }

    fn spawn_watcher(
        self: &Arc<Self>,
        mut subscription: Subscription,
        cancel: CancellationToken,
        target: WatchTarget,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = subscription.changed() => {
                        if !changed {
                            break;
                        }
                        let result = match target {
                            WatchTarget::Board => client.refresh_board().await,
                            WatchTarget::Thread(parent_id) => client.load_thread(parent_id).await,
                        };
                        if let Err(e) = result {
                            warn!("Refetch after change notification failed: {}", e);
                            client.notify(ViewEvent::Notice(e.to_string()));
                        }
                    }
                }
            }
            subscription.unsubscribe();
        })
    }

    // --- Intents ---

    /// Validates the draft, uploads the image (if any) and inserts the note.
    /// A failed upload means nothing is inserted.
    pub async fn create_note(
        &self,
        draft: NoteDraft,
        image: Option<ImageUpload>,
    ) -> PortResult<Note> {
        let mut new_note = draft.validate()?;

        if let Some(parent_id) = new_note.replying_to_id {
            let parent = self
                .store
                .get_note(parent_id)
                .await?
                .ok_or_else(|| PortError::NotFound(format!("Note {} not found", parent_id)))?;
            if !parent.is_top_level() {
                return Err(PortError::Validation(
                    "Replies can only be added to top-level notes".to_string(),
                ));
            }
        }

        if let Some(image) = image {
            let url = self
                .images
                .upload_image(self.session.session_id(), image)
                .await
                .map_err(|e| {
                    error!("Image upload failed, note not created: {}", e);
                    e
                })?;
            new_note.image_url = Some(url);
        }

        let note = self
            .store
            .create_note(new_note, self.session.session_id())
            .await
            .map_err(|e| {
                error!("Failed to create note: {}", e);
                e
            })?;
        info!(note_id = %note.id, reply = note.replying_to_id.is_some(), "Note created.");

        self.refresh_after_mutation().await;
        Ok(note)
    }

    /// Returns whether anything was deleted; notes owned by other sessions are left alone.
    pub async fn delete_note(&self, note_id: Uuid) -> PortResult<bool> {
        let removed = self
            .store
            .delete_note(note_id, self.session.session_id())
            .await?;
        if removed {
            info!(%note_id, "Note deleted.");
        } else {
            debug!(%note_id, "Delete matched no owned note.");
        }
        self.refresh_after_mutation().await;
        Ok(removed)
    }

    pub async fn toggle_like(&self, note_id: Uuid) -> PortResult<LikeToggle> {
        let toggle = self
            .store
            .toggle_like(note_id, self.session.session_id())
            .await?;
        self.refresh_after_mutation().await;
        Ok(toggle)
    }

    pub async fn report_note(&self, note_id: Uuid) -> PortResult<()> {
        self.store
            .report_note(note_id, self.session.session_id())
            .await?;
        info!(%note_id, "Note reported.");
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// The mutation already succeeded; a failed refetch only leaves the view stale.
    async fn refresh_after_mutation(&self) {
        if let Err(e) = self.refresh_board().await {
            warn!("Board refetch failed: {}", e);
            self.notify(ViewEvent::Notice(e.to_string()));
        }
        if let Err(e) = self.refresh_thread().await {
            warn!("Thread refetch failed: {}", e);
            self.notify(ViewEvent::Notice(e.to_string()));
        }
    }
}
