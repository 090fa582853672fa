//! crates/secretboard_core/src/view.rs
//!
//! Derives what the board and the reply view render from the raw notes the
//! store returned. Everything here is pure; fetching and refresh live in the
//! client.

use uuid::Uuid;

use crate::domain::Note;

/// A note placed on the board together with its post number.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardEntry {
    /// Counts down from the grand total, so the earliest note is always 1.
    pub ordinal: i64,
    pub note: Note,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
    pub total_count: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Pagination {
    /// `page_len` is how many rows the store returned for this page, before search.
    pub fn new(page_index: usize, page_size: usize, page_len: usize, total_count: i64) -> Self {
        let seen = (page_index * page_size + page_len) as i64;
        Self {
            page_index,
            page_size,
            total_count,
            has_previous: page_index > 0,
            has_next: seen < total_count,
        }
    }

    /// Index of the last page that can hold any note.
    pub fn last_page_index(page_size: usize, total_count: i64) -> usize {
        if page_size == 0 || total_count <= 0 {
            return 0;
        }
        ((total_count as usize) - 1) / page_size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardView {
    pub entries: Vec<BoardEntry>,
    pub pagination: Pagination,
    pub search_query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadView {
    pub parent_id: Uuid,
    pub replies: Vec<Note>,
}

/// Filters, searches, orders and numbers one page of top-level notes.
pub fn derive_board(
    notes: &[Note],
    search_query: &str,
    page_index: usize,
    page_size: usize,
    total_count: i64,
) -> Vec<BoardEntry> {
    let needle = search_query.trim().to_lowercase();

    let mut visible: Vec<&Note> = notes
        .iter()
        .filter(|note| note.is_top_level())
        .filter(|note| needle.is_empty() || matches_search(note, &needle))
        .collect();

    // `sort_by` is stable: equal timestamps keep their fetch order.
    visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let offset = (page_index * page_size) as i64;
    visible
        .into_iter()
        .enumerate()
        .map(|(position, note)| BoardEntry {
            ordinal: total_count - (offset + position as i64),
            note: note.clone(),
        })
        .collect()
}

fn matches_search(note: &Note, needle: &str) -> bool {
    let hit = |field: &str| field.to_lowercase().contains(needle);
    note.recipient.as_deref().is_some_and(hit) || hit(&note.short_id) || hit(&note.message)
}

/// Replies arrive oldest first and are shown as-is.
pub fn derive_replies(parent_id: Uuid, replies: Vec<Note>) -> ThreadView {
    ThreadView { parent_id, replies }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Color, SessionId};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn note(message: &str, created_at: DateTime<Utc>) -> Note {
        let id = Uuid::new_v4();
        Note {
            id,
            short_id: crate::domain::short_id_for(id),
            message: message.to_string(),
            color: Color::Yellow,
            recipient: None,
            from_sender: None,
            image_url: None,
            replying_to_id: None,
            session_id: SessionId::new("s1"),
            created_at,
            likes_count: 0,
            replies_count: 0,
        }
    }

    fn messages(entries: &[BoardEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.note.message.as_str()).collect()
    }

    #[test]
    fn replies_never_reach_the_board() {
        let parent = note("parent", at(0));
        let mut reply = note("reply", at(5));
        reply.replying_to_id = Some(parent.id);

        let entries = derive_board(&[reply, parent], "", 0, 8, 1);

        assert_eq!(messages(&entries), vec!["parent"]);
    }

    #[test]
    fn sorts_newest_first_and_keeps_fetch_order_on_ties() {
        let notes = vec![
            note("old", at(0)),
            note("tie-a", at(10)),
            note("new", at(20)),
            note("tie-b", at(10)),
        ];

        let entries = derive_board(&notes, "", 0, 8, 4);

        assert_eq!(messages(&entries), vec!["new", "tie-a", "tie-b", "old"]);
    }

    #[test]
    fn search_is_case_insensitive_across_recipient_short_id_and_message() {
        let mut to_alex = note("see you", at(3));
        to_alex.recipient = Some("Alex".to_string());
        let mut by_short_id = note("nothing", at(2));
        by_short_id.short_id = "beef1234".to_string();
        let by_message = note("Dear ALEXANDRA", at(1));
        let unrelated = note("lunch?", at(0));
        let notes = vec![to_alex, by_short_id, by_message, unrelated];

        assert_eq!(
            messages(&derive_board(&notes, "  alex ", 0, 8, 4)),
            vec!["see you", "Dear ALEXANDRA"]
        );
        assert_eq!(
            messages(&derive_board(&notes, "BEEF", 0, 8, 4)),
            vec!["nothing"]
        );
        assert!(derive_board(&notes, "zzz", 0, 8, 4).is_empty());
    }

    #[test]
    fn blank_search_returns_everything() {
        let notes = vec![note("a", at(1)), note("b", at(0))];
        assert_eq!(derive_board(&notes, " \t ", 0, 8, 2).len(), 2);
    }

    #[test]
    fn ordinals_count_down_from_the_grand_total() {
        let first_page: Vec<Note> = (0..8).map(|i| note("p0", at(100 - i))).collect();
        let second_page: Vec<Note> = (0..2).map(|i| note("p1", at(10 - i))).collect();

        let page0 = derive_board(&first_page, "", 0, 8, 10);
        let page1 = derive_board(&second_page, "", 1, 8, 10);

        assert_eq!(page0.first().unwrap().ordinal, 10);
        assert_eq!(page0[7].ordinal, 3);
        assert_eq!(
            page1.iter().map(|e| e.ordinal).collect::<Vec<_>>(),
            vec![2, 1]
        );
    }

    #[test]
    fn pagination_bounds() {
        let first = Pagination::new(0, 8, 8, 10);
        assert!(!first.has_previous);
        assert!(first.has_next);

        let last = Pagination::new(1, 8, 2, 10);
        assert!(last.has_previous);
        assert!(!last.has_next);

        let exact = Pagination::new(0, 8, 8, 8);
        assert!(!exact.has_next);
    }

    #[test]
    fn last_page_index_handles_exact_multiples() {
        assert_eq!(Pagination::last_page_index(8, 0), 0);
        assert_eq!(Pagination::last_page_index(8, 8), 0);
        assert_eq!(Pagination::last_page_index(8, 9), 1);
        assert_eq!(Pagination::last_page_index(8, 16), 1);
    }
}
