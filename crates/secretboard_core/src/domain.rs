//! crates/secretboard_core/src/domain.rs
//!
//! Defines the pure, core data structures for the board.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

pub const MAX_MESSAGE_CHARS: usize = 150;
pub const MAX_NAME_CHARS: usize = 50;

/// The opaque, browser-persisted token that stands in for a user identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed palette a note can be painted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    #[default]
    Yellow,
    Pink,
    Blue,
    Green,
    Purple,
    Orange,
}

impl Color {
    pub const ALL: [Color; 6] = [
        Color::Yellow,
        Color::Pink,
        Color::Blue,
        Color::Green,
        Color::Purple,
        Color::Orange,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Color::Yellow => "yellow",
            Color::Pink => "pink",
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Purple => "purple",
            Color::Orange => "orange",
        }
    }

    /// The swatch value rendered by the front-end.
    pub fn swatch(self) -> &'static str {
        match self {
            Color::Yellow => "#fef08a",
            Color::Pink => "#fbcfe8",
            Color::Blue => "#bfdbfe",
            Color::Green => "#bbf7d0",
            Color::Purple => "#e9d5ff",
            Color::Orange => "#fed7aa",
        }
    }
}

impl FromStr for Color {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Color::ALL
            .into_iter()
            .find(|c| {
                c.name().eq_ignore_ascii_case(wanted) || c.swatch().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| PortError::Validation(format!("Unknown note color '{}'", s)))
    }
}

/// A single post-it on the board, top-level or reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: Uuid,
    pub short_id: String,
    pub message: String,
    pub color: Color,
    pub recipient: Option<String>,
    pub from_sender: Option<String>,
    pub image_url: Option<String>,
    pub replying_to_id: Option<Uuid>,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub likes_count: i32,
    /// Derived by the store, never persisted on the row itself.
    pub replies_count: i64,
}

impl Note {
    pub fn is_top_level(&self) -> bool {
        self.replying_to_id.is_none()
    }
}

/// Builds the short display id from a note's UUID.
pub fn short_id_for(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// One page of top-level notes plus the size of the whole top-level set.
#[derive(Debug, Clone, Default)]
pub struct NotePage {
    pub notes: Vec<Note>,
    pub total_count: i64,
}

/// The outcome of the like toggle procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes_count: i32,
}

/// An image picked by the user, not yet stored.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// The original extension, lowercased, without the dot.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Raw form input for a new note, exactly as the user typed it.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub message: String,
    pub color: Color,
    pub recipient: Option<String>,
    pub from_sender: Option<String>,
    pub image_url: Option<String>,
    pub replying_to_id: Option<Uuid>,
}

/// A validated note ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNote {
    pub message: String,
    pub color: Color,
    pub recipient: Option<String>,
    pub from_sender: Option<String>,
    pub image_url: Option<String>,
    pub replying_to_id: Option<Uuid>,
}

impl NoteDraft {
    /// Trims every field, drops blank optionals and enforces the length limits.
    pub fn validate(self) -> PortResult<NewNote> {
        let message = self.message.trim().to_string();
        if message.is_empty() {
            return Err(PortError::Validation("Message cannot be empty".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(PortError::Validation(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        Ok(NewNote {
            message,
            color: self.color,
            recipient: optional_field("Recipient", self.recipient, Some(MAX_NAME_CHARS))?,
            from_sender: optional_field("Sender", self.from_sender, Some(MAX_NAME_CHARS))?,
            image_url: optional_field("Image URL", self.image_url, None)?,
            replying_to_id: self.replying_to_id,
        })
    }
}

fn optional_field(
    label: &str,
    value: Option<String>,
    max_chars: Option<usize>,
) -> PortResult<Option<String>> {
    let Some(trimmed) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if let Some(max) = max_chars {
        if trimmed.chars().count() > max {
            return Err(PortError::Validation(format!(
                "{} must be at most {} characters",
                label, max
            )));
        }
    }
    Ok(Some(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(message: &str) -> NoteDraft {
        NoteDraft {
            message: message.to_string(),
            ..NoteDraft::default()
        }
    }

    #[test]
    fn validate_trims_message_and_drops_blank_optionals() {
        let new_note = NoteDraft {
            recipient: Some("   ".to_string()),
            from_sender: Some("  anon ".to_string()),
            image_url: Some(String::new()),
            ..draft("  hello  ")
        }
        .validate()
        .unwrap();

        assert_eq!(new_note.message, "hello");
        assert_eq!(new_note.recipient, None);
        assert_eq!(new_note.from_sender.as_deref(), Some("anon"));
        assert_eq!(new_note.image_url, None);
    }

    #[test]
    fn validate_rejects_blank_message() {
        let err = draft(" \n\t ").validate().unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
    }

    #[test]
    fn validate_counts_characters_not_bytes() {
        assert!(draft(&"é".repeat(150)).validate().is_ok());
        assert!(matches!(
            draft(&"é".repeat(151)).validate(),
            Err(PortError::Validation(_))
        ));
    }

    #[test]
    fn validate_rejects_oversize_recipient() {
        let result = NoteDraft {
            recipient: Some("x".repeat(51)),
            ..draft("hi")
        }
        .validate();
        assert!(matches!(result, Err(PortError::Validation(_))));
    }

    #[test]
    fn color_parses_names_and_swatches() {
        assert_eq!("Pink".parse::<Color>().unwrap(), Color::Pink);
        assert_eq!("#BFDBFE".parse::<Color>().unwrap(), Color::Blue);
        assert!("magenta".parse::<Color>().is_err());
    }

    #[test]
    fn short_id_is_eight_hex_chars() {
        let id = Uuid::parse_str("0123abcd-0000-4000-8000-000000000000").unwrap();
        assert_eq!(short_id_for(id), "0123abcd");
    }

    #[test]
    fn image_extension_requires_a_stem() {
        let upload = |name: &str| ImageUpload {
            file_name: name.to_string(),
            content_type: None,
            bytes: vec![],
        };
        assert_eq!(upload("cat.PNG").extension().as_deref(), Some("png"));
        assert_eq!(upload(".hidden").extension(), None);
        assert_eq!(upload("noext").extension(), None);
    }
}
