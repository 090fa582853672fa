pub mod domain;
pub mod ports;
pub mod session;
pub mod view;

pub use domain::{
    Color, ImageUpload, LikeToggle, NewNote, Note, NoteDraft, NotePage, SessionId,
};
pub use ports::{
    ChangeFeed, ChangeKind, FeedFilter, ImageStore, NoteStore, PortError, PortResult, RowChange,
    SessionStorage, Subscription, SubscriptionId,
};
pub use session::{SessionContext, SessionIdentityProvider, SESSION_STORAGE_KEY};
pub use view::{derive_board, derive_replies, BoardEntry, BoardView, Pagination, ThreadView};
