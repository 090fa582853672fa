pub mod db;
pub mod feed;
pub mod images;
pub mod local_storage;
pub mod memory;
pub mod pg_feed;

pub use db::DbAdapter;
pub use feed::ChangeFeedDispatcher;
pub use images::LocalBucket;
pub use local_storage::FileStorage;
pub use memory::MemoryNoteStore;
