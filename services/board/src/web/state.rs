//! services/board/src/web/state.rs
//!
//! Defines the application state shared by every handler.

use crate::client::BoardClient;
use crate::config::Config;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<BoardClient>,
    pub config: Arc<Config>,
}
