//! services/board/src/adapters/pg_feed.rs
//!
//! Feeds row-level changes on `notes` into the dispatcher. A trigger on the
//! table publishes every insert, update and delete on the `notes_changes`
//! channel; this task listens on it and republishes each change.

use secretboard_core::ports::{ChangeKind, RowChange};
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::feed::ChangeFeedDispatcher;

pub const NOTES_CHANNEL: &str = "notes_changes";

/// The JSON payload published by the `notes_change_feed` trigger.
#[derive(Debug, Deserialize)]
struct NotifyPayload {
    op: String,
    note_id: Uuid,
    replying_to_id: Option<Uuid>,
}

fn parse_payload(payload: &str) -> Option<RowChange> {
    let parsed: NotifyPayload = serde_json::from_str(payload).ok()?;
    let kind = match parsed.op.as_str() {
        "insert" => ChangeKind::Insert,
        "update" => ChangeKind::Update,
        "delete" => ChangeKind::Delete,
        _ => return None,
    };
    Some(RowChange {
        kind,
        note_id: parsed.note_id,
        replying_to_id: parsed.replying_to_id,
    })
}

/// Starts listening and forwarding until `shutdown` is cancelled.
pub async fn spawn_pg_change_source(
    pool: &PgPool,
    feed: ChangeFeedDispatcher,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(NOTES_CHANNEL).await?;
    info!("Listening for note changes on '{}'.", NOTES_CHANNEL);

    Ok(tokio::spawn(async move {
        loop {
            let notification = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = listener.recv() => received,
            };
            match notification {
                Ok(notification) => match parse_payload(notification.payload()) {
                    Some(change) => feed.publish(change),
                    None => warn!("Ignoring malformed change payload: {}", notification.payload()),
                },
                // `recv` reconnects on the next call after a dropped connection.
                Err(e) => error!("Change feed listener error: {:?}", e),
            }
        }
        info!("Change feed listener stopped.");
    }))
}
