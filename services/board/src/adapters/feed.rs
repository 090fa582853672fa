//! services/board/src/adapters/feed.rs
//!
//! The change feed dispatcher: a single task owning every subscription,
//! driven by one command channel. Change sources (the Postgres listener, the
//! in-memory store) publish into the same channel, so a subscription is always
//! registered before any change sent after it.

use futures::channel::mpsc as notify;
use secretboard_core::ports::{ChangeFeed, FeedFilter, RowChange, Subscription, SubscriptionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

enum FeedCommand {
    Subscribe {
        id: SubscriptionId,
        filter: FeedFilter,
        notifier: notify::UnboundedSender<()>,
    },
    Unsubscribe(SubscriptionId),
    Change(RowChange),
    Count(oneshot::Sender<usize>),
}

/// A cloneable handle onto the dispatcher task.
#[derive(Clone)]
pub struct ChangeFeedDispatcher {
    commands: mpsc::UnboundedSender<FeedCommand>,
    next_id: Arc<AtomicU64>,
}

impl ChangeFeedDispatcher {
    /// Spawns the dispatcher task. It stops once every handle and subscription is gone.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(dispatch(receiver));
        let dispatcher = Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (dispatcher, task)
    }

    /// Reports a row-level change to every matching subscriber.
    pub fn publish(&self, change: RowChange) {
        let _ = self.commands.send(FeedCommand::Change(change));
    }

    /// Number of live subscriptions, as seen by the dispatcher.
    pub async fn subscriber_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(FeedCommand::Count(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

impl ChangeFeed for ChangeFeedDispatcher {
    fn subscribe(&self, filter: FeedFilter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (notifier, events) = notify::unbounded();
        let _ = self.commands.send(FeedCommand::Subscribe {
            id,
            filter,
            notifier,
        });

        let commands = self.commands.clone();
        Subscription::new(
            id,
            filter,
            events,
            Arc::new(move |id| {
                let _ = commands.send(FeedCommand::Unsubscribe(id));
            }),
        )
    }
}

async fn dispatch(mut commands: mpsc::UnboundedReceiver<FeedCommand>) {
    let mut subscribers: HashMap<SubscriptionId, (FeedFilter, notify::UnboundedSender<()>)> =
        HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            FeedCommand::Subscribe {
                id,
                filter,
                notifier,
            } => {
                debug!(id, ?filter, "Change feed subscription added.");
                subscribers.insert(id, (filter, notifier));
            }
            FeedCommand::Unsubscribe(id) => {
                if subscribers.remove(&id).is_some() {
                    debug!(id, "Change feed subscription removed.");
                }
            }
            FeedCommand::Change(change) => {
                // Receivers that went away without unsubscribing are pruned here.
                subscribers.retain(|_, (filter, notifier)| {
                    !filter.matches(&change) || notifier.unbounded_send(()).is_ok()
                });
            }
            FeedCommand::Count(reply) => {
                let _ = reply.send(subscribers.len());
            }
        }
    }

    info!("Change feed dispatcher stopped.");
}
