//! Player event fan-out.
//!
//! Each listener gets its own bounded queue and dispatch thread, so a slow
//! listener delays only itself and events reach every listener in the order
//! they were emitted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::warn;

use super::{PlayerState, Track};

/// Notifications published by a [`super::Player`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StateChanged(PlayerState),
    TrackChanged(Track),
    PositionChanged(Duration),
    VolumeChanged(f32),
    TrackFinished(Track),
    Error(String),
}

/// Handle returned by `subscribe`, required to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    sender: SyncSender<PlayerEvent>,
    handle: JoinHandle<()>,
}

pub(crate) struct EventBus {
    next_id: AtomicU64,
    capacity: usize,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&PlayerEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::sync_channel::<PlayerEvent>(self.capacity);
        let handle = thread::Builder::new()
            .name(format!("waveline-events-{}", id.0))
            .spawn(move || {
                while let Ok(event) = receiver.recv() {
                    listener(&event);
                }
            });

        match handle {
            Ok(handle) => {
                self.subscribers.lock().unwrap().push(Subscriber {
                    id,
                    sender,
                    handle,
                });
            }
            Err(err) => warn!("failed to spawn event dispatch thread: {}", err),
        }
        id
    }

    /// Stop delivery to `id`. Events already queued are still delivered.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap();
        match subscribers.iter().position(|s| s.id == id) {
            Some(index) => {
                // Dropping the sender ends the dispatch thread once it drains.
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Queue `event` for every listener without blocking.
    pub(crate) fn emit(&self, event: PlayerEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|subscriber| match subscriber.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    "event queue full for listener {}, dropping {:?}",
                    subscriber.id.0, dropped
                );
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Drop every listener and wait for their queues to drain.
    pub(crate) fn close(&self) {
        let subscribers: Vec<Subscriber> = self.subscribers.lock().unwrap().drain(..).collect();
        let current = thread::current().id();
        for subscriber in subscribers {
            let Subscriber { sender, handle, .. } = subscriber;
            drop(sender);
            // A listener closing the player from its own callback cannot
            // join itself.
            if handle.thread().id() != current && handle.join().is_err() {
                warn!("event listener panicked");
            }
        }
    }
}
