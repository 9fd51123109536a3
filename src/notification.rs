use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument};

/// How long a notification stays visible unless dismissed.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// Handle returned by [`NotificationQueue::post`].
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, derive_more::Display,
)]
#[display("#{_0}")]
pub struct NotificationId(u64);

/// Severity of a user-facing status message.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, strum_macros::Display, strum_macros::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing status message.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Notification {
    id: NotificationId,
    message: String,
    kind: NotificationKind,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl Notification {
    #[must_use]
    pub fn id(&self) -> NotificationId {
        self.id
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    #[must_use]
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

#[derive(Debug)]
struct Entry {
    notification: Notification,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    entries: VecDeque<Entry>,
}

impl QueueState {
    fn prune(&mut self, now: Instant) {
        while self
            .entries
            .front()
            .is_some_and(|entry| entry.expires_at <= now)
        {
            self.entries.pop_front();
        }
    }

    fn remove(&mut self, id: NotificationId) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.notification.id == id)
        else {
            return false;
        };
        self.entries.remove(index);
        true
    }
}

/// Ordered, auto-expiring queue of status messages.
///
/// Cheap to clone; every clone posts into the same queue. Posting never
/// awaits, so any component may post from any context.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    state: Arc<Mutex<QueueState>>,
    ttl: Duration,
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}

impl NotificationQueue {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            ttl,
        }
    }

    /// Appends a notification and schedules its removal after the queue TTL.
    #[instrument(skip(self, message), level = "debug", fields(%kind))]
    pub fn post(&self, message: impl Into<String>, kind: NotificationKind) -> NotificationId {
        let message = message.into();
        let expires_at = Instant::now() + self.ttl;
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = NotificationId(state.next_id);
            state.entries.push_back(Entry {
                notification: Notification {
                    id,
                    message: message.clone(),
                    kind,
                    created_at: OffsetDateTime::now_utc(),
                },
                expires_at,
            });
            id
        };
        info!(%id, %kind, %message, "notification posted");

        if let Ok(runtime) = Handle::try_current() {
            runtime.spawn(expire_after(Arc::downgrade(&self.state), id, self.ttl));
        }
        id
    }

    /// Removes a notification early. Returns `false` when it already expired.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        let removed = self.lock().remove(id);
        debug!(%id, removed, "notification dismissed");
        removed
    }

    /// Returns live notifications, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Notification> {
        let mut state = self.lock();
        state.prune(Instant::now());
        state
            .entries
            .iter()
            .map(|entry| entry.notification.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn expire_after(state: Weak<Mutex<QueueState>>, id: NotificationId, ttl: Duration) {
    sleep(ttl).await;
    if let Some(state) = state.upgrade() {
        let removed = state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed {
            debug!(%id, "notification expired");
        }
    }
}
