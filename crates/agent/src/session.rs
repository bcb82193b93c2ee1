//! Keyed session store with per-session locking and idle expiry.
//!
//! The map itself sits behind a short-lived `std` mutex that is only held
//! to look up or insert an entry. Each session has its own async mutex, so
//! two messages on one session are serialized while different sessions
//! never wait on each other. The sweeper removes a session only when it is
//! idle *and* nobody holds or is waiting for it.

use admitline_core::intent::{Entities, Intent};
use admitline_core::message::{Message, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::contact::DialogueState;

/// Conversation state for one session id.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    /// Conversation history, oldest first.
    pub messages: Vec<Message>,
    /// Open contact dialogue, if any.
    pub dialogue: Option<DialogueState>,
    /// Intent of the last classified message.
    pub last_intent: Option<Intent>,
    /// Entities of the last cutoff question, for follow-ups.
    pub cutoff_entities: Option<Entities>,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl Session {
    fn new(id: SessionId) -> Self {
        let now = Instant::now();
        Self {
            id,
            messages: Vec::new(),
            dialogue: None,
            last_intent: None,
            cutoff_entities: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Append a user/assistant exchange, keeping at most `max_messages`.
    pub fn record_exchange(&mut self, user: Message, assistant: Message, max_messages: usize) {
        self.messages.push(user);
        self.messages.push(assistant);
        if self.messages.len() > max_messages {
            let excess = self.messages.len() - max_messages;
            self.messages.drain(..excess);
        }
        self.touch();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}

/// Exclusive access to one session. The lock is released on drop, even if
/// the request holding it is cancelled.
pub type SessionGuard = OwnedMutexGuard<Session>;

/// Shared map from session id to session.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<AsyncMutex<Session>>>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), idle_timeout }
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<Session>>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lock a session, creating it on first use. Waits only for other
    /// requests on the same session.
    pub async fn acquire(&self, id: &SessionId) -> SessionGuard {
        let slot = {
            let mut map = self.map();
            map.entry(id.as_str().to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(Session::new(id.clone()))))
                .clone()
        };
        let mut guard = slot.lock_owned().await;
        guard.touch();
        guard
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.map().contains_key(id)
    }

    /// Remove sessions idle longer than the timeout. Sessions that are
    /// locked, or that a request is about to lock, are skipped until a later
    /// sweep. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut map = self.map();
        let before = map.len();
        map.retain(|_, slot| {
            // Another holder of the Arc is mid-request or queued for the lock.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(session) => session.idle_for(now) < self.idle_timeout,
                Err(_) => true,
            }
        });
        let removed = before - map.len();
        if removed > 0 {
            debug!(removed, remaining = map.len(), "expired idle sessions");
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) on a fixed interval until the store is
    /// dropped by everyone else.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.sweep();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::parse(Some(s)).unwrap()
    }

    #[tokio::test]
    async fn acquire_creates_once() {
        let store = SessionStore::new(Duration::from_secs(60));
        {
            let mut s = store.acquire(&sid("a")).await;
            s.messages.push(Message::user("hi"));
        }
        let s = store.acquire(&sid("a")).await;
        assert_eq!(s.messages.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn history_is_capped() {
        let mut s = Session::new(sid("a"));
        for i in 0..15 {
            s.record_exchange(Message::user(format!("q{i}")), Message::assistant(format!("a{i}")), 20);
        }
        assert_eq!(s.messages.len(), 20);
        assert_eq!(s.messages[0].content, "q5");
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_idle_sessions() {
        let store = SessionStore::new(Duration::from_secs(60));
        drop(store.acquire(&sid("old")).await);
        tokio::time::advance(Duration::from_secs(45)).await;
        drop(store.acquire(&sid("fresh")).await);
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(store.sweep(), 1);
        assert!(!store.contains("old"));
        assert!(store.contains("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_defers_sessions_in_use() {
        let store = SessionStore::new(Duration::from_secs(60));
        let guard = store.acquire(&sid("busy")).await;
        tokio::time::advance(Duration::from_secs(120)).await;

        assert_eq!(store.sweep(), 0);
        assert!(store.contains("busy"));

        drop(guard);
        assert_eq!(store.sweep(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn same_session_is_serialized() {
        let store = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let guard = store.acquire(&sid("s")).await;

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut s = store.acquire(&sid("s")).await;
                s.messages.push(Message::user("second"));
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        // Waiting requests keep the session alive through a sweep.
        tokio::time::advance(Duration::from_secs(120)).await;
        drop(guard);
        assert_eq!(store.sweep(), 0);

        waiter.await.unwrap();
        assert_eq!(store.acquire(&sid("s")).await.messages.len(), 1);
    }

    #[tokio::test]
    async fn different_sessions_do_not_block() {
        let store = SessionStore::new(Duration::from_secs(60));
        let _a = store.acquire(&sid("a")).await;
        let b = tokio::time::timeout(Duration::from_millis(100), store.acquire(&sid("b"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_expires_sessions() {
        let store = Arc::new(SessionStore::new(Duration::from_secs(10)));
        drop(store.acquire(&sid("a")).await);
        let handle = store.spawn_sweeper(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(store.is_empty());
        handle.abort();
    }
}
