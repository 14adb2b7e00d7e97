use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;

use crate::models::ChatMessage;

type Sessions = LruCache<String, VecDeque<ChatMessage>>;

/// Short-term conversation windows keyed by session id.
///
/// Each window keeps the most recent `max_turns` messages. The number of
/// sessions is bounded too: the least recently used session is dropped when
/// a new one would exceed `capacity`. Nothing is persisted.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<Sessions>>,
    max_turns: usize,
}

impl SessionStore {
    pub fn new(capacity: usize, max_turns: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Arc::new(Mutex::new(LruCache::new(capacity))),
            max_turns: max_turns.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends one message, evicting the oldest when the window is full.
    /// Returns the window length afterwards.
    pub fn append(&self, session_id: &str, message: ChatMessage) -> usize {
        let mut sessions = self.lock();
        let window = sessions.get_or_insert_mut(session_id.to_string(), VecDeque::new);
        window.push_back(message);
        while window.len() > self.max_turns {
            window.pop_front();
        }
        window.len()
    }

    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.lock()
            .get(session_id)
            .map(|window| window.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_bounded_fifo() {
        let store = SessionStore::new(10, 12);
        for i in 0..12 {
            assert_eq!(store.append("s", ChatMessage::user(format!("m{i}"))), i + 1);
        }
        assert_eq!(store.append("s", ChatMessage::user("m12")), 12);

        let history = store.history("s");
        assert_eq!(history.len(), 12);
        assert_eq!(history[0].content, "m1");
        assert_eq!(history[11].content, "m12");
    }

    #[test]
    fn test_sessions_are_isolated_and_lru_bounded() {
        let store = SessionStore::new(2, 12);
        store.append("a", ChatMessage::user("hello from a"));
        store.append("b", ChatMessage::user("hello from b"));
        assert_eq!(store.history("a").len(), 1);

        // "a" was touched last, so "b" is evicted.
        store.append("c", ChatMessage::user("hello from c"));
        assert_eq!(store.session_count(), 2);
        assert!(store.history("b").is_empty());
        assert_eq!(store.history("a")[0].content, "hello from a");
    }

    #[test]
    fn test_unknown_session_is_empty() {
        let store = SessionStore::new(0, 0);
        assert!(store.history("nope").is_empty());
        assert_eq!(store.append("x", ChatMessage::user("1")), 1);
        assert_eq!(store.append("x", ChatMessage::user("2")), 1);
    }
}
