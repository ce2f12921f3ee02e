//! Posting rate limiter keyed by client address

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct SpamGuard {
    block_for: Duration,
    posts: Mutex<HashMap<String, Instant>>,
}

impl SpamGuard {
    pub fn new(block_for: Duration) -> Self {
        Self {
            block_for,
            posts: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `key` may post now; a successful check opens a new block window
    pub fn can_post(&self, key: &str) -> bool {
        self.can_post_at(key, Instant::now())
    }

    fn can_post_at(&self, key: &str, now: Instant) -> bool {
        let mut posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());

        // Lazy cleanup on every call
        posts.retain(|_, expires| *expires > now);

        if posts.contains_key(key) {
            return false;
        }
        posts.insert(key.to_string(), now + self.block_for);
        true
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.posts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_within_window() {
        let guard = SpamGuard::new(Duration::from_secs(30));
        let start = Instant::now();

        assert!(guard.can_post_at("10.0.0.1", start));
        assert!(!guard.can_post_at("10.0.0.1", start + Duration::from_secs(5)));
        assert!(guard.can_post_at("10.0.0.2", start + Duration::from_secs(5)));
        assert!(guard.can_post_at("10.0.0.1", start + Duration::from_secs(31)));
    }

    #[test]
    fn test_expired_entries_are_purged() {
        let guard = SpamGuard::new(Duration::from_secs(1));
        let start = Instant::now();

        for i in 0..10 {
            assert!(guard.can_post_at(&format!("client-{i}"), start));
        }
        assert_eq!(guard.tracked(), 10);

        assert!(guard.can_post_at("late", start + Duration::from_secs(2)));
        assert_eq!(guard.tracked(), 1);
    }

    #[test]
    fn test_public_entry_point() {
        let guard = SpamGuard::new(Duration::from_secs(60));
        assert!(guard.can_post("127.0.0.1"));
        assert!(!guard.can_post("127.0.0.1"));
    }
}
