use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tracing::debug;

/// Reset tokens are accepted for one hour, matching the copy in the reset
/// email.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

/// Generate an opaque single-use reset token: 256 bits from the OS RNG,
/// URL-safe base64 without padding.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Clone)]
struct ResetEntry {
    email: String,
    created_at: OffsetDateTime,
}

/// In-process store mapping reset token -> requesting email. All mutation
/// goes through one mutex; the lock is never held across an await.
#[derive(Clone, Default)]
pub struct ResetTokenStore {
    inner: Arc<Mutex<HashMap<String, ResetEntry>>>,
}

impl ResetTokenStore {
    pub fn insert(&self, token: String, email: String) {
        self.insert_at(token, email, OffsetDateTime::now_utc());
    }

    fn insert_at(&self, token: String, email: String, created_at: OffsetDateTime) {
        let mut map = self.inner.lock().expect("reset token store poisoned");
        map.insert(token, ResetEntry { email, created_at });
    }

    /// Resolve a token to its email. Entries past the TTL are evicted and
    /// treated as absent.
    pub fn lookup(&self, token: &str) -> Option<String> {
        let mut map = self.inner.lock().expect("reset token store poisoned");
        let (email, created_at) = {
            let entry = map.get(token)?;
            (entry.email.clone(), entry.created_at)
        };
        if OffsetDateTime::now_utc() - created_at > RESET_TOKEN_TTL {
            debug!("reset token expired, evicting");
            map.remove(token);
            return None;
        }
        Some(email)
    }

    /// Delete a token, returning whether it was present. Single use is
    /// enforced here: exactly one caller observes `true`.
    pub fn remove(&self, token: &str) -> bool {
        let mut map = self.inner.lock().expect("reset token store poisoned");
        map.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("reset token store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lookup_remove() {
        let store = ResetTokenStore::default();
        store.insert("tok-1".into(), "a@x.com".into());
        assert_eq!(store.lookup("tok-1").as_deref(), Some("a@x.com"));
        assert!(store.remove("tok-1"));
        assert_eq!(store.lookup("tok-1"), None);
        assert!(!store.remove("tok-1"));
    }

    #[test]
    fn lookup_unknown_token_is_none() {
        let store = ResetTokenStore::default();
        assert_eq!(store.lookup("never-issued"), None);
    }

    #[test]
    fn lookup_is_not_consuming() {
        let store = ResetTokenStore::default();
        store.insert("tok".into(), "a@x.com".into());
        assert!(store.lookup("tok").is_some());
        assert!(store.lookup("tok").is_some());
    }

    #[test]
    fn expired_entries_are_evicted() {
        let store = ResetTokenStore::default();
        store.insert_at(
            "stale".into(),
            "a@x.com".into(),
            OffsetDateTime::now_utc() - Duration::hours(2),
        );
        assert_eq!(store.lookup("stale"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn entries_within_ttl_survive() {
        let store = ResetTokenStore::default();
        store.insert_at(
            "recent".into(),
            "a@x.com".into(),
            OffsetDateTime::now_utc() - Duration::minutes(59),
        );
        assert_eq!(store.lookup("recent").as_deref(), Some("a@x.com"));
    }

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_ne!(a, b);
        // 32 bytes -> 43 base64 chars without padding
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn concurrent_consumption_is_single_use() {
        let store = ResetTokenStore::default();
        store.insert("contested".into(), "a@x.com".into());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.remove("contested") }));
        }

        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_do_not_lose_entries() {
        let store = ResetTokenStore::default();
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(format!("tok-{i}"), format!("user{i}@x.com"));
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.len(), 50);
        assert_eq!(store.lookup("tok-7").as_deref(), Some("user7@x.com"));
    }
}
