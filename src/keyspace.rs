use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

type BinaryData = Vec<u8>;
type Expiry = Option<Instant>;

/// The primary's/replica's in-memory key-value store. Expiration is lazy:
/// a key past its TTL is evicted the next time it's looked up, never by a
/// background sweep.
#[derive(Default)]
pub struct Keyspace {
    store: RwLock<HashMap<BinaryData, (BinaryData, Expiry)>>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<BinaryData> {
        if let Some((_, Some(expiry))) = self.store.read().unwrap().get(key) {
            if *expiry < Instant::now() {
                self.store.write().unwrap().remove(key);
                return None;
            }
        }
        self.store.read().unwrap().get(key).map(|(value, _)| value.clone())
    }

    pub fn set(&self, key: &[u8], value: &[u8], expiry_ms: Option<u64>) {
        let expiry = expiry_ms
            .map(Duration::from_millis)
            .and_then(|ttl| Instant::now().checked_add(ttl));
        self.store
            .write()
            .unwrap()
            .insert(key.to_vec(), (value.to_vec(), expiry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn get_returns_none_for_missing_key() {
        let keyspace = Keyspace::new();
        assert_eq!(keyspace.get(b"missing"), None);
    }

    #[test]
    fn set_then_get_round_trips() {
        let keyspace = Keyspace::new();
        keyspace.set(b"foo", b"bar", None);
        assert_eq!(keyspace.get(b"foo"), Some(b"bar".to_vec()));
    }

    #[test]
    fn key_expires_after_its_ttl() {
        let keyspace = Keyspace::new();
        keyspace.set(b"foo", b"bar", Some(10));
        sleep(Duration::from_millis(30));
        assert_eq!(keyspace.get(b"foo"), None);
    }

    #[test]
    fn set_without_expiry_never_expires() {
        let keyspace = Keyspace::new();
        keyspace.set(b"foo", b"bar", None);
        sleep(Duration::from_millis(20));
        assert_eq!(keyspace.get(b"foo"), Some(b"bar".to_vec()));
    }
}
