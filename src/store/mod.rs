//! # Record Store Module
//!
//! In-memory mapping from id to submitted secret. Ids are allocated from a
//! counter advanced under the store's write lock, so they run 1, 2, 3, ...
//! with no gaps or reuse, and a record is in the map before its id is handed
//! back to anyone.
//!
//! A record's digest is only served once the record is at least
//! [`MIN_RECORD_AGE_SECS`] old according to the store's [`Clock`].

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use crate::crypto::digest_secret;
use crate::error::{HashServerError, Result};
use crate::MIN_RECORD_AGE_SECS;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

/// A submitted secret. Write-once.
#[derive(Clone)]
pub struct Record {
    /// 1-based id
    pub id: u64,
    /// Raw secret bytes
    pub secret: Arc<[u8]>,
    /// Unix timestamp (seconds) at insertion
    pub submitted_at: u64,
}

impl Record {
    /// Seconds elapsed since submission, saturating at zero
    #[must_use]
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.submitted_at)
    }
}

// Secrets stay out of logs
impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("secret", &format_args!("<{} bytes>", self.secret.len()))
            .field("submitted_at", &self.submitted_at)
            .finish()
    }
}

/// Thread-safe record store
#[derive(Debug)]
pub struct RecordStore {
    records: RwLock<HashMap<u64, Record>>,
    /// Last id handed out; only advanced while `records` is write-locked
    last_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl RecordStore {
    /// Create an empty store backed by the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store backed by `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            last_id: AtomicU64::new(0),
            clock,
        }
    }

    /// Store `secret` and return its id
    ///
    /// ## Errors
    /// - `HashServerError::EmptyInput` if `secret` is empty; no id is consumed
    pub fn submit(&self, secret: &[u8]) -> Result<u64> {
        if secret.is_empty() {
            return Err(HashServerError::empty_input());
        }

        let secret: Arc<[u8]> = Arc::from(secret);
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        let id = self.last_id.load(Ordering::Acquire) + 1;
        let record = Record {
            id,
            secret,
            submitted_at: self.clock.now(),
        };
        trace!(?record, "Inserting record");
        records.insert(id, record);
        self.last_id.store(id, Ordering::Release);

        Ok(id)
    }

    /// Return the digest of record `id`
    ///
    /// The digest is recomputed on every call.
    ///
    /// ## Errors
    /// - `HashServerError::NotFound` if `id` is 0 or has not been issued
    /// - `HashServerError::NotReady` if the record is younger than
    ///   [`MIN_RECORD_AGE_SECS`]
    pub fn retrieve(&self, id: u64) -> Result<String> {
        let record = self.get(id).ok_or_else(|| HashServerError::not_found(id))?;

        // A clock behind `submitted_at` reads as age 0, so the retry hint
        // is the full delay and may undershoot once the clock recovers.
        let age = record.age(self.clock.now());
        if age < MIN_RECORD_AGE_SECS {
            debug!(id, age, "Record not old enough");
            return Err(HashServerError::not_ready(id, MIN_RECORD_AGE_SECS - age));
        }

        Ok(digest_secret(&record.secret))
    }

    /// Copy of record `id`, if it exists
    #[must_use]
    pub fn get(&self, id: u64) -> Option<Record> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Number of records stored
    #[must_use]
    pub fn len(&self) -> u64 {
        self.last_id.load(Ordering::Acquire)
    }

    /// Whether no record has been stored yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    const ANGRY_MONKEY_DIGEST: &str =
        "ZEHhWB65gUlzdVwtDQArEyx-KVLzp_aTaRaPlBzYRIFj6vjFdqEb0Q5B8zVKCZ0vKbZPZklJz0Fd7su2A-gf7Q==";

    fn store_at(start: u64) -> (Arc<ManualClock>, RecordStore) {
        let clock = Arc::new(ManualClock::new(start));
        let store = RecordStore::with_clock(clock.clone());
        (clock, store)
    }

    #[test]
    fn test_ids_start_at_one() {
        let (_, store) = store_at(1_000);
        assert!(store.is_empty());
        assert_eq!(store.submit(b"a").unwrap(), 1);
        assert_eq!(store.submit(b"b").unwrap(), 2);
        assert_eq!(store.submit(b"c").unwrap(), 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_submitted_at_uses_store_clock() {
        let (clock, store) = store_at(1_000);
        let first = store.submit(b"a").unwrap();
        clock.advance(3);
        let second = store.submit(b"b").unwrap();

        assert_eq!(store.get(first).unwrap().submitted_at, 1_000);
        assert_eq!(store.get(second).unwrap().submitted_at, 1_003);
    }

    #[test]
    fn test_empty_secret_does_not_allocate() {
        let (_, store) = store_at(1_000);
        assert!(matches!(store.submit(b""), Err(HashServerError::EmptyInput)));
        assert_eq!(store.len(), 0);
        assert_eq!(store.submit(b"x").unwrap(), 1);
    }

    #[test]
    fn test_retrieve_not_found() {
        let (clock, store) = store_at(1_000);
        store.submit(b"a").unwrap();
        clock.advance(60);

        assert!(matches!(store.retrieve(0), Err(HashServerError::NotFound { id: 0 })));
        assert!(matches!(store.retrieve(2), Err(HashServerError::NotFound { id: 2 })));
        assert!(matches!(
            store.retrieve(u64::MAX),
            Err(HashServerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_retrieve_not_ready_until_threshold() {
        let (clock, store) = store_at(1_000);
        let id = store.submit(b"angryMonkey").unwrap();

        match store.retrieve(id) {
            Err(HashServerError::NotReady { retry_after_secs, .. }) => {
                assert_eq!(retry_after_secs, 5);
            }
            other => panic!("expected NotReady, got {other:?}"),
        }

        clock.advance(4);
        match store.retrieve(id) {
            Err(HashServerError::NotReady { retry_after_secs, .. }) => {
                assert_eq!(retry_after_secs, 1);
            }
            other => panic!("expected NotReady, got {other:?}"),
        }

        clock.advance(1);
        assert_eq!(store.retrieve(id).unwrap(), ANGRY_MONKEY_DIGEST);
    }

    #[test]
    fn test_retrieve_is_idempotent() {
        let (clock, store) = store_at(1_000);
        let id = store.submit(b"angryMonkey").unwrap();
        clock.advance(10);

        let first = store.retrieve(id).unwrap();
        clock.advance(1_000);
        let second = store.retrieve(id).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, ANGRY_MONKEY_DIGEST);
    }

    #[test]
    fn test_clock_going_backwards_is_not_ready() {
        let (clock, store) = store_at(1_000);
        let id = store.submit(b"a").unwrap();
        clock.set(10);

        assert!(matches!(store.retrieve(id), Err(HashServerError::NotReady { .. })));
    }

    #[test]
    fn test_record_debug_hides_secret() {
        let (_, store) = store_at(1_000);
        let id = store.submit(b"hunter2").unwrap();
        let debug = format!("{:?}", store.get(id).unwrap());

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("7 bytes"));
    }

    #[test]
    fn test_concurrent_submissions_get_contiguous_ids() {
        let (_, store) = store_at(1_000);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    (0..250)
                        .map(|i| store.submit(format!("secret-{t}-{i}").as_bytes()).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let unique: HashSet<u64> = ids.iter().copied().collect();

        assert_eq!(ids.len(), 2_000);
        assert_eq!(unique.len(), 2_000);
        assert_eq!(unique, (1..=2_000).collect::<HashSet<u64>>());
        assert_eq!(store.len(), 2_000);
    }

    #[test]
    fn test_issued_ids_are_always_visible() {
        let (_, store) = store_at(1_000);
        let store = Arc::new(store);

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..500 {
                    store.submit(format!("s{i}").as_bytes()).unwrap();
                }
            })
        };

        // Every id at or below the observed length must already be readable
        for _ in 0..500 {
            let len = store.len();
            if len > 0 {
                assert!(store.get(len).is_some());
            }
        }

        writer.join().unwrap();
        assert_eq!(store.len(), 500);
    }
}
