// src/utils/cache.rs

//! Single-slot TTL cache owned by the service that uses it.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Holds one value for at most `ttl`.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    slot: Mutex<Option<(Instant, T)>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Cached value if it has not expired.
    pub fn get(&self) -> Option<T> {
        let guard = self.slot.lock().ok()?;
        match guard.as_ref() {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    pub fn put(&self, value: T) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some((Instant::now(), value));
        }
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = None;
        }
    }
}
