//! In-flight lookup registry
//!
//! Refuses to start a second lookup for a key that is already being searched.
//! Tickets release their key when dropped, whatever way the search ended.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("lookup already in progress for {0}")]
pub struct LookupInProgress(pub String);

#[derive(Debug, Clone, Default)]
pub struct ActiveLookups {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl ActiveLookups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, failing if another lookup holds it
    pub fn begin(&self, key: &str) -> Result<LookupTicket, LookupInProgress> {
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        if !keys.insert(key.to_string()) {
            return Err(LookupInProgress(key.to_string()));
        }

        Ok(LookupTicket {
            key: key.to_string(),
            keys: Arc::clone(&self.keys),
        })
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held for the duration of one lookup
#[derive(Debug)]
pub struct LookupTicket {
    key: String,
    keys: Arc<Mutex<HashSet<String>>>,
}

impl LookupTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LookupTicket {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}
