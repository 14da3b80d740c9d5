//! Client transaction identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared across every generator so ids stay unique within the process
static SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Client transaction id (`<clTRID>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl TransactionId {
    /// Wrap an existing id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces `<prefix>-<unix seconds>-<sequence>` ids
#[derive(Debug, Clone)]
pub struct TransactionIdGenerator {
    prefix: String,
}

impl Default for TransactionIdGenerator {
    fn default() -> Self {
        Self::new("CLI")
    }
}

impl TransactionIdGenerator {
    /// Create a generator with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Prefix of every id from this generator
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next id; strictly increasing sequence number across the process
    pub fn next_id(&self) -> TransactionId {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        TransactionId(format!("{}-{}-{}", self.prefix, secs, seq))
    }
}
