//! Task identifiers.
//!
//! Ids are textual and carry their creation instant up front
//! (`task_<UTC timestamp>_<random suffix>`), so a plain lexical sort over
//! ids from one producer roughly follows submission order. Uniqueness is
//! enforced against the document at submission, not assumed from entropy
//! alone.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of the random suffix.
const SUFFIX_LEN: usize = 8;

/// Alphabet for the random suffix (lowercase base36).
const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identifier of a task. Globally unique within one queue document and never
/// reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generate a fresh id for the given instant: `task_YYYYMMDDHHMMSS_` plus
    /// an 8-character random suffix.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self(format!("task_{}_{}", now.format("%Y%m%d%H%M%S"), suffix))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generated_id_has_expected_shape() {
        let now = Utc.with_ymd_and_hms(2026, 8, 28, 12, 34, 56).unwrap();
        let id = TaskId::generate(now);

        let s = id.as_str();
        assert!(s.starts_with("task_20260828123456_"));
        assert_eq!(s.len(), "task_20260828123456_".len() + SUFFIX_LEN);

        let suffix = &s[s.len() - SUFFIX_LEN..];
        assert!(suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
    }

    #[test]
    fn generated_ids_differ_in_suffix() {
        let now = Utc::now();
        let a = TaskId::generate(now);
        let b = TaskId::generate(now);
        // Same timestamp, different random suffix (collision odds 36^-8).
        assert_ne!(a, b);
    }

    #[test]
    fn id_serializes_as_a_bare_string() {
        let id = TaskId::new("task_x");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"task_x\"");
    }
}
