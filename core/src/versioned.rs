//! Append-only versioned rows with merge-on-read.
//!
//! Writers never modify a row. An insert appends `(value, version, +1)`.
//! An update appends a tombstone for the prior version and a live row for
//! the next one. A delete appends only the tombstone. Readers fold the log
//! per key: the highest version wins, and at equal versions the tombstone
//! wins.

use std::collections::HashMap;
use std::hash::Hash;

/// A value tagged with its version and liveness.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
    pub tombstone: bool,
}

impl<T> Versioned<T> {
    pub fn live(value: T, version: u64) -> Self {
        Self {
            value,
            version,
            tombstone: false,
        }
    }

    pub fn tombstone(value: T, version: u64) -> Self {
        Self {
            value,
            version,
            tombstone: true,
        }
    }

    /// Decode the `sign` column convention: `1` live, `-1` tombstone.
    pub fn from_sign(value: T, version: u64, sign: i8) -> Self {
        Self {
            value,
            version,
            tombstone: sign < 0,
        }
    }

    /// Encode liveness as a `sign` column value.
    pub fn sign(&self) -> i8 {
        if self.tombstone { -1 } else { 1 }
    }

    fn supersedes(&self, other: &Self) -> bool {
        self.version > other.version || (self.version == other.version && self.tombstone)
    }
}

/// Result of folding every row written for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct Collapsed<T> {
    /// The current row, unless the key was deleted.
    pub live: Option<Versioned<T>>,

    /// Highest version ever written, tombstones included.
    pub max_version: u64,
}

impl<T> Collapsed<T> {
    /// Version to use for the next write of this key.
    pub fn next_version(&self) -> u64 {
        self.max_version + 1
    }
}

/// Fold an append-only log into the latest state per key.
pub fn collapse<K, T>(rows: impl IntoIterator<Item = (K, Versioned<T>)>) -> HashMap<K, Collapsed<T>>
where
    K: Eq + Hash,
{
    let mut winners: HashMap<K, Versioned<T>> = HashMap::new();
    for (key, row) in rows {
        let wins = winners
            .get(&key)
            .is_none_or(|current| row.supersedes(current));
        if wins {
            winners.insert(key, row);
        }
    }

    winners
        .into_iter()
        .map(|(key, winner)| {
            let max_version = winner.version;
            let live = (!winner.tombstone).then_some(winner);
            (key, Collapsed { live, max_version })
        })
        .collect()
}

/// Only the live values, keyed by identifier.
pub fn collapse_latest<K, T>(rows: impl IntoIterator<Item = (K, Versioned<T>)>) -> HashMap<K, T>
where
    K: Eq + Hash,
{
    collapse(rows)
        .into_iter()
        .filter_map(|(key, collapsed)| collapsed.live.map(|row| (key, row.value)))
        .collect()
}
