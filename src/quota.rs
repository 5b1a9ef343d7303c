use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stable identifiers for the rate-limited operations. Logically grouped
/// actions share one key; URL variants do not get their own entries.
pub mod keys {
    pub const CREATE_TWEET: &str = "POST /2/tweets";
    pub const DELETE_TWEET: &str = "DELETE /2/tweets/:id";
    pub const LIKE: &str = "POST /2/users/:id/likes";
    pub const UNLIKE: &str = "DELETE /2/users/:id/likes/:tweet_id";
    pub const SEARCH: &str = "GET /2/tweets/search/recent";
    pub const GET_TWEET: &str = "GET /2/tweets/:id";
    pub const ME: &str = "GET /2/users/me";
    pub const USER_BY_USERNAME: &str = "GET /2/users/by/username";
    pub const USER_TWEETS: &str = "GET /2/users/:id/tweets";
    pub const HOME_TIMELINE: &str = "GET /2/users/:id/timelines/reverse_chronological";
}

const DAY_SECS: i64 = 24 * 60 * 60;
const QUARTER_HOUR_SECS: i64 = 15 * 60;

/// Documented per-endpoint limits for the free API tier, seeded before any
/// authoritative response has been observed for an endpoint.
fn default_limit(key: &str) -> (u32, i64) {
    match key {
        keys::CREATE_TWEET | keys::DELETE_TWEET => (17, DAY_SECS),
        keys::LIKE | keys::UNLIKE => (50, DAY_SECS),
        keys::ME | keys::USER_BY_USERNAME => (25, DAY_SECS),
        keys::SEARCH | keys::GET_TWEET | keys::USER_TWEETS | keys::HOME_TIMELINE => {
            (1, QUARTER_HOUR_SECS)
        }
        // Undocumented endpoints start optimistic on a short window and are
        // corrected by the first authoritative response.
        _ => (15, QUARTER_HOUR_SECS),
    }
}

/// Tracked quota state for one endpoint. Timestamps are integer epoch
/// seconds so the persisted form round-trips exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointQuota {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64,
    pub last_updated: i64,
}

impl EndpointQuota {
    fn fresh(key: &str, now: i64) -> Self {
        let (limit, window) = default_limit(key);
        Self {
            limit,
            remaining: limit,
            reset_at: now + window,
            last_updated: now,
        }
    }

    /// Window expiry trusts the local wall clock: the instant `now` reaches
    /// `reset_at` the quota is treated as freshly reset, without waiting for
    /// a confirming response.
    fn roll_window_if_expired(&mut self, key: &str, now: i64) {
        if now >= self.reset_at {
            let (_, window) = default_limit(key);
            self.remaining = self.limit;
            self.reset_at = now + window;
            self.last_updated = now;
        }
    }
}

/// The whole persisted mapping, written as one JSON document.
pub type QuotaLedger = BTreeMap<String, EndpointQuota>;

/// Answer to "may this call proceed now?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Blocked { wait_secs: u64, reset_at: i64 },
}

/// Per-endpoint request accounting, persisted across runs because the remote
/// window clock is independent of the local process lifetime. Every
/// read-modify-write runs under an exclusive file lock so another process
/// sharing the same credential cannot corrupt the ledger or race for the
/// last remaining call.
#[derive(Debug, Clone)]
pub struct QuotaTracker {
    path: PathBuf,
    lock_path: PathBuf,
}

impl QuotaTracker {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("quota.json"),
            lock_path: state_dir.join("quota.json.lock"),
        }
    }

    /// Evaluate whether a call to `key` may proceed now. On permit the
    /// remaining count is decremented speculatively and persisted before any
    /// network round trip, so a burst of calls within one process cannot all
    /// believe they have room.
    pub fn check_and_reserve(&self, key: &str) -> Result<Decision> {
        self.check_and_reserve_at(key, Utc::now().timestamp())
    }

    pub fn check_and_reserve_at(&self, key: &str, now: i64) -> Result<Decision> {
        self.with_ledger(|ledger| {
            let entry = ledger
                .entry(key.to_string())
                .or_insert_with(|| EndpointQuota::fresh(key, now));
            entry.roll_window_if_expired(key, now);
            if entry.remaining == 0 {
                return Decision::Blocked {
                    wait_secs: (entry.reset_at - now).max(0) as u64,
                    reset_at: entry.reset_at,
                };
            }
            entry.remaining -= 1;
            entry.last_updated = now;
            Decision::Allowed
        })
    }

    /// Absorb the authoritative quota fields from a completed call's
    /// response. Always overwrites speculative local state; idempotent under
    /// repeated identical calls.
    pub fn record_outcome(
        &self,
        key: &str,
        limit: Option<u32>,
        remaining: u32,
        reset_at: i64,
    ) -> Result<()> {
        let now = Utc::now().timestamp();
        self.with_ledger(|ledger| {
            let entry = ledger
                .entry(key.to_string())
                .or_insert_with(|| EndpointQuota::fresh(key, now));
            if let Some(limit) = limit {
                entry.limit = limit;
            }
            entry.remaining = remaining;
            entry.reset_at = reset_at;
            entry.last_updated = now;
        })
    }

    /// The server rejected a call local bookkeeping predicted room for
    /// (clock drift, or another client on the same credential). Adopt the
    /// server's reset and zero the window.
    pub fn record_rejection(&self, key: &str, reset_at: i64) -> Result<()> {
        let now = Utc::now().timestamp();
        self.with_ledger(|ledger| {
            let entry = ledger
                .entry(key.to_string())
                .or_insert_with(|| EndpointQuota::fresh(key, now));
            entry.remaining = 0;
            entry.reset_at = reset_at;
            entry.last_updated = now;
        })
    }

    /// Read-only copy of the current ledger, for display.
    pub fn snapshot(&self) -> Result<QuotaLedger> {
        self.with_ledger(|ledger| ledger.clone())
    }

    /// Lock, load, mutate, atomically rewrite. The lock file is a sibling of
    /// the ledger because the ledger inode is replaced on every write.
    fn with_ledger<T>(&self, f: impl FnOnce(&mut QuotaLedger) -> T) -> Result<T> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Storage {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| Error::Storage {
                path: self.lock_path.clone(),
                source: e,
            })?;
        lock_file.lock_exclusive().map_err(|e| Error::Storage {
            path: self.lock_path.clone(),
            source: e,
        })?;

        let mut ledger = self.load_ledger();
        let out = f(&mut ledger);
        self.store_ledger(&ledger)?;
        // Lock released when lock_file drops.
        Ok(out)
    }

    /// Unparsable or missing ledger degrades to empty: entries are re-seeded
    /// from the defaults table, which is conservative for a fresh window.
    fn load_ledger(&self) -> QuotaLedger {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return QuotaLedger::new(),
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                return QuotaLedger::new();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(
                    "Discarding unparsable quota ledger {}: {}",
                    self.path.display(),
                    e
                );
                QuotaLedger::new()
            }
        }
    }

    fn store_ledger(&self, ledger: &QuotaLedger) -> Result<()> {
        let payload = serde_json::to_string_pretty(ledger).map_err(|e| Error::Storage {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload).map_err(|e| Error::Storage {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::Storage {
            path: self.path.clone(),
            source: e,
        })
    }
}
