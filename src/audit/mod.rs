//! Audit log — append-only record of every request outcome.
//!
//! Entries land in an in-memory ring buffer (for UI queries and
//! statistics) and on a write queue that a background flusher drains
//! every five seconds into per-day JSON-lines files:
//!
//!   `<audit_dir>/audit-YYYY-MM-DD.json`   (one JSON object per line)
//!
//! Designed for graceful degradation: a failed file write is logged to
//! the debug channel and the entries are dropped — audit problems must
//! never take the vault down with them.  On startup the tail of today's
//! file is reloaded so a restart does not lose the visible window.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::authz::Action;
use crate::errors::Result;

/// Actor name recorded when the server runs without authentication.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// Actor id recorded when the server runs without authentication.
pub const ANONYMOUS_ID: &str = "N/A";

/// Actor name recorded for requests that failed authentication.
pub const INVALID_NAME: &str = "Invalid";

/// Default size of the in-memory ring buffer.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Interval between background flushes.
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub api_key_name: String,
    pub api_key_id: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuditEntry {
    pub fn new(
        api_key_name: impl Into<String>,
        api_key_id: impl Into<String>,
        action: Action,
        secret_key: Option<String>,
        success: bool,
        error_message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            api_key_name: api_key_name.into(),
            api_key_id: api_key_id.into(),
            action,
            secret_key,
            success,
            error_message,
        }
    }

    /// Entry for an unauthenticated-mode request.
    pub fn anonymous(
        action: Action,
        secret_key: Option<String>,
        success: bool,
        error_message: Option<String>,
    ) -> Self {
        Self::new(ANONYMOUS_NAME, ANONYMOUS_ID, action, secret_key, success, error_message)
    }
}

/// Aggregate statistics over the in-memory window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditStats {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub unique_api_keys: usize,
    pub unique_secret_keys: usize,
    pub by_action: BTreeMap<String, usize>,
    pub by_api_key: BTreeMap<String, usize>,
    /// The ten most-accessed secret keys, most frequent first.
    pub top_secrets: Vec<(String, usize)>,
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

struct Shared {
    dir: PathBuf,
    capacity: usize,
    recent: Mutex<VecDeque<AuditEntry>>,
    queue: Mutex<Vec<AuditEntry>>,
    /// `true` once shutdown is requested; paired with `wake` so the
    /// flusher can be woken early.
    stop: Mutex<bool>,
    wake: Condvar,
}

/// Concurrent-safe handle to the audit pipeline.  Cheap to clone; all
/// clones share one ring buffer, queue, and flusher thread.
#[derive(Clone)]
pub struct AuditLog {
    shared: Arc<Shared>,
    flusher: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AuditLog {
    /// Open the audit log rooted at `dir`, reloading the tail of today's
    /// file and starting the background flusher.
    pub fn open(dir: &Path, capacity: usize) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let recent = load_tail(&file_for(dir, Utc::now()), capacity);

        let shared = Arc::new(Shared {
            dir: dir.to_path_buf(),
            capacity,
            recent: Mutex::new(recent),
            queue: Mutex::new(Vec::new()),
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("arca-audit-flush".into())
            .spawn(move || flusher_loop(&worker))?;

        Ok(Self {
            shared,
            flusher: Arc::new(Mutex::new(Some(handle))),
        })
    }

    /// Record an entry.  Never blocks on I/O and never fails the caller.
    pub fn record(&self, entry: AuditEntry) {
        {
            let mut recent = self.shared.recent.lock().expect("audit lock");
            if recent.len() == self.shared.capacity {
                recent.pop_front();
            }
            recent.push_back(entry.clone());
        }
        self.shared.queue.lock().expect("audit lock").push(entry);
    }

    /// Drain the queue to disk right now.
    pub fn flush(&self) {
        drain_queue(&self.shared);
    }

    /// The most recent `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<AuditEntry> {
        let recent = self.shared.recent.lock().expect("audit lock");
        let skip = recent.len().saturating_sub(n);
        recent.iter().skip(skip).cloned().collect()
    }

    /// Statistics over the in-memory window.
    pub fn statistics(&self) -> AuditStats {
        let recent = self.shared.recent.lock().expect("audit lock");

        let mut stats = AuditStats {
            total: recent.len(),
            ..AuditStats::default()
        };
        let mut key_names = HashSet::new();
        let mut secret_keys = HashSet::new();
        let mut secret_counts: BTreeMap<String, usize> = BTreeMap::new();

        for entry in recent.iter() {
            if entry.success {
                stats.successes += 1;
            } else {
                stats.failures += 1;
            }
            key_names.insert(entry.api_key_name.clone());
            *stats.by_action.entry(entry.action.name().to_string()).or_default() += 1;
            *stats.by_api_key.entry(entry.api_key_name.clone()).or_default() += 1;
            if let Some(secret) = &entry.secret_key {
                secret_keys.insert(secret.clone());
                *secret_counts.entry(secret.clone()).or_default() += 1;
            }
        }

        stats.unique_api_keys = key_names.len();
        stats.unique_secret_keys = secret_keys.len();

        let mut ranked: Vec<(String, usize)> = secret_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(10);
        stats.top_secrets = ranked;

        stats
    }

    /// Stop the flusher and write out everything still queued.  Entries
    /// that fail to write at this point are dropped (the drain logs them
    /// to the debug channel).
    pub fn shutdown(&self) {
        {
            let mut stop = self.shared.stop.lock().expect("audit lock");
            *stop = true;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.flusher.lock().expect("audit lock").take() {
            let _ = handle.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Flusher
// ---------------------------------------------------------------------------

fn flusher_loop(shared: &Shared) {
    loop {
        {
            let stop = shared.stop.lock().expect("audit lock");
            if *stop {
                break;
            }
            // Wait for the next tick or an early shutdown wake-up.
            let _unused = shared
                .wake
                .wait_timeout(stop, FLUSH_INTERVAL)
                .expect("audit lock");
        }
        drain_queue(shared);
    }

    // Final synchronous flush on the way out.
    drain_queue(shared);
}

fn drain_queue(shared: &Shared) {
    let pending: Vec<AuditEntry> = {
        let mut queue = shared.queue.lock().expect("audit lock");
        std::mem::take(&mut *queue)
    };
    if pending.is_empty() {
        return;
    }

    // Entries near midnight may span two files; group by day.
    let mut by_file: BTreeMap<PathBuf, Vec<&AuditEntry>> = BTreeMap::new();
    for entry in &pending {
        by_file
            .entry(file_for(&shared.dir, entry.timestamp))
            .or_default()
            .push(entry);
    }

    for (path, entries) in by_file {
        if let Err(e) = append_entries(&path, &entries) {
            debug!(path = %path.display(), error = %e, dropped = entries.len(),
                "audit flush failed, dropping entries");
        }
    }
}

fn append_entries(path: &Path, entries: &[&AuditEntry]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for entry in entries {
        let line = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(file, "{line}")?;
    }
    Ok(())
}

fn file_for(dir: &Path, timestamp: DateTime<Utc>) -> PathBuf {
    dir.join(format!("audit-{}.json", timestamp.format("%Y-%m-%d")))
}

/// Load up to `capacity` trailing entries from a day file.  Unparseable
/// lines are skipped.
fn load_tail(path: &Path, capacity: usize) -> VecDeque<AuditEntry> {
    let mut tail = VecDeque::with_capacity(capacity);
    let Ok(file) = fs::File::open(path) else {
        return tail;
    };

    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(entry) = serde_json::from_str::<AuditEntry>(&line) {
            if tail.len() == capacity {
                tail.pop_front();
            }
            tail.push_back(entry);
        }
    }
    tail
}
