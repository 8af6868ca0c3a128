//! Per-user conversation memory with durable JSON persistence.
//!
//! Each user owns a bounded [`ConversationWindow`] holding at most
//! `max_history` turns. State lives in a [`DashMap`] of per-user slots:
//!
//! - appends for one user are serialized by that user's async mutex, so
//!   two concurrent appends never interleave their eviction step;
//! - appends for different users never contend;
//! - reads take a snapshot under a short `parking_lot` read lock and never
//!   wait for a write in progress;
//! - clearing a user drops its slot; clearing an unknown user creates none.
//!
//! Every mutation writes the whole log to `<dir>/<stem>.json` (temp file,
//! fsync, rename) before the new snapshot is published, so a crash loses
//! at most the in-flight append.
//!
//! # File format
//!
//! ```json
//! {
//!   "user_id": "alice",
//!   "messages": [{"role": "user", "content": "...", "timestamp": "..."}],
//!   "created_at": "2024-05-01T12:00:00Z",
//!   "updated_at": "2024-05-01T12:00:05Z"
//! }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use docqa_core::models::ConversationTurn;
use docqa_core::window::ConversationWindow;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_PLAIN_STEM_LEN: usize = 128;

#[derive(Debug, Serialize, Deserialize)]
struct StoredConversation {
    user_id: String,
    messages: Vec<ConversationTurn>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct UserLog {
    window: ConversationWindow,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserLog {
    fn empty(max_history: usize) -> Self {
        let now = Utc::now();
        Self {
            window: ConversationWindow::new(max_history),
            created_at: now,
            updated_at: now,
        }
    }
}

struct UserSlot {
    write: tokio::sync::Mutex<()>,
    log: RwLock<UserLog>,
}

impl UserSlot {
    fn new(log: UserLog) -> Self {
        Self {
            write: tokio::sync::Mutex::new(()),
            log: RwLock::new(log),
        }
    }
}

pub struct ConversationMemory {
    dir: PathBuf,
    max_history: usize,
    users: DashMap<String, Arc<UserSlot>>,
}

impl ConversationMemory {
    /// Open the conversations directory, creating it if needed, and load
    /// every stored log. Logs longer than `max_history` are truncated to
    /// their newest turns. Unreadable files are renamed to `*.corrupt` and
    /// skipped.
    pub fn open(dir: &Path, max_history: usize) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::memory(format!(
                "failed to create conversations directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let memory = Self {
            dir: dir.to_path_buf(),
            max_history: max_history.max(1),
            users: DashMap::new(),
        };

        let entries = std::fs::read_dir(dir).map_err(Error::memory)?;
        for entry in entries {
            let path = entry.map_err(Error::memory)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_file(&path) {
                Ok(stored) => {
                    let log = UserLog {
                        window: ConversationWindow::from_turns(stored.messages, memory.max_history),
                        created_at: stored.created_at,
                        updated_at: stored.updated_at,
                    };
                    memory
                        .users
                        .insert(stored.user_id, Arc::new(UserSlot::new(log)));
                }
                Err(e) => {
                    let aside = path.with_extension("json.corrupt");
                    tracing::warn!(path = %path.display(), error = %e, "moving unreadable conversation file aside");
                    std::fs::rename(&path, &aside).map_err(Error::memory)?;
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            users = memory.users.len(),
            max_history = memory.max_history,
            "conversation memory loaded"
        );
        Ok(memory)
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    fn slot(&self, user_id: &str) -> Arc<UserSlot> {
        self.users
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(UserSlot::new(UserLog::empty(self.max_history))))
            .clone()
    }

    fn is_current(&self, user_id: &str, slot: &Arc<UserSlot>) -> bool {
        self.users
            .get(user_id)
            .is_some_and(|s| Arc::ptr_eq(s.value(), slot))
    }

    /// Append turns to a user's log as one atomic step, evicting the oldest
    /// turns beyond `max_history`. Returns once the log is on disk.
    pub async fn append(&self, user_id: &str, turns: Vec<ConversationTurn>) -> Result<()> {
        if turns.is_empty() {
            return Ok(());
        }
        loop {
            let slot = self.slot(user_id);
            let _guard = slot.write.lock().await;
            // A concurrent clear may have detached this slot while we waited.
            if !self.is_current(user_id, &slot) {
                continue;
            }

            let mut next = slot.log.read().clone();
            if next.window.is_empty() {
                next.created_at = Utc::now();
            }
            let evicted = next.window.extend(turns);
            next.updated_at = Utc::now();

            let stored = StoredConversation {
                user_id: user_id.to_string(),
                messages: next.window.to_vec(),
                created_at: next.created_at,
                updated_at: next.updated_at,
            };
            let path = self.path_for(user_id);
            tokio::task::spawn_blocking(move || write_atomic(&path, &stored))
                .await
                .map_err(Error::memory)??;

            if evicted > 0 {
                tracing::debug!(user_id, evicted, "evicted oldest turns");
            }
            *slot.log.write() = next;
            return Ok(());
        }
    }

    /// The user's turns, oldest first. Unknown users have an empty history.
    pub fn get_history(&self, user_id: &str) -> Vec<ConversationTurn> {
        let slot = match self.users.get(user_id) {
            Some(slot) => Arc::clone(slot.value()),
            None => return Vec::new(),
        };
        let log = slot.log.read();
        log.window.to_vec()
    }

    /// Remove a user's log, its file and its slot. Clearing an unknown user
    /// is a no-op.
    pub async fn clear(&self, user_id: &str) -> Result<()> {
        let Some(slot) = self.users.get(user_id).map(|s| Arc::clone(s.value())) else {
            return Ok(());
        };
        let _guard = slot.write.lock().await;
        if !self.is_current(user_id, &slot) {
            // Cleared by someone else while we waited.
            return Ok(());
        }

        let path = self.path_for(user_id);
        tokio::task::spawn_blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::memory(format!(
                "failed to remove {}: {}",
                path.display(),
                e
            ))),
        })
        .await
        .map_err(Error::memory)??;

        *slot.log.write() = UserLog::empty(self.max_history);
        self.users.remove_if(user_id, |_, s| Arc::ptr_eq(s, &slot));
        tracing::info!(user_id, "conversation cleared");
        Ok(())
    }

    /// Number of users with a non-empty log.
    pub fn known_users(&self) -> usize {
        self.users
            .iter()
            .filter(|entry| !entry.value().log.read().window.is_empty())
            .count()
    }

    /// Sorted ids of users with a non-empty log.
    pub fn list_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .users
            .iter()
            .filter(|entry| !entry.value().log.read().window.is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        users.sort();
        users
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(user_id)))
    }
}

/// File stem for a user id.
///
/// Ids made only of `[A-Za-z0-9_.-]`, not starting with `.` and at most 128
/// characters long, are used as-is. Anything else becomes `=` followed by
/// the hex encoding of the id, which cannot collide with a plain stem.
pub fn file_stem(user_id: &str) -> String {
    let plain = !user_id.is_empty()
        && user_id.len() <= MAX_PLAIN_STEM_LEN
        && !user_id.starts_with('.')
        && user_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'));
    if plain {
        user_id.to_string()
    } else {
        format!("={}", hex::encode(user_id.as_bytes()))
    }
}

fn load_file(path: &Path) -> Result<StoredConversation> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_atomic(path: &Path, stored: &StoredConversation) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        serde_json::to_writer_pretty(&mut file, stored)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();
    result.map_err(|e| Error::memory(format!("failed to write {}: {}", path.display(), e)))
}
