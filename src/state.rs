//! Durable record of published meetings
//!
//! The store is a JSON file mapping meeting identity keys to
//! [`PublishedRecord`]s. Commits are atomic: the new state is written to a
//! temporary file and renamed over the canonical one, so a reader never
//! observes a torn write. Before each replace the previous canonical file is
//! rotated into numbered backups (`state.json.1` is the newest), keeping at
//! most `backup_count` of them. A corrupt canonical file is recovered from
//! the newest readable backup at load time.

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::identity::MeetingIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Persisted record of one published meeting.
///
/// Born on the first successful publish of an identity, fingerprints updated
/// on every successful republish. The pipeline never deletes records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedRecord {
    pub identity: MeetingIdentity,

    /// Meeting name as it appeared in the note title.
    pub display_name: String,

    /// Fingerprint of the summary file at publish time, if one was present.
    pub summary_fingerprint: Option<Fingerprint>,

    /// Fingerprint of the transcript file at publish time, if one was present.
    pub transcript_fingerprint: Option<Fingerprint>,

    /// Opaque note handle returned by the publisher, when it has one.
    pub note_id: Option<String>,

    pub last_published: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    records: BTreeMap<String, PublishedRecord>,
}

const STATE_VERSION: u32 = 1;

/// Mapping from meeting identity to its published record, backed by a JSON
/// file. All mutation goes through `put` + `commit`; callers serialize
/// access by owning the store behind a lock.
pub struct StateStore {
    path: PathBuf,
    backup_count: usize,
    records: BTreeMap<String, PublishedRecord>,
}

impl StateStore {
    /// Open the store at `path`, creating parent directories as needed and
    /// loading any previously committed state.
    pub fn open(path: PathBuf, backup_count: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Persistence(format!("create {}: {e}", parent.display())))?;
        }

        let mut store = Self {
            path,
            backup_count,
            records: BTreeMap::new(),
        };
        store.load()?;
        Ok(store)
    }

    pub fn get(&self, identity: &MeetingIdentity) -> Option<&PublishedRecord> {
        self.records.get(&identity.key())
    }

    /// Insert or replace the record for an identity. In-memory only until
    /// the next `commit`.
    pub fn put(&mut self, record: PublishedRecord) {
        self.records.insert(record.identity.key(), record);
    }

    /// All records in identity-key order.
    pub fn snapshot(&self) -> Vec<&PublishedRecord> {
        self.records.values().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Durably persist the current in-memory state.
    ///
    /// Writes to a temporary file and atomically renames it over the
    /// canonical path; the prior canonical file is rotated into the backup
    /// slots between the two steps. The temp write comes first so a commit
    /// that fails there leaves every backup slot untouched; repeated failed
    /// commits must not drain the retained versions an operator would
    /// hand-recover from. On failure the previously committed file is
    /// untouched.
    pub fn commit(&self) -> Result<()> {
        let file = StateFile {
            version: STATE_VERSION,
            records: self.records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::Persistence(format!("serialize state: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| Error::Persistence(format!("write {}: {e}", tmp.display())))?;

        self.rotate_backups()?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Persistence(format!("replace {}: {e}", self.path.display())))?;

        tracing::debug!(
            path = %self.path.display(),
            records = self.records.len(),
            "State committed"
        );
        Ok(())
    }

    fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "No state file, starting empty");
            return Ok(());
        }

        match Self::read_state_file(&self.path) {
            Ok(file) => {
                self.records = file.records;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "State file unreadable, trying backups"
                );
                self.restore_from_backup()
            }
        }
    }

    fn read_state_file(path: &Path) -> Result<StateFile> {
        let data = std::fs::read_to_string(path)?;
        let file: StateFile = serde_json::from_str(&data)?;
        Ok(file)
    }

    /// Load the newest readable backup, if any. Starting empty is the last
    /// resort; it risks republishing meetings, so it is reported loudly.
    fn restore_from_backup(&mut self) -> Result<()> {
        for slot in 1..=self.backup_count {
            let backup = self.backup_path(slot);
            if !backup.exists() {
                continue;
            }
            match Self::read_state_file(&backup) {
                Ok(file) => {
                    tracing::info!(
                        backup = %backup.display(),
                        records = file.records.len(),
                        "Recovered state from backup"
                    );
                    self.records = file.records;
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(backup = %backup.display(), error = %e, "Backup unreadable");
                }
            }
        }

        tracing::error!(
            path = %self.path.display(),
            "State file and all backups unreadable; starting empty. \
             Already-published meetings may be republished."
        );
        self.records = BTreeMap::new();
        Ok(())
    }

    /// Shift `state.json.N` backups down one slot and copy the current
    /// canonical file into slot 1.
    fn rotate_backups(&self) -> Result<()> {
        if self.backup_count == 0 || !self.path.exists() {
            return Ok(());
        }

        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            std::fs::remove_file(&oldest)
                .map_err(|e| Error::Persistence(format!("remove {}: {e}", oldest.display())))?;
        }
        for slot in (1..self.backup_count).rev() {
            let from = self.backup_path(slot);
            if from.exists() {
                let to = self.backup_path(slot + 1);
                std::fs::rename(&from, &to)
                    .map_err(|e| Error::Persistence(format!("rotate {}: {e}", from.display())))?;
            }
        }
        let newest = self.backup_path(1);
        std::fs::copy(&self.path, &newest)
            .map_err(|e| Error::Persistence(format!("backup {}: {e}", newest.display())))?;
        Ok(())
    }

    fn backup_path(&self, slot: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{slot}"));
        PathBuf::from(name)
    }
}
