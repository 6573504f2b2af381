//! Pairing of summary and transcript files into meeting candidates

use crate::fingerprint::Fingerprint;
use crate::identity::{IdentityExtractor, MeetingIdentity};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Which side of a meeting a file describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Summary,
    Transcript,
}

impl FileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRole::Summary => "summary",
            FileRole::Transcript => "transcript",
        }
    }
}

/// A discovered file, tagged with its role and content fingerprint.
#[derive(Debug, Clone)]
pub struct FileRef {
    pub path: PathBuf,
    pub role: FileRole,
    pub fingerprint: Fingerprint,

    /// Modification time in Unix milliseconds; used only to resolve
    /// duplicate files claiming the same role for one identity.
    pub modified_ms: u64,
}

/// A matched (possibly partial) pair of files for one meeting.
///
/// At least one of `summary` / `transcript` is always present; the matcher
/// never constructs an empty candidate.
#[derive(Debug, Clone)]
pub struct MeetingCandidate {
    pub identity: MeetingIdentity,

    /// Meeting name as written in a filename, for the note title.
    pub display_name: String,

    pub summary: Option<FileRef>,
    pub transcript: Option<FileRef>,
}

impl MeetingCandidate {
    /// True when one side of the pair has not appeared yet.
    pub fn is_partial(&self) -> bool {
        self.summary.is_none() || self.transcript.is_none()
    }
}

/// Result of one matching pass over a batch of files.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    /// Candidates keyed by identity, in deterministic order.
    pub candidates: BTreeMap<MeetingIdentity, MeetingCandidate>,

    /// Files skipped because their names matched no known pattern.
    pub unparsed: usize,

    /// Redundant files ignored because a newer file claimed the same role.
    pub duplicates: usize,
}

/// Groups files by meeting identity into candidates.
pub struct PairMatcher {
    extractor: IdentityExtractor,
}

impl PairMatcher {
    pub fn new() -> Self {
        Self {
            extractor: IdentityExtractor::new(),
        }
    }

    /// Group a batch of role-tagged files into meeting candidates.
    ///
    /// Unparseable filenames and duplicate-role files are skipped with a
    /// warning, never failing the batch. A role token in the filename itself
    /// overrides the directory-derived role, so a transcript dropped into
    /// the summary directory still lands on the right side.
    pub fn match_files(&self, files: Vec<FileRef>) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        for mut file in files {
            let parsed = match self.extractor.extract(&file.path) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "Skipping file");
                    outcome.unparsed += 1;
                    continue;
                }
            };
            if let Some(hint) = parsed.role_hint {
                file.role = hint;
            }

            let candidate = outcome
                .candidates
                .entry(parsed.identity.clone())
                .or_insert_with(|| MeetingCandidate {
                    identity: parsed.identity.clone(),
                    display_name: parsed.display_name.clone(),
                    summary: None,
                    transcript: None,
                });

            let slot = match file.role {
                FileRole::Summary => &mut candidate.summary,
                FileRole::Transcript => &mut candidate.transcript,
            };
            match slot {
                Some(existing) if existing.modified_ms >= file.modified_ms => {
                    tracing::warn!(
                        identity = %parsed.identity,
                        role = file.role.as_str(),
                        kept = %existing.path.display(),
                        ignored = %file.path.display(),
                        "Duplicate ignored"
                    );
                    outcome.duplicates += 1;
                }
                Some(existing) => {
                    tracing::warn!(
                        identity = %parsed.identity,
                        role = file.role.as_str(),
                        kept = %file.path.display(),
                        ignored = %existing.path.display(),
                        "Duplicate ignored"
                    );
                    outcome.duplicates += 1;
                    *existing = file;
                }
                None => *slot = Some(file),
            }
        }

        outcome
    }
}

impl Default for PairMatcher {
    fn default() -> Self {
        Self::new()
    }
}
