//! Candidate classification and the publishing pipeline
//!
//! For every matched meeting candidate the runner decides whether it is new,
//! changed, or already published, then drives extraction, composition,
//! publication, and the state commit. Failures are isolated per candidate:
//! one bad PDF or one rejected publication never aborts the batch, and a
//! failed candidate leaves no state behind, so it is retried on the next
//! run. That re-evaluation is the only retry mechanism; there is no
//! in-process backoff.

mod note;

pub use note::{NoteComposer, PARTIAL_TAG};

use crate::config::MeetbearConfig;
use crate::error::{Error, Result};
use crate::extract::TextExtractor;
use crate::fingerprint::{fingerprint, Fingerprint, FingerprintMode};
use crate::identity::{IdentityExtractor, MeetingIdentity};
use crate::matcher::{FileRef, FileRole, MeetingCandidate, PairMatcher};
use crate::publish::NotePublisher;
use crate::state::{PublishedRecord, StateStore};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::sync::RwLock;

/// How a candidate relates to the published state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No record exists; both sides present.
    New,

    /// No record exists and one side is missing; published with a partial
    /// marker.
    PartialNew,

    /// A record exists and at least one fingerprint differs.
    Updated,

    /// A record exists and nothing changed; skipped.
    Unchanged,
}

/// Compare a candidate against its published record, if any.
pub fn classify(
    candidate: &MeetingCandidate,
    record: Option<&PublishedRecord>,
) -> Classification {
    let Some(record) = record else {
        return if candidate.is_partial() {
            Classification::PartialNew
        } else {
            Classification::New
        };
    };

    let summary_changed =
        side_fingerprint(&candidate.summary) != record.summary_fingerprint.as_ref();
    let transcript_changed =
        side_fingerprint(&candidate.transcript) != record.transcript_fingerprint.as_ref();

    if summary_changed || transcript_changed {
        Classification::Updated
    } else {
        Classification::Unchanged
    }
}

fn side_fingerprint(side: &Option<FileRef>) -> Option<&Fingerprint> {
    side.as_ref().map(|f| &f.fingerprint)
}

/// Counts from one pipeline pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub scanned: usize,
    pub published: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,

    /// Unparseable or duplicate files skipped during matching.
    pub skipped: usize,

    /// Publishes whose state commit failed afterwards. Loud, because the
    /// next run may republish these meetings.
    pub persistence_failures: usize,
}

impl RunReport {
    pub fn log(&self) {
        tracing::info!(
            scanned = self.scanned,
            published = self.published,
            updated = self.updated,
            unchanged = self.unchanged,
            failed = self.failed,
            skipped = self.skipped,
            "Pipeline pass complete"
        );
        if self.persistence_failures > 0 {
            tracing::error!(
                count = self.persistence_failures,
                "State commits failed after successful publishes; state on disk \
                 is behind Bear and affected notes may be republished"
            );
        }
    }
}

/// Drives the full classify → extract → compose → publish → commit cycle.
///
/// Candidates are processed one at a time so that publication and the state
/// commit for an identity are never racing another publish; the two sides
/// of one candidate are extracted concurrently.
pub struct PipelineRunner {
    summary_dir: PathBuf,
    transcript_dir: PathBuf,
    fingerprint_mode: FingerprintMode,
    matcher: PairMatcher,
    composer: NoteComposer,
    extractor: Arc<dyn TextExtractor>,
    publisher: Arc<dyn NotePublisher>,
    state: Arc<RwLock<StateStore>>,
}

impl PipelineRunner {
    pub fn new(
        config: &MeetbearConfig,
        extractor: Arc<dyn TextExtractor>,
        publisher: Arc<dyn NotePublisher>,
        state: Arc<RwLock<StateStore>>,
    ) -> Self {
        Self {
            summary_dir: config.directories.summary_dir.clone(),
            transcript_dir: config.directories.transcript_dir.clone(),
            fingerprint_mode: config.service.fingerprint,
            matcher: PairMatcher::new(),
            composer: NoteComposer::new(&config.note_format),
            extractor,
            publisher,
            state,
        }
    }

    /// Run one pass over the full configured directory listing.
    pub async fn run_once(&self) -> RunReport {
        let files = self.scan();
        let scanned = files.len();
        tracing::info!(files = scanned, "Scanned watched directories");

        let outcome = self.matcher.match_files(files);
        let mut report = self
            .process(outcome.candidates.into_values().collect())
            .await;
        report.scanned = scanned;
        report.skipped = outcome.unparsed + outcome.duplicates;
        report.log();
        report
    }

    /// Process exactly one explicit summary/transcript pair, regardless of
    /// the watched directories. The identity comes from the summary
    /// filename, falling back to its stem and today's date when the name
    /// matches no known pattern.
    pub async fn run_pair(&self, summary: &Path, transcript: &Path) -> Result<RunReport> {
        let summary_ref = self.file_ref(summary, FileRole::Summary)?;
        let transcript_ref = self.file_ref(transcript, FileRole::Transcript)?;

        let extractor = IdentityExtractor::new();
        let (identity, display_name) = match extractor.extract(summary) {
            Ok(parsed) => (parsed.identity, parsed.display_name),
            Err(e) => {
                tracing::warn!(error = %e, "Summary filename unparseable, using file stem");
                let stem = summary
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("meeting")
                    .to_string();
                (
                    MeetingIdentity::new(Utc::now().date_naive(), &stem),
                    stem,
                )
            }
        };

        let candidate = MeetingCandidate {
            identity,
            display_name,
            summary: Some(summary_ref),
            transcript: Some(transcript_ref),
        };
        let mut report = self.process(vec![candidate]).await;
        report.scanned = 2;
        report.log();
        Ok(report)
    }

    async fn process(&self, candidates: Vec<MeetingCandidate>) -> RunReport {
        let mut report = RunReport::default();
        for candidate in candidates {
            let identity = candidate.identity.clone();
            match self.process_candidate(&candidate).await {
                Ok(Outcome::Skipped) => report.unchanged += 1,
                Ok(Outcome::Published {
                    classification,
                    committed,
                }) => {
                    match classification {
                        Classification::Updated => report.updated += 1,
                        _ => report.published += 1,
                    }
                    if !committed {
                        report.persistence_failures += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(identity = %identity, error = %e, "Candidate failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn process_candidate(&self, candidate: &MeetingCandidate) -> Result<Outcome> {
        let prior = {
            let state = self.state.read().await;
            state.get(&candidate.identity).cloned()
        };
        let classification = classify(candidate, prior.as_ref());

        match classification {
            Classification::Unchanged => {
                tracing::debug!(identity = %candidate.identity, "Unchanged, skipping");
                return Ok(Outcome::Skipped);
            }
            Classification::PartialNew => {
                tracing::info!(
                    identity = %candidate.identity,
                    "One side missing, publishing partial note"
                );
            }
            Classification::New | Classification::Updated => {
                tracing::info!(identity = %candidate.identity, ?classification, "Processing");
            }
        }

        // The two sides are independent: extract them concurrently and keep
        // whichever succeeds.
        let (summary_text, transcript_text) = tokio::join!(
            self.extract_side(candidate.summary.as_ref()),
            self.extract_side(candidate.transcript.as_ref()),
        );
        if summary_text.is_none() && transcript_text.is_none() {
            return Err(Error::Extraction(
                "no side of the meeting could be extracted".to_string(),
            ));
        }

        let note = self.composer.compose(
            &candidate.identity,
            &candidate.display_name,
            summary_text.as_deref(),
            transcript_text.as_deref(),
        );

        let prior_note_id = prior.as_ref().and_then(|r| r.note_id.clone());
        let handle = match prior_note_id.as_deref() {
            Some(id) => self.publisher.update(id, &note).await?,
            None => self.publisher.create(&note).await?,
        };

        // A fingerprint is recorded only for a side that made it into the
        // note; a side that failed extraction stays unrecorded so the next
        // run retries it.
        let record = PublishedRecord {
            identity: candidate.identity.clone(),
            display_name: candidate.display_name.clone(),
            summary_fingerprint: summary_text
                .as_ref()
                .and_then(|_| side_fingerprint(&candidate.summary).cloned()),
            transcript_fingerprint: transcript_text
                .as_ref()
                .and_then(|_| side_fingerprint(&candidate.transcript).cloned()),
            note_id: handle.or(prior_note_id),
            last_published: Utc::now(),
        };

        let committed = {
            let mut state = self.state.write().await;
            state.put(record);
            match state.commit() {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(
                        identity = %candidate.identity,
                        error = %e,
                        "State commit failed AFTER a successful publish; the \
                         note exists in Bear but is not recorded. A later run \
                         may publish it again."
                    );
                    false
                }
            }
        };

        Ok(Outcome::Published {
            classification,
            committed,
        })
    }

    async fn extract_side(&self, side: Option<&FileRef>) -> Option<String> {
        let file = side?;
        match self.extractor.extract_text(&file.path).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(
                    path = %file.path.display(),
                    role = file.role.as_str(),
                    error = %e,
                    "Extraction failed, continuing without this side"
                );
                None
            }
        }
    }

    /// List PDF files in both watched directories, role-tagged by directory.
    fn scan(&self) -> Vec<FileRef> {
        let mut files = Vec::new();
        for (dir, role) in [
            (&self.summary_dir, FileRole::Summary),
            (&self.transcript_dir, FileRole::Transcript),
        ] {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Cannot scan directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let is_pdf = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
                if !is_pdf {
                    continue;
                }
                match self.file_ref(&path, role) {
                    Ok(file) => files.push(file),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping file");
                    }
                }
            }
        }
        files
    }

    fn file_ref(&self, path: &Path, role: FileRole) -> Result<FileRef> {
        let meta = std::fs::metadata(path)?;
        let modified_ms = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(FileRef {
            path: path.to_path_buf(),
            role,
            fingerprint: fingerprint(path, self.fingerprint_mode)?,
            modified_ms,
        })
    }
}

enum Outcome {
    Skipped,
    Published {
        classification: Classification,
        committed: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::Note;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Reads the file as plain text; a file containing "CORRUPT" fails.
    struct PlainTextExtractor;

    #[async_trait]
    impl TextExtractor for PlainTextExtractor {
        async fn extract_text(&self, path: &Path) -> Result<String> {
            let text = std::fs::read_to_string(path)
                .map_err(|e| Error::Extraction(format!("{}: {e}", path.display())))?;
            if text.contains("CORRUPT") {
                return Err(Error::Extraction(format!("{}: corrupt", path.display())));
            }
            Ok(text)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(Note),
        Update(String, Note),
    }

    /// Records publish calls; can be told to reject everything.
    struct RecordingPublisher {
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotePublisher for RecordingPublisher {
        async fn create(&self, note: &Note) -> Result<Option<String>> {
            if self.fail {
                return Err(Error::Publication("app unavailable".to_string()));
            }
            self.calls.lock().unwrap().push(Call::Create(note.clone()));
            Ok(Some("NOTE-1".to_string()))
        }

        async fn update(&self, note_id: &str, note: &Note) -> Result<Option<String>> {
            if self.fail {
                return Err(Error::Publication("app unavailable".to_string()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(note_id.to_string(), note.clone()));
            Ok(Some(note_id.to_string()))
        }
    }

    struct Harness {
        _dir: TempDir,
        summary_dir: PathBuf,
        transcript_dir: PathBuf,
        publisher: Arc<RecordingPublisher>,
        runner: PipelineRunner,
        state: Arc<RwLock<StateStore>>,
    }

    fn harness_with(publisher: RecordingPublisher) -> Harness {
        let dir = TempDir::new().unwrap();
        let summary_dir = dir.path().join("summaries");
        let transcript_dir = dir.path().join("transcripts");
        std::fs::create_dir_all(&summary_dir).unwrap();
        std::fs::create_dir_all(&transcript_dir).unwrap();

        let mut config = MeetbearConfig::default();
        config.directories.summary_dir = summary_dir.clone();
        config.directories.transcript_dir = transcript_dir.clone();
        config.service.state_file = dir.path().join("state.json");

        let state = Arc::new(RwLock::new(
            StateStore::open(config.service.state_file.clone(), 3).unwrap(),
        ));
        let publisher = Arc::new(publisher);
        let runner = PipelineRunner::new(
            &config,
            Arc::new(PlainTextExtractor),
            publisher.clone(),
            state.clone(),
        );

        Harness {
            _dir: dir,
            summary_dir,
            transcript_dir,
            publisher,
            runner,
            state,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingPublisher::new())
    }

    fn write_pair(h: &Harness, summary_text: &str, transcript_text: &str) {
        std::fs::write(h.summary_dir.join("2024-01-15 - Planning.pdf"), summary_text).unwrap();
        std::fs::write(
            h.transcript_dir.join("2024-01-15 - Planning_transcript.pdf"),
            transcript_text,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_new_pair_is_published_and_recorded() {
        let h = harness();
        write_pair(&h, "summary text", "transcript text");

        let report = h.runner.run_once().await;
        assert_eq!(report.published, 1);
        assert_eq!(report.failed, 0);

        let calls = h.publisher.calls();
        assert_eq!(calls.len(), 1);
        let Call::Create(note) = &calls[0] else {
            panic!("expected create, got {calls:?}");
        };
        assert_eq!(note.title, "2024-01-15 - Planning");
        assert!(note.body.contains("summary text"));
        assert!(note.body.contains("--==RAW NOTES==--"));
        assert!(note.body.contains("transcript text"));

        let state = h.state.read().await;
        let records = state.snapshot();
        assert_eq!(records.len(), 1);
        assert!(records[0].summary_fingerprint.is_some());
        assert!(records[0].transcript_fingerprint.is_some());
        assert_eq!(records[0].note_id.as_deref(), Some("NOTE-1"));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let h = harness();
        write_pair(&h, "summary", "transcript");

        let first = h.runner.run_once().await;
        assert_eq!(first.published, 1);

        let second = h.runner.run_once().await;
        assert_eq!(second.published, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(h.publisher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_changed_transcript_triggers_update() {
        let h = harness();
        write_pair(&h, "summary", "transcript v1");
        h.runner.run_once().await;

        std::fs::write(
            h.transcript_dir.join("2024-01-15 - Planning_transcript.pdf"),
            "transcript v2",
        )
        .unwrap();

        let report = h.runner.run_once().await;
        assert_eq!(report.updated, 1);
        assert_eq!(report.published, 0);

        let calls = h.publisher.calls();
        let Call::Update(id, note) = calls.last().unwrap() else {
            panic!("expected update, got {calls:?}");
        };
        assert_eq!(id, "NOTE-1");
        assert!(note.body.contains("transcript v2"));
        assert!(note.body.contains("summary"));
    }

    #[tokio::test]
    async fn test_partial_then_completed() {
        let h = harness();
        std::fs::write(h.summary_dir.join("2024-01-15 - Planning.pdf"), "summary only").unwrap();

        let report = h.runner.run_once().await;
        assert_eq!(report.published, 1);
        let Call::Create(note) = &h.publisher.calls()[0] else {
            panic!("expected create");
        };
        assert!(note.tags.contains(&PARTIAL_TAG.to_string()));

        // Transcript appears later: the candidate reclassifies as Updated
        // and the republished note drops the partial marker.
        std::fs::write(
            h.transcript_dir.join("2024-01-15 - Planning_transcript.pdf"),
            "late transcript",
        )
        .unwrap();

        let report = h.runner.run_once().await;
        assert_eq!(report.updated, 1);
        let calls = h.publisher.calls();
        let Call::Update(_, note) = calls.last().unwrap() else {
            panic!("expected update");
        };
        assert!(!note.tags.contains(&PARTIAL_TAG.to_string()));
        assert!(note.body.contains("late transcript"));
    }

    #[tokio::test]
    async fn test_failed_side_is_retried_next_run() {
        let h = harness();
        write_pair(&h, "CORRUPT", "transcript");

        let report = h.runner.run_once().await;
        // The transcript side still publishes, marked partial.
        assert_eq!(report.published, 1);
        {
            let state = h.state.read().await;
            let record = state.snapshot()[0].clone();
            assert!(record.summary_fingerprint.is_none());
            assert!(record.transcript_fingerprint.is_some());
        }

        // Summary fixed: the unrecorded side makes the candidate Updated.
        std::fs::write(h.summary_dir.join("2024-01-15 - Planning.pdf"), "fixed summary").unwrap();
        let report = h.runner.run_once().await;
        assert_eq!(report.updated, 1);

        let state = h.state.read().await;
        assert!(state.snapshot()[0].summary_fingerprint.is_some());
    }

    #[tokio::test]
    async fn test_both_sides_failing_is_candidate_failure() {
        let h = harness();
        write_pair(&h, "CORRUPT", "CORRUPT");

        let report = h.runner.run_once().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.published, 0);
        let state = h.state.read().await;
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_publication_failure_leaves_no_state() {
        let h = harness_with(RecordingPublisher::failing());
        write_pair(&h, "summary", "transcript");

        let report = h.runner.run_once().await;
        assert_eq!(report.failed, 1);
        let state = h.state.read().await;
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_one_bad_candidate_does_not_block_others() {
        let h = harness();
        write_pair(&h, "summary", "transcript");
        std::fs::write(h.summary_dir.join("2024-01-16 - Retro.pdf"), "CORRUPT").unwrap();

        let report = h.runner.run_once().await;
        assert_eq!(report.published, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_unparseable_files_are_skipped() {
        let h = harness();
        write_pair(&h, "summary", "transcript");
        std::fs::write(h.summary_dir.join("not-an-export.pdf"), "whatever").unwrap();

        let report = h.runner.run_once().await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.published, 1);
    }

    #[tokio::test]
    async fn test_run_pair_with_unparseable_name_falls_back_to_stem() {
        let h = harness();
        let summary = h.summary_dir.join("oddly named.pdf");
        let transcript = h.transcript_dir.join("oddly named too.pdf");
        std::fs::write(&summary, "s").unwrap();
        std::fs::write(&transcript, "t").unwrap();

        let report = h.runner.run_pair(&summary, &transcript).await.unwrap();
        assert_eq!(report.published, 1);

        let Call::Create(note) = &h.publisher.calls()[0] else {
            panic!("expected create");
        };
        assert!(note.title.contains("oddly named"));
    }

    #[test]
    fn test_classify_matrix() {
        use crate::fingerprint::Fingerprint;
        use chrono::NaiveDate;

        let identity = MeetingIdentity::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), "x");
        let file = |fp: &str, role| FileRef {
            path: PathBuf::from("f.pdf"),
            role,
            fingerprint: Fingerprint::Sha256(fp.to_string()),
            modified_ms: 0,
        };
        let full = MeetingCandidate {
            identity: identity.clone(),
            display_name: "x".to_string(),
            summary: Some(file("s1", FileRole::Summary)),
            transcript: Some(file("t1", FileRole::Transcript)),
        };
        let record = |s: Option<&str>, t: Option<&str>| PublishedRecord {
            identity: identity.clone(),
            display_name: "x".to_string(),
            summary_fingerprint: s.map(|v| Fingerprint::Sha256(v.to_string())),
            transcript_fingerprint: t.map(|v| Fingerprint::Sha256(v.to_string())),
            note_id: None,
            last_published: Utc::now(),
        };

        assert_eq!(classify(&full, None), Classification::New);
        assert_eq!(
            classify(&full, Some(&record(Some("s1"), Some("t1")))),
            Classification::Unchanged
        );
        assert_eq!(
            classify(&full, Some(&record(Some("s1"), Some("old")))),
            Classification::Updated
        );
        assert_eq!(
            classify(&full, Some(&record(Some("s1"), None))),
            Classification::Updated
        );

        let partial = MeetingCandidate {
            summary: Some(file("s1", FileRole::Summary)),
            transcript: None,
            ..full.clone()
        };
        assert_eq!(classify(&partial, None), Classification::PartialNew);
        assert_eq!(
            classify(&partial, Some(&record(Some("s1"), None))),
            Classification::Unchanged
        );
    }
}
