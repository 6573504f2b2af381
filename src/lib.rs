//! meetbear - Meeting transcription exports to Bear.app notes
//!
//! meetbear watches a pair of directories for PDF exports of recorded
//! meetings (an AI-written summary and a raw transcript per meeting), joins
//! the two files belonging to the same meeting, and publishes one combined
//! note per meeting to Bear.app. Published content is fingerprinted and
//! recorded in a durable state file, so every meeting is published exactly
//! once per content version no matter how often the pipeline runs.
//!
//! ## Pipeline
//!
//! ```text
//! summary dir ──┐
//!               ├─► scan ─► match pairs ─► classify ─► extract text
//! transcript ───┘              │               │            │
//!     dir                 (by date+name)  (against state)   ▼
//!                                               │      compose note
//!                                               │            │
//!                                               ▼            ▼
//!                                         skip unchanged  publish to Bear
//!                                                            │
//!                                                            ▼
//!                                                    commit state file
//! ```
//!
//! ## Modules
//!
//! - [`identity`]: Meeting identity extraction from export filenames
//! - [`matcher`]: Pairing summary and transcript files into candidates
//! - [`fingerprint`]: Content fingerprinting for change detection
//! - [`state`]: Durable record of published meetings, with backups
//! - [`extract`]: PDF text extraction
//! - [`pipeline`]: Classification, note composition, and the run loop
//! - [`publish`]: Bear.app x-callback-url publication
//! - [`watch`]: Debounced watch mode scheduling
//! - [`config`]: Configuration management

pub mod config;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod identity;
pub mod matcher;
pub mod pipeline;
pub mod publish;
pub mod state;
pub mod watch;

pub use config::MeetbearConfig;
pub use error::{Error, Result};
pub use identity::MeetingIdentity;
pub use pipeline::{Classification, PipelineRunner, RunReport};
pub use state::{PublishedRecord, StateStore};
