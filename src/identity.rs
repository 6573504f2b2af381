//! Meeting identity extraction from export filenames
//!
//! Two filename shapes are recognized:
//!
//! ```text
//! Chad Walters and Makaela Gradowski-summary-2025-03-04T16-17-00.058Z.pdf
//! 2024-01-15 - Planning.pdf            (summary)
//! 2024-01-15 - Planning_transcript.pdf (transcript)
//! ```
//!
//! Both reduce to the same identity key: the calendar date plus the
//! normalized meeting name. Time-of-day in the export timestamp is ignored
//! so that a summary and transcript written a few seconds apart still match.

use crate::error::{Error, Result};
use crate::matcher::FileRole;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Stable identity of one meeting: calendar date plus normalized name.
///
/// Equality on this type is the join key between summary and transcript
/// files. The name is case-folded with collapsed whitespace so trivial
/// renames still match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeetingIdentity {
    /// Meeting date
    pub date: NaiveDate,

    /// Normalized meeting name
    pub name: String,
}

impl MeetingIdentity {
    pub fn new(date: NaiveDate, raw_name: &str) -> Self {
        Self {
            date,
            name: normalize_name(raw_name),
        }
    }

    /// Stable string key used in the persisted state map.
    pub fn key(&self) -> String {
        format!("{}|{}", self.date.format("%Y-%m-%d"), self.name)
    }
}

impl fmt::Display for MeetingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.name)
    }
}

/// Result of parsing one filename.
#[derive(Debug, Clone)]
pub struct ExtractedIdentity {
    pub identity: MeetingIdentity,

    /// Meeting name as written in the filename, for note titles.
    pub display_name: String,

    /// Role encoded in the filename itself, when present. Files that only
    /// carry a role through their directory have no hint.
    pub role_hint: Option<FileRole>,
}

/// Parses export filenames into meeting identities.
pub struct IdentityExtractor {
    /// `<name>-<role>-<iso timestamp>.pdf`
    name_first: Regex,

    /// `<date> - <name>[_transcript].pdf`
    date_first: Regex,
}

impl IdentityExtractor {
    pub fn new() -> Self {
        Self {
            name_first: Regex::new(
                r"(?i)^(?P<name>.*?)[-_ ]+(?P<role>summary|transcript)[-_ ]+(?P<date>\d{4}-\d{2}-\d{2})T\d{2}-\d{2}-\d{2}\.\d{3}Z\.pdf$",
            )
            .expect("name-first pattern is valid"),
            date_first: Regex::new(
                r"(?i)^(?P<date>\d{4}-\d{2}-\d{2})[-_ ]+(?P<name>.+?)(?P<suffix>[-_ ](?:summary|transcript))?\.pdf$",
            )
            .expect("date-first pattern is valid"),
        }
    }

    /// Parse a file path into a meeting identity.
    ///
    /// Returns `Error::Pattern` when the filename matches neither shape;
    /// callers skip the file and continue with the rest of the batch.
    pub fn extract(&self, path: &Path) -> Result<ExtractedIdentity> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Pattern(format!("not a UTF-8 filename: {}", path.display())))?;

        if let Some(caps) = self.name_first.captures(file_name) {
            let date = parse_date(&caps["date"], file_name)?;
            let raw_name = caps["name"].trim();
            return Ok(ExtractedIdentity {
                identity: MeetingIdentity::new(date, raw_name),
                display_name: raw_name.to_string(),
                role_hint: role_from_token(&caps["role"]),
            });
        }

        if let Some(caps) = self.date_first.captures(file_name) {
            let date = parse_date(&caps["date"], file_name)?;
            let raw_name = caps["name"].trim();
            let role_hint = caps
                .name("suffix")
                .and_then(|s| role_from_token(s.as_str().trim_start_matches(['-', '_', ' '])));
            return Ok(ExtractedIdentity {
                identity: MeetingIdentity::new(date, raw_name),
                display_name: raw_name.to_string(),
                role_hint,
            });
        }

        Err(Error::Pattern(format!(
            "filename does not match any known export pattern: {file_name}"
        )))
    }
}

impl Default for IdentityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_date(token: &str, file_name: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .map_err(|e| Error::Pattern(format!("invalid date in {file_name}: {e}")))
}

fn role_from_token(token: &str) -> Option<FileRole> {
    match token.to_ascii_lowercase().as_str() {
        "summary" => Some(FileRole::Summary),
        "transcript" => Some(FileRole::Transcript),
        _ => None,
    }
}

/// Case-fold and collapse whitespace so equivalent names compare equal.
fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
