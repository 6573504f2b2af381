//! Note composition
//!
//! Builds the published note from extracted section texts: title from the
//! configured template, summary and transcript sections joined by the
//! configured separator, and the configured tag set. A note missing one
//! side carries an extra `partial` tag so the gap is visible in Bear; the
//! tag disappears on the republish that fills the gap, since updates
//! replace the whole note.

use crate::config::NoteFormatConfig;
use crate::identity::MeetingIdentity;
use crate::publish::Note;

/// Tag marking a note that is missing its summary or transcript side.
pub const PARTIAL_TAG: &str = "partial";

/// Composes notes from extracted meeting text.
pub struct NoteComposer {
    title_template: String,
    separator: String,
    tags: Vec<String>,
}

impl NoteComposer {
    pub fn new(format: &NoteFormatConfig) -> Self {
        Self {
            title_template: format.title_template.clone(),
            separator: format.separator.clone(),
            tags: format.tags.clone(),
        }
    }

    /// Build the note for one meeting from whichever sections are present.
    ///
    /// Callers guarantee at least one section. Section order is fixed:
    /// summary, separator, transcript.
    pub fn compose(
        &self,
        identity: &MeetingIdentity,
        display_name: &str,
        summary_text: Option<&str>,
        transcript_text: Option<&str>,
    ) -> Note {
        let mut sections = Vec::new();
        if let Some(text) = summary_text {
            sections.push(format!("## Summary\n\n{}", text.trim()));
        }
        if let Some(text) = transcript_text {
            sections.push(format!("## Transcript\n\n{}", text.trim()));
        }
        let body = sections.join(&format!("\n\n{}\n\n", self.separator));

        let mut tags = self.tags.clone();
        if summary_text.is_none() || transcript_text.is_none() {
            tags.push(PARTIAL_TAG.to_string());
        }

        Note {
            title: self.title(identity, display_name),
            body,
            tags,
        }
    }

    fn title(&self, identity: &MeetingIdentity, display_name: &str) -> String {
        self.title_template
            .replace("{date}", &identity.date.format("%Y-%m-%d").to_string())
            .replace("{name}", display_name)
            .replace("{meeting_name}", display_name)
    }
}
