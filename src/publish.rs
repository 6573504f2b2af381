//! Note publication to Bear.app
//!
//! Bear has no API beyond its `x-callback-url` scheme, so publication is
//! fire-and-forget: the URL is handed to the macOS `open` command and a zero
//! exit status is the only confirmation. There is no read-back; the note
//! handle is whatever identifier can be derived locally, which for `create`
//! is usually nothing.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::process::Command;

/// A composed note ready for publication.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

/// Creates and updates notes in an external note-taking application.
#[async_trait]
pub trait NotePublisher: Send + Sync {
    /// Create a new note. Returns an opaque note handle when the publisher
    /// has one; `None` otherwise.
    async fn create(&self, note: &Note) -> Result<Option<String>>;

    /// Replace the content of an existing note identified by `note_id`.
    async fn update(&self, note_id: &str, note: &Note) -> Result<Option<String>>;
}

/// Publisher driving Bear.app through its x-callback-url scheme.
pub struct BearPublisher;

impl BearPublisher {
    pub fn new() -> Self {
        Self
    }

    fn callback_url(action: &str, params: &BTreeMap<&str, String>) -> String {
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("bear://x-callback-url/{action}?{query}")
    }

    /// Tags go at the end of the body as `#tag` words; that is how Bear
    /// attaches tags through the URL scheme.
    fn body_with_tags(note: &Note) -> String {
        if note.tags.is_empty() {
            return note.body.clone();
        }
        let tags = note
            .tags
            .iter()
            .map(|t| format!("#{}", t.trim()))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}\n\n{tags}", note.body)
    }

    async fn open(&self, url: String) -> Result<()> {
        // -g keeps Bear in the background instead of stealing focus.
        let status = Command::new("open")
            .arg("-g")
            .arg(&url)
            .status()
            .await
            .map_err(|e| Error::Publication(format!("failed to run open: {e}")))?;

        if !status.success() {
            return Err(Error::Publication(format!(
                "open exited with {status}; is Bear installed?"
            )));
        }
        Ok(())
    }
}

impl Default for BearPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotePublisher for BearPublisher {
    async fn create(&self, note: &Note) -> Result<Option<String>> {
        let mut params = BTreeMap::new();
        params.insert("title", note.title.clone());
        params.insert("text", Self::body_with_tags(note));
        params.insert("open_note", "no".to_string());

        let url = Self::callback_url("create", &params);
        self.open(url).await?;

        tracing::info!(title = %note.title, "Created Bear note");
        // `open` gives no callback response, so there is no durable handle.
        Ok(None)
    }

    async fn update(&self, note_id: &str, note: &Note) -> Result<Option<String>> {
        let mut params = BTreeMap::new();
        params.insert("id", note_id.to_string());
        params.insert("title", note.title.clone());
        params.insert("text", Self::body_with_tags(note));
        params.insert("mode", "replace".to_string());
        params.insert("open_note", "no".to_string());

        let url = Self::callback_url("add-text", &params);
        self.open(url).await?;

        tracing::info!(title = %note.title, note_id, "Updated Bear note");
        Ok(Some(note_id.to_string()))
    }
}
