//! Persists raw event payloads for batch ingestion.
//!
//! Each payload lands at `<root>/<type>/<id>`. The layout is deterministic so a
//! redelivered event overwrites its earlier copy instead of duplicating it.

use std::path::{Component, Path, PathBuf};

use events::CloudEvent;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// A payload could not be recorded.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The event type or id is not usable as a single path component.
    #[error("event {attribute} '{value}' is not a valid file name")]
    InvalidComponent {
        attribute: &'static str,
        value: String,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Writes every received payload below one root directory.
#[derive(Debug, Clone)]
pub struct Recorder {
    root: PathBuf,
}

impl Recorder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file an event is recorded to.
    pub fn path_for(&self, event: &CloudEvent) -> Result<PathBuf, RecordError> {
        let event_type = single_component("type", &event.event_type)?;
        let id = single_component("id", event.id.as_str())?;
        Ok(self.root.join(event_type).join(id))
    }

    /// Writes the event's data, owner-readable only, and returns the path.
    pub async fn record(&self, event: &CloudEvent) -> Result<PathBuf, RecordError> {
        let path = self.path_for(event)?;
        let io_error = |source| RecordError::Io {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_error)?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&path).await.map_err(io_error)?;
        file.write_all(&event.data).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;

        info!(
            "event.id" = %event.id,
            "event.type" = %event.event_type,
            path = %path.display(),
            bytes = event.data.len(),
            "recorded event"
        );
        Ok(path)
    }
}

fn single_component<'a>(attribute: &'static str, value: &'a str) -> Result<&'a str, RecordError> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !value.contains(['/', '\\']) => Ok(value),
        _ => Err(RecordError::InvalidComponent {
            attribute,
            value: value.to_string(),
        }),
    }
}
