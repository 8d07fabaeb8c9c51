//! Recordings directory
//!
//! The store is the directory the segment recorder and converter write into.
//! HTTP handlers only read it: listing entries and opening validated names.
//! Writes are create/rename/delete of whole files, so readers need no lock.

pub mod name;

pub use name::{RecordingKind, RecordingName, CONTAINER_EXTENSION, RAW_EXTENSION};

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One recording file as listed to viewers
#[derive(Debug, Clone)]
pub struct RecordingEntry {
    /// Validated filename
    pub name: RecordingName,
    /// Last modification time
    pub modified: SystemTime,
    /// File size in bytes
    pub size: u64,
}

impl RecordingEntry {
    /// Whether the entry can be played back
    pub fn is_playable(&self) -> bool {
        self.name.is_playable()
    }
}

/// Read-side view of the recordings directory
#[derive(Debug, Clone)]
pub struct RecordingStore {
    dir: PathBuf,
}

impl RecordingStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The recordings directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a validated recording inside the store
    pub fn path_of(&self, name: &RecordingName) -> PathBuf {
        self.dir.join(name.as_str())
    }

    /// List recordings, newest first
    ///
    /// Files whose names do not pass [`RecordingName::parse`] are skipped, as
    /// are entries that vanish while listing (a segment deleted after
    /// conversion, for example).
    pub async fn list(&self) -> io::Result<Vec<RecordingEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().and_then(RecordingName::parse) else {
                continue;
            };

            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };

            entries.push(RecordingEntry {
                name,
                modified: metadata.modified()?,
                size: metadata.len(),
            });
        }

        entries.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.name.as_str().cmp(a.name.as_str()))
        });

        Ok(entries)
    }

    /// Open a recording for reading
    ///
    /// Returns the file and its length.
    pub async fn open(&self, name: &RecordingName) -> io::Result<(tokio::fs::File, u64)> {
        let file = tokio::fs::File::open(self.path_of(name)).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
        }
        Ok((file, metadata.len()))
    }
}
