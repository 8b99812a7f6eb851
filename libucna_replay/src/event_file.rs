use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::error::EventFileError;
use super::raw_event::{RawEvent, RAW_EVENT_SIZE};

/// A file of raw event records for one run.
///
/// Iterating an EventFile yields events in acquisition order. Iteration stops at the first
/// malformed record, which is returned as an error.
#[derive(Debug)]
pub struct EventFile {
    reader: BufReader<File>,
    path: PathBuf,
    size_bytes: u64,
    is_ended: bool,
}

impl EventFile {
    /// Open a raw event file
    pub fn open(path: &Path) -> Result<Self, EventFileError> {
        if !path.exists() {
            return Err(EventFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        if size_bytes % RAW_EVENT_SIZE as u64 != 0 {
            log::warn!(
                "EventFile {} has a trailing partial record ({} bytes)",
                path.to_string_lossy(),
                size_bytes % RAW_EVENT_SIZE as u64
            );
        }
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            size_bytes,
            is_ended: false,
        })
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Number of complete records in the file
    pub fn n_events(&self) -> u64 {
        self.size_bytes / RAW_EVENT_SIZE as u64
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for EventFile {
    type Item = Result<RawEvent, EventFileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_ended {
            return None;
        }
        match RawEvent::read_from(&mut self.reader) {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.is_ended = true;
                None
            }
            Err(e) => {
                self.is_ended = true;
                Some(Err(EventFileError::BadEvent(e)))
            }
        }
    }
}
