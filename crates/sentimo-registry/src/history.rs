//! Promotion history
//!
//! Every promotion is appended to a JSON-lines log. Entries are hash
//! chained: each one carries the hash of its predecessor, so an edited or
//! dropped line is detected by [`PromotionLog::verify`].
//!
//! The log assumes a single writer per registry root: appends are serialized
//! by the registry's promote lock, and the hash of the last record is cached
//! after the first read. Two processes promoting into the same root can fork
//! the chain, which `verify` then reports.

use crate::pointer::PromotedPair;
use chrono::{DateTime, Utc};
use sentimo_core::{ArtifactRef, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One line of the promotion log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub run_id: String,
    pub experiment: String,
    pub transform: ArtifactRef,
    pub classifier: ArtifactRef,
    pub accuracy: f64,
    pub promoted_at: DateTime<Utc>,

    /// Hash of the previous record
    pub previous_hash: Option<String>,

    /// Hash over this record's fields and `previous_hash`
    pub hash: String,
}

impl PromotionRecord {
    fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.run_id.as_bytes());
        hasher.update(self.experiment.as_bytes());
        hasher.update(self.transform.digest.as_bytes());
        hasher.update(self.classifier.digest.as_bytes());
        hasher.update(self.accuracy.to_bits().to_le_bytes());
        hasher.update(self.promoted_at.to_rfc3339().as_bytes());
        if let Some(ref prev) = self.previous_hash {
            hasher.update(prev.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug)]
enum Tail {
    Unread,
    Hash(Option<String>),
}

/// Append-only promotion log at a fixed path
#[derive(Debug)]
pub struct PromotionLog {
    path: PathBuf,
    tail: Mutex<Tail>,
}

impl PromotionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tail: Mutex::new(Tail::Unread),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record for `pair`. Callers serialize appends.
    pub fn append(&self, pair: &PromotedPair) -> Result<PromotionRecord> {
        let mut tail = self.tail.lock();
        let previous_hash = match &*tail {
            Tail::Hash(hash) => hash.clone(),
            Tail::Unread => self.read_all()?.last().map(|r| r.hash.clone()),
        };

        let mut record = PromotionRecord {
            run_id: pair.run_id.clone(),
            experiment: pair.experiment.clone(),
            transform: pair.transform.clone(),
            classifier: pair.classifier.clone(),
            accuracy: pair.accuracy,
            promoted_at: pair.promoted_at,
            previous_hash,
            hash: String::new(),
        };
        record.hash = record.compute_hash();

        // A failed write may leave a partial line; re-read on the next append.
        *tail = Tail::Unread;
        self.write_record(&record)?;
        *tail = Tail::Hash(Some(record.hash.clone()));

        Ok(record)
    }

    fn write_record(&self, record: &PromotionRecord) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// All records, oldest first
    pub fn read_all(&self) -> Result<Vec<PromotionRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable promotion record at line {}: {}", line_no + 1, e),
            }
        }
        Ok(records)
    }

    /// Whether the chain is intact
    pub fn verify(&self) -> Result<bool> {
        let mut prev_hash: Option<String> = None;
        for record in self.read_all()? {
            if record.previous_hash != prev_hash || record.hash != record.compute_hash() {
                return Ok(false);
            }
            prev_hash = Some(record.hash);
        }
        Ok(true)
    }
}
