//! Append-only audit journal of guard notifications.
//!
//! One JSON object per line. The guard flushes notifications only for
//! committed units of work, so replaying the file reconstructs exactly the
//! history that actually happened, without re-executing anything.
//!
//! Initialization: `AuditJournal::open` with a file path; the file is
//! created if missing and appended to otherwise, with the sequence counter
//! resuming after the last persisted record.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::error;

use warden_core::events::{EventSink, Notification};
use warden_core::ident::{AssetId, PayloadDigest};

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("journal encode error: {0}")]
    Encode(String),
    #[error("journal parse error at line {line}: {detail}")]
    Parse { line: usize, detail: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub seq: u64,
    pub event: Notification,
}

pub struct AuditJournal {
    path: PathBuf,
    writer: BufWriter<File>,
    next_seq: u64,
    write_errors: u64,
}

impl AuditJournal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let next_seq = match Self::replay(&path) {
            Ok(records) => records.last().map(|record| record.seq + 1).unwrap_or(0),
            Err(JournalError::Io(err)) if err.kind() == ErrorKind::NotFound => 0,
            Err(err) => return Err(err),
        };
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            next_seq,
            write_errors: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends that failed inside `emit`, where there is no caller to
    /// propagate to.
    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    pub fn append(&mut self, event: &Notification) -> Result<u64, JournalError> {
        let record = JournalRecord {
            seq: self.next_seq,
            event: event.clone(),
        };
        let line =
            serde_json::to_string(&record).map_err(|err| JournalError::Encode(err.to_string()))?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.next_seq += 1;
        Ok(record.seq)
    }

    pub fn flush(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<JournalRecord>, JournalError> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: JournalRecord =
                serde_json::from_str(&line).map_err(|err| JournalError::Parse {
                    line: idx + 1,
                    detail: err.to_string(),
                })?;
            records.push(record);
        }
        Ok(records)
    }
}

impl EventSink for AuditJournal {
    fn emit(&mut self, event: &Notification) {
        // The journal is post-commit observability, not part of the unit of
        // work; a write failure is counted and logged, never propagated
        // back into the guard.
        let outcome = self.append(event).and_then(|_| self.flush());
        if let Err(err) = outcome {
            self.write_errors += 1;
            error!(error = %err, path = %self.path.display(), "audit journal write failed");
        }
    }
}

/// One borrow cycle as reconstructed from the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHistory {
    pub asset: AssetId,
    pub amount: u128,
    pub payload_digest: PayloadDigest,
    /// Fee of the matching settlement; `None` for a borrow that never
    /// settled (possible only with a journal written by something other
    /// than the guard's commit path).
    pub fee: Option<u128>,
}

/// Pairs each `BorrowRequested` with its `SettlementCompleted` by payload
/// digest, asset, and amount, in journal order.
pub fn reconstruct_sessions(records: &[JournalRecord]) -> Vec<SessionHistory> {
    let mut sessions: Vec<SessionHistory> = Vec::new();
    for record in records {
        match &record.event {
            Notification::BorrowRequested {
                asset,
                amount,
                payload_digest,
            } => {
                sessions.push(SessionHistory {
                    asset: *asset,
                    amount: *amount,
                    payload_digest: *payload_digest,
                    fee: None,
                });
            }
            Notification::SettlementCompleted {
                asset,
                amount,
                fee,
                payload_digest,
            } => {
                if let Some(open) = sessions.iter_mut().rev().find(|session| {
                    session.fee.is_none()
                        && session.payload_digest == *payload_digest
                        && session.asset == *asset
                        && session.amount == *amount
                }) {
                    open.fee = Some(*fee);
                }
            }
            _ => {}
        }
    }
    sessions
}
