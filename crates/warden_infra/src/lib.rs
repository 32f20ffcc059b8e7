//! Infrastructure adapters for the Warden system.

pub mod journal;
pub mod setup;

pub use journal::{AuditJournal, JournalError, JournalRecord, SessionHistory, reconstruct_sessions};
pub use setup::{GuardSetup, JOURNAL_PATH_DEFAULT, SetupInput};
