//! Run-length compacted reachability history.
//!
//! Each endpoint owns one [`HistoryStore`]: an ordered [`SegmentSeries`]
//! persisted as a versioned CSV table after every tick, plus an append-only
//! log of down events.

pub mod downlog;
pub mod segment;
pub mod store;
pub mod table;

pub use downlog::DownLog;
pub use segment::{ColorTag, MergeOutcome, Segment, SegmentSeries};
pub use store::{HistoryStore, StorePaths};
pub use table::SegmentTable;

use thiserror::Error;

/// Reasons a persisted segment table is rejected on load
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table is not valid UTF-8")]
    InvalidEncoding,
    #[error("missing schema marker line")]
    MissingMarker,
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(String),
    #[error("unexpected header: {0}")]
    HeaderMismatch(String),
    #[error("row {row} belongs to endpoint {found:?}, expected {expected:?}")]
    ForeignEndpoint { row: usize, expected: String, found: String },
    #[error("row {row}: color or magnitude disagrees with reachable")]
    InconsistentRow { row: usize },
    #[error("row {row}: elapsed time goes backwards")]
    OutOfOrder { row: usize },
    #[error("row {row}: third consecutive segment with the same status")]
    UncompactedRun { row: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0:#}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid segment table: {0}")]
    Schema(#[from] SchemaError),
    #[error("not writing over unreadable table {0}")]
    WriteSuspended(std::path::PathBuf),
}

impl StoreError {
    /// Whether the error comes from the file contents rather than the filesystem
    pub fn is_corruption(&self) -> bool {
        match self {
            StoreError::Io(_) => false,
            StoreError::Csv(e) => !matches!(e.kind(), csv::ErrorKind::Io(_)),
            StoreError::Schema(_) => true,
            StoreError::WriteSuspended(_) => false,
        }
    }
}
