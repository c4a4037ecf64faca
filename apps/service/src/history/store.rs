use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::{DownLog, MergeOutcome, SegmentSeries, SegmentTable, StoreError};
use crate::monitoring::types::{Endpoint, Observation};

/// File locations of one endpoint inside the storage directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub table: PathBuf,
    pub log: PathBuf,
}

impl StorePaths {
    pub fn for_endpoint(directory: &Path, name: &str) -> Self {
        Self {
            table: directory.join(format!("{name}-data.csv")),
            log: directory.join(format!("{name}-downtimes.txt")),
        }
    }
}

/// History of a single endpoint: compacted segments plus the down-event log.
///
/// Only the endpoint's own monitor writes to it.
#[derive(Debug)]
pub struct HistoryStore {
    endpoint: Endpoint,
    series: SegmentSeries,
    table: SegmentTable,
    log: DownLog,

    /// Set when an unreadable table could not be moved aside
    write_suspended: bool,
}

impl HistoryStore {
    /// Open the store for `endpoint` under `directory`.
    ///
    /// An unreadable segment table is moved aside and replaced by an empty
    /// one. If it cannot be moved, the store keeps history in memory only and
    /// never writes over it. Only failing to create the directory or the log
    /// is an error.
    pub fn open(directory: &Path, endpoint: &Endpoint) -> Result<Self, StoreError> {
        fs::create_dir_all(directory)?;

        let paths = StorePaths::for_endpoint(directory, &endpoint.name);
        let table = SegmentTable::new(paths.table);
        let log = DownLog::open(paths.log)?;

        let mut write_suspended = false;
        let series = match Self::load(&table, &endpoint.name) {
            Ok(Some(series)) => {
                info!(endpoint = %endpoint.name, segments = series.len(), "Loaded history");
                series
            }
            Ok(None) => {
                debug!(endpoint = %endpoint.name, "No history yet, creating empty table");
                if let Err(e) = table.write(&[]) {
                    warn!(endpoint = %endpoint.name, error = %e, "Failed to create segment table");
                }
                SegmentSeries::new()
            }
            Err(e) => {
                let reason = if e.is_corruption() { "corrupt" } else { "unreadable" };
                match table.quarantine() {
                    Ok(moved) => warn!(
                        endpoint = %endpoint.name,
                        error = %e,
                        moved_to = %moved.display(),
                        "Segment table is {}, starting with empty history", reason
                    ),
                    Err(io) if io.kind() == std::io::ErrorKind::NotFound => {}
                    Err(io) => {
                        error!(
                            endpoint = %endpoint.name,
                            error = %e,
                            quarantine_error = %io,
                            "Segment table is {} and could not be moved aside, history will not be written",
                            reason
                        );
                        write_suspended = true;
                    }
                }
                SegmentSeries::new()
            }
        };

        Ok(Self { endpoint: endpoint.clone(), series, table, log, write_suspended })
    }

    fn load(table: &SegmentTable, name: &str) -> Result<Option<SegmentSeries>, StoreError> {
        match table.read()? {
            Some(segments) => Ok(Some(SegmentSeries::from_segments(segments, name)?)),
            None => Ok(None),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn series(&self) -> &SegmentSeries {
        &self.series
    }

    pub fn table_path(&self) -> &Path {
        self.table.path()
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Append the down-event line for `observation`, returning the line
    pub fn record_down_event(&self, observation: &Observation) -> Result<String, StoreError> {
        let line = observation.down_line();
        self.log.append(&line)?;
        Ok(line)
    }

    /// Fold `observation` into the series and write the whole table through.
    ///
    /// The in-memory series keeps the observation even when the write fails;
    /// the next successful write persists it.
    pub fn merge(&mut self, observation: &Observation) -> Result<MergeOutcome, StoreError> {
        let outcome = self.series.merge(observation);
        if self.write_suspended {
            return Err(StoreError::WriteSuspended(self.table.path().to_path_buf()));
        }
        self.table.write(self.series.as_slice())?;
        Ok(outcome)
    }

    pub fn down_events(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.log.read_lines()?)
    }
}
