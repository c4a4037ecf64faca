use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

use super::{SchemaError, Segment, StoreError};

pub const SCHEMA_MARKER: &str = "#statewatch-segments";
pub const SCHEMA_VERSION: u32 = 1;
pub const HEADER: [&str; 7] =
    ["name", "address", "elapsed_ms", "timestamp", "reachable", "color", "magnitude"];

/// CSV file holding one endpoint's segments
#[derive(Debug, Clone)]
pub struct SegmentTable {
    path: PathBuf,
}

impl SegmentTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the table, `None` if the file does not exist
    pub fn read(&self) -> Result<Option<Vec<Segment>>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let content = String::from_utf8(bytes).map_err(|_| SchemaError::InvalidEncoding)?;
        parse(&content).map(Some)
    }

    /// Replace the table on disk with `segments`.
    ///
    /// The rows are written to a sibling temp file first and renamed over the
    /// live table, so an interrupted write leaves the previous table in place.
    pub fn write(&self, segments: &[Segment]) -> Result<(), StoreError> {
        let content = render(segments)?;
        let tmp_path = self.sibling("tmp");

        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Move an unreadable table aside and return where it went
    pub fn quarantine(&self) -> io::Result<PathBuf> {
        let suffix = format!("corrupt-{}", Local::now().format("%Y%m%dT%H%M%S"));
        let target = self.sibling(&suffix);
        fs::rename(&self.path, &target)?;
        Ok(target)
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

/// Serialize segments with the schema marker and header
pub fn render(segments: &[Segment]) -> Result<String, StoreError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for segment in segments {
        writer.serialize(segment)?;
    }

    let body = writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;

    let mut content = format!("{SCHEMA_MARKER} v{SCHEMA_VERSION}\n");
    content.push_str(&String::from_utf8_lossy(&body));
    Ok(content)
}

/// Parse a table produced by [`render`]
pub fn parse(content: &str) -> Result<Vec<Segment>, StoreError> {
    let (marker, body) = content.split_once('\n').unwrap_or((content, ""));
    check_marker(marker.trim_end_matches('\r'))?;

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(body.as_bytes());

    let headers = reader.headers()?;
    if !headers.iter().eq(HEADER.iter().copied()) {
        return Err(SchemaError::HeaderMismatch(headers.iter().collect::<Vec<_>>().join(",")).into());
    }

    let mut segments = Vec::new();
    for row in reader.deserialize::<Segment>() {
        segments.push(row?);
    }
    Ok(segments)
}

fn check_marker(line: &str) -> Result<(), SchemaError> {
    let version = line
        .strip_prefix(SCHEMA_MARKER)
        .map(str::trim)
        .ok_or(SchemaError::MissingMarker)?;

    match version.strip_prefix('v').and_then(|v| v.parse::<u32>().ok()) {
        Some(SCHEMA_VERSION) => Ok(()),
        _ => Err(SchemaError::UnsupportedVersion(version.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::SegmentSeries;
    use crate::monitoring::types::Observation;
    use tempfile::tempdir;

    fn sample_segments() -> Vec<Segment> {
        let mut series = SegmentSeries::new();
        for (tick, reachable) in [true, true, true, false].into_iter().enumerate() {
            series.merge(&Observation {
                endpoint_name: "nas".to_string(),
                address: "nas.local".to_string(),
                timestamp: Local::now(),
                elapsed_ms: tick as u64 * 60_000,
                reachable,
            });
        }
        series.as_slice().to_vec()
    }

    #[test]
    fn test_missing_table_reads_as_none() {
        let dir = tempdir().unwrap();
        let table = SegmentTable::new(dir.path().join("nas-data.csv"));

        assert!(table.read().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let table = SegmentTable::new(dir.path().join("nas-data.csv"));
        let segments = sample_segments();

        table.write(&segments).unwrap();

        assert_eq!(table.read().unwrap().unwrap(), segments);
        assert!(!dir.path().join("nas-data.csv.tmp").exists());
    }

    #[test]
    fn test_rendered_layout() {
        let content = render(&sample_segments()).unwrap();
        let mut lines = content.lines();

        assert_eq!(lines.next(), Some("#statewatch-segments v1"));
        assert_eq!(lines.next(), Some("name,address,elapsed_ms,timestamp,reachable,color,magnitude"));
        let last = content.lines().last().unwrap();
        assert!(last.starts_with("nas,nas.local,180000,"));
        assert!(last.ends_with(",false,red,-1"));
    }

    #[test]
    fn test_empty_table_round_trips() {
        let content = render(&[]).unwrap();
        assert!(parse(&content).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_foreign_files() {
        // Table written by the old dashboard: no marker, pandas index column
        let legacy = ",name,ip,ctime,timestamp,reachable,color,one\n0,a,1.1.1.1,0.5,\"01/01/2024, 00:00:00\",True,green,1\n";
        assert!(matches!(
            parse(legacy),
            Err(StoreError::Schema(SchemaError::MissingMarker))
        ));

        assert!(matches!(
            parse("#statewatch-segments v2\nname\n"),
            Err(StoreError::Schema(SchemaError::UnsupportedVersion(_)))
        ));

        assert!(matches!(
            parse("#statewatch-segments v1\nname,address\n"),
            Err(StoreError::Schema(SchemaError::HeaderMismatch(_)))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nas-data.csv");
        fs::write(&path, b"#statewatch-segments v1\nname,address\n\xff\xfe garbage").unwrap();

        let error = SegmentTable::new(&path).read().unwrap_err();
        assert!(matches!(error, StoreError::Schema(SchemaError::InvalidEncoding)));
        assert!(error.is_corruption());
    }

    #[test]
    fn test_truncated_row_is_corruption() {
        let mut content = render(&sample_segments()).unwrap();
        content.truncate(content.len() - 12);

        let error = parse(&content).unwrap_err();
        assert!(error.is_corruption());
    }

    #[test]
    fn test_quarantine_moves_file_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nas-data.csv");
        fs::write(&path, "garbage").unwrap();

        let table = SegmentTable::new(&path);
        let moved = table.quarantine().unwrap();

        assert!(!path.exists());
        assert_eq!(fs::read_to_string(&moved).unwrap(), "garbage");
        assert!(moved.file_name().unwrap().to_string_lossy().starts_with("nas-data.csv.corrupt-"));
    }
}
