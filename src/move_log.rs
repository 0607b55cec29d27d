//! Move log writers with clean feature flag handling.
//!
//! The session hands every completed move to a [`MoveLogger`]. The logger only
//! sees the requested position in microns and a timestamp; it knows nothing
//! about the serial protocol.
use crate::error::MoveLogError;
use crate::units::MicronPosition;
use chrono::{DateTime, Local};

/// Timestamp format used in the `timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Sink for completed moves.
pub trait MoveLogger: Send {
    /// Record one completed move at `position`, in microns.
    fn record(
        &mut self,
        position: &MicronPosition,
        timestamp: DateTime<Local>,
    ) -> Result<(), MoveLogError>;
}

/// Discards every record.
#[derive(Debug, Default)]
pub struct NullMoveLog;

impl MoveLogger for NullMoveLog {
    fn record(&mut self, _: &MicronPosition, _: DateTime<Local>) -> Result<(), MoveLogError> {
        Ok(())
    }
}

// ============================================================================
// CSV Writer
// ============================================================================

#[cfg(feature = "storage_csv")]
mod csv_enabled {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::path::{Path, PathBuf};

    /// Append-only CSV file with one `timestamp,x,y,z` row per move.
    pub struct CsvMoveLog {
        path: PathBuf,
        writer: csv::Writer<File>,
    }

    impl CsvMoveLog {
        /// Open `path` for appending, creating it (with a header row) if absent.
        pub fn open(path: impl AsRef<Path>) -> Result<Self, MoveLogError> {
            let path = path.as_ref().to_path_buf();
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let is_new = file.metadata()?.len() == 0;

            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            if is_new {
                writer.write_record(["timestamp", "x", "y", "z"])?;
                writer.flush()?;
            }

            tracing::info!("Move log opened at '{}'", path.display());
            Ok(Self { path, writer })
        }

        /// File this log appends to.
        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl MoveLogger for CsvMoveLog {
        fn record(
            &mut self,
            position: &MicronPosition,
            timestamp: DateTime<Local>,
        ) -> Result<(), MoveLogError> {
            self.writer.write_record(&[
                timestamp.format(TIMESTAMP_FORMAT).to_string(),
                position.x.to_string(),
                position.y.to_string(),
                position.z.to_string(),
            ])?;
            // Every row must be on disk before the next move starts.
            self.writer.flush()?;
            Ok(())
        }
    }
}

#[cfg(not(feature = "storage_csv"))]
mod csv_disabled {
    use super::*;
    use crate::error::Mp285Error;
    use std::path::Path;

    /// Placeholder used when the `storage_csv` feature is disabled.
    pub struct CsvMoveLog;

    impl CsvMoveLog {
        /// Always fails with a feature-not-enabled error.
        pub fn open(_path: impl AsRef<Path>) -> Result<Self, MoveLogError> {
            Err(MoveLogError::Io(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                Mp285Error::FeatureNotEnabled("storage_csv".to_string()).to_string(),
            )))
        }
    }

    impl MoveLogger for CsvMoveLog {
        fn record(&mut self, _: &MicronPosition, _: DateTime<Local>) -> Result<(), MoveLogError> {
            Ok(())
        }
    }
}

#[cfg(feature = "storage_csv")]
pub use csv_enabled::CsvMoveLog;

#[cfg(not(feature = "storage_csv"))]
pub use csv_disabled::CsvMoveLog;

#[cfg(all(test, feature = "storage_csv"))]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moves.csv");

        let mut log = CsvMoveLog::open(&path).unwrap();
        let ts = Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        log.record(&MicronPosition::new(100.0, 100.0, 100.0), ts)
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "timestamp,x,y,z\n2024-03-01T12:30:05.000,100,100,100\n"
        );
    }

    #[test]
    fn test_reopen_appends_without_second_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("moves.csv");
        let ts = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        CsvMoveLog::open(&path)
            .unwrap()
            .record(&MicronPosition::new(1.0, 2.0, 3.0), ts)
            .unwrap();
        CsvMoveLog::open(&path)
            .unwrap()
            .record(&MicronPosition::new(4.5, -5.0, 6.0), ts)
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,x,y,z");
        assert!(lines[1].ends_with(",1,2,3"));
        assert!(lines[2].ends_with(",4.5,-5,6"));
    }

    #[test]
    fn test_unwritable_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("moves.csv");
        assert!(matches!(
            CsvMoveLog::open(&path),
            Err(MoveLogError::Io(_))
        ));
    }
}
