//! Last-successful-export checkpoint.
//!
//! The checkpoint is the only state an export run persists. It is read once
//! when a run starts and written once when the run succeeds; a failed run
//! never touches it, so retrying selects the same transactions again.
//!
//! [`ExportCheckpoint`] serialises runs: [`ExportCheckpoint::begin`] holds a
//! lock until the returned [`CheckpointLease`] is advanced or dropped.

use crate::error::{ExportError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

/// Durable storage for the checkpoint timestamp.
pub trait CheckpointStore {
    /// Returns the stored timestamp, or the Unix epoch if none was written.
    fn read(&self) -> Result<DateTime<Utc>>;

    /// Replaces the stored timestamp.
    fn write(&mut self, timestamp: DateTime<Utc>) -> Result<()>;
}

/// Checkpoint kept in process memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCheckpoint {
    timestamp: DateTime<Utc>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::at(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn at(timestamp: DateTime<Utc>) -> Self {
        MemoryCheckpoint { timestamp }
    }
}

impl Default for MemoryCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn read(&self) -> Result<DateTime<Utc>> {
        Ok(self.timestamp)
    }

    fn write(&mut self, timestamp: DateTime<Utc>) -> Result<()> {
        self.timestamp = timestamp;
        Ok(())
    }
}

/// Checkpoint persisted as an RFC 3339 line in a file.
///
/// Writes go to a sibling temporary file that is synced to disk and then
/// renamed over the target, so a crash leaves either the previous or the
/// new value.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCheckpoint { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CheckpointStore for FileCheckpoint {
    fn read(&self) -> Result<DateTime<Utc>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No checkpoint at {}, starting from epoch", self.path.display());
                return Ok(DateTime::<Utc>::UNIX_EPOCH);
            }
            Err(e) => return Err(e.into()),
        };

        DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                ExportError::InvalidCheckpoint(format!("{}: {}", self.path.display(), e))
            })
    }

    fn write(&mut self, timestamp: DateTime<Utc>) -> Result<()> {
        let temp = self.temp_path();
        let line = format!("{}\n", timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        let mut file = File::create(&temp)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// The checkpoint shared by all export runs against one ledger.
#[derive(Debug)]
pub struct ExportCheckpoint<S: CheckpointStore> {
    store: Mutex<S>,
}

impl<S: CheckpointStore> ExportCheckpoint<S> {
    pub fn new(store: S) -> Self {
        ExportCheckpoint {
            store: Mutex::new(store),
        }
    }

    /// Starts a run: blocks until no other run is in flight, then reads the
    /// checkpoint.
    pub fn begin(&self) -> Result<CheckpointLease<'_, S>> {
        let guard = self
            .store
            .lock()
            .map_err(|_| ExportError::CheckpointPoisoned)?;
        let since = guard.read()?;
        debug!("Export run started from checkpoint {}", since);
        Ok(CheckpointLease { guard, since })
    }

    /// Current value, waiting for any run in flight to finish.
    pub fn read(&self) -> Result<DateTime<Utc>> {
        self.store
            .lock()
            .map_err(|_| ExportError::CheckpointPoisoned)?
            .read()
    }

    pub fn into_inner(self) -> Result<S> {
        self.store
            .into_inner()
            .map_err(|_| ExportError::CheckpointPoisoned)
    }
}

/// Exclusive hold on the checkpoint for the duration of one run.
///
/// Dropping the lease without calling [`advance`](Self::advance) releases
/// the lock and leaves the checkpoint as it was.
pub struct CheckpointLease<'a, S: CheckpointStore> {
    guard: MutexGuard<'a, S>,
    since: DateTime<Utc>,
}

impl<S: CheckpointStore> CheckpointLease<'_, S> {
    /// Exclusive lower bound of the run's delta query.
    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    /// Records a successful run and releases the lock.
    pub fn advance(mut self, timestamp: DateTime<Utc>) -> Result<()> {
        self.guard.write(timestamp)?;
        info!("Export checkpoint advanced to {}", timestamp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_memory_checkpoint_starts_at_epoch() {
        let checkpoint = ExportCheckpoint::new(MemoryCheckpoint::new());
        assert_eq!(checkpoint.read().unwrap(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_advance_writes_once() {
        let checkpoint = ExportCheckpoint::new(MemoryCheckpoint::at(at(1)));
        let lease = checkpoint.begin().unwrap();
        assert_eq!(lease.since(), at(1));
        lease.advance(at(5)).unwrap();
        assert_eq!(checkpoint.read().unwrap(), at(5));
    }

    #[test]
    fn test_dropped_lease_leaves_checkpoint() {
        let checkpoint = ExportCheckpoint::new(MemoryCheckpoint::at(at(1)));
        {
            let _lease = checkpoint.begin().unwrap();
        }
        assert_eq!(checkpoint.read().unwrap(), at(1));
    }

    #[test]
    fn test_runs_are_serialised() {
        let checkpoint = Arc::new(ExportCheckpoint::new(MemoryCheckpoint::at(at(1))));
        let lease = checkpoint.begin().unwrap();

        let other = Arc::clone(&checkpoint);
        let handle = thread::spawn(move || {
            let lease = other.begin().unwrap();
            lease.since()
        });

        thread::sleep(Duration::from_millis(50));
        lease.advance(at(2)).unwrap();

        // The second run sees the first run's checkpoint, not the stale one.
        assert_eq!(handle.join().unwrap(), at(2));
    }

    #[test]
    fn test_file_checkpoint_missing_reads_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpoint::new(dir.path().join("last-export"));
        assert_eq!(store.read().unwrap(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_file_checkpoint_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last-export");

        let mut store = FileCheckpoint::new(&path);
        store.write(at(7)).unwrap();

        let reopened = FileCheckpoint::new(&path);
        assert_eq!(reopened.read().unwrap(), at(7));
        assert!(!dir.path().join("last-export.tmp").exists());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "2024-03-01T07:00:00Z\n"
        );
    }

    #[test]
    fn test_file_checkpoint_overwrites_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last-export");
        fs::write(&path, "2024-03-01T01:00:00Z\n").unwrap();

        let mut store = FileCheckpoint::new(&path);
        store.write(at(9)).unwrap();
        store.write(at(10)).unwrap();

        assert_eq!(FileCheckpoint::new(&path).read().unwrap(), at(10));
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_file_checkpoint_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last-export");
        fs::write(&path, "yesterday").unwrap();

        assert!(matches!(
            FileCheckpoint::new(&path).read(),
            Err(ExportError::InvalidCheckpoint(_))
        ));
    }
}
