//! Persistent value table
//!
//! Maps state keys to final per-player values. One table serves every worker
//! of a search episode through a single coarse lock; it is loaded wholesale
//! at startup and written back wholesale at each checkpoint.

use log::{debug, info};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::codec::{StateKey, StateKeys};
use crate::error::{Result, SolverError};

/// Checkpoint after this many new entries unless configured otherwise
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 1000;

/// File holding the table of one (board size, win length, player count) configuration
pub fn cache_path<P: AsRef<Path>>(dir: P, board_size: usize, win_length: usize, n_players: usize) -> PathBuf {
    dir.as_ref()
        .join(format!("{:02}_{:02}_{:02}.bin", board_size, win_length, n_players))
}

/// Table contents as seen while holding the lock
#[derive(Debug, Default)]
pub struct TableState {
    values: HashMap<StateKey, f64>,
    inserted_since_checkpoint: usize,
}

impl TableState {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Stores a value unless the key already has one; values are final
    ///
    /// Returns whether the entry is new.
    pub fn insert(&mut self, key: &str, value: f64) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(key.to_string(), value);
        self.inserted_since_checkpoint += 1;
        true
    }

    /// Stores one value per perspective of a state
    pub fn insert_all(&mut self, keys: &StateKeys, values: &[f64]) {
        for (key, &value) in keys.iter().zip(values) {
            self.insert(key, value);
        }
    }

    /// Values of one state for every player, `None` if any perspective is missing
    pub fn values_for(&self, keys: &StateKeys) -> Option<Vec<f64>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Shared, lock-protected value table with periodic checkpointing
#[derive(Debug)]
pub struct ValueTable {
    path: Option<PathBuf>,
    checkpoint_interval: usize,
    state: Mutex<TableState>,
}

impl ValueTable {
    /// Table that lives only in memory; checkpoints are no-ops
    pub fn in_memory() -> Self {
        ValueTable {
            path: None,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            state: Mutex::new(TableState::default()),
        }
    }

    /// Loads the table stored at `path`, or starts empty if there is no file yet
    ///
    /// The table keeps `path` as its checkpoint target.
    pub fn load<P: AsRef<Path>>(path: P, checkpoint_interval: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values: HashMap<StateKey, f64> = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let values: HashMap<StateKey, f64> = bincode::deserialize_from(reader)?;
            info!("Loaded {}, {} entries", path.display(), values.len());
            values
        } else {
            info!("No value table at {}, starting empty", path.display());
            HashMap::new()
        };

        Ok(ValueTable {
            path: Some(path),
            checkpoint_interval: checkpoint_interval.max(1),
            state: Mutex::new(TableState {
                values,
                inserted_since_checkpoint: 0,
            }),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Takes the table lock for a read-modify-write sequence
    pub fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.state.lock().get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().contains(key)
    }

    /// Single-key write; an existing value is kept
    pub fn put(&self, key: &str, value: f64) -> bool {
        self.state.lock().insert(key, value)
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    /// Writes every perspective of one state in a single critical section
    ///
    /// Checkpoints to disk, still under the lock, once enough new entries
    /// accumulated since the previous checkpoint.
    pub fn put_all(&self, keys: &StateKeys, values: &[f64]) -> Result<()> {
        let mut state = self.state.lock();
        state.insert_all(keys, values);
        self.maybe_checkpoint(&mut state)
    }

    /// Checkpoints if enough new entries accumulated; the caller holds the lock
    pub fn maybe_checkpoint(&self, state: &mut TableState) -> Result<()> {
        if state.inserted_since_checkpoint >= self.checkpoint_interval {
            if let Some(path) = &self.path {
                debug!("Saving {}, {} entries", path.display(), state.len());
                write_snapshot(&state.values, path)?;
            }
            state.inserted_since_checkpoint = 0;
        }
        Ok(())
    }

    /// Full snapshot to the table's own file; no-op for in-memory tables
    pub fn checkpoint(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut state = self.state.lock();
        info!("Updating value table {}, {} entries", path.display(), state.len());
        write_snapshot(&state.values, path)?;
        state.inserted_since_checkpoint = 0;
        Ok(())
    }

    /// Full snapshot to an arbitrary file
    pub fn snapshot_save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let state = self.state.lock();
        write_snapshot(&state.values, path.as_ref())
    }
}

/// Serializes into a sibling temp file, then renames it over `path`
fn write_snapshot(values: &HashMap<StateKey, f64>, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        bincode::serialize_into(&mut writer, values)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| SolverError::Io(e.into_error()))?
            .sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Board, Coord};
    use tempfile::tempdir;

    #[test]
    fn test_cache_path_is_per_configuration() {
        assert_eq!(cache_path("data", 3, 3, 2), PathBuf::from("data/03_03_02.bin"));
        assert_ne!(cache_path("data", 3, 3, 2), cache_path("data", 3, 3, 3));
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let table = ValueTable::load(dir.path().join("none.bin"), 10).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_values_are_never_overwritten() {
        let table = ValueTable::in_memory();
        assert!(table.put("00:00", 1.0));
        assert!(!table.put("00:00", -1.0));
        assert_eq!(table.get("00:00"), Some(1.0));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.bin");

        let table = ValueTable::in_memory();
        table.put("00:010200", 1.0);
        table.put("01:010200", -1.0);
        table.put("00:000000", 0.5);
        table.snapshot_save(&path).unwrap();

        let reloaded = ValueTable::load(&path, 10).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.get("00:010200"), Some(1.0));
        assert_eq!(reloaded.get("01:010200"), Some(-1.0));
        assert_eq!(reloaded.get("00:000000"), Some(0.5));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_put_all_checkpoints_after_interval() {
        let dir = tempdir().unwrap();
        let path = cache_path(dir.path().join("nested"), 2, 2, 2);
        let table = ValueTable::load(&path, 4).unwrap();

        let first = StateKeys::new(&Board::new(2).with_move(Coord::new(0, 0), 0), 2);
        table.put_all(&first, &[1.0, -1.0]).unwrap();
        assert!(!path.exists());

        let second = StateKeys::new(&Board::new(2).with_move(Coord::new(0, 1), 0), 2);
        table.put_all(&second, &[1.0, -1.0]).unwrap();
        assert!(path.exists());

        let reloaded = ValueTable::load(&path, 4).unwrap();
        assert_eq!(reloaded.len(), 4);
        assert_eq!(reloaded.lock().values_for(&second), Some(vec![1.0, -1.0]));
    }

    #[test]
    fn test_in_memory_checkpoint_is_noop() {
        let table = ValueTable::in_memory();
        table.put("00:00", 0.0);
        assert!(table.checkpoint().is_ok());
        assert!(table.path().is_none());
    }
}
