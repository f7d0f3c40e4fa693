//! Whole-store snapshot persistence: load-on-open, autosave ticker,
//! optional sync-on-commit, atomic file replacement.
//!
//! The on-disk format is a single self-describing document rather than
//! an incremental log: explicit big-endian length and checksum prefixes
//! via `byteorder`, wrapping a `bincode` payload that round-trips every
//! `Value` shape and timestamp losslessly.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::clock::Version;
use crate::entry::Entry;
use crate::error::{CResult, Error};

const MAGIC: &[u8; 4] = b"XEDB";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotBody {
    next_version: Version,
    entries: Vec<(Vec<u8>, Entry)>,
}

/// The result of loading a persisted file: the rebuilt entries and the
/// version the clock must be re-seeded above.
pub struct Loaded {
    pub entries: Vec<(Vec<u8>, Entry)>,
    pub highest_version: Version,
}

/// Path to the single snapshot file inside `data_dir`.
pub fn data_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join("xedb.db")
}

/// Path to the exclusive ownership lock file: the data file is owned
/// exclusively by one open store instance.
pub fn lock_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join("xedb.lock")
}

/// Loads a previously-persisted store, if the file exists. Returns `None`
/// for a fresh `DataDir`.
pub fn load(data_dir: &Path) -> CResult<Option<Loaded>> {
    let path = data_file_path(data_dir);
    if !path.exists() {
        return Ok(None);
    }

    let mut file = BufReader::new(File::open(&path)?);
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::Io(format!("{}: not a xedb data file", path.display())));
    }
    let _format_version = file.read_u32::<BigEndian>()?;
    let checksum = file.read_u64::<BigEndian>()?;
    let body_len = file.read_u64::<BigEndian>()?;
    let mut body = vec![0u8; body_len as usize];
    file.read_exact(&mut body)?;

    if checksum_of(&body) != checksum {
        return Err(Error::Io(format!("{}: checksum mismatch, file is corrupt", path.display())));
    }

    let body: SnapshotBody = bincode::deserialize(&body)?;
    let highest_version = body
        .entries
        .iter()
        .map(|(_, e)| e.list_versions().into_iter().max().unwrap_or(0))
        .max()
        .unwrap_or(0)
        .max(body.next_version.saturating_sub(1));

    Ok(Some(Loaded { entries: body.entries, highest_version }))
}

/// Serializes `entries`/`next_version` and atomically replaces the data
/// file: write to `<path>.tmp`, flush+sync, then `rename` over the live
/// path.
pub fn write_snapshot(data_dir: &Path, entries: Vec<(Vec<u8>, Entry)>, next_version: Version) -> CResult<()> {
    fs::create_dir_all(data_dir)?;
    let path = data_file_path(data_dir);
    let tmp_path = path.with_extension("db.tmp");

    let body = SnapshotBody { next_version, entries };
    let body_bytes = bincode::serialize(&body)?;
    let checksum = checksum_of(&body_bytes);

    {
        let file = File::create(&tmp_path)?;
        let mut w = BufWriter::new(file);
        w.write_all(MAGIC)?;
        w.write_u32::<BigEndian>(FORMAT_VERSION)?;
        w.write_u64::<BigEndian>(checksum)?;
        w.write_u64::<BigEndian>(body_bytes.len() as u64)?;
        w.write_all(&body_bytes)?;
        w.flush()?;
        w.get_ref().sync_all()?;
    }

    fs::rename(&tmp_path, &path)?;
    Ok(())
}

fn checksum_of(body: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Value;
    use bytes::Bytes;
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn round_trips_entries_and_clock() {
        let dir = tempfile::tempdir().unwrap();
        let e = Entry::apply_write(None, Value::String(Bytes::from_static(b"v1")), 7, now(), 0, false);
        write_snapshot(dir.path(), vec![(b"k1".to_vec(), e)], 8).unwrap();

        let loaded = load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].0, b"k1".to_vec());
        assert_eq!(loaded.highest_version, 7);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn rejects_corrupted_file() {
        let dir = tempfile::tempdir().unwrap();
        let e = Entry::apply_write(None, Value::String(Bytes::from_static(b"v1")), 1, now(), 0, false);
        write_snapshot(dir.path(), vec![(b"k1".to_vec(), e)], 2).unwrap();

        let path = data_file_path(dir.path());
        let mut bytes = fs::read(&path).unwrap();
        *bytes.last_mut().unwrap() ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(load(dir.path()).is_err());
    }
}
