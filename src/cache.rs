//! Local cache files.
//!
//! A cache file holds exactly one [`Snapshot`] wrapped in a small versioned
//! JSON envelope. The format is private to this crate; the only promise is that
//! a record written by [`write_cache`] comes back unchanged from [`read_cache`].

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::dataset::Snapshot;
use crate::error::DatasetError;
use crate::table::Table;

/// Extension appended to every derived cache file name.
pub const CACHE_EXTENSION: &str = "cache";

/// Version written into every cache envelope. Files with any other version are
/// treated as unavailable.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct CacheEnvelopeRef<'a> {
    format_version: u32,
    last_updated: NaiveDateTime,
    table: &'a Table,
}

#[derive(Deserialize)]
struct CacheEnvelope {
    format_version: u32,
    last_updated: NaiveDateTime,
    table: Table,
}

/// File name for the cache of `(name, sub_package)`: `name--sub_package.cache`.
pub fn cache_file_name(name: &str, sub_package: &str) -> String {
    format!("{name}--{sub_package}.{CACHE_EXTENSION}")
}

/// Full cache path inside `dir`, or relative to the working directory.
pub fn cache_path(dir: Option<&Path>, name: &str, sub_package: &str) -> PathBuf {
    let file_name = cache_file_name(name, sub_package);
    match dir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Writes `snapshot` to `path`, replacing whatever was there.
///
/// The record is written to a uniquely named temporary file in the same
/// directory and renamed into place, so readers never see a half-written
/// cache and concurrent writers never share a temporary file.
pub fn write_cache(path: &Path, snapshot: &Snapshot) -> Result<(), DatasetError> {
    let write_err = |source: std::io::Error| DatasetError::CacheWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(write_err)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        let envelope = CacheEnvelopeRef {
            format_version: CACHE_FORMAT_VERSION,
            last_updated: snapshot.last_updated,
            table: &snapshot.table,
        };
        serde_json::to_writer(&mut writer, &envelope)
            .map_err(|source| write_err(std::io::Error::other(source)))?;
        writer.flush().map_err(write_err)?;
    }

    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Reads the snapshot stored at `path`.
///
/// Every failure, from a missing file to a record of the wrong shape, is
/// reported as [`DatasetError::CacheUnavailable`].
pub fn read_cache(path: &Path) -> Result<Snapshot, DatasetError> {
    let file = File::open(path).map_err(|e| DatasetError::CacheUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    decode(BufReader::new(file), path)
}

/// Decodes a cache record from bytes.
///
/// Useful for fuzzing and tests without file I/O.
pub fn from_cache_slice(bytes: &[u8]) -> Result<Snapshot, DatasetError> {
    decode(bytes, Path::new("<bytes>"))
}

fn decode<R: Read>(reader: R, path: &Path) -> Result<Snapshot, DatasetError> {
    let unavailable = |reason: String| DatasetError::CacheUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    let envelope: CacheEnvelope = serde_json::from_reader(reader)
        .map_err(|e| unavailable(format!("corrupt cache record: {e}")))?;

    if envelope.format_version != CACHE_FORMAT_VERSION {
        return Err(unavailable(format!(
            "cache format version {} (expected {})",
            envelope.format_version, CACHE_FORMAT_VERSION
        )));
    }

    Ok(Snapshot {
        last_updated: envelope.last_updated,
        table: envelope.table,
    })
}
