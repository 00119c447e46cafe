// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Commit-file persistence.
//!
//! Each logical key is one JSON document in the data directory. Writes stage
//! the full document in a sibling `.commit` file, then publish it by deleting
//! the target and renaming the commit file over it. Reads first finish any
//! publish a crash interrupted. A commit file that does not hold a complete
//! JSON document was cut off mid-write and is discarded instead, so the
//! previous value survives.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::{debug, warn};

use super::StorageError;

/// Suffix of staging files.
pub const COMMIT_SUFFIX: &str = ".commit";

/// JSON documents stored under one directory.
pub(crate) struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens the directory, creating it if needed.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        Ok(FileStore {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn paths(&self, name: &str) -> (PathBuf, PathBuf) {
        let target = self.dir.join(name);
        let commit = self.dir.join(format!("{}{}", name, COMMIT_SUFFIX));
        (target, commit)
    }

    /// Reads and parses the document `name`.
    ///
    /// Returns [`StorageError::NotFound`] when no document exists.
    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<T, StorageError> {
        let (target, commit) = self.paths(name);
        recover_pending_commit(&commit, &target)?;

        let data = match fs::read(&target) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        Ok(serde_json::from_slice(&data)?)
    }

    /// Serializes `value` and atomically replaces the document `name`.
    ///
    /// On failure the previous document is left in place.
    pub fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        let data = serde_json::to_vec_pretty(value)?;
        let (target, commit) = self.paths(name);

        if let Err(e) = write_commit_file(&commit, &data) {
            // Best effort: the partial file would be discarded on read anyway.
            let _ = fs::remove_file(&commit);
            return Err(StorageError::Io(e));
        }

        publish(&commit, &target)?;
        debug!("Wrote {}", name);
        Ok(())
    }

    /// Deletes the document `name` and any staged replacement. Missing files are fine.
    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        let (target, commit) = self.paths(name);
        remove_if_exists(&commit)?;
        remove_if_exists(&target)?;
        Ok(())
    }

    /// True when the document `name` exists on disk (published or staged).
    pub fn exists(&self, name: &str) -> bool {
        let (target, commit) = self.paths(name);
        target.exists() || commit.exists()
    }

    /// Deletes every file in the directory (not recursively).
    ///
    /// Keeps going after a failed delete and reports the first error.
    pub fn delete_all(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                if let Err(e) = remove_if_exists(&path) {
                    warn!("Failed to delete {}: {}", path.display(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(StorageError::Io(e)),
            None => Ok(()),
        }
    }
}

fn write_commit_file(commit: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(commit)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Replaces `target` with `commit`: delete, then rename.
fn publish(commit: &Path, target: &Path) -> io::Result<()> {
    remove_if_exists(target)?;
    fs::rename(commit, target)
}

/// Completes a publish interrupted by a crash, if one is pending.
fn recover_pending_commit(commit: &Path, target: &Path) -> io::Result<()> {
    let data = match fs::read(commit) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if serde_json::from_slice::<IgnoredAny>(&data).is_err() {
        warn!("Discarding incomplete commit file {}", commit.display());
        return remove_if_exists(commit);
    }

    debug!("Recovering pending commit {}", commit.display());
    publish(commit, target)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
