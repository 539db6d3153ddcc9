/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The cursor file: what a poller persists so that it can resume after a crash.
//!
//! ## Contents
//!
//! A cursor file is a JSON document named [`cursor.json`](STATE_FILE_NAME) holding:
//! 1. `Lib`: the fork database's LIB at save time.
//! 2. `LastFiredBlock`: the last block of the segment that was fired just before saving.
//! 3. `Blocks`: every fired block still held by the fork database, ordered by number.
//!
//! Every block reference is written as `{"id": ..., "num": ..., "previous_ref_id": ...}`. For example:
//!
//! ```text
//! {"Lib":{"id":"98a","num":98,"previous_ref_id":""},"LastFiredBlock":{"id":"100a","num":100,"previous_ref_id":"99a"},"Blocks":[...]}
//! ```
//!
//! ## Resuming
//!
//! Only fired blocks are written, so a [rehydrated](StateFile::rehydrate) fork database marks all of
//! its blocks as fired, and the poller resumes fetching right after `LastFiredBlock`.
//! Blocks of pending branches are not written: after a restart they are fetched again.
//!
//! Saves replace the previous file atomically: the document is written to `cursor.json.tmp`, synced,
//! then renamed over `cursor.json`. A crash in the middle of a save leaves the previous file intact.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::fork_db::{ForkDB, ForkDBError, Link, TrackedBlock};
use crate::types::data_types::{BlockId, BlockRef};

pub const STATE_FILE_NAME: &str = "cursor.json";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlockRef {
    pub id: BlockId,
    pub num: u64,
    #[serde(rename = "previous_ref_id")]
    pub previous_id: BlockId,
}

impl StoredBlockRef {
    pub fn as_ref(&self) -> BlockRef {
        BlockRef::new(self.id.clone(), self.num)
    }
}

impl From<&Link> for StoredBlockRef {
    fn from(link: &Link) -> Self {
        Self {
            id: link.block.id.clone(),
            num: link.block.num,
            previous_id: link.previous.id.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(rename = "Lib")]
    pub lib: StoredBlockRef,
    #[serde(rename = "LastFiredBlock")]
    pub last_fired_block: StoredBlockRef,
    #[serde(rename = "Blocks", default)]
    pub blocks: Vec<StoredBlockRef>,
}

impl StateFile {
    /// Capture the state of `fork_db` right after the segment ending at `last_fired` was fired.
    pub fn snapshot(fork_db: &ForkDB, last_fired: &Link) -> Result<Self, StateFileError> {
        let lib = fork_db.lib().ok_or(StateFileError::NoLib)?;
        let blocks = fork_db
            .links()
            .iter()
            .filter(|link| fork_db.tracked(link.id()).map_or(false, |tracked| tracked.fired))
            .map(StoredBlockRef::from)
            .collect();

        Ok(Self {
            lib: StoredBlockRef {
                id: lib.id.clone(),
                num: lib.num,
                previous_id: BlockId::default(),
            },
            last_fired_block: StoredBlockRef::from(last_fired),
            blocks,
        })
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(STATE_FILE_NAME)
    }

    pub fn load(dir: &Path) -> Result<Self, StateFileError> {
        let path = Self::path(dir);
        let content = fs::read(&path).map_err(|source| StateFileError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&content).map_err(|source| StateFileError::Decode { path, source })
    }

    /// Atomically replace the cursor file in `dir`, creating `dir` if needed. Returns the path written.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, StateFileError> {
        fs::create_dir_all(dir).map_err(|source| StateFileError::Write {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = Self::path(dir);
        let tmp_path = path.with_extension("json.tmp");
        let mut content = serde_json::to_vec(self).map_err(StateFileError::Encode)?;
        content.push(b'\n');

        let result = (|| -> io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&content)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &path)
        })();

        if let Err(source) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(StateFileError::Write { path, source });
        }
        Ok(path)
    }

    /// Rebuild a fork database from this file: LIB from `Lib`, and every stored block linked as already fired.
    ///
    /// Parent numbers are not persisted, so each block's parent is assumed to be numbered `num - 1`.
    pub fn rehydrate(&self) -> Result<ForkDB, ForkDBError> {
        let mut fork_db = ForkDB::new();
        fork_db.init_lib(self.lib.as_ref())?;
        for stored in &self.blocks {
            let previous = BlockRef::new(stored.previous_id.clone(), stored.num.saturating_sub(1));
            fork_db.add_link(stored.as_ref(), previous, TrackedBlock::restored());
        }
        Ok(fork_db)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateFileError {
    #[error("unable to read cursor file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("unable to decode cursor file {path:?}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unable to encode cursor file: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("unable to write cursor file {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("fork db has no lib to save")]
    NoLib,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::block::{Block, Payload};
    use tempfile::TempDir;

    fn block(id: &str, num: u64, prev: &str) -> Block {
        Block {
            id: id.into(),
            number: num,
            parent_id: prev.into(),
            parent_number: num.saturating_sub(1),
            lib_number: 0,
            timestamp: 0,
            payload: Payload::default(),
        }
    }

    fn fired_db() -> ForkDB {
        let mut db = ForkDB::new();
        db.init_lib(BlockRef::new("97a", 97)).unwrap();
        for (id, num, prev) in [
            ("97a", 97, "96a"),
            ("98a", 98, "97a"),
            ("99a", 99, "98a"),
            ("100a", 100, "99a"),
        ] {
            let b = block(id, num, prev);
            db.add_link(b.as_ref(), b.parent_ref(), TrackedBlock::new(b));
            db.tracked_mut(&id.into()).unwrap().fired = true;
        }
        db.set_lib(&BlockRef::new("99a", 99), 98).unwrap();
        db.purge_before_lib();
        db
    }

    #[test]
    fn save_writes_expected_document() {
        let dir = TempDir::new().unwrap();
        let db = fired_db();
        let last = db.link(&"100a".into()).unwrap();

        let path = StateFile::snapshot(&db, &last).unwrap().save(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("cursor.json"));
        assert!(!dir.path().join("cursor.json.tmp").exists());

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            concat!(
                r#"{"Lib":{"id":"98a","num":98,"previous_ref_id":""},"#,
                r#""LastFiredBlock":{"id":"100a","num":100,"previous_ref_id":"99a"},"#,
                r#""Blocks":[{"id":"98a","num":98,"previous_ref_id":"97a"},"#,
                r#"{"id":"99a","num":99,"previous_ref_id":"98a"},"#,
                r#"{"id":"100a","num":100,"previous_ref_id":"99a"}]}"#,
                "\n"
            )
        );
    }

    #[test]
    fn unfired_blocks_are_not_saved() {
        let mut db = fired_db();
        let b = block("101b", 101, "100a");
        db.add_link(b.as_ref(), b.parent_ref(), TrackedBlock::new(b));

        let last = db.link(&"100a".into()).unwrap();
        let state = StateFile::snapshot(&db, &last).unwrap();
        assert!(state.blocks.iter().all(|stored| stored.id.as_str() != "101b"));
    }

    #[test]
    fn save_creates_directory_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("state").join("poller");
        let db = fired_db();

        let first = StateFile::snapshot(&db, &db.link(&"99a".into()).unwrap()).unwrap();
        first.save(&nested).unwrap();
        let second = StateFile::snapshot(&db, &db.link(&"100a".into()).unwrap()).unwrap();
        second.save(&nested).unwrap();

        assert_eq!(StateFile::load(&nested).unwrap(), second);
    }

    #[test]
    fn load_reports_missing_and_corrupt_files() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            StateFile::load(dir.path()),
            Err(StateFileError::Read { .. })
        ));

        fs::write(dir.path().join(STATE_FILE_NAME), "{\"Lib\":").unwrap();
        assert!(matches!(
            StateFile::load(dir.path()),
            Err(StateFileError::Decode { .. })
        ));
    }

    #[test]
    fn rehydrated_blocks_are_fired_and_linked() {
        let db = fired_db();
        let state = StateFile::snapshot(&db, &db.link(&"100a".into()).unwrap()).unwrap();

        let restored = state.rehydrate().unwrap();
        assert_eq!(restored.lib(), Some(&BlockRef::new("98a", 98)));
        assert_eq!(restored.len(), 3);
        assert!(restored.links().iter().all(|link| restored.tracked(link.id()).unwrap().fired));

        let (segment, reached) = restored.complete_segment(&BlockRef::new("100a", 100));
        assert!(reached);
        assert_eq!(segment.len(), 3);
    }
}
