//! Durable byte-keyed storage for blocks and chain pointers, backed by sled
//! (pure-Rust, no C dependencies).
//!
//! Every key is `type_tag_byte ∥ payload`. Three shapes are stored:
//!   BLOCK ∥ block_hash               → canonical block bytes
//!   PREVIOUS_BLOCK_HASH ∥ block_hash → parent hash bytes
//!   SYSTEM ∥ "last_block_hash"       → hash of the chain tip

use std::path::Path;

use tracing::info;

use pyrite_core::{Error, Result};

/// Well-known SYSTEM payload pointing at the chain tip.
pub const LAST_BLOCK_HASH_KEY: &[u8] = b"last_block_hash";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyTag {
    System = 1,
    Block = 2,
    PreviousBlockHash = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Open the directory as-is, keeping existing records.
    Default,
    /// Empty the directory before opening; used for resync-from-scratch.
    Clear,
}

fn tagged(tag: KeyTag, payload: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + payload.len());
    key.push(tag as u8);
    key.extend_from_slice(payload);
    key
}

fn db_err(e: impl std::fmt::Display) -> Error {
    Error::Database(e.to_string())
}

pub struct Database {
    db: sled::Db,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        if mode == OpenMode::Clear && path.exists() {
            std::fs::remove_dir_all(path).map_err(db_err)?;
            info!(path = %path.display(), "cleared database directory");
        }
        let db = sled::open(path).map_err(db_err)?;
        info!(path = %path.display(), "database open");
        Ok(Self { db })
    }

    pub fn put(&self, tag: KeyTag, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(tagged(tag, key), value).map_err(db_err)?;
        Ok(())
    }

    pub fn get(&self, tag: KeyTag, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .db
            .get(tagged(tag, key))
            .map_err(db_err)?
            .map(|v| v.to_vec()))
    }

    pub fn exists(&self, tag: KeyTag, key: &[u8]) -> Result<bool> {
        self.db.contains_key(tagged(tag, key)).map_err(db_err)
    }

    pub fn remove(&self, tag: KeyTag, key: &[u8]) -> Result<()> {
        self.db.remove(tagged(tag, key)).map_err(db_err)?;
        Ok(())
    }

    /// Block until all pending writes reach disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(db_err)?;
        Ok(())
    }
}
