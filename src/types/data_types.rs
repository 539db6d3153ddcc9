/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to identify blocks, and do not have any major "active" behavior.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Opaque identifier of a block, as reported by the chain source (usually a hex-encoded hash).
///
/// The poller never interprets the content of a `BlockId`; two ids are the same block if and only
/// if they are byte-for-byte equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Create a new `BlockId` wrapping `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string of this `BlockId`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the empty id, used by sources for "no parent".
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        BlockId::new(value)
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        BlockId(value)
    }
}

/// Identity of a block: its id together with its number.
///
/// Two `BlockRef`s are equal iff both fields match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub id: BlockId,
    pub num: u64,
}

impl BlockRef {
    pub fn new(id: impl Into<BlockId>, num: u64) -> Self {
        Self { id: id.into(), num }
    }
}

impl Display for BlockRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.num, self.id)
    }
}
