/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' envelope and its associated methods.

use crate::types::data_types::{BlockId, BlockRef};

/// Chain-specific block content, tagged with the type URL of its encoding (e.g.
/// `type.googleapis.com/sf.ethereum.type.v2.Block`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload {
    pub type_url: String,
    pub value: Vec<u8>,
}

impl Payload {
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }
}

/// A block as seen by the source at the time it was fetched.
///
/// `parent_id`/`parent_number` are the source's declared parent. The poller trusts these links and
/// does not check that `number == parent_number + 1`.
///
/// `lib_number` is the number of the last irreversible block as reported by the source when this
/// block was produced, and `timestamp` is in nanoseconds since the Unix Epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub number: u64,
    pub parent_id: BlockId,
    pub parent_number: u64,
    pub lib_number: u64,
    pub timestamp: u64,
    pub payload: Payload,
}

impl Block {
    pub fn as_ref(&self) -> BlockRef {
        BlockRef {
            id: self.id.clone(),
            num: self.number,
        }
    }

    pub fn parent_ref(&self) -> BlockRef {
        BlockRef {
            id: self.parent_id.clone(),
            num: self.parent_number,
        }
    }
}
