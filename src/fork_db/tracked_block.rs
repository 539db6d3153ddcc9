/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The values stored as nodes of the fork graph.

use crate::types::{
    block::Block,
    data_types::{BlockId, BlockRef},
};

/// A block held by the [`ForkDB`](super::ForkDB), together with whether it has already been handed
/// to the [`BlockHandler`](crate::handler::BlockHandler).
///
/// `block` is `None` for blocks rehydrated from a [state file](crate::state_file): only their
/// references were persisted, and they were all fired before being persisted.
#[derive(Clone, Debug)]
pub struct TrackedBlock {
    pub block: Option<Block>,
    pub fired: bool,
}

impl TrackedBlock {
    /// A freshly fetched block that has not been fired yet.
    pub fn new(block: Block) -> Self {
        Self {
            block: Some(block),
            fired: false,
        }
    }

    /// A block restored from persisted state. Always already fired.
    pub fn restored() -> Self {
        Self {
            block: None,
            fired: true,
        }
    }
}

/// A cheap view of one node of the fork graph: the block and the parent it declared.
///
/// Segment queries return `Link`s rather than references into the graph so that the caller can
/// mutate the graph (e.g., mark blocks as fired) while iterating over a segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub block: BlockRef,
    pub previous: BlockRef,
}

impl Link {
    pub fn id(&self) -> &BlockId {
        &self.block.id
    }

    pub fn num(&self) -> u64 {
        self.block.num
    }
}
