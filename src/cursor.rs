/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The linearization cursor: decides which block a [complete segment](crate::fork_db::ForkDB::complete_segment)
//! query should target after each fetched block.
//!
//! ## Segment heads
//!
//! The cursor tracks the "head" of the segment it is trying to link to the LIB. Normally this is the
//! block that was just fetched. When a segment fails to reach the LIB, the poller walks backward to
//! fetch the missing ancestor, and the cursor remembers which ancestor it is waiting for. When that
//! ancestor arrives, the head stays where it was, so that once the gap is closed the whole branch up
//! to the head is fired in one go. Any other block arriving instead starts a new segment.
//!
//! ## States
//!
//! |State|Meaning|
//! |---|---|
//! |[`ContinuousSegment`](SegmentState::ContinuousSegment)|The last block extended the previously processed block, or the last segment reached the LIB.|
//! |[`DivergentSegment`](SegmentState::DivergentSegment)|The last block did not extend the previous one (a reorg or a backward walk), or the last segment did not reach the LIB.|
//!
//! The state is diagnostic: it is logged, but only the segment head drives the poller.

use std::fmt::{self, Display, Formatter};

use crate::types::{
    block::Block,
    data_types::{BlockId, BlockRef},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentState {
    ContinuousSegment,
    DivergentSegment,
}

impl Display for SegmentState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SegmentState::ContinuousSegment => write!(f, "continuous"),
            SegmentState::DivergentSegment => write!(f, "divergent"),
        }
    }
}

#[derive(Debug)]
pub struct Cursor {
    state: SegmentState,
    head: Option<BlockRef>,
    last_added: Option<BlockRef>,
    awaited: Option<BlockId>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            state: SegmentState::ContinuousSegment,
            head: None,
            last_added: None,
            awaited: None,
        }
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    /// The ancestor the previous evaluation found missing, if any.
    pub fn awaited(&self) -> Option<&BlockId> {
        self.awaited.as_ref()
    }

    /// Record that `block` was just linked into the fork database.
    pub fn add_block(&mut self, block: &Block, seen_block: bool, seen_parent: bool) {
        let fills_gap = self.awaited.as_ref() == Some(&block.id);
        if !fills_gap {
            self.head = Some(block.as_ref());
        }

        let extends_previous = self
            .last_added
            .as_ref()
            .map_or(false, |last| last.id == block.parent_id);
        self.state = if seen_parent && extends_previous {
            SegmentState::ContinuousSegment
        } else {
            SegmentState::DivergentSegment
        };

        log::debug!(
            "cursor added block {} (seen: {}, parent seen: {}, fills gap: {}), state {}",
            block.as_ref(),
            seen_block,
            seen_parent,
            fills_gap,
            self.state
        );
        self.last_added = Some(block.as_ref());
    }

    /// The block to use as target of the next complete segment query.
    pub fn segment_target(&self) -> Option<&BlockRef> {
        self.head.as_ref()
    }

    /// Record that the segment ending at the target reached the LIB.
    pub fn block_is_connected_to_lib(&mut self) {
        self.awaited = None;
        self.state = SegmentState::ContinuousSegment;
    }

    /// Record that the segment ending at the target stopped at `missing`, which the poller fetches next.
    pub fn block_is_not_connected_to_lib(&mut self, missing: &BlockRef) {
        self.awaited = Some(missing.id.clone());
        self.state = SegmentState::DivergentSegment;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::block::Payload;

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

    #[test]
    fn forward_walk_stays_continuous() {
        let mut cursor = Cursor::new();
        cursor.add_block(&block("100a", 100, "99a"), false, false);
        cursor.block_is_connected_to_lib();
        cursor.add_block(&block("101a", 101, "100a"), false, true);
        assert_eq!(cursor.state(), SegmentState::ContinuousSegment);
        assert_eq!(cursor.segment_target(), Some(&BlockRef::new("101a", 101)));
    }

    #[test]
    fn parent_mismatch_is_divergent() {
        let mut cursor = Cursor::new();
        cursor.add_block(&block("103a", 103, "102a"), false, true);
        cursor.add_block(&block("104b", 104, "103b"), false, false);
        assert_eq!(cursor.state(), SegmentState::DivergentSegment);
        assert_eq!(cursor.segment_target(), Some(&BlockRef::new("104b", 104)));
    }

    #[test]
    fn awaited_ancestor_keeps_segment_head() {
        let mut cursor = Cursor::new();
        cursor.add_block(&block("105b", 105, "104b"), false, true);
        cursor.block_is_not_connected_to_lib(&BlockRef::new("103b", 103));
        assert_eq!(cursor.awaited(), Some(&BlockId::new("103b")));

        cursor.add_block(&block("103b", 103, "102b"), false, false);
        assert_eq!(cursor.segment_target(), Some(&BlockRef::new("105b", 105)));

        cursor.block_is_connected_to_lib();
        assert_eq!(cursor.state(), SegmentState::ContinuousSegment);
        assert!(cursor.awaited().is_none());
    }

    #[test]
    fn unexpected_block_starts_new_segment() {
        let mut cursor = Cursor::new();
        cursor.add_block(&block("104b", 104, "103b"), false, false);
        cursor.block_is_not_connected_to_lib(&BlockRef::new("103b", 103));

        cursor.add_block(&block("103a", 103, "102a"), true, true);
        assert_eq!(cursor.segment_target(), Some(&BlockRef::new("103a", 103)));
    }
}
