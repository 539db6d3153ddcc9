/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Queries over chains of linked blocks.
//!
//! All queries walk parent pointers backward from a given block. Walks stop at the first unknown
//! parent, at the LIB, or when a block id is visited twice (a source declaring cyclic parents).

use std::collections::HashSet;

use crate::types::data_types::BlockRef;

use super::{tracked_block::Link, ForkDB};

impl ForkDB {
    /// Walk backward from `target` until the LIB is reached.
    ///
    /// ## Return value
    ///
    /// `(segment, reached_lib)`. The segment is ordered oldest first and ends with `target`.
    ///
    /// If the walk reaches the LIB, `reached_lib` is `true` and the segment starts at the LIB when the
    /// LIB block itself is stored, or at the LIB's child otherwise. If the walk stops at an unknown
    /// ancestor, `reached_lib` is `false` and the segment holds the partial chain collected so far: its
    /// first element's `previous` is the missing block.
    pub fn complete_segment(&self, target: &BlockRef) -> (Vec<Link>, bool) {
        let lib_id = match self.lib_id() {
            Some(id) => id,
            None => return (Vec::new(), false),
        };

        let mut reversed = Vec::new();
        let mut seen = HashSet::new();
        let mut cur = target.id.clone();
        let reached_lib = loop {
            if !seen.insert(cur.clone()) {
                log::warn!("cycle detected in fork db while walking back from {}", target);
                break false;
            }

            let node = match self.nodes.get(&cur) {
                Some(node) => node,
                None => break &cur == lib_id,
            };
            reversed.push(node.link());
            if &cur == lib_id {
                break true;
            }
            cur = node.previous.id.clone();
        };

        reversed.reverse();
        (reversed, reached_lib)
    }

    /// The chain of stored blocks ending at `head` whose numbers are strictly above the LIB number,
    /// oldest first.
    ///
    /// Unlike [`complete_segment`](Self::complete_segment), this does not require the chain to be
    /// linked to the LIB.
    pub fn reversible_segment(&self, head: &BlockRef) -> Vec<Link> {
        let lib_num = self.lib_num();
        let mut reversed = Vec::new();
        let mut seen = HashSet::new();
        let mut cur = head.id.clone();
        while seen.insert(cur.clone()) {
            let node = match self.nodes.get(&cur) {
                Some(node) if node.block.num > lib_num => node,
                _ => break,
            };
            reversed.push(node.link());
            cur = node.previous.id.clone();
        }
        reversed.reverse();
        reversed
    }

    /// The block numbered `num` in the ancestry of `head` (`head` included), if every block between
    /// them is stored.
    pub fn block_in_chain(&self, head: &BlockRef, num: u64) -> Option<BlockRef> {
        let mut seen = HashSet::new();
        let mut cur = head.id.clone();
        while seen.insert(cur.clone()) {
            let node = self.nodes.get(&cur)?;
            if node.block.num == num {
                return Some(node.block.clone());
            }
            if node.block.num < num {
                return None;
            }
            cur = node.previous.id.clone();
        }
        None
    }
}
