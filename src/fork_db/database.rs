/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The fork graph itself, and the methods that mutate it.
//!
//! # Initializing the Fork Database
//!
//! A `ForkDB` starts out empty and without a LIB. Before any block is linked, the LIB must be set
//! exactly once with [`init_lib`](ForkDB::init_lib), either to the block the poller resolved as its
//! start block, or to the LIB read back from a [state file](crate::state_file).

use std::collections::HashMap;

use crate::types::data_types::{BlockId, BlockRef};

use super::{
    invariants,
    tracked_block::{Link, TrackedBlock},
};

/// A node of the fork graph.
#[derive(Clone, Debug)]
pub(super) struct Node {
    pub(super) block: BlockRef,
    pub(super) previous: BlockRef,
    pub(super) tracked: TrackedBlock,
}

impl Node {
    pub(super) fn link(&self) -> Link {
        Link {
            block: self.block.clone(),
            previous: self.previous.clone(),
        }
    }
}

/// Provisional block graph above the LIB. See the [module-level docs](super) for an overview.
#[derive(Debug, Default)]
pub struct ForkDB {
    pub(super) lib: Option<BlockRef>,
    /// Whether the current LIB was reported by the source, as opposed to set by `init_lib`.
    pub(super) lib_reported: bool,
    pub(super) nodes: HashMap<BlockId, Node>,
}

/// Lifecycle and LIB methods.
impl ForkDB {
    /// Create an empty `ForkDB` without a LIB.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting LIB to `lib`, with no prior history.
    ///
    /// ## Precondition
    ///
    /// Called exactly once, before any [`add_link`](Self::add_link).
    pub fn init_lib(&mut self, lib: BlockRef) -> Result<(), ForkDBError> {
        if let Some(current) = &self.lib {
            return Err(ForkDBError::LibAlreadyInitialized {
                lib: current.clone(),
            });
        }
        log::debug!("initializing fork db lib at {}", lib);
        self.lib = Some(lib);
        self.lib_reported = false;
        Ok(())
    }

    pub fn has_lib(&self) -> bool {
        self.lib.is_some()
    }

    pub fn lib(&self) -> Option<&BlockRef> {
        self.lib.as_ref()
    }

    /// Number of the current LIB, or `0` if it has not been initialized.
    pub fn lib_num(&self) -> u64 {
        self.lib.as_ref().map(|lib| lib.num).unwrap_or(0)
    }

    pub fn lib_id(&self) -> Option<&BlockId> {
        self.lib.as_ref().map(|lib| &lib.id)
    }

    /// Advance the LIB to the block numbered `lib_num` in the ancestry of `head` (inclusive).
    ///
    /// Returns whether the LIB actually moved. `lib_num` equal to the current LIB number is a no-op.
    /// If the block at `lib_num` cannot be reached from `head` through linked blocks, the LIB is left
    /// where it is.
    ///
    /// A LIB set by [`init_lib`](Self::init_lib) was not reported by the source, so until the source
    /// reports a LIB at or above it, lower values of `lib_num` are ignored rather than rejected.
    ///
    /// ## Precondition
    ///
    /// `head` was returned as the target of a [complete segment](Self::complete_segment) that reached
    /// the LIB.
    ///
    /// ## Error
    ///
    /// [`ForkDBError::LibMovedBackward`] if `lib_num` is below a current LIB number that the source
    /// reported itself.
    pub fn set_lib(&mut self, head: &BlockRef, lib_num: u64) -> Result<bool, ForkDBError> {
        let current = self.lib.as_ref().ok_or(ForkDBError::LibNotInitialized)?;
        if !self.lib_reported && lib_num < current.num {
            log::debug!(
                "source lib #{} is below the starting lib {}, keeping it",
                lib_num,
                current
            );
            return Ok(false);
        }
        invariants::check_lib_monotonic(current.num, lib_num)?;
        if lib_num == current.num {
            self.lib_reported = true;
            return Ok(false);
        }

        match self.block_in_chain(head, lib_num) {
            Some(new_lib) => {
                log::debug!("moving lib from {} to {}", current, new_lib);
                self.lib = Some(new_lib);
                self.lib_reported = true;
                Ok(true)
            }
            None => {
                log::warn!(
                    "unable to find block #{} in the chain of {}, not moving lib from {}",
                    lib_num,
                    head,
                    current
                );
                Ok(false)
            }
        }
    }
}

/// Graph mutators.
impl ForkDB {
    /// Register `block` as a child of `previous`.
    ///
    /// Returns `(already_seen_block, already_seen_parent)`. `already_seen_parent` is `true` if the
    /// parent is a stored block or is the LIB.
    ///
    /// Linking a block whose id is already known leaves the stored node untouched, which preserves its
    /// `fired` flag when a source re-delivers a block.
    pub fn add_link(
        &mut self,
        block: BlockRef,
        previous: BlockRef,
        tracked: TrackedBlock,
    ) -> (bool, bool) {
        let seen_parent =
            self.nodes.contains_key(&previous.id) || self.lib_id() == Some(&previous.id);

        if self.nodes.contains_key(&block.id) {
            return (true, seen_parent);
        }

        self.nodes.insert(
            block.id.clone(),
            Node {
                block,
                previous,
                tracked,
            },
        );
        (false, seen_parent)
    }

    /// Delete every block whose number is below the LIB number, returning the purged blocks in
    /// ascending order.
    pub fn purge_before_lib(&mut self) -> Vec<BlockRef> {
        let lib_num = self.lib_num();
        let mut purged: Vec<BlockRef> = self
            .nodes
            .values()
            .filter(|node| node.block.num < lib_num)
            .map(|node| node.block.clone())
            .collect();
        for block in &purged {
            self.nodes.remove(&block.id);
        }
        purged.sort_by(|a, b| a.num.cmp(&b.num).then_with(|| a.id.cmp(&b.id)));
        purged
    }

    pub fn tracked_mut(&mut self, id: &BlockId) -> Option<&mut TrackedBlock> {
        self.nodes.get_mut(id).map(|node| &mut node.tracked)
    }
}

/// Getters.
impl ForkDB {
    pub fn tracked(&self, id: &BlockId) -> Option<&TrackedBlock> {
        self.nodes.get(id).map(|node| &node.tracked)
    }

    pub fn link(&self, id: &BlockId) -> Option<Link> {
        self.nodes.get(id).map(Node::link)
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Every stored block, ordered by number then id.
    pub fn links(&self) -> Vec<Link> {
        let mut links: Vec<Link> = self.nodes.values().map(Node::link).collect();
        links.sort_by(|a, b| a.num().cmp(&b.num()).then_with(|| a.id().cmp(b.id())));
        links
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Errors raised by [`ForkDB`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ForkDBError {
    #[error("fork db lib has not been initialized")]
    LibNotInitialized,

    #[error("fork db lib is already initialized at {lib}")]
    LibAlreadyInitialized { lib: BlockRef },

    /// The LIB was asked to move backward, meaning a block that was already final got reorganized.
    #[error("lib cannot move backward from #{current} to #{requested}")]
    LibMovedBackward { current: u64, requested: u64 },

    /// A block below the LIB was requested. There should be no re-org below the LIB.
    #[error("block #{requested} is below the current lib #{lib}, there should be no re-org below the lib")]
    BelowLib { requested: u64, lib: u64 },

    /// A block that an invariant says should exist could not be found.
    #[error("block {block} expected in fork db but not found")]
    BlockExpectedButNotFound { block: BlockId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        block::{Block, Payload},
        data_types::BlockRef,
    };

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

    fn link(db: &mut ForkDB, id: &str, num: u64, prev: &str) -> (bool, bool) {
        let b = block(id, num, prev);
        db.add_link(b.as_ref(), b.parent_ref(), TrackedBlock::new(b))
    }

    #[test]
    fn init_lib_only_once() {
        let mut db = ForkDB::new();
        assert!(!db.has_lib());
        assert_eq!(db.lib_num(), 0);
        db.init_lib(BlockRef::new("100a", 100)).unwrap();
        assert_eq!(db.lib_num(), 100);
        assert_eq!(db.lib_id(), Some(&BlockId::new("100a")));
        assert!(matches!(
            db.init_lib(BlockRef::new("101a", 101)),
            Err(ForkDBError::LibAlreadyInitialized { .. })
        ));
    }

    #[test]
    fn add_link_reports_seen_block_and_parent() {
        let mut db = ForkDB::new();
        db.init_lib(BlockRef::new("100a", 100)).unwrap();

        assert_eq!(link(&mut db, "100a", 100, "99a"), (false, false));
        assert_eq!(link(&mut db, "101a", 101, "100a"), (false, true));
        assert_eq!(link(&mut db, "103a", 103, "102a"), (false, false));
        assert_eq!(link(&mut db, "101a", 101, "100a"), (true, true));
        assert_eq!(db.len(), 3);
    }

    #[test]
    fn parent_equal_to_lib_counts_as_seen() {
        let mut db = ForkDB::new();
        db.init_lib(BlockRef::new("100a", 100)).unwrap();
        assert_eq!(link(&mut db, "101a", 101, "100a"), (false, true));
    }

    #[test]
    fn re_adding_a_block_keeps_fired_flag() {
        let mut db = ForkDB::new();
        db.init_lib(BlockRef::new("100a", 100)).unwrap();
        link(&mut db, "100a", 100, "99a");
        db.tracked_mut(&"100a".into()).unwrap().fired = true;

        link(&mut db, "100a", 100, "99a");
        assert!(db.tracked(&"100a".into()).unwrap().fired);
    }

    #[test]
    fn set_lib_follows_head_ancestry() {
        let mut db = ForkDB::new();
        db.init_lib(BlockRef::new("97a", 97)).unwrap();
        link(&mut db, "97a", 97, "96a");
        link(&mut db, "98a", 98, "97a");
        link(&mut db, "99a", 99, "98a");

        assert!(db.set_lib(&BlockRef::new("99a", 99), 98).unwrap());
        assert_eq!(db.lib(), Some(&BlockRef::new("98a", 98)));

        // Same number is a no-op.
        assert!(!db.set_lib(&BlockRef::new("99a", 99), 98).unwrap());
        assert_eq!(db.lib(), Some(&BlockRef::new("98a", 98)));
    }

    #[test]
    fn set_lib_backward_is_rejected() {
        let mut db = ForkDB::new();
        db.init_lib(BlockRef::new("100a", 100)).unwrap();
        link(&mut db, "100a", 100, "99a");
        link(&mut db, "101a", 101, "100a");
        assert!(db.set_lib(&BlockRef::new("101a", 101), 101).unwrap());

        let err = db.set_lib(&BlockRef::new("101a", 101), 100).unwrap_err();
        assert!(matches!(
            err,
            ForkDBError::LibMovedBackward {
                current: 101,
                requested: 100
            }
        ));
        assert_eq!(db.lib_num(), 101);
    }

    #[test]
    fn lower_lib_is_ignored_until_source_reports_one() {
        let mut db = ForkDB::new();
        db.init_lib(BlockRef::new("100a", 100)).unwrap();
        link(&mut db, "100a", 100, "99a");
        link(&mut db, "101a", 101, "100a");

        // The starting LIB was not reported by the source.
        assert!(!db.set_lib(&BlockRef::new("100a", 100), 99).unwrap());
        assert_eq!(db.lib_num(), 100);

        // Once the source reports a LIB at the starting one, going back below it is an error.
        assert!(!db.set_lib(&BlockRef::new("101a", 101), 100).unwrap());
        assert!(matches!(
            db.set_lib(&BlockRef::new("101a", 101), 99),
            Err(ForkDBError::LibMovedBackward {
                current: 100,
                requested: 99
            })
        ));
    }

    #[test]
    fn set_lib_unreachable_keeps_lib() {
        let mut db = ForkDB::new();
        db.init_lib(BlockRef::new("100a", 100)).unwrap();
        link(&mut db, "100a", 100, "99a");
        link(&mut db, "102a", 102, "101a");

        assert!(!db.set_lib(&BlockRef::new("102a", 102), 101).unwrap());
        assert_eq!(db.lib(), Some(&BlockRef::new("100a", 100)));
    }

    #[test]
    fn set_lib_without_init_fails() {
        let mut db = ForkDB::new();
        assert!(matches!(
            db.set_lib(&BlockRef::new("1a", 1), 1),
            Err(ForkDBError::LibNotInitialized)
        ));
    }

    #[test]
    fn purge_removes_only_blocks_below_lib() {
        let mut db = ForkDB::new();
        db.init_lib(BlockRef::new("100a", 100)).unwrap();
        link(&mut db, "100a", 100, "99a");
        link(&mut db, "101a", 101, "100a");
        link(&mut db, "101b", 101, "100a");
        link(&mut db, "102a", 102, "101a");
        db.set_lib(&BlockRef::new("102a", 102), 102).unwrap();

        let purged = db.purge_before_lib();
        assert_eq!(
            purged,
            vec![
                BlockRef::new("100a", 100),
                BlockRef::new("101a", 101),
                BlockRef::new("101b", 101),
            ]
        );
        assert_eq!(db.len(), 1);
        assert!(db.contains(&"102a".into()));

        // Safe to call again.
        assert!(db.purge_before_lib().is_empty());
    }

    #[test]
    fn links_are_ordered_by_number() {
        let mut db = ForkDB::new();
        db.init_lib(BlockRef::new("100a", 100)).unwrap();
        link(&mut db, "102a", 102, "101a");
        link(&mut db, "100a", 100, "99a");
        link(&mut db, "101b", 101, "100a");
        link(&mut db, "101a", 101, "100a");

        let ids: Vec<String> = db.links().iter().map(|l| l.id().to_string()).collect();
        assert_eq!(ids, vec!["100a", "101a", "101b", "102a"]);
    }
}
