/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The in-memory fork graph that the poller drives.
//!
//! # The Fork Database
//!
//! A fork database is a graph of [block references](crate::types::data_types::BlockRef) keyed by block
//! id, where every node points to the parent its source declared. The graph hangs from a single block
//! called the "Last Irreversible Block" (LIB). Blocks at or above the LIB are kept until the LIB moves
//! past them, at which point they are "purged".
//!
//! Like a block tree, a fork database is "narrow": most blocks have exactly one child. Above the LIB,
//! however, multiple **candidate branches** may coexist, for example when the source reorganized and
//! the poller has seen both the abandoned and the new blocks at some height. Nothing in this module
//! chooses between branches. A branch "wins" when a block on it is linked back to the LIB and the LIB
//! is then moved forward along it; losing branches are never fired and are dropped by the next purge.
//!
//! There are **two kinds of blocks** in a fork database:
//! 1. **Linked blocks**: blocks from which walking parent pointers reaches the LIB. These form a
//!    [complete segment](ForkDB::complete_segment) and may be fired.
//! 2. **Dangling blocks**: blocks whose ancestry stops at an unknown parent. The poller keeps fetching
//!    the missing ancestors until the block becomes linked.
//!
//! # Ownership
//!
//! A `ForkDB` is not thread-safe and is owned exclusively by one [poller](crate::poller) run. Running
//! several pollers in one process means running several `ForkDB`s; nothing is shared between them.
//!
//! The invariants that the LIB must respect are implemented in [`invariants`].

pub mod database;
pub use database::{ForkDB, ForkDBError};

pub mod invariants;

pub mod segments;

pub mod tracked_block;
pub use tracked_block::{Link, TrackedBlock};
