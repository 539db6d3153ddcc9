/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A fork-aware block poller: turns blocks polled by number from a non-streaming chain source (e.g., an
//! RPC endpoint) into a linearized stream of final blocks, delivered exactly once and in order. It offers:
//! 1. A [fork database](fork_db) that links blocks above the last irreversible block (LIB) and decides
//!    which branch is final.
//! 2. A [polling driver](poller) that walks forward along the chain and backward into missing ancestors.
//! 3. Pluggable block [sources](fetcher) and [consumers](handler).
//! 4. A [cursor file](state_file) to resume after a crash without losing fork context.

pub mod types;

pub mod fork_db;

pub mod cursor;

pub mod fetcher;

pub mod handler;

pub mod state_file;

pub mod poller;

pub mod events;

pub(crate) mod event_bus;

pub mod logging;
