/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events emitted by the poller driver, for event handling and logging.
//!
//! Note: an event for a given action indicates that the action has been completed.
//!
//! Users register handlers for these events through the `on_*` setters of
//! [`PollerSpec`](crate::poller::PollerSpec). Handlers run on a dedicated event bus thread, so a slow
//! handler never delays the driver.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::types::data_types::BlockRef;

pub enum Event {
    // Events that involve the block source.
    FetchBlock(FetchBlockEvent),
    CheckSegment(CheckSegmentEvent),
    // Events that involve the block handler.
    FireBlock(FireBlockEvent),
    // Events that change the fork database's finality.
    SetLib(SetLibEvent),
    PurgeBlocks(PurgeBlocksEvent),
    // Events that involve the cursor file.
    SaveState(SaveStateEvent),
    LoadState(LoadStateEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            // The event bus only goes away after the driver, while shutting down.
            let _ = event_publisher.send(event);
        }
    }
}

/// A block was fetched from the source, possibly after retries.
pub struct FetchBlockEvent {
    pub timestamp: SystemTime,
    pub block: BlockRef,
    pub parent: BlockRef,
}

/// The segment ending at `target` was checked for a connection to the LIB.
pub struct CheckSegmentEvent {
    pub timestamp: SystemTime,
    pub target: BlockRef,
    pub segment_len: usize,
    pub reached_lib: bool,
}

/// A block was delivered to the block handler.
pub struct FireBlockEvent {
    pub timestamp: SystemTime,
    pub block: BlockRef,
}

pub struct SetLibEvent {
    pub timestamp: SystemTime,
    pub lib: BlockRef,
}

/// Blocks below the LIB were removed from the fork database.
pub struct PurgeBlocksEvent {
    pub timestamp: SystemTime,
    pub blocks: Vec<BlockRef>,
}

pub struct SaveStateEvent {
    pub timestamp: SystemTime,
    pub lib: BlockRef,
    pub last_fired_block: BlockRef,
    pub block_count: usize,
}

/// The poller resumed from a cursor file instead of cold-starting.
pub struct LoadStateEvent {
    pub timestamp: SystemTime,
    pub lib: BlockRef,
    pub last_fired_block: BlockRef,
    pub block_count: usize,
}
