/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The polling loop.
//!
//! A [`BlockPoller`] owns its [`ForkDB`] and [`Cursor`] exclusively, and drives them from a single
//! thread: fetch, link, check the segment, fire, persist, sleep, repeat. Nothing here is shared, so
//! nothing here is locked.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::SystemTime;

use crate::cursor::Cursor;
use crate::events::*;
use crate::fetcher::{fetch_with_retry, BlockFetcher, FetchError};
use crate::fork_db::{invariants, ForkDB, ForkDBError, Link, TrackedBlock};
use crate::handler::{BlockHandler, HandlerError};
use crate::state_file::{StateFile, StateFileError};
use crate::types::{block::Block, data_types::BlockRef};

use super::PollerConfiguration;

/// Never start ahead of what the source has already finalized.
pub fn resolve_start_block(start_block_num: u64, finalized_block_num: u64) -> u64 {
    start_block_num.min(finalized_block_num)
}

pub struct BlockPoller<F: BlockFetcher, H: BlockHandler> {
    config: PollerConfiguration,
    fetcher: F,
    handler: H,
    fork_db: ForkDB,
    cursor: Cursor,
    event_publisher: Option<Sender<Event>>,
}

impl<F: BlockFetcher, H: BlockHandler> BlockPoller<F, H> {
    pub fn new(config: PollerConfiguration, fetcher: F, handler: H) -> Self {
        Self {
            config,
            fetcher,
            handler,
            fork_db: ForkDB::new(),
            cursor: Cursor::new(),
            event_publisher: None,
        }
    }

    pub(crate) fn with_event_publisher(mut self, event_publisher: Option<Sender<Event>>) -> Self {
        self.event_publisher = event_publisher;
        self
    }

    pub fn fork_db(&self) -> &ForkDB {
        &self.fork_db
    }

    pub fn into_parts(self) -> (F, H) {
        (self.fetcher, self.handler)
    }

    /// Run the polling loop until `shutdown_signal` receives a value or hangs up, until the configured
    /// stop block is final, or until an unrecoverable error.
    ///
    /// ## Startup
    ///
    /// 1. [Initialize](BlockHandler::init) the handler.
    /// 2. [Resolve](resolve_start_block) the start block.
    /// 3. If a cursor file can be loaded from the state store path, rebuild the fork database from it and
    ///    resume right after its last fired block. Otherwise fetch the resolved start block and use it as
    ///    the LIB.
    ///
    /// ## Iteration
    ///
    /// Each iteration processes one block. When the segment ending at the cursor's target reaches the
    /// LIB, its unfired blocks are fired, the LIB advances, blocks below it are purged, state is saved,
    /// and the next block is the one after the segment. Otherwise the next block is the missing
    /// ancestor of the segment.
    ///
    /// Cancellation is only observed between iterations and while sleeping for the fetcher's polling
    /// interval.
    pub fn run(&mut self, shutdown_signal: &Receiver<()>) -> Result<(), PollerError> {
        self.fork_db = ForkDB::new();
        self.cursor = Cursor::new();

        self.handler.init().map_err(PollerError::HandlerInit)?;

        let start_block_num = self.config.start_block_num;
        let resolved_start_block_num = resolve_start_block(
            start_block_num,
            self.config.finalized_block_num.unwrap_or(start_block_num),
        );
        log::info!(
            "starting poller, start block #{}, finalized block {:?}, resolved start block #{}",
            start_block_num,
            self.config.finalized_block_num,
            resolved_start_block_num
        );

        let (mut next_block_num, mut pending_block) = self.init_state(resolved_start_block_num)?;
        let polling_interval = self.fetcher.polling_interval();

        loop {
            match shutdown_signal.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    log::info!("stop requested, next block would have been #{}", next_block_num);
                    return Ok(());
                }
                Err(TryRecvError::Empty) => (),
            }

            invariants::check_above_lib(next_block_num, self.fork_db.lib_num())?;

            let block = match pending_block.take() {
                Some(block) => block,
                None => self.fetch_block(next_block_num)?,
            };

            let (next, reached_lib) = self.process_block(block)?;
            next_block_num = next;

            if let Some(stop_block_num) = self.config.stop_block_num {
                if reached_lib && next_block_num > stop_block_num {
                    log::info!("stop block #{} is final, stopping", stop_block_num);
                    return Ok(());
                }
            }

            if !polling_interval.is_zero() {
                match shutdown_signal.recv_timeout(polling_interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        log::info!(
                            "stop requested while waiting to fetch block #{}",
                            next_block_num
                        );
                        return Ok(());
                    }
                    Err(RecvTimeoutError::Timeout) => (),
                }
            }
        }
    }

    /// Returns the number of the first block to process, and the block itself if it was already
    /// fetched.
    fn init_state(
        &mut self,
        resolved_start_block_num: u64,
    ) -> Result<(u64, Option<Block>), PollerError> {
        if let Some(dir) = self.config.state_store_path.clone() {
            match StateFile::load(&dir) {
                Ok(state) => {
                    self.fork_db = state.rehydrate()?;
                    log::info!(
                        "loaded cursor, last fired block {}, lib {}, {} blocks",
                        state.last_fired_block.as_ref(),
                        state.lib.as_ref(),
                        state.blocks.len()
                    );
                    self.publish(Event::LoadState(LoadStateEvent {
                        timestamp: SystemTime::now(),
                        lib: state.lib.as_ref(),
                        last_fired_block: state.last_fired_block.as_ref(),
                        block_count: state.blocks.len(),
                    }));
                    return Ok((state.last_fired_block.num + 1, None));
                }
                Err(err) => log::warn!(
                    "unable to load cursor file, initializing a new fork db at #{}: {}",
                    resolved_start_block_num,
                    err
                ),
            }
        }

        let start_block = self.fetch_block(resolved_start_block_num)?;
        self.fork_db.init_lib(start_block.as_ref())?;
        Ok((resolved_start_block_num, Some(start_block)))
    }

    fn fetch_block(&mut self, num: u64) -> Result<Block, PollerError> {
        let block = fetch_with_retry(
            &mut self.fetcher,
            num,
            self.config.fetch_retry_count,
            self.config.fetch_retry_delay,
        )
        .map_err(|(attempts, source)| PollerError::FetchFailed {
            num,
            attempts,
            source,
        })?;

        self.publish(Event::FetchBlock(FetchBlockEvent {
            timestamp: SystemTime::now(),
            block: block.as_ref(),
            parent: block.parent_ref(),
        }));
        Ok(block)
    }

    /// Link `block`, then check the segment ending at the cursor's target.
    ///
    /// Returns the number of the next block to fetch, and whether the segment reached the LIB.
    fn process_block(&mut self, block: Block) -> Result<(u64, bool), PollerError> {
        let block_ref = block.as_ref();
        let (seen_block, seen_parent) = self.fork_db.add_link(
            block_ref.clone(),
            block.parent_ref(),
            TrackedBlock::new(block.clone()),
        );
        self.cursor.add_block(&block, seen_block, seen_parent);

        let target = self
            .cursor
            .segment_target()
            .cloned()
            .ok_or_else(|| ForkDBError::BlockExpectedButNotFound {
                block: block_ref.id.clone(),
            })?;
        let (segment, reached_lib) = self.fork_db.complete_segment(&target);
        log::debug!(
            "checked if block {} is a complete segment: {} blocks, reached lib: {}",
            target,
            segment.len(),
            reached_lib
        );
        self.publish(Event::CheckSegment(CheckSegmentEvent {
            timestamp: SystemTime::now(),
            target: target.clone(),
            segment_len: segment.len(),
            reached_lib,
        }));

        let (first, last) = match (segment.first(), segment.last()) {
            (Some(first), Some(last)) => (first.clone(), last.clone()),
            _ => return Err(ForkDBError::BlockExpectedButNotFound { block: target.id }.into()),
        };

        if !reached_lib {
            self.cursor.block_is_not_connected_to_lib(&first.previous);
            return Ok((first.previous.num, false));
        }

        self.cursor.block_is_connected_to_lib();
        self.fire_complete_segment(&segment)?;

        let lib_num = self.lib_num_after(&block);
        log::debug!("setting lib from block {} to #{}", block_ref, lib_num);
        if self.fork_db.set_lib(&block_ref, lib_num)? {
            if let Some(lib) = self.fork_db.lib() {
                self.publish(Event::SetLib(SetLibEvent {
                    timestamp: SystemTime::now(),
                    lib: lib.clone(),
                }));
            }
        }

        let purged = self.fork_db.purge_before_lib();
        if !purged.is_empty() {
            self.publish(Event::PurgeBlocks(PurgeBlocksEvent {
                timestamp: SystemTime::now(),
                blocks: purged,
            }));
        }

        self.save_state(&last)?;
        Ok((last.num() + 1, true))
    }

    /// Hand every unfired block of `segment` to the handler, oldest first.
    ///
    /// Blocks below the start block are marked fired without being handed over.
    pub(crate) fn fire_complete_segment(&mut self, segment: &[Link]) -> Result<(), PollerError> {
        for link in segment {
            let tracked = self
                .fork_db
                .tracked_mut(link.id())
                .ok_or_else(|| ForkDBError::BlockExpectedButNotFound {
                    block: link.id().clone(),
                })?;
            if tracked.fired {
                continue;
            }
            if link.num() < self.config.start_block_num {
                tracked.fired = true;
                continue;
            }

            let block = tracked
                .block
                .as_ref()
                .ok_or_else(|| ForkDBError::BlockExpectedButNotFound {
                    block: link.id().clone(),
                })?;
            self.handler
                .handle(block)
                .map_err(|source| PollerError::HandlerFailed {
                    block: link.block.clone(),
                    source,
                })?;
            tracked.fired = true;

            Event::publish(
                &self.event_publisher,
                Event::FireBlock(FireBlockEvent {
                    timestamp: SystemTime::now(),
                    block: link.block.clone(),
                }),
            );
        }
        Ok(())
    }

    /// The LIB number to use after `block` completed a segment.
    ///
    /// A source LIB above `block` (e.g., while catching up) means `block` itself is final.
    fn lib_num_after(&self, block: &Block) -> u64 {
        let source_lib_num = block.lib_number.min(block.number);
        match self.config.force_finality_after_blocks {
            Some(n) => source_lib_num
                .max(block.number.saturating_sub(n))
                .max(self.fork_db.lib_num()),
            None => source_lib_num,
        }
    }

    fn save_state(&self, last_fired: &Link) -> Result<(), PollerError> {
        let dir = match &self.config.state_store_path {
            Some(dir) => dir,
            None => return Ok(()),
        };

        let state = StateFile::snapshot(&self.fork_db, last_fired)?;
        let path = state.save(dir)?;
        log::info!(
            "saved cursor {:?}, last fired block {}, lib {}, {} blocks",
            path,
            last_fired.block,
            state.lib.as_ref(),
            state.blocks.len()
        );
        self.publish(Event::SaveState(SaveStateEvent {
            timestamp: SystemTime::now(),
            lib: state.lib.as_ref(),
            last_fired_block: last_fired.block.clone(),
            block_count: state.blocks.len(),
        }));
        Ok(())
    }

    fn publish(&self, event: Event) {
        Event::publish(&self.event_publisher, event)
    }
}

/// Errors that stop a [`BlockPoller`].
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error("unable to fetch block #{num} after {attempts} attempts: {source}")]
    FetchFailed {
        num: u64,
        attempts: u32,
        source: FetchError,
    },

    #[error("unable to initialize block handler: {0}")]
    HandlerInit(#[source] HandlerError),

    #[error("firing block {block}: {source}")]
    HandlerFailed {
        block: BlockRef,
        source: HandlerError,
    },

    /// The source broke its finality contract, or the fork database lost a block it should hold.
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] ForkDBError),

    #[error(transparent)]
    StateFile(#[from] StateFileError),

    #[error("poller driver thread panicked")]
    DriverPanicked,
}
