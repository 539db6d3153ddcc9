/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the poller's
//! [configuration](crate::poller::PollerConfiguration).
//!
//! The poller logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [FireBlock](crate::events::FireBlockEvent) is printed:
//!
//! ```text
//! FireBlock, 1701329264, 18571000, d2836a703a02f3ca
//! ```
//!
//! In the snippet, the third value is the number of the fired block and the fourth value is its id.
//!
//! Events on the hot path of the driver ([FetchBlock](crate::events::FetchBlockEvent) and
//! [CheckSegment](crate::events::CheckSegmentEvent)) are logged at the `debug` level. Every other event
//! is logged at the `info` level.

use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const FETCH_BLOCK: &str = "FetchBlock";
pub const CHECK_SEGMENT: &str = "CheckSegment";
pub const FIRE_BLOCK: &str = "FireBlock";
pub const SET_LIB: &str = "SetLib";
pub const PURGE_BLOCKS: &str = "PurgeBlocks";
pub const SAVE_STATE: &str = "SaveState";
pub const LOAD_STATE: &str = "LoadState";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for FetchBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |fetch_block_event: &FetchBlockEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}, {}",
                FETCH_BLOCK,
                secs_since_unix_epoch(fetch_block_event.timestamp),
                fetch_block_event.block.num,
                fetch_block_event.block.id,
                fetch_block_event.parent.num,
                fetch_block_event.parent.id
            )
        };
        Box::new(logger)
    }
}

impl Logger for CheckSegmentEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |check_segment_event: &CheckSegmentEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}, {}",
                CHECK_SEGMENT,
                secs_since_unix_epoch(check_segment_event.timestamp),
                check_segment_event.target.num,
                check_segment_event.target.id,
                check_segment_event.segment_len,
                check_segment_event.reached_lib
            )
        };
        Box::new(logger)
    }
}

impl Logger for FireBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |fire_block_event: &FireBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                FIRE_BLOCK,
                secs_since_unix_epoch(fire_block_event.timestamp),
                fire_block_event.block.num,
                fire_block_event.block.id
            )
        };
        Box::new(logger)
    }
}

impl Logger for SetLibEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |set_lib_event: &SetLibEvent| {
            log::info!(
                "{}, {}, {}, {}",
                SET_LIB,
                secs_since_unix_epoch(set_lib_event.timestamp),
                set_lib_event.lib.num,
                set_lib_event.lib.id
            )
        };
        Box::new(logger)
    }
}

impl Logger for PurgeBlocksEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |purge_blocks_event: &PurgeBlocksEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PURGE_BLOCKS,
                secs_since_unix_epoch(purge_blocks_event.timestamp),
                purge_blocks_event.blocks.len(),
                purge_blocks_event
                    .blocks
                    .last()
                    .map(|block| block.num.to_string())
                    .unwrap_or_default()
            )
        };
        Box::new(logger)
    }
}

impl Logger for SaveStateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |save_state_event: &SaveStateEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                SAVE_STATE,
                secs_since_unix_epoch(save_state_event.timestamp),
                save_state_event.lib.num,
                save_state_event.last_fired_block.num,
                save_state_event.block_count
            )
        };
        Box::new(logger)
    }
}

impl Logger for LoadStateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |load_state_event: &LoadStateEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                LOAD_STATE,
                secs_since_unix_epoch(load_state_event.timestamp),
                load_state_event.lib.num,
                load_state_event.last_fired_block.num,
                load_state_event.block_count
            )
        };
        Box::new(logger)
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn secs_are_counted_from_epoch() {
        let timestamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1701329264);
        assert_eq!(secs_since_unix_epoch(timestamp), 1701329264);
        assert_eq!(
            secs_since_unix_epoch(SystemTime::UNIX_EPOCH - Duration::from_secs(1)),
            0
        );
    }
}
