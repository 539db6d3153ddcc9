/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! User-defined parameters of a poller run.

use std::path::PathBuf;
use std::time::Duration;

use typed_builder::TypedBuilder;

/// Stores the user-defined parameters required to run a [`BlockPoller`](super::BlockPoller), that is:
/// 1. The start block number: the first block that may be handed to the
///    [block handler](crate::handler::BlockHandler). Blocks below it may still be fetched and linked
///    into the fork database, but are never handled.
/// 2. The source's finalized block number at launch, if known. The poller never starts ahead of it.
/// 3. The stop block number. If set, the poller returns once every block up to and including it has
///    been made final.
/// 4. The fetch retry count and delay: how many times a block fetch is attempted before the poller
///    gives up, and how long it waits between attempts.
/// 5. The "force finality after blocks" override. See below.
/// 6. The state store path: the directory holding the [cursor file](crate::state_file). If unset,
///    nothing is persisted and every run cold-starts.
/// 7. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Force finality
///
/// Some sources never report a LIB. Setting `force_finality_after_blocks` to `n` makes the poller treat
/// a block as final once it is `n` blocks deep: the LIB used after fetching block `b` is the highest of
/// `b.lib_number` and `b.number - n`. The forced LIB never exceeds `b.number`, and never goes below the
/// current LIB.
///
/// ## Log Events
///
/// The poller logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [PollerConfiguration]. On the builder call the following methods to construct a valid [PollerConfiguration].

    Required:
    - `.start_block_num(...)`

    Optional:
    - `.finalized_block_num(...)`
    - `.stop_block_num(...)`
    - `.fetch_retry_count(...)`
    - `.fetch_retry_delay(...)`
    - `.force_finality_after_blocks(...)`
    - `.state_store_path(...)`
    - `.log_events(...)`
"))]
pub struct PollerConfiguration {
    #[builder(setter(doc = "Set the first block number that may be handled. Required."))]
    pub start_block_num: u64,
    #[builder(default, setter(strip_option, doc = "Set the source's finalized block number at launch. Optional."))]
    pub finalized_block_num: Option<u64>,
    #[builder(default, setter(strip_option, doc = "Set the last block number to make final before returning. Optional."))]
    pub stop_block_num: Option<u64>,
    #[builder(default = 4, setter(doc = "Set the number of attempts made to fetch a block. Optional, defaults to 4."))]
    pub fetch_retry_count: u32,
    #[builder(default = Duration::from_secs(1), setter(doc = "Set the delay between two fetch attempts. Optional, defaults to 1 second."))]
    pub fetch_retry_delay: Duration,
    #[builder(default, setter(strip_option, doc = "Treat blocks as final once they are this many blocks deep. Optional."))]
    pub force_finality_after_blocks: Option<u64>,
    #[builder(default, setter(strip_option, into, doc = "Set the directory holding the cursor file. Optional."))]
    pub state_store_path: Option<PathBuf>,
    #[builder(default = false, setter(doc = "Enable logging? Optional, defaults to false."))]
    pub log_events: bool,
}
