/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The polling driver: turns a numeric block cursor over a [`BlockFetcher`](crate::fetcher::BlockFetcher)
//! into a finalized, ordered stream of blocks for a [`BlockHandler`](crate::handler::BlockHandler).
//!
//! The key components of this module are:
//! - The [configuration](PollerConfiguration) of a run, built with `PollerConfiguration::builder`.
//! - The [driver](BlockPoller), which can be run on the caller's thread with [`BlockPoller::run`].
//! - The builder-pattern interface to construct a [specification of the poller](PollerSpec) and
//!   [start](PollerSpec::start) it on its own thread, returning [the type](Poller) which keeps it alive.
//!
//! ## Starting a poller
//!
//! ```ignore
//! let configuration =
//!     PollerConfiguration::builder()
//!     .start_block_num(18_571_000)
//!     .finalized_block_num(finalized)
//!     .state_store_path("/var/lib/poller")
//!     .log_events(true)
//!     .build();
//!
//! let poller =
//!     PollerSpec::builder()
//!     .fetcher(rpc_fetcher)
//!     .handler(FireBlockHandler::stdout("type.googleapis.com/sf.ethereum.type.v2.Block"))
//!     .configuration(configuration)
//!     .on_set_lib(set_lib_handler)
//!     .build()
//!     .start();
//! ```
//!
//! ## Error handling
//!
//! The driver stops on the first [`PollerError`]:
//! 1. A fetch that still fails after the configured number of attempts.
//! 2. An error from the block handler. The block it was handed is not marked as fired.
//! 3. An invariant violation: a block below the LIB was requested, or the LIB was asked to move backward.
//!    Both mean that the source re-organized blocks it had already declared final.
//! 4. A cursor file that cannot be written.
//!
//! None of these are retried. The process is expected to be restarted by its supervisor, and to resume
//! from its cursor file.

pub mod config;
pub use config::PollerConfiguration;

pub mod driver;
pub use driver::{resolve_start_block, BlockPoller, PollerError};

pub mod handle;
pub use handle::{Poller, PollerSpec};
