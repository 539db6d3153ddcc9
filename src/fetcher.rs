/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Trait for pluggable block sources, and helpers to fetch from them reliably.
//!
//! A [`BlockFetcher`] is the chain-specific part of a poller: typically a client of a node's RPC
//! endpoint that knows how to turn "the block at height N" into a [`Block`]. The poller never
//! assumes anything about the source beyond this trait:
//! 1. The returned block's `parent_id`/`parent_number` reflect the source's view of the chain at the
//!    time of the call, and may change between calls (re-orgs).
//! 2. The returned block's `lib_number` is the source's finalization point at the time of the call.
//!
//! Failures are expected to be transient. The poller retries them with [`fetch_with_retry`].

use std::thread;
use std::time::Duration;

use crate::types::block::Block;

pub trait BlockFetcher {
    /// Fetch the block currently at height `num` in the source's view of the chain.
    fn fetch(&mut self, num: u64) -> Result<Block, FetchError>;

    /// How long the poller should wait between two iterations. `Duration::ZERO` means no wait.
    fn polling_interval(&self) -> Duration {
        Duration::ZERO
    }
}

impl<F: BlockFetcher + ?Sized> BlockFetcher for Box<F> {
    fn fetch(&mut self, num: u64) -> Result<Block, FetchError> {
        (**self).fetch(num)
    }

    fn polling_interval(&self) -> Duration {
        (**self).polling_interval()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("block #{0} is not available yet")]
    NotFound(u64),

    #[error("source error: {0}")]
    Source(String),

    #[error("all {} clients failed to fetch block #{num}", .failures.len())]
    AllClientsFailed { num: u64, failures: Vec<FetchError> },
}

/// Call `fetcher.fetch(num)` up to `retry_count` times (at least once), sleeping `retry_delay`
/// between consecutive attempts.
///
/// On exhaustion, returns the number of attempts made together with the last error.
pub fn fetch_with_retry<F: BlockFetcher + ?Sized>(
    fetcher: &mut F,
    num: u64,
    retry_count: u32,
    retry_delay: Duration,
) -> Result<Block, (u32, FetchError)> {
    let attempts = retry_count.max(1);
    let mut attempt = 1;
    loop {
        match fetcher.fetch(num) {
            Ok(block) => return Ok(block),
            Err(err) if attempt < attempts => {
                log::debug!(
                    "fetching block #{} failed (attempt {}/{}): {}",
                    num,
                    attempt,
                    attempts,
                    err
                );
                if !retry_delay.is_zero() {
                    thread::sleep(retry_delay);
                }
                attempt += 1;
            }
            Err(err) => return Err((attempt, err)),
        }
    }
}

/// A fetcher that tries several underlying fetchers in order, e.g., one per RPC endpoint.
///
/// Each call to [`fetch`](BlockFetcher::fetch) starts again from the first fetcher: a fetcher that
/// failed once is not demoted.
pub struct FallbackFetcher {
    fetchers: Vec<Box<dyn BlockFetcher + Send>>,
}

impl FallbackFetcher {
    pub fn new(fetchers: Vec<Box<dyn BlockFetcher + Send>>) -> Self {
        Self { fetchers }
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}

impl BlockFetcher for FallbackFetcher {
    fn fetch(&mut self, num: u64) -> Result<Block, FetchError> {
        let mut failures = Vec::new();
        for (i, fetcher) in self.fetchers.iter_mut().enumerate() {
            match fetcher.fetch(num) {
                Ok(block) => return Ok(block),
                Err(err) => {
                    log::debug!("client {} failed to fetch block #{}: {}", i, num, err);
                    failures.push(err);
                }
            }
        }
        Err(FetchError::AllClientsFailed { num, failures })
    }

    /// The first fetcher's interval.
    fn polling_interval(&self) -> Duration {
        self.fetchers
            .first()
            .map(|fetcher| fetcher.polling_interval())
            .unwrap_or(Duration::ZERO)
    }
}
