//! Block sources used by the integration tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use blockpoller_rs::{
    fetcher::{BlockFetcher, FetchError},
    types::block::{Block, Payload},
};

pub(crate) const TYPE_URL: &str = "type.googleapis.com/sf.test.type.v1.Block";

/// The number encoded at the start of a test block id, e.g. `104` for `"104b"`. Empty ids are `0`.
pub(crate) fn blocknum(id: &str) -> u64 {
    let digits: String = id.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// A test block whose number and parent number are read from the ids.
pub(crate) fn blk(id: &str, prev: &str, lib_num: u64) -> Block {
    Block {
        id: id.into(),
        number: blocknum(id),
        parent_id: prev.into(),
        parent_number: blocknum(prev),
        lib_number: lib_num,
        timestamp: blocknum(id) * 1_000_000_000,
        payload: Payload::new(TYPE_URL, id.as_bytes().to_vec()),
    }
}

/// Serves a fixed sequence of blocks, one per call, and checks that each is requested by its number.
///
/// Once the script is exhausted every call fails with [`FetchError::NotFound`], which is how the
/// tests end a run. Clones share the same script, so a test can keep one to inspect after handing
/// another to the poller.
#[derive(Clone)]
pub(crate) struct ScriptedFetcher {
    inner: Arc<Mutex<Script>>,
}

struct Script {
    blocks: VecDeque<Block>,
    requested: Vec<u64>,
    transient_failures: u32,
    polling_interval: Duration,
}

impl ScriptedFetcher {
    pub(crate) fn new(blocks: Vec<Block>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Script {
                blocks: blocks.into(),
                requested: Vec::new(),
                transient_failures: 0,
                polling_interval: Duration::ZERO,
            })),
        }
    }

    /// Make the next `n` calls fail before the script resumes.
    pub(crate) fn fail_next(self, n: u32) -> Self {
        self.inner.lock().unwrap().transient_failures = n;
        self
    }

    pub(crate) fn with_polling_interval(self, interval: Duration) -> Self {
        self.inner.lock().unwrap().polling_interval = interval;
        self
    }

    /// Every block number requested so far, failed attempts included.
    pub(crate) fn requested(&self) -> Vec<u64> {
        self.inner.lock().unwrap().requested.clone()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.inner.lock().unwrap().blocks.len()
    }
}

impl BlockFetcher for ScriptedFetcher {
    fn fetch(&mut self, num: u64) -> Result<Block, FetchError> {
        let mut script = self.inner.lock().unwrap();
        script.requested.push(num);

        if script.transient_failures > 0 {
            script.transient_failures -= 1;
            return Err(FetchError::Source(format!("transient failure fetching #{}", num)));
        }

        match script.blocks.pop_front() {
            Some(block) => {
                assert_eq!(
                    block.number, num,
                    "expected to fetch block #{}, got a request for #{}",
                    block.number, num
                );
                Ok(block)
            }
            None => Err(FetchError::NotFound(num)),
        }
    }

    fn polling_interval(&self) -> Duration {
        self.inner.lock().unwrap().polling_interval
    }
}

/// An endless, fork-free chain `"<n>a"` whose blocks report `n - 1` as their LIB.
pub(crate) struct ChainFetcher {
    pub(crate) polling_interval: Duration,
}

impl BlockFetcher for ChainFetcher {
    fn fetch(&mut self, num: u64) -> Result<Block, FetchError> {
        let prev = if num == 0 {
            String::new()
        } else {
            format!("{}a", num - 1)
        };
        Ok(blk(&format!("{}a", num), &prev, num.saturating_sub(1)))
    }

    fn polling_interval(&self) -> Duration {
        self.polling_interval
    }
}

/// A source that is always down.
pub(crate) struct DownFetcher;

impl BlockFetcher for DownFetcher {
    fn fetch(&mut self, num: u64) -> Result<Block, FetchError> {
        Err(FetchError::Source(format!("connection refused fetching #{}", num)))
    }
}
