//! A block handler that records what it is handed.

use std::sync::{Arc, Mutex};

use blockpoller_rs::{
    handler::{BlockHandler, HandlerError},
    types::{block::Block, data_types::BlockId},
};

/// Records every handled block. Clones share the same record.
#[derive(Clone, Default)]
pub(crate) struct RecordingHandler {
    handled: Arc<Mutex<Vec<Block>>>,
    fail_on: Option<BlockId>,
}

impl RecordingHandler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reject the block with id `id` instead of recording it.
    pub(crate) fn failing_on(id: &str) -> Self {
        Self {
            handled: Arc::default(),
            fail_on: Some(id.into()),
        }
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        self.handled
            .lock()
            .unwrap()
            .iter()
            .map(|block| block.id.to_string())
            .collect()
    }

    pub(crate) fn nums(&self) -> Vec<u64> {
        self.handled
            .lock()
            .unwrap()
            .iter()
            .map(|block| block.number)
            .collect()
    }
}

impl BlockHandler for RecordingHandler {
    fn init(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    fn handle(&mut self, block: &Block) -> Result<(), HandlerError> {
        if self.fail_on.as_ref() == Some(&block.id) {
            return Err(HandlerError::Rejected(format!("refusing {}", block.id)));
        }
        self.handled.lock().unwrap().push(block.clone());
        Ok(())
    }
}
