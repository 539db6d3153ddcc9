/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Trait for the downstream consumer of final blocks, and the console-line consumer used by
//! Firehose readers.
//!
//! ## Delivery guarantees
//!
//! Within a single run of the poller, [`handle`](BlockHandler::handle) is called exactly once per
//! final block, in strictly increasing block number order. Across restarts delivery is at-least-once:
//! blocks fired after the last saved [state file](crate::state_file) are delivered again, so
//! implementations should be idempotent or deduplicate by block id.
//!
//! An error returned from `handle` stops the poller. The block is not marked as fired.

use std::io::{self, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::types::block::Block;

pub trait BlockHandler {
    /// Called once, before the first block is handled.
    fn init(&mut self) -> Result<(), HandlerError>;

    fn handle(&mut self, block: &Block) -> Result<(), HandlerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("block type url {actual:?} does not match expected type {expected:?}")]
    TypeUrlMismatch { expected: String, actual: String },

    #[error("unable to write block line: {0}")]
    Io(#[from] io::Error),

    #[error("block rejected: {0}")]
    Rejected(String),
}

/// Writes the Firehose console reader protocol:
///
/// ```text
/// FIRE INIT 1.0 <type_url>
/// FIRE BLOCK <num> <id> <parent_num> <parent_id> <lib_num> <timestamp_nanos> <base64 payload>
/// ```
pub struct FireBlockHandler<W: Write> {
    block_type_url: String,
    out: W,
}

impl FireBlockHandler<io::Stdout> {
    pub fn stdout(block_type_url: impl Into<String>) -> Self {
        Self::new(block_type_url, io::stdout())
    }
}

impl<W: Write> FireBlockHandler<W> {
    pub fn new(block_type_url: impl Into<String>, out: W) -> Self {
        Self {
            block_type_url: block_type_url.into(),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> BlockHandler for FireBlockHandler<W> {
    fn init(&mut self) -> Result<(), HandlerError> {
        writeln!(self.out, "FIRE INIT 1.0 {}", self.block_type_url)?;
        self.out.flush()?;
        Ok(())
    }

    fn handle(&mut self, block: &Block) -> Result<(), HandlerError> {
        if block.payload.type_url != self.block_type_url {
            return Err(HandlerError::TypeUrlMismatch {
                expected: self.block_type_url.clone(),
                actual: block.payload.type_url.clone(),
            });
        }

        writeln!(
            self.out,
            "FIRE BLOCK {} {} {} {} {} {} {}",
            block.number,
            block.id,
            block.parent_number,
            block.parent_id,
            block.lib_number,
            block.timestamp,
            STANDARD.encode(&block.payload.value)
        )?;
        self.out.flush()?;
        Ok(())
    }
}
