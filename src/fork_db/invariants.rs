/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Rules that keep the fork database consistent with the source's finality contract.
//!
//! # LIB monotonicity
//!
//! The source guarantees that the LIB it reports never goes backward. Everything fired by the poller
//! sits at or below the LIB, so a LIB that moves backward, or a request for a block below the LIB,
//! means that the source reorganized a part of the chain that was already final. This cannot be
//! corrected silently: both situations are reported as errors, and the
//! [poller](crate::poller::BlockPoller) stops on them.

use super::ForkDBError;

/// Check that moving the LIB from `current` to `requested` does not move it backward.
pub fn check_lib_monotonic(current: u64, requested: u64) -> Result<(), ForkDBError> {
    if requested < current {
        return Err(ForkDBError::LibMovedBackward { current, requested });
    }
    Ok(())
}

/// Check that block `requested` may still be fetched given the current LIB number.
pub fn check_above_lib(requested: u64, lib: u64) -> Result<(), ForkDBError> {
    if requested < lib {
        return Err(ForkDBError::BelowLib { requested, lib });
    }
    Ok(())
}
