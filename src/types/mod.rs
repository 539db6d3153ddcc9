/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types used throughout the poller: block identities and the block envelope delivered by a
//! [`BlockFetcher`](crate::fetcher::BlockFetcher).

pub mod block;

pub mod data_types;
