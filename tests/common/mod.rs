//! Helpers shared by the integration tests.

#![allow(dead_code)]

pub(crate) mod fetcher;

pub(crate) mod handler;

pub(crate) mod logging;
