/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and start a poller on its own thread.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use typed_builder::TypedBuilder;

use crate::event_bus::*;
use crate::events::*;
use crate::fetcher::BlockFetcher;
use crate::handler::BlockHandler;

use super::{BlockPoller, PollerConfiguration, PollerError};

/// Stores all necessary parameters and trait implementations required to run a [Poller].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [PollerSpec]. On the builder call the following methods to construct a valid [PollerSpec].

    Required:
    - `.fetcher(...)`
    - `.handler(...)`
    - `.configuration(...)`

    Optional:
    - `.on_fetch_block(...)`
    - `.on_check_segment(...)`
    - `.on_fire_block(...)`
    - `.on_set_lib(...)`
    - `.on_purge_blocks(...)`
    - `.on_save_state(...)`
    - `.on_load_state(...)`
"))]
pub struct PollerSpec<F: BlockFetcher + Send + 'static, H: BlockHandler + Send + 'static> {
    #[builder(setter(doc = "Set the source of blocks. The argument must implement the [BlockFetcher](crate::fetcher::BlockFetcher) trait. Required."))]
    fetcher: F,
    #[builder(setter(doc = "Set the consumer of final blocks. The argument must implement the [BlockHandler](crate::handler::BlockHandler) trait. Required."))]
    handler: H,
    #[builder(setter(doc = "Set the [configuration](PollerConfiguration) of the run. Required."))]
    configuration: PollerConfiguration,

    #[builder(default, setter(transform = |handler: impl Fn(&FetchBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<FetchBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is fetched from the source. Optional."))]
    on_fetch_block: Option<HandlerPtr<FetchBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CheckSegmentEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CheckSegmentEvent>),
    doc = "Register a handler closure to be invoked after a segment is checked for a connection to the LIB. Optional."))]
    on_check_segment: Option<HandlerPtr<CheckSegmentEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&FireBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<FireBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is handed to the block handler. Optional."))]
    on_fire_block: Option<HandlerPtr<FireBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SetLibEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SetLibEvent>),
    doc = "Register a handler closure to be invoked after the LIB advances. Optional."))]
    on_set_lib: Option<HandlerPtr<SetLibEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PurgeBlocksEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PurgeBlocksEvent>),
    doc = "Register a handler closure to be invoked after blocks below the LIB are purged. Optional."))]
    on_purge_blocks: Option<HandlerPtr<PurgeBlocksEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SaveStateEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SaveStateEvent>),
    doc = "Register a handler closure to be invoked after the cursor file is saved. Optional."))]
    on_save_state: Option<HandlerPtr<SaveStateEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&LoadStateEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<LoadStateEvent>),
    doc = "Register a handler closure to be invoked after the poller resumes from a cursor file. Optional."))]
    on_load_state: Option<HandlerPtr<LoadStateEvent>>,
}

impl<F: BlockFetcher + Send + 'static, H: BlockHandler + Send + 'static> PollerSpec<F, H> {
    /// Starts the driver thread, and the event bus thread if any event handler is registered or event
    /// logging is enabled, and returns the handles to them in a [Poller] struct.
    pub fn start(self) -> Poller {
        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            self.on_fetch_block,
            self.on_check_segment,
            self.on_fire_block,
            self.on_set_lib,
            self.on_purge_blocks,
            self.on_save_state,
            self.on_load_state,
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let (event_bus, event_bus_shutdown) = match event_subscriber {
            Some(event_subscriber) => {
                let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
                let event_bus = start_event_bus(
                    event_handlers,
                    event_subscriber,
                    event_bus_shutdown_receiver,
                );
                (Some(event_bus), Some(event_bus_shutdown))
            }
            None => (None, None),
        };

        let (driver_shutdown, driver_shutdown_receiver) = mpsc::channel();
        let mut block_poller = BlockPoller::new(self.configuration, self.fetcher, self.handler)
            .with_event_publisher(event_publisher);
        let driver = thread::spawn(move || block_poller.run(&driver_shutdown_receiver));

        Poller {
            driver: Some(driver),
            driver_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to the background threads of a poller. When this value is dropped, the driver is asked to
/// stop at its next iteration boundary and all background threads are joined.
pub struct Poller {
    driver: Option<JoinHandle<Result<(), PollerError>>>,
    driver_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl Poller {
    /// Whether the driver has returned, either because the stop block is final or because of an error.
    pub fn is_finished(&self) -> bool {
        self.driver.as_ref().map_or(true, |driver| driver.is_finished())
    }

    /// Wait for the driver to return on its own, and get its result.
    pub fn join(mut self) -> Result<(), PollerError> {
        self.wait()
    }

    /// Ask the driver to stop at its next iteration boundary, and get its result.
    pub fn stop(mut self) -> Result<(), PollerError> {
        let _ = self.driver_shutdown.send(());
        self.wait()
    }

    fn wait(&mut self) -> Result<(), PollerError> {
        let result = match self.driver.take() {
            Some(driver) => driver.join().unwrap_or(Err(PollerError::DriverPanicked)),
            None => Ok(()),
        };

        // The driver is the only event publisher, so every event is queued by now.
        if let Some(event_bus_shutdown) = &self.event_bus_shutdown {
            let _ = event_bus_shutdown.send(());
        }
        if let Some(event_bus) = self.event_bus.take() {
            let _ = event_bus.join();
        }
        result
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        // Driver first. The event bus drains whatever the driver published before returning.
        let _ = self.driver_shutdown.send(());
        let _ = self.wait();
    }
}
