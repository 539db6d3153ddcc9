/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The registry of event handlers and the thread that dispatches [events](crate::events) to them.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

const RECV_TIMEOUT: Duration = Duration::from_millis(50);

pub(crate) struct EventHandlers {
    pub(crate) fetch_block_handlers: Vec<HandlerPtr<FetchBlockEvent>>,
    pub(crate) check_segment_handlers: Vec<HandlerPtr<CheckSegmentEvent>>,
    pub(crate) fire_block_handlers: Vec<HandlerPtr<FireBlockEvent>>,
    pub(crate) set_lib_handlers: Vec<HandlerPtr<SetLibEvent>>,
    pub(crate) purge_blocks_handlers: Vec<HandlerPtr<PurgeBlocksEvent>>,
    pub(crate) save_state_handlers: Vec<HandlerPtr<SaveStateEvent>>,
    pub(crate) load_state_handlers: Vec<HandlerPtr<LoadStateEvent>>,
}

impl EventHandlers {
    /// Collect the user-defined handlers, prepending the default loggers if `log_events` is set.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        fetch_block_handler: Option<HandlerPtr<FetchBlockEvent>>,
        check_segment_handler: Option<HandlerPtr<CheckSegmentEvent>>,
        fire_block_handler: Option<HandlerPtr<FireBlockEvent>>,
        set_lib_handler: Option<HandlerPtr<SetLibEvent>>,
        purge_blocks_handler: Option<HandlerPtr<PurgeBlocksEvent>>,
        save_state_handler: Option<HandlerPtr<SaveStateEvent>>,
        load_state_handler: Option<HandlerPtr<LoadStateEvent>>,
    ) -> EventHandlers {
        fn handlers<T: Logger>(
            log_events: bool,
            user: Option<HandlerPtr<T>>,
        ) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger());
            }
            handlers.extend(user);
            handlers
        }

        EventHandlers {
            fetch_block_handlers: handlers(log_events, fetch_block_handler),
            check_segment_handlers: handlers(log_events, check_segment_handler),
            fire_block_handlers: handlers(log_events, fire_block_handler),
            set_lib_handlers: handlers(log_events, set_lib_handler),
            purge_blocks_handlers: handlers(log_events, purge_blocks_handler),
            save_state_handlers: handlers(log_events, save_state_handler),
            load_state_handlers: handlers(log_events, load_state_handler),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fetch_block_handlers.is_empty()
            && self.check_segment_handlers.is_empty()
            && self.fire_block_handlers.is_empty()
            && self.set_lib_handlers.is_empty()
            && self.purge_blocks_handlers.is_empty()
            && self.save_state_handlers.is_empty()
            && self.load_state_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::FetchBlock(fetch_block_event) => self
                .fetch_block_handlers
                .iter()
                .for_each(|handler| handler(&fetch_block_event)),

            Event::CheckSegment(check_segment_event) => self
                .check_segment_handlers
                .iter()
                .for_each(|handler| handler(&check_segment_event)),

            Event::FireBlock(fire_block_event) => self
                .fire_block_handlers
                .iter()
                .for_each(|handler| handler(&fire_block_event)),

            Event::SetLib(set_lib_event) => self
                .set_lib_handlers
                .iter()
                .for_each(|handler| handler(&set_lib_event)),

            Event::PurgeBlocks(purge_blocks_event) => self
                .purge_blocks_handlers
                .iter()
                .for_each(|handler| handler(&purge_blocks_event)),

            Event::SaveState(save_state_event) => self
                .save_state_handlers
                .iter()
                .for_each(|handler| handler(&save_state_event)),

            Event::LoadState(load_state_event) => self
                .load_state_handlers
                .iter()
                .for_each(|handler| handler(&load_state_event)),
        }
    }
}

/// Dispatch events until the driver (the only publisher) hangs up, or until a shutdown signal is
/// received. Events already queued when the shutdown signal arrives are still dispatched.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                while let Ok(event) = event_subscriber.try_recv() {
                    event_handlers.fire_handlers(event)
                }
                return;
            }
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(RECV_TIMEOUT) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
