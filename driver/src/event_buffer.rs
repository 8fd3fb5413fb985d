//! Event routing between the local process, the filters, the simulation
//! and the log service.
//!
//! Events arrive from local input, from `GameLoop::raise_event`, and (for a
//! receiver) from the log service's event subscription. Depending on the
//! buffer mode they are queued for filtering, forwarded to the log, or
//! dropped. `process_events` runs the filter chain and partitions the
//! survivors into the buffers the tick generator and the local-tick path
//! read from.

use log::warn;
use ticklog_shared::{Event, EventFlags};

use crate::config::EventBufferMode;
use crate::log_service::LogService;

pub type EventFilter = dyn FnMut(Vec<Event>) -> Vec<Event>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterHandle(u64);

struct FilterEntry {
    handle: FilterHandle,
    filter: Box<EventFilter>,
    /// Run this filter even when no events are queued.
    handle_empty: bool,
}

pub struct EventBuffer {
    mode: EventBufferMode,
    default_event_priority: EventFlags,
    unfiltered_local: Vec<Event>,
    unfiltered_shared: Vec<Event>,
    /// Filtered non-local, non-join/leave events, pending tick generation.
    buffer: Vec<Event>,
    /// Filtered join/leave events, pending join resolution.
    join_leave_buffer: Vec<Event>,
    /// Filtered local events, pending the next local or shared tick.
    local_buffer: Vec<Event>,
    filters: Vec<FilterEntry>,
    next_handle: u64,
}

impl EventBuffer {
    pub fn new(mode: EventBufferMode, default_event_priority: EventFlags) -> Self {
        Self {
            mode,
            default_event_priority: mode.default_event_priority.unwrap_or(default_event_priority),
            unfiltered_local: Vec::new(),
            unfiltered_shared: Vec::new(),
            buffer: Vec::new(),
            join_leave_buffer: Vec::new(),
            local_buffer: Vec::new(),
            filters: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn mode(&self) -> EventBufferMode {
        self.mode
    }

    /// Switches the buffer mode, toggling the log-service event
    /// subscription when the receiver flag changes.
    pub fn set_mode<L: LogService>(&mut self, mode: EventBufferMode, log: &mut L) {
        if self.mode == mode {
            return;
        }
        let was_receiver = self.mode.is_receiver;
        self.mode = mode;
        if let Some(p) = mode.default_event_priority {
            self.default_event_priority = p;
        }
        if was_receiver != mode.is_receiver {
            log.set_event_subscription(mode.is_receiver);
        }
    }

    /// Accepts one event from input or the event subscription.
    pub fn on_event<L: LogService>(&mut self, mut event: Event, log: &mut L) {
        if event.local {
            if self.mode.is_local_receiver && !self.mode.is_discarder {
                self.unfiltered_local.push(event);
            }
            return;
        }
        // receiving and sending gate independently; a receiver that is
        // also a sender buffers the event and forwards it
        if self.mode.is_receiver && !self.mode.is_discarder {
            self.unfiltered_shared.push(event.clone());
        }
        if self.mode.is_sender {
            event.stamp_default_flags(self.default_event_priority);
            if let Err(e) = log.send_event(&event) {
                warn!("dropping an outgoing event: {}", e);
            }
        }
    }

    /// Accepts one event bypassing the filter chain.
    pub fn add_event_direct<L: LogService>(&mut self, mut event: Event, log: &mut L) {
        if event.local {
            if self.mode.is_local_receiver && !self.mode.is_discarder {
                self.local_buffer.push(event);
            }
            return;
        }
        if self.mode.is_receiver && !self.mode.is_discarder {
            let kept = event.clone();
            if kept.is_join_or_leave() {
                self.join_leave_buffer.push(kept);
            } else {
                self.buffer.push(kept);
            }
        }
        if self.mode.is_sender {
            event.stamp_default_flags(self.default_event_priority);
            if let Err(e) = log.send_event(&event) {
                warn!("dropping an outgoing event: {}", e);
            }
        }
    }

    /// Runs the filter chain over the queued unfiltered events and
    /// partitions the survivors. `is_local` restricts the pass to local
    /// events (used while the scene runs fully local).
    pub fn process_events(&mut self, is_local: bool) {
        let mut events = std::mem::take(&mut self.unfiltered_local);
        if !is_local {
            events.append(&mut self.unfiltered_shared);
        }
        for entry in self.filters.iter_mut() {
            if events.is_empty() && !entry.handle_empty {
                continue;
            }
            events = (entry.filter)(events);
        }
        for event in events {
            if event.local {
                self.local_buffer.push(event);
            } else if event.is_join_or_leave() {
                self.join_leave_buffer.push(event);
            } else {
                self.buffer.push(event);
            }
        }
    }

    pub fn read_events(&mut self) -> Option<Vec<Event>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    pub fn read_join_leaves(&mut self) -> Option<Vec<Event>> {
        if self.join_leave_buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.join_leave_buffer))
        }
    }

    pub fn read_local_events(&mut self) -> Option<Vec<Event>> {
        if self.local_buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.local_buffer))
        }
    }

    pub fn add_filter(&mut self, filter: Box<EventFilter>, handle_empty: bool) -> FilterHandle {
        let handle = FilterHandle(self.next_handle);
        self.next_handle += 1;
        self.filters.push(FilterEntry {
            handle,
            filter,
            handle_empty,
        });
        handle
    }

    /// Removes one filter, or every filter when `handle` is `None`.
    pub fn remove_filter(&mut self, handle: Option<FilterHandle>) {
        match handle {
            Some(h) => self.filters.retain(|e| e.handle != h),
            None => self.filters.clear(),
        }
    }
}
