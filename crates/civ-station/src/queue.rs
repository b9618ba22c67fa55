//! Outbound transport queue
//!
//! The radio drops characters when frames arrive back to back, so
//! every outbound message goes through this queue, which enforces a
//! minimum spacing between sends. User-initiated commands take the
//! priority queue and always drain ahead of scheduler polls; within a
//! queue, order is FIFO. A message identical to one already pending in
//! its queue is not enqueued twice.
//!
//! The queue is a deterministic core: it never looks at the clock
//! itself, callers pass `Instant::now()` in. The async driver owns the
//! drain cadence.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::debug;

use crate::config::StationConfig;

/// A message ready to hand to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportPayload {
    /// Space-joined ASCII hex, as used by the text transport
    Text(String),
    /// Raw frame bytes, for transports that take binary
    Binary(Vec<u8>),
}

/// Outbound queue with minimum inter-send spacing
#[derive(Debug)]
pub struct TransportQueue {
    priority: VecDeque<String>,
    poll: VecDeque<String>,
    last_send: Option<Instant>,
    link_open: bool,
    binary_mode: bool,
    min_send_interval: std::time::Duration,
}

impl TransportQueue {
    /// Create a queue using the config's send spacing
    pub fn new(config: &StationConfig) -> Self {
        Self {
            priority: VecDeque::new(),
            poll: VecDeque::new(),
            last_send: None,
            link_open: false,
            binary_mode: false,
            min_send_interval: config.min_send_interval(),
        }
    }

    /// Switch between text and binary payloads
    pub fn set_binary_mode(&mut self, binary: bool) {
        self.binary_mode = binary;
    }

    /// Mark the transport link open or closed
    pub fn set_link_open(&mut self, open: bool) {
        self.link_open = open;
    }

    /// Whether the transport link is open
    pub fn link_open(&self) -> bool {
        self.link_open
    }

    /// Number of messages waiting in both queues
    pub fn pending(&self) -> usize {
        self.priority.len() + self.poll.len()
    }

    /// Drop all pending messages
    pub fn clear(&mut self) {
        self.priority.clear();
        self.poll.clear();
    }

    /// Submit a message for transmission
    ///
    /// Returns the payload to put on the wire right now, or `None` if
    /// the message was queued (link closed, or too soon after the last
    /// send). When this returns `None` and [`Self::pending`] is
    /// non-zero, the caller should schedule a drain.
    pub fn send(&mut self, data: &str, is_poll: bool, now: Instant) -> Option<TransportPayload> {
        if self.link_open && self.spacing_elapsed(now) {
            self.last_send = Some(now);
            return Some(self.payload(data));
        }

        let queue = if is_poll {
            &mut self.poll
        } else {
            &mut self.priority
        };
        if queue.iter().any(|pending| pending == data) {
            debug!("already queued, dropping: {}", data);
        } else {
            queue.push_back(data.to_string());
        }
        None
    }

    /// Release at most one queued message, priority queue first
    ///
    /// Returns `None` when nothing is eligible: queue empty, link
    /// closed, or the spacing window has not elapsed yet.
    pub fn drain_one(&mut self, now: Instant) -> Option<TransportPayload> {
        if !self.link_open || !self.spacing_elapsed(now) {
            return None;
        }
        let data = self.priority.pop_front().or_else(|| self.poll.pop_front())?;
        self.last_send = Some(now);
        Some(self.payload(&data))
    }

    fn spacing_elapsed(&self, now: Instant) -> bool {
        match self.last_send {
            Some(last) => now.duration_since(last) >= self.min_send_interval,
            None => true,
        }
    }

    fn payload(&self, data: &str) -> TransportPayload {
        if self.binary_mode {
            let bytes = data
                .split_whitespace()
                .filter_map(|token| u8::from_str_radix(token, 16).ok())
                .collect();
            TransportPayload::Binary(bytes)
        } else {
            TransportPayload::Text(data.to_string())
        }
    }
}
