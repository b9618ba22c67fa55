//! Inbound message router
//!
//! One transport carries traffic for every device on the CI-V bus.
//! The router normalizes each inbound message, drops echoes of our own
//! transmissions and stale duplicates, counts malformed garbage toward
//! a reconnect threshold, and hands accepted frames to the session
//! registered for the source address.
//!
//! Like the other cores, the router never reads the clock itself.

use std::collections::HashSet;
use std::time::Instant;

use civ_protocol::frame::{decode, Frame};
use tracing::{debug, warn};

use crate::config::StationConfig;

/// Outcome of offering one inbound message to the router
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Frame accepted for the session at this address
    Frame(Frame),
    /// Valid frame, but addressed elsewhere or from an unregistered
    /// device
    Ignored,
    /// Identical to the previous message inside the duplicate window
    Duplicate,
    /// Unparseable; counted toward the reconnect threshold
    Malformed {
        /// Malformed messages seen since the last reset
        count: u32,
    },
    /// Threshold tripped: the caller must close the transport. The
    /// counter has been reset.
    Overflow,
}

/// Filters and demultiplexes inbound transport messages
#[derive(Debug)]
pub struct DeviceRouter {
    display_address: u8,
    registered: HashSet<u8>,
    last_message: Option<(String, Instant)>,
    malformed_count: u32,
    config: StationConfig,
}

impl DeviceRouter {
    /// Create a router for a controller at `display_address`
    pub fn new(display_address: u8, config: StationConfig) -> Self {
        Self {
            display_address,
            registered: HashSet::new(),
            last_message: None,
            malformed_count: 0,
            config,
        }
    }

    /// The controller's own CI-V address
    pub fn display_address(&self) -> u8 {
        self.display_address
    }

    /// Register a device address for routing
    pub fn register(&mut self, address: u8) -> bool {
        self.registered.insert(address)
    }

    /// Remove a device address
    pub fn unregister(&mut self, address: u8) -> bool {
        self.registered.remove(&address)
    }

    /// Reset per-connection state; called on open and close
    pub fn reset(&mut self) {
        self.last_message = None;
        self.malformed_count = 0;
    }

    /// Offer one raw transport message
    pub fn accept(&mut self, text: &str, now: Instant) -> Routed {
        let message = text.trim().to_uppercase();

        if !message.starts_with("FE FE") {
            return self.count_malformed(&message);
        }

        // The radio repeats unchanged state when polled fast; an exact
        // repeat right behind the previous message carries nothing.
        if let Some((last, at)) = &self.last_message {
            if *last == message && now.duration_since(*at) < self.config.duplicate_window() {
                debug!("dropping duplicate: {}", message);
                self.last_message = Some((message, now));
                return Routed::Duplicate;
            }
        }
        self.last_message = Some((message.clone(), now));

        let frame = match decode(&message) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("undecodable message: {}", err);
                return self.count_malformed(&message);
            }
        };

        if frame.to != self.display_address && frame.to != civ_protocol::frame::BROADCAST_ADDR {
            debug!("not for us (to {:02X}): {}", frame.to, message);
            return Routed::Ignored;
        }
        // Our own transmissions echo back with our source address.
        if frame.from == self.display_address {
            return Routed::Ignored;
        }
        if !self.registered.contains(&frame.from) {
            debug!("no session for {:02X}", frame.from);
            return Routed::Ignored;
        }

        Routed::Frame(frame)
    }

    fn count_malformed(&mut self, message: &str) -> Routed {
        self.malformed_count += 1;
        warn!(
            count = self.malformed_count,
            "malformed message: {}", message
        );
        if self.malformed_count > self.config.malformed_threshold {
            self.malformed_count = 0;
            Routed::Overflow
        } else {
            Routed::Malformed {
                count: self.malformed_count,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn router() -> DeviceRouter {
        let mut r = DeviceRouter::new(0xE0, StationConfig::default());
        r.register(0x94);
        r
    }

    #[test]
    fn test_routes_registered_source() {
        let mut r = router();
        let now = Instant::now();
        match r.accept("fe fe e0 94 03 00 00 25 14 00 fd", now) {
            Routed::Frame(frame) => {
                assert_eq!(frame.from, 0x94);
                assert_eq!(frame.to, 0xE0);
            }
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_accepted() {
        let mut r = router();
        assert!(matches!(
            r.accept("FE FE 00 94 03 00 00 25 14 00 FD", Instant::now()),
            Routed::Frame(_)
        ));
    }

    #[test]
    fn test_ignores_other_destinations_and_own_echo() {
        let mut r = router();
        let now = Instant::now();
        assert_eq!(
            r.accept("FE FE A2 94 03 00 00 25 14 00 FD", now),
            Routed::Ignored
        );
        // Echo of our own command.
        assert_eq!(
            r.accept("FE FE 94 E0 03 FD", now + Duration::from_secs(1)),
            Routed::Ignored
        );
    }

    #[test]
    fn test_ignores_unregistered_source() {
        let mut r = router();
        assert_eq!(
            r.accept("FE FE E0 A2 03 00 00 25 14 00 FD", Instant::now()),
            Routed::Ignored
        );
    }

    #[test]
    fn test_duplicate_window() {
        let mut r = router();
        let now = Instant::now();
        let text = "FE FE E0 94 1C 00 00 FD";
        assert!(matches!(r.accept(text, now), Routed::Frame(_)));
        assert_eq!(
            r.accept(text, now + Duration::from_millis(50)),
            Routed::Duplicate
        );
        // Past the window it routes again.
        assert!(matches!(
            r.accept(text, now + Duration::from_millis(200)),
            Routed::Frame(_)
        ));
    }

    #[test]
    fn test_duplicate_window_slides() {
        let mut r = router();
        let now = Instant::now();
        let text = "FE FE E0 94 1C 00 00 FD";
        assert!(matches!(r.accept(text, now), Routed::Frame(_)));
        // Each repeat refreshes the window, so a steady stream of
        // repeats keeps being dropped.
        for i in 1..5 {
            assert_eq!(
                r.accept(text, now + Duration::from_millis(50 * i)),
                Routed::Duplicate
            );
        }
    }

    #[test]
    fn test_malformed_threshold_forces_close() {
        let mut r = router();
        let now = Instant::now();
        for i in 1..=5 {
            assert_eq!(r.accept("garbage", now), Routed::Malformed { count: i });
        }
        assert_eq!(r.accept("garbage", now), Routed::Overflow);
        // Counter reset after the trip.
        assert_eq!(r.accept("garbage", now), Routed::Malformed { count: 1 });
    }

    #[test]
    fn test_malformed_count_survives_good_traffic() {
        let mut r = router();
        let now = Instant::now();
        assert!(matches!(r.accept("junk", now), Routed::Malformed { .. }));
        assert!(matches!(
            r.accept("FE FE E0 94 03 00 00 25 14 00 FD", now),
            Routed::Frame(_)
        ));
        // The counter only clears on reconnect, not on good frames.
        assert_eq!(r.accept("junk", now), Routed::Malformed { count: 2 });
    }
}
