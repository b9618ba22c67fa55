//! Poll scheduler
//!
//! The radio does not push most of its state; the station keeps the
//! display fresh by polling a fixed table of query commands on a
//! per-entry cadence. One scheduler tick releases at most one due
//! entry, in table order, so polls never burst and user commands can
//! always interleave.
//!
//! Each entry carries two cadences (station attended vs unattended)
//! and gates controlling when it runs at all: during receive, during
//! transmit, while unattended, and at each power state.

use std::time::{Duration, Instant};

use tracing::debug;

/// One row of the poll table
#[derive(Debug, Clone)]
pub struct PollEntry {
    /// Query payload (no framing)
    pub command: &'static str,
    /// Cadence while the station is attended (ms)
    pub active_interval_ms: u64,
    /// Cadence while the station is unattended (ms)
    pub inactive_interval_ms: u64,
    /// Run while receiving
    pub poll_rx: bool,
    /// Run while transmitting
    pub poll_tx: bool,
    /// Run while the station is unattended
    pub poll_inactive: bool,
    /// Run while the radio is powered on
    pub poll_on: bool,
    /// Run while the radio is powered off
    pub poll_off: bool,
    last_polled: Option<Instant>,
}

impl PollEntry {
    #[allow(clippy::too_many_arguments)]
    fn new(
        command: &'static str,
        active_interval_ms: u64,
        inactive_interval_ms: u64,
        poll_rx: bool,
        poll_tx: bool,
        poll_inactive: bool,
        poll_on: bool,
        poll_off: bool,
    ) -> Self {
        Self {
            command,
            active_interval_ms,
            inactive_interval_ms,
            poll_rx,
            poll_tx,
            poll_inactive,
            poll_on,
            poll_off,
            last_polled: None,
        }
    }

    fn due(&self, attended: bool, now: Instant) -> bool {
        let interval = if attended {
            self.active_interval_ms
        } else {
            self.inactive_interval_ms
        };
        match self.last_polled {
            Some(last) => last + Duration::from_millis(interval) < now,
            None => true,
        }
    }

    fn gated_in(&self, transmitting: bool, attended: bool, powered_on: bool) -> bool {
        let tx_gate = (self.poll_rx != transmitting) || (self.poll_tx == transmitting);
        let attention_gate = attended || self.poll_inactive;
        let power_gate = (powered_on && self.poll_on) || (!powered_on && self.poll_off);
        tx_gate && attention_gate && power_gate
    }
}

/// The default Icom query table
///
/// Meters poll fast, configuration slowly; the power query (`19 00`)
/// is the only entry that runs while the radio is off, doubling as the
/// liveness probe.
pub fn icom_poll_table() -> Vec<PollEntry> {
    vec![
        PollEntry::new("0F", 1000, 2000, true, true, true, true, false),
        PollEntry::new("14 01", 1000, 2000, true, true, true, true, false),
        PollEntry::new("15 01", 300, 500, true, false, true, true, false),
        PollEntry::new("15 02", 300, 500, true, false, true, true, false),
        PollEntry::new("15 11", 500, 1000, false, true, true, true, false),
        PollEntry::new("15 12", 500, 1000, false, true, true, true, false),
        PollEntry::new("15 13", 500, 1000, false, true, true, true, false),
        PollEntry::new("15 14", 500, 1000, false, true, true, true, false),
        PollEntry::new("15 15", 2000, 5000, true, true, true, true, false),
        PollEntry::new("15 16", 500, 1000, true, true, true, true, false),
        PollEntry::new("16 42", 500, 1000, true, true, true, true, false),
        PollEntry::new("16 43", 500, 1000, true, true, true, true, false),
        PollEntry::new("16 5D", 500, 1000, true, true, true, true, false),
        PollEntry::new("19 00", 3000, 9000, true, true, true, false, true),
        PollEntry::new("1C 00", 300, 500, true, true, true, true, false),
        PollEntry::new("25 01", 500, 1000, true, true, true, true, false),
    ]
}

/// Releases due poll entries one per tick
#[derive(Debug)]
pub struct PollScheduler {
    entries: Vec<PollEntry>,
    running: bool,
    attended: bool,
}

impl PollScheduler {
    /// Create a scheduler over the given table
    pub fn new(entries: Vec<PollEntry>) -> Self {
        Self {
            entries,
            running: false,
            attended: true,
        }
    }

    /// Number of entries in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether ticks currently release polls
    pub fn running(&self) -> bool {
        self.running
    }

    /// Mark the station attended (fast cadence) or unattended
    pub fn set_attended(&mut self, attended: bool) {
        self.attended = attended;
    }

    /// Begin releasing polls; idempotent
    pub fn start(&mut self) {
        if !self.running {
            debug!("poll scheduler started");
            self.running = true;
        }
    }

    /// Stop releasing polls; idempotent, pending cadence state is kept
    pub fn stop(&mut self) {
        if self.running {
            debug!("poll scheduler stopped");
            self.running = false;
        }
    }

    /// Evaluate one tick
    ///
    /// Returns the first due, gate-passing entry's command, or `None`.
    /// At most one poll per tick keeps the queue shallow.
    pub fn tick(&mut self, transmitting: bool, powered_on: bool, now: Instant) -> Option<&'static str> {
        if !self.running {
            return None;
        }
        let attended = self.attended;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.due(attended, now) && e.gated_in(transmitting, attended, powered_on))?;
        entry.last_polled = Some(now);
        Some(entry.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> PollScheduler {
        let mut s = PollScheduler::new(icom_poll_table());
        s.start();
        s
    }

    #[test]
    fn test_one_poll_per_tick_in_table_order() {
        let mut s = scheduler();
        let now = Instant::now();
        assert_eq!(s.tick(false, true, now), Some("0F"));
        assert_eq!(s.tick(false, true, now), Some("14 01"));
        assert_eq!(s.tick(false, true, now), Some("15 01"));
    }

    #[test]
    fn test_powered_off_only_polls_power_query() {
        let mut s = scheduler();
        let now = Instant::now();
        assert_eq!(s.tick(false, false, now), Some("19 00"));
        // Nothing else runs while off.
        assert_eq!(s.tick(false, false, now), None);
    }

    #[test]
    fn test_transmit_gates() {
        let mut s = scheduler();
        let now = Instant::now();
        while s.tick(true, true, now).is_some() {}

        // Squelch entries (rx-only) never ran; their slots are still due
        // once transmit drops.
        assert_eq!(s.tick(false, true, now), Some("15 01"));
        assert_eq!(s.tick(false, true, now), Some("15 02"));
        assert_eq!(s.tick(false, true, now), None);
    }

    #[test]
    fn test_tx_meters_skipped_while_receiving() {
        let mut s = scheduler();
        let now = Instant::now();
        let mut seen = Vec::new();
        while let Some(cmd) = s.tick(false, true, now) {
            seen.push(cmd);
        }
        assert!(!seen.contains(&"15 11"));
        assert!(seen.contains(&"15 01"));
    }

    #[test]
    fn test_cadence_respected() {
        let mut s = scheduler();
        let now = Instant::now();
        assert_eq!(s.tick(false, true, now), Some("0F"));
        while s.tick(false, true, now).is_some() {}

        // 0F runs at 1000 ms attended; 500 ms in, still quiet.
        let later = now + Duration::from_millis(500);
        assert_ne!(s.tick(false, true, later), Some("0F"));

        let later = now + Duration::from_millis(1001);
        assert_eq!(s.tick(false, true, later), Some("0F"));
    }

    #[test]
    fn test_unattended_slows_cadence() {
        let mut s = scheduler();
        s.set_attended(false);
        let now = Instant::now();
        assert_eq!(s.tick(false, true, now), Some("0F"));
        while s.tick(false, true, now).is_some() {}

        // Attended cadence has lapsed, unattended has not.
        let later = now + Duration::from_millis(1500);
        assert_ne!(s.tick(false, true, later), Some("0F"));
        let later = now + Duration::from_millis(2001);
        assert_eq!(s.tick(false, true, later), Some("0F"));
    }

    #[test]
    fn test_start_stop_idempotent() {
        let mut s = PollScheduler::new(icom_poll_table());
        assert_eq!(s.tick(false, true, Instant::now()), None);
        s.start();
        s.start();
        assert!(s.running());
        s.stop();
        s.stop();
        assert!(!s.running());
        assert_eq!(s.tick(false, true, Instant::now()), None);
    }
}
