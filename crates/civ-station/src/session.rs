//! Radio session state machine
//!
//! A [`RadioSession`] owns everything known about one CI-V radio: two
//! VFOs, the power state machine, radio-wide levels, the poll
//! scheduler and the band stacking table. Inbound frames mutate state
//! and emit [`SessionEvent`]s; operations push framed command text
//! into an outbox for the transport queue.
//!
//! The session is a deterministic core in the engine style: it never
//! reads the clock or sleeps. Callers pass `Instant::now()` in, and
//! delayed work (power settle, band-change follow-ups) is expressed as
//! timer requests the async driver schedules and fires back via
//! [`RadioSession::timer_fired`].

use std::time::{Duration, Instant};

use civ_protocol::frame::{
    encode_command, encode_wake_command, format_bytes, Frame, FrameBody, ACK_NG, ACK_OK,
    POWER_OFF_COMMAND, POWER_ON_COMMAND,
};
use civ_protocol::freq::{bcd_value, decode_frequency_slice, encode_frequency, meter_value};
use civ_protocol::tone::{dtcs_wire_bytes, tone_wire_bytes, DtcsPolarity, ToneSelection};
use tracing::{debug, info, warn};

use crate::config::StationConfig;
use crate::error::StationError;
use crate::events::{MeterKind, OperateMode, SessionEvent, ToneKind};
use crate::poll::{icom_poll_table, PollScheduler};
use crate::profile::{RadioProfile, ToneStrategy};
use crate::vfo::{Duplex, Filter, Mode, VfoState};

/// Power state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    /// State not yet determined
    #[default]
    Unknown,
    /// Radio confirmed off
    Off,
    /// Power-on sent, waiting for the radio to come up
    TurningOn,
    /// Radio confirmed on
    On,
    /// Power-off sent, waiting for the radio to go down
    TurningOff,
}

/// Delayed work the session asks the driver to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Re-initialize after the power-on settle time
    PowerOnSettle,
    /// Declare the radio off after the power-off settle time
    PowerOffSettle,
    /// Send the stacking-register frequency after a band change
    BandFrequency {
        /// Band index in the profile's table
        band: usize,
    },
    /// Re-query state after a band change
    BandRequery,
}

impl TimerAction {
    /// Timer slot this action occupies; scheduling into an occupied
    /// slot replaces the pending timer
    pub fn slot(&self) -> usize {
        match self {
            TimerAction::PowerOnSettle => 0,
            TimerAction::PowerOffSettle => 1,
            TimerAction::BandFrequency { .. } => 2,
            TimerAction::BandRequery => 3,
        }
    }
}

/// Number of timer slots a driver needs to track
pub const TIMER_SLOTS: usize = 4;

/// Timer bookkeeping requested by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOp {
    /// Arm a timer; replaces any pending timer in the same slot
    Schedule {
        /// What to run
        action: TimerAction,
        /// How long from now
        delay: Duration,
    },
    /// Disarm whatever occupies the action's slot
    Cancel(TimerAction),
}

/// A framed command ready for the transport queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Full frame text
    pub text: String,
    /// True when scheduler-originated (drains behind user commands)
    pub poll: bool,
}

/// Which tone family to enable in [`RadioSession::change_tone_type`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneType {
    /// Disable tone and DTCS on this side
    Off,
    /// CTCSS tone
    Tone,
    /// DTCS code
    Dtcs,
}

/// State machine for one CI-V radio
pub struct RadioSession {
    address: u8,
    display_address: u8,
    baud: u32,
    profile: RadioProfile,
    config: StationConfig,
    vfos: [VfoState; 2],
    active_vfo: usize,
    power: PowerState,
    powered_on: bool,
    af_level: u16,
    voltage: u16,
    amperage: f32,
    operate_mode: OperateMode,
    memory_channel: u16,
    last_response: Option<Instant>,
    scheduler: PollScheduler,
    outbox: Vec<OutboundFrame>,
    timer_ops: Vec<TimerOp>,
    event_buffer: Vec<SessionEvent>,
}

impl RadioSession {
    /// Create a session for a radio at `address`, seen from the
    /// controller at `display_address`
    pub fn new(
        address: u8,
        display_address: u8,
        baud: u32,
        profile: RadioProfile,
        config: StationConfig,
    ) -> Self {
        Self {
            address,
            display_address,
            baud,
            profile,
            config,
            vfos: [VfoState::default(), VfoState::default()],
            active_vfo: 0,
            power: PowerState::Unknown,
            powered_on: false,
            af_level: 0,
            voltage: 0,
            amperage: 0.0,
            operate_mode: OperateMode::Vfo,
            memory_channel: 1,
            last_response: None,
            scheduler: PollScheduler::new(icom_poll_table()),
            outbox: Vec::new(),
            timer_ops: Vec::new(),
            event_buffer: Vec::new(),
        }
    }

    /// CI-V address of this radio
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Model profile
    pub fn profile(&self) -> &RadioProfile {
        &self.profile
    }

    /// Current power state
    pub fn power_state(&self) -> PowerState {
        self.power
    }

    /// Whether the radio is considered on
    pub fn powered_on(&self) -> bool {
        self.powered_on
    }

    /// The active VFO
    pub fn active_vfo(&self) -> &VfoState {
        &self.vfos[self.active_vfo]
    }

    /// The inactive VFO
    pub fn inactive_vfo(&self) -> &VfoState {
        &self.vfos[(self.active_vfo + 1) % 2]
    }

    /// Band stacking table
    pub fn band_stack(&self) -> &[crate::profile::BandStack] {
        &self.profile.band_stack
    }

    /// Last reported AF gain level (raw device code)
    pub fn af_level(&self) -> u16 {
        self.af_level
    }

    /// Last reported supply voltage (raw device code)
    pub fn voltage(&self) -> u16 {
        self.voltage
    }

    /// Last reported or estimated drain current in amperes
    pub fn amperage(&self) -> f32 {
        self.amperage
    }

    /// Current operate mode
    pub fn operate_mode(&self) -> OperateMode {
        self.operate_mode
    }

    /// Selected memory channel
    pub fn memory_channel(&self) -> u16 {
        self.memory_channel
    }

    /// Take all events emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.event_buffer)
    }

    /// Take all framed commands waiting for the transport
    pub fn drain_outbox(&mut self) -> Vec<OutboundFrame> {
        std::mem::take(&mut self.outbox)
    }

    /// Take all pending timer operations
    pub fn drain_timer_ops(&mut self) -> Vec<TimerOp> {
        std::mem::take(&mut self.timer_ops)
    }

    fn emit(&mut self, event: SessionEvent) {
        self.event_buffer.push(event);
    }

    /// Frame a command payload and push it to the outbox
    ///
    /// The power-on command gets the baud-dependent wake preamble.
    pub fn send_command(&mut self, command: &str, poll: bool) {
        if command.is_empty() {
            return;
        }
        let text = if command == POWER_ON_COMMAND {
            encode_wake_command(self.address, self.display_address, command, self.baud)
        } else {
            encode_command(self.address, self.display_address, command)
        };
        self.outbox.push(OutboundFrame { text, poll });
    }

    // ------------------------------------------------------------------
    // Polling and liveness
    // ------------------------------------------------------------------

    /// Begin polling (idempotent); called when the link opens
    pub fn start_polling(&mut self) {
        self.scheduler.start();
    }

    /// Stop polling (idempotent); called when the link closes
    pub fn stop_polling(&mut self) {
        self.scheduler.stop();
    }

    /// Mark the station attended or unattended (poll cadence)
    pub fn set_attended(&mut self, attended: bool) {
        self.scheduler.set_attended(attended);
    }

    /// Evaluate one poll tick, queueing at most one query
    pub fn poll_tick(&mut self, now: Instant) {
        let transmitting = self.active_vfo().transmitting;
        if let Some(command) = self.scheduler.tick(transmitting, self.powered_on, now) {
            self.send_command(command, true);
        }
    }

    /// Converge the power indicator on observed traffic
    ///
    /// Runs on the liveness cadence. A silent radio is declared off, a
    /// talking one on, except while a deliberate transition is in
    /// flight in the other direction. Skipped when the poll table has
    /// a single entry, since there is not enough traffic to judge by.
    pub fn check_liveness(&mut self, now: Instant) {
        if self.scheduler.len() <= 1 {
            return;
        }
        let silent = match self.last_response {
            Some(last) => now.duration_since(last) > self.config.liveness_timeout(),
            None => true,
        };
        if silent {
            if self.power != PowerState::TurningOn {
                self.power = PowerState::Off;
                self.set_powered(false);
            }
        } else if self.power != PowerState::TurningOff {
            self.power = PowerState::On;
            self.set_powered(true);
        }
    }

    fn set_powered(&mut self, on: bool) {
        if self.powered_on != on {
            info!(address = self.address, on, "power state settled");
            self.powered_on = on;
            self.emit(SessionEvent::Power { on });
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Query initial state after the link opens or the radio powers up
    pub fn initialize(&mut self) {
        debug!(address = self.address, "initializing radio state");
        self.send_command("03", false);
        self.send_command("04", false);
        self.send_command("1A 06", false);
        self.send_command("0F", false);
        self.send_command("07 00", false);
    }

    /// Power the radio on or off
    ///
    /// Arms the matching settle timer and disarms the opposite one, so
    /// flipping the switch twice never leaves a stale transition
    /// behind.
    pub fn set_power(&mut self, on: bool) {
        info!(address = self.address, on, "power command");
        if on {
            self.power = PowerState::TurningOn;
            self.timer_ops.push(TimerOp::Cancel(TimerAction::PowerOffSettle));
            self.timer_ops.push(TimerOp::Schedule {
                action: TimerAction::PowerOnSettle,
                delay: self.config.power_on_settle(),
            });
            self.send_command(POWER_ON_COMMAND, false);
        } else {
            self.power = PowerState::TurningOff;
            self.timer_ops.push(TimerOp::Cancel(TimerAction::PowerOnSettle));
            self.timer_ops.push(TimerOp::Schedule {
                action: TimerAction::PowerOffSettle,
                delay: self.config.power_off_settle(),
            });
            self.send_command(POWER_OFF_COMMAND, false);
        }
    }

    /// Run a timer the driver armed earlier
    pub fn timer_fired(&mut self, action: TimerAction) {
        match action {
            TimerAction::PowerOnSettle => self.initialize(),
            TimerAction::PowerOffSettle => {
                self.power = PowerState::Off;
                self.set_powered(false);
            }
            TimerAction::BandFrequency { band } => {
                if let Some(stack) = self.profile.band_stack.get(band) {
                    let frequency = stack.registers[0].clone();
                    if let Err(err) = self.set_frequency(&frequency) {
                        warn!("bad stacking register frequency {:?}: {}", frequency, err);
                    }
                }
            }
            TimerAction::BandRequery => self.send_command("03", false),
        }
    }

    /// Set the active VFO's frequency
    pub fn set_frequency(&mut self, display: &str) -> Result<(), StationError> {
        let bytes = encode_frequency(display)?;
        self.send_command(&format!("25 00 {}", format_bytes(&bytes)), false);
        Ok(())
    }

    /// Set mode, data mode and filter on the active VFO, then re-query
    pub fn update_mode(
        &mut self,
        mode: Mode,
        data_mode: bool,
        filter: Filter,
    ) -> Result<(), StationError> {
        if !self.profile.supports_mode(mode) {
            return Err(StationError::UnsupportedMode(mode.name().to_string()));
        }
        self.send_command(
            &format!(
                "26 00 {:02X} 0{} {:02X}",
                mode.byte(),
                u8::from(data_mode),
                filter.byte()
            ),
            false,
        );
        self.send_command("26 00", false);
        Ok(())
    }

    /// Toggle transmit, updating the local flag ahead of the poll
    pub fn toggle_transmit(&mut self) {
        if self.vfos[self.active_vfo].transmitting {
            self.send_command("1C 00 00", false);
            self.vfos[self.active_vfo].transmitting = false;
        } else {
            self.send_command("1C 00 01", false);
            self.vfos[self.active_vfo].transmitting = true;
        }
    }

    /// Select VFO operation
    pub fn select_vfo(&mut self) {
        self.send_command("07 00", false);
    }

    /// Jump to a band via its stacking registers
    ///
    /// Sends the band-select, then the register-0 frequency after the
    /// radio has had time to switch, then a state re-query.
    pub fn select_band(&mut self, band: usize) -> Result<(), StationError> {
        if band >= self.profile.band_stack.len() {
            return Err(StationError::BandOutOfRange(band));
        }
        self.send_command(&format!("1A 01 {:02} 01", band + 1), false);
        self.timer_ops.push(TimerOp::Schedule {
            action: TimerAction::BandFrequency { band },
            delay: self.config.band_freq_settle(),
        });
        self.timer_ops.push(TimerOp::Schedule {
            action: TimerAction::BandRequery,
            delay: self.config.band_requery_settle(),
        });
        Ok(())
    }

    /// Enable the scope and its waveform output
    pub fn start_scope(&mut self) {
        self.send_command("27 10 01", false);
        self.send_command("27 11 01", false);
        self.send_command("27 10", false);
        self.send_command("27 11", false);
    }

    /// Stop the scope's waveform output
    pub fn stop_scope(&mut self) {
        self.send_command("27 11 00", false);
        self.send_command("27 10", false);
        self.send_command("27 11", false);
    }

    /// Toggle split operation on the active VFO
    pub fn toggle_split(&mut self) {
        if self.active_vfo().split {
            self.send_command("0F 00", false);
        } else {
            self.send_command("0F 01", false);
        }
        self.send_command("0F", false);
    }

    /// Select the repeater duplex direction, then re-query
    pub fn change_duplex(&mut self, duplex: Duplex) {
        self.send_command(&format!("0F {:02X}", duplex.select_byte()), false);
        self.send_command("0F", false);
    }

    /// Query tone/duplex configuration for the active VFO
    pub fn request_repeater_details(&mut self) {
        match self.profile.tone_strategy {
            ToneStrategy::Combined => self.send_command("16 5D", false),
            ToneStrategy::Paired => {
                self.send_command("16 42", false);
                self.send_command("16 43", false);
            }
        }
        self.send_command("1B 00", false);
        self.send_command("1B 01", false);
        if self.profile.tone_strategy == ToneStrategy::Combined {
            self.send_command("1B 02", false);
        }
        self.send_command("0F", false);
    }

    /// Push the active VFO's tone/code values to the radio
    pub fn send_tone_values(&mut self) {
        let vfo = &self.vfos[self.active_vfo];
        let tone = tone_wire_bytes(vfo.tone_cursor.value());
        let tsql = tone_wire_bytes(vfo.tsql_cursor.value());
        let dtcs = dtcs_wire_bytes(vfo.dtcs_cursor.value(), vfo.dtcs_polarity);
        let selection = vfo.tone;

        if selection.tx_tone {
            self.send_command(&format!("1B 00 {}", format_bytes(&tone)), false);
            self.send_command("1B 00", false);
        }
        if selection.rx_tone {
            self.send_command(&format!("1B 01 {}", format_bytes(&tsql)), false);
            self.send_command("1B 01", false);
        }
        if selection.tx_dtcs || selection.rx_dtcs {
            self.send_command(&format!("1B 02 {}", format_bytes(&dtcs)), false);
            self.send_command("1B 02", false);
        }
    }

    /// Step the active tone/code value on one side and re-query
    ///
    /// Which table steps depends on what is enabled on that side:
    /// CTCSS wins over DTCS, nothing enabled does nothing.
    pub fn change_tone_value(&mut self, next: bool, tx_side: bool) {
        let vfo = &self.vfos[self.active_vfo];
        let selection = vfo.tone;
        let polarity = vfo.dtcs_polarity;

        let step_value = |cursor: &civ_protocol::tone::ToneCursor| {
            if next {
                cursor.next_value()
            } else {
                cursor.previous_value()
            }
        };

        if tx_side {
            if selection.tx_tone {
                let bytes = tone_wire_bytes(step_value(&vfo.tone_cursor));
                self.send_command(&format!("1B 00 {}", format_bytes(&bytes)), false);
                self.send_command("1B 00", false);
            } else if selection.tx_dtcs {
                let bytes = dtcs_wire_bytes(step_value(&vfo.dtcs_cursor), polarity);
                self.send_command(&format!("1B 02 {}", format_bytes(&bytes)), false);
                self.send_command("1B 02", false);
            }
        } else if selection.rx_tone {
            let bytes = tone_wire_bytes(step_value(&vfo.tsql_cursor));
            self.send_command(&format!("1B 01 {}", format_bytes(&bytes)), false);
            self.send_command("1B 01", false);
        } else if selection.rx_dtcs {
            let bytes = dtcs_wire_bytes(step_value(&vfo.dtcs_cursor), polarity);
            self.send_command(&format!("1B 02 {}", format_bytes(&bytes)), false);
            self.send_command("1B 02", false);
        }
    }

    /// Change the tone family on one side, sending the commands the
    /// radio's strategy requires and re-querying
    pub fn change_tone_type(&mut self, tone_type: ToneType, tx_side: bool) {
        let current = self.active_vfo().tone;
        let mut new = current;

        match tone_type {
            ToneType::Off => {
                if tx_side {
                    new.tx_tone = false;
                    new.tx_dtcs = false;
                } else {
                    new.rx_tone = false;
                    new.rx_dtcs = false;
                }
            }
            ToneType::Tone => {
                if tx_side {
                    new.tx_tone = true;
                    new.tx_dtcs = false;
                } else {
                    new.rx_tone = true;
                    new.rx_dtcs = false;
                }
            }
            ToneType::Dtcs => {
                if tx_side {
                    new.tx_tone = false;
                    new.tx_dtcs = true;
                } else {
                    new.rx_tone = false;
                    new.rx_dtcs = true;
                }
            }
        }

        let combined = self.profile.tone_strategy == ToneStrategy::Combined;
        match (new.tx_tone, new.rx_tone, new.tx_dtcs, new.rx_dtcs) {
            (false, false, false, false) => {
                if combined {
                    self.send_combined_tone_mode(0x00);
                } else {
                    self.send_paired_tone_mode(false, false);
                }
            }
            (true, false, false, false) => {
                if combined {
                    self.send_combined_tone_mode(0x01);
                } else {
                    self.send_paired_tone_mode(true, false);
                }
            }
            (false, true, false, false) => {
                if combined {
                    self.send_combined_tone_mode(0x02);
                } else {
                    self.send_paired_tone_mode(false, true);
                }
            }
            (false, false, true, true) => self.send_combined_tone_mode(0x03),
            (false, false, true, false) => self.send_combined_tone_mode(0x06),
            (true, false, false, true) => self.send_combined_tone_mode(0x07),
            (false, true, true, false) => self.send_combined_tone_mode(0x08),
            (true, true, false, false) => {
                if combined {
                    self.send_combined_tone_mode(0x09);
                } else {
                    // Paired radios run one CTCSS function at a time;
                    // keep whichever side was already active.
                    if current.tx_tone {
                        self.send_command("16 43 01", false);
                    } else {
                        self.send_command("16 42 01", false);
                    }
                    self.send_command("16 42", false);
                    self.send_command("16 43", false);
                }
            }
            (false, false, false, true) => {
                // RX DTCS alone is not a device mode; pair it up or
                // back out, depending on where the TX side was.
                warn!("RX DTCS alone is not selectable");
                if !current.tx_tone && !current.tx_dtcs {
                    self.send_combined_tone_mode(0x03);
                } else {
                    self.send_combined_tone_mode(0x00);
                }
            }
            _ => {
                warn!("unreachable tone combination requested: {:?}", new);
                self.send_command("16 5D", false);
            }
        }
    }

    fn send_combined_tone_mode(&mut self, mode: u8) {
        self.send_command(&format!("16 5D {:02X}", mode), false);
        self.send_command("16 5D", false);
    }

    fn send_paired_tone_mode(&mut self, tx_on: bool, rx_on: bool) {
        self.send_command(&format!("16 42 {:02X}", u8::from(tx_on)), false);
        self.send_command(&format!("16 43 {:02X}", u8::from(rx_on)), false);
        self.send_command("16 42", false);
        self.send_command("16 43", false);
    }

    /// Flip DTCS polarity on one side and push the new value
    pub fn change_dtcs_polarity(&mut self, tx_side: bool) {
        use civ_protocol::tone::Polarity;
        let vfo = &mut self.vfos[self.active_vfo];
        let side = if tx_side {
            &mut vfo.dtcs_polarity.tx
        } else {
            &mut vfo.dtcs_polarity.rx
        };
        *side = match side {
            Polarity::Normal => Polarity::Reverse,
            Polarity::Reverse => Polarity::Normal,
        };
        let bytes = dtcs_wire_bytes(vfo.dtcs_cursor.value(), vfo.dtcs_polarity);
        self.send_command(&format!("1B 02 {}", format_bytes(&bytes)), false);
        self.send_command("1B 02", false);
    }

    /// Switch between VFO and memory operation
    pub fn set_operate_mode(&mut self, mode: OperateMode) {
        if self.operate_mode != mode {
            self.operate_mode = mode;
            self.emit(SessionEvent::OperateModeChanged { mode });
        }
    }

    /// Select a memory channel
    pub fn set_memory_channel(&mut self, channel: u16) {
        if self.memory_channel != channel {
            self.memory_channel = channel;
            self.emit(SessionEvent::MemoryChannel { channel });
        }
    }

    // ------------------------------------------------------------------
    // Inbound dispatch
    // ------------------------------------------------------------------

    /// Apply one decoded frame from this radio
    pub fn handle_frame(&mut self, frame: &Frame, now: Instant) -> Result<(), StationError> {
        if frame.from != self.address {
            return Ok(());
        }

        match &frame.body {
            FrameBody::Ack { code } => self.handle_ack(*code),
            FrameBody::Command { number, sub, data } => {
                self.last_response = Some(now);
                if self.power == PowerState::TurningOn {
                    self.power = PowerState::On;
                    self.set_powered(true);
                }
                self.dispatch(*number, *sub, data)?;
            }
        }
        Ok(())
    }

    fn handle_ack(&mut self, code: u8) {
        match self.power {
            PowerState::TurningOn if code == ACK_OK => {
                self.power = PowerState::On;
                self.set_powered(true);
            }
            PowerState::TurningOff if code == ACK_OK => {
                self.power = PowerState::Off;
                self.set_powered(false);
            }
            // Anything but an explicit no-good means something is
            // answering, so the radio cannot be off.
            PowerState::TurningOff | PowerState::Unknown if code != ACK_NG => {
                self.power = PowerState::On;
                self.set_powered(true);
            }
            _ => {}
        }
    }

    fn dispatch(&mut self, number: u8, sub: Option<u8>, data: &[u8]) -> Result<(), StationError> {
        match number {
            0x00 | 0x03 => {
                let frequency = decode_frequency_slice(data)?;
                let slot = self.active_vfo;
                self.vfos[slot].frequency = frequency.clone();
                self.emit(SessionEvent::Frequency { slot, frequency });
            }

            0x01 | 0x04 => {
                let slot = self.active_vfo;
                if let Some(mode) = data.first().copied().and_then(Mode::from_byte) {
                    self.vfos[slot].mode = mode;
                    self.emit(SessionEvent::Mode { slot, mode });
                }
                if let Some(filter) = data.get(1).copied().and_then(Filter::from_byte) {
                    self.vfos[slot].filter = filter;
                    self.emit(SessionEvent::Filter { slot, filter });
                }
            }

            0x0F => self.dispatch_split(data),

            0x14 => {
                if sub == Some(0x01) {
                    let value = meter_value(data)?;
                    self.af_level = value;
                    self.emit(SessionEvent::AfLevel { value });
                }
            }

            0x15 => self.dispatch_meter(sub, data)?,

            0x16 => self.dispatch_tone_enable(sub, data),

            0x19 => {
                // Transceiver ID query response; traffic alone feeds
                // the liveness check.
            }

            0x1A => self.dispatch_registers(sub, data)?,

            0x1B => self.dispatch_tone_value(sub, data),

            0x1C => {
                if sub == Some(0x00) {
                    let slot = self.active_vfo;
                    match data.first() {
                        Some(0x00) => {
                            self.vfos[slot].transmitting = false;
                            self.emit(SessionEvent::Transmit { on: false });
                        }
                        Some(0x01) => {
                            self.vfos[slot].transmitting = true;
                            self.emit(SessionEvent::Transmit { on: true });
                        }
                        _ => {}
                    }
                }
            }

            0x25 => {
                let slot = self.vfo_slot_for(data.first().copied());
                let frequency = decode_frequency_slice(data.get(1..6).unwrap_or_default())?;
                self.vfos[slot].frequency = frequency.clone();
                self.emit(SessionEvent::Frequency { slot, frequency });
            }

            0x26 => self.dispatch_vfo_mode(data),

            0x27 => self.dispatch_scope(sub, data)?,

            other => {
                // The radio reports plenty the station does not track.
                debug!(command = format!("{:02X}", other), "ignoring report");
            }
        }
        Ok(())
    }

    fn vfo_slot_for(&self, selector: Option<u8>) -> usize {
        match selector {
            Some(0x01) => (self.active_vfo + 1) % 2,
            _ => self.active_vfo,
        }
    }

    fn dispatch_split(&mut self, data: &[u8]) {
        let vfo = &mut self.vfos[self.active_vfo];
        match data.first() {
            // Anything that is not an explicit DUP report means the
            // repeater offset is off.
            Some(0x00) => {
                vfo.split = false;
                vfo.duplex = Duplex::Simplex;
            }
            Some(0x01) => {
                vfo.split = true;
                vfo.duplex = Duplex::Simplex;
            }
            Some(0x11) => {
                vfo.split = false;
                vfo.duplex = Duplex::Minus;
            }
            Some(0x12) => {
                vfo.split = false;
                vfo.duplex = Duplex::Plus;
            }
            _ => return,
        }
        let split = vfo.split;
        let duplex = vfo.duplex;
        self.emit(SessionEvent::Split { on: split });
        self.emit(SessionEvent::Duplex { duplex });
    }

    fn dispatch_meter(&mut self, sub: Option<u8>, data: &[u8]) -> Result<(), StationError> {
        let slot = self.active_vfo;
        match sub {
            Some(0x01) => {
                let open = data.first() == Some(&0x01);
                self.vfos[slot].squelch_open = open;
                self.emit(SessionEvent::Squelch { open });
            }
            Some(0x02) => {
                let value = meter_value(data)?;
                self.vfos[slot].meters.s = value;
                self.emit(SessionEvent::Meter {
                    kind: MeterKind::SMeter,
                    value,
                });
            }
            Some(0x11) => {
                let value = meter_value(data)?;
                self.vfos[slot].meters.po = value;
                self.emit(SessionEvent::Meter {
                    kind: MeterKind::PoMeter,
                    value,
                });
            }
            Some(0x12) => {
                let value = meter_value(data)?;
                self.vfos[slot].meters.swr = value;
                self.emit(SessionEvent::Meter {
                    kind: MeterKind::SwrMeter,
                    value,
                });
            }
            Some(0x13) => {
                let value = meter_value(data)?;
                self.vfos[slot].meters.alc = value;
                self.emit(SessionEvent::Meter {
                    kind: MeterKind::Alc,
                    value,
                });
            }
            Some(0x14) => {
                let value = meter_value(data)?;
                self.vfos[slot].meters.comp = value;
                self.emit(SessionEvent::Meter {
                    kind: MeterKind::Comp,
                    value,
                });
            }
            Some(0x15) => {
                let value = meter_value(data)?;
                self.voltage = value;
                self.emit(SessionEvent::Voltage { value });
            }
            Some(0x16) => {
                let reading = meter_value(data)?;
                let amps = if reading == 0 {
                    // The meter reads zero below its floor; estimate
                    // from the AF gain and the profile's draw range.
                    let squelch_modifier = if self.vfos[slot].squelch_open {
                        1.0
                    } else {
                        0.0
                    };
                    let span = self.profile.rx_current_max - self.profile.rx_current_min;
                    let estimate = self.profile.rx_current_min
                        + (f32::from(self.af_level) / 255.0) * span * squelch_modifier;
                    estimate * 9.7
                } else {
                    f32::from(reading)
                };
                self.amperage = amps;
                self.emit(SessionEvent::Amperage { amps });
            }
            _ => {}
        }
        Ok(())
    }

    fn dispatch_tone_enable(&mut self, sub: Option<u8>, data: &[u8]) {
        let paired = self.profile.tone_strategy == ToneStrategy::Paired;
        let slot = self.active_vfo;
        match sub {
            Some(0x42) if paired => {
                if let Some(on) = data.first().map(|b| *b == 0x01) {
                    self.vfos[slot].tone.tx_tone = on;
                    let selection = self.vfos[slot].tone;
                    self.emit(SessionEvent::ToneEnablement { selection });
                }
            }
            Some(0x43) if paired => {
                if let Some(on) = data.first().map(|b| *b == 0x01) {
                    self.vfos[slot].tone.rx_tone = on;
                    let selection = self.vfos[slot].tone;
                    self.emit(SessionEvent::ToneEnablement { selection });
                }
            }
            Some(0x5D) => {
                let Some(byte) = data.first().copied() else {
                    return;
                };
                match ToneSelection::from_mode_byte(byte) {
                    Ok(selection) => {
                        self.vfos[slot].tone = selection;
                        self.emit(SessionEvent::ToneEnablement { selection });
                    }
                    Err(_) => self.emit(SessionEvent::UnrecognizedTone { byte }),
                }
            }
            _ => {}
        }
    }

    fn dispatch_registers(&mut self, sub: Option<u8>, data: &[u8]) -> Result<(), StationError> {
        match sub {
            Some(0x01) => {
                // Band and register arrive as BCD ordinals, 1-based.
                let (Some(&band_byte), Some(&register_byte)) = (data.first(), data.get(1)) else {
                    return Ok(());
                };
                let band = usize::from(bcd_value(band_byte)?).saturating_sub(1);
                let register = usize::from(bcd_value(register_byte)?).saturating_sub(1);
                let frequency = decode_frequency_slice(data.get(2..7).unwrap_or_default())?;
                if let Some(stack) = self.profile.band_stack.get_mut(band) {
                    if let Some(slot) = stack.registers.get_mut(register) {
                        *slot = frequency.clone();
                        self.emit(SessionEvent::BandStackUpdated {
                            band,
                            register,
                            frequency,
                        });
                    }
                }
            }
            Some(0x06) => {
                let slot = self.active_vfo;
                if let Some(on) = data.first().map(|b| *b == 0x01) {
                    self.vfos[slot].data_mode = on;
                    self.emit(SessionEvent::DataMode { slot, on });
                }
                if let Some(filter) = data.get(1).copied().and_then(Filter::from_byte) {
                    self.vfos[slot].filter = filter;
                    self.emit(SessionEvent::Filter { slot, filter });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn dispatch_tone_value(&mut self, sub: Option<u8>, data: &[u8]) {
        if data.len() < 3 {
            return;
        }
        let digits = format!("{:02X}{:02X}{:02X}", data[0], data[1], data[2]);
        let slot = self.active_vfo;
        match sub {
            Some(0x00) => {
                if self.vfos[slot].tone.tx_tone && self.vfos[slot].tone_cursor.set_value(&digits) {
                    let index = self.vfos[slot].tone_cursor.index();
                    let value = self.vfos[slot].tone_cursor.value().to_string();
                    self.emit(SessionEvent::ToneValue {
                        kind: ToneKind::Tone,
                        index,
                        value,
                    });
                }
            }
            Some(0x01) => {
                if self.vfos[slot].tone.rx_tone && self.vfos[slot].tsql_cursor.set_value(&digits) {
                    let index = self.vfos[slot].tsql_cursor.index();
                    let value = self.vfos[slot].tsql_cursor.value().to_string();
                    self.emit(SessionEvent::ToneValue {
                        kind: ToneKind::Tsql,
                        index,
                        value,
                    });
                }
            }
            Some(0x02) => {
                if let Some(polarity) = DtcsPolarity::from_byte(data[0]) {
                    self.vfos[slot].dtcs_polarity = polarity;
                    self.emit(SessionEvent::DtcsPolarity { polarity });
                }
                // Match on the significant digits; the leading pair is
                // the polarity prefix, not part of the code.
                let code_digits = format!("{:02X}{:02X}", data[1], data[2]);
                if self.vfos[slot].dtcs_cursor.set_value(&code_digits) {
                    let index = self.vfos[slot].dtcs_cursor.index();
                    let value = self.vfos[slot].dtcs_cursor.value().to_string();
                    self.emit(SessionEvent::ToneValue {
                        kind: ToneKind::Dtcs,
                        index,
                        value,
                    });
                }
            }
            _ => {}
        }
    }

    fn dispatch_vfo_mode(&mut self, data: &[u8]) {
        let slot = self.vfo_slot_for(data.first().copied());
        let is_active = slot == self.active_vfo;

        if let Some(mode) = data.get(1).copied().and_then(Mode::from_byte) {
            self.vfos[slot].mode = mode;
            if is_active {
                self.emit(SessionEvent::Mode { slot, mode });
            }
        }
        if let Some(on) = data.get(2).map(|b| *b == 0x01) {
            self.vfos[slot].data_mode = on;
            if is_active {
                self.emit(SessionEvent::DataMode { slot, on });
            }
        }
        if let Some(filter) = data.get(3).copied().and_then(Filter::from_byte) {
            self.vfos[slot].filter = filter;
            if is_active {
                self.emit(SessionEvent::Filter { slot, filter });
            }
        }
    }

    fn dispatch_scope(&mut self, sub: Option<u8>, data: &[u8]) -> Result<(), StationError> {
        let slot = self.active_vfo;
        match sub {
            Some(0x00) => {
                let Some(&segment_byte) = data.get(1) else {
                    return Ok(());
                };
                let segment = usize::from(bcd_value(segment_byte)?);
                if segment > 1 {
                    // Segments 2..=11 carry 50 cells each, after the
                    // three header bytes.
                    let start = (segment - 2) * 50;
                    for (i, cell) in data.iter().skip(3).enumerate() {
                        if let Some(target) = self.vfos[slot].scope.get_mut(start + i) {
                            *target = *cell;
                        }
                    }
                }
                if segment == 11 {
                    let cells = self.vfos[slot].scope.clone();
                    self.emit(SessionEvent::ScopeData { cells });
                }
            }
            Some(0x10) => {
                if let Some(on) = data.first().map(|b| *b == 0x01) {
                    self.vfos[slot].scope_on = on;
                    self.emit(SessionEvent::ScopeOn { on });
                }
            }
            Some(0x11) => {
                if let Some(on) = data.first().map(|b| *b == 0x01) {
                    self.vfos[slot].scope_sending = on;
                    self.emit(SessionEvent::ScopeSending { on });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civ_protocol::frame::decode;

    const RADIO: u8 = 0x94;
    const DISPLAY: u8 = 0xE0;

    fn session() -> RadioSession {
        RadioSession::new(
            RADIO,
            DISPLAY,
            115_200,
            RadioProfile::ic7300(),
            StationConfig::default(),
        )
    }

    fn feed(session: &mut RadioSession, text: &str) {
        let frame = decode(text).unwrap();
        session.handle_frame(&frame, Instant::now()).unwrap();
    }

    fn outbox_text(session: &mut RadioSession) -> Vec<String> {
        session.drain_outbox().into_iter().map(|f| f.text).collect()
    }

    #[test]
    fn test_frequency_report_updates_active_vfo() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 03 00 00 25 14 00 FD");
        assert_eq!(s.active_vfo().frequency, "14.250.000");
        assert!(s
            .drain_events()
            .contains(&SessionEvent::Frequency {
                slot: 0,
                frequency: "14.250.000".to_string()
            }));
    }

    #[test]
    fn test_inactive_vfo_report_does_not_touch_active() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 25 01 00 00 00 40 12 FD");
        assert_eq!(s.active_vfo().frequency, "0.000.000");
        assert_eq!(s.inactive_vfo().frequency, "1240.000.000");
    }

    #[test]
    fn test_mode_report() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 04 03 02 FD");
        assert_eq!(s.active_vfo().mode, Mode::Cw);
        assert_eq!(s.active_vfo().filter, Filter::Fil2);
    }

    #[test]
    fn test_vfo_mode_report_for_inactive_stays_quiet() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 26 01 05 01 03 FD");
        assert_eq!(s.inactive_vfo().mode, Mode::Fm);
        assert!(s.inactive_vfo().data_mode);
        // Inactive-VFO changes are recorded without event noise.
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn test_power_on_sequence() {
        let mut s = session();
        s.set_power(true);
        assert_eq!(s.power_state(), PowerState::TurningOn);

        let ops = s.drain_timer_ops();
        assert!(ops.contains(&TimerOp::Cancel(TimerAction::PowerOffSettle)));
        assert!(ops.iter().any(|op| matches!(
            op,
            TimerOp::Schedule {
                action: TimerAction::PowerOnSettle,
                ..
            }
        )));

        let sent = outbox_text(&mut s);
        // Wake preamble: the power-on frame opens with a long FE run.
        assert!(sent[0].starts_with("FE FE FE"));
        assert!(sent[0].ends_with("18 01 FD"));

        feed(&mut s, "FE FE E0 94 FB FD");
        assert_eq!(s.power_state(), PowerState::On);
        assert!(s.powered_on());
        assert!(s.drain_events().contains(&SessionEvent::Power { on: true }));
    }

    #[test]
    fn test_power_off_settle_forces_off() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 FB FD"); // Unknown + ok-ish ack forces On
        assert!(s.powered_on());

        s.set_power(false);
        assert_eq!(s.power_state(), PowerState::TurningOff);
        s.timer_fired(TimerAction::PowerOffSettle);
        assert_eq!(s.power_state(), PowerState::Off);
        assert!(!s.powered_on());
    }

    #[test]
    fn test_negative_ack_does_not_force_on() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 FA FD");
        assert_eq!(s.power_state(), PowerState::Unknown);
        assert!(!s.powered_on());
    }

    #[test]
    fn test_command_report_while_turning_on_completes() {
        let mut s = session();
        s.set_power(true);
        s.drain_outbox();
        feed(&mut s, "FE FE E0 94 03 00 00 25 14 00 FD");
        assert_eq!(s.power_state(), PowerState::On);
        assert!(s.powered_on());
    }

    #[test]
    fn test_liveness_converges() {
        let mut s = session();
        let t0 = Instant::now();
        feed(&mut s, "FE FE E0 94 03 00 00 25 14 00 FD");

        // Fresh traffic: on.
        s.check_liveness(t0 + Duration::from_millis(100));
        assert!(s.powered_on());

        // Silence past the threshold: off.
        s.check_liveness(t0 + Duration::from_millis(3500));
        assert!(!s.powered_on());
        assert_eq!(s.power_state(), PowerState::Off);
    }

    #[test]
    fn test_liveness_respects_transitions_in_flight() {
        let mut s = session();
        s.set_power(true);
        // No response yet, but a power-on is in flight.
        s.check_liveness(Instant::now() + Duration::from_secs(10));
        assert_eq!(s.power_state(), PowerState::TurningOn);
    }

    #[test]
    fn test_band_select_sequence() {
        let mut s = session();
        // 20 m is index 4 in the IC-7300 table.
        s.select_band(4).unwrap();
        assert_eq!(outbox_text(&mut s), vec!["FE FE 94 E0 1A 01 05 01 FD"]);

        let ops = s.drain_timer_ops();
        assert_eq!(ops.len(), 2);

        s.timer_fired(TimerAction::BandFrequency { band: 4 });
        assert_eq!(
            outbox_text(&mut s),
            vec!["FE FE 94 E0 25 00 00 00 00 14 00 FD"]
        );

        s.timer_fired(TimerAction::BandRequery);
        assert_eq!(outbox_text(&mut s), vec!["FE FE 94 E0 03 FD"]);
    }

    #[test]
    fn test_band_select_out_of_range() {
        let mut s = session();
        assert!(matches!(
            s.select_band(10),
            Err(StationError::BandOutOfRange(10))
        ));
    }

    #[test]
    fn test_band_stack_report_updates_table() {
        let mut s = session();
        // Band 5 (20 m), register 1, 14.074.000.
        feed(&mut s, "FE FE E0 94 1A 01 05 01 00 40 07 14 00 FD");
        assert_eq!(s.band_stack()[4].registers[0], "14.074.000");
    }

    #[test]
    fn test_update_mode_commands() {
        let mut s = session();
        s.update_mode(Mode::Usb, true, Filter::Fil2).unwrap();
        assert_eq!(
            outbox_text(&mut s),
            vec!["FE FE 94 E0 26 00 01 01 02 FD", "FE FE 94 E0 26 00 FD"]
        );
    }

    #[test]
    fn test_update_mode_rejects_unsupported() {
        let mut s = session();
        assert!(s.update_mode(Mode::Dv, false, Filter::Fil1).is_err());
    }

    #[test]
    fn test_toggle_transmit_is_preemptive() {
        let mut s = session();
        s.toggle_transmit();
        assert!(s.active_vfo().transmitting);
        assert_eq!(outbox_text(&mut s), vec!["FE FE 94 E0 1C 00 01 FD"]);

        s.toggle_transmit();
        assert!(!s.active_vfo().transmitting);
        assert_eq!(outbox_text(&mut s), vec!["FE FE 94 E0 1C 00 00 FD"]);
    }

    #[test]
    fn test_meter_and_current_fallback() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 14 01 01 28 FD"); // AF level 128
        feed(&mut s, "FE FE E0 94 15 01 01 FD"); // squelch open
        feed(&mut s, "FE FE E0 94 15 16 00 00 FD"); // current reads zero
        let events = s.drain_events();
        let amps = events.iter().find_map(|e| match e {
            SessionEvent::Amperage { amps } => Some(*amps),
            _ => None,
        });
        let expected = (0.9 + (128.0 / 255.0) * (1.25 - 0.9)) * 9.7;
        assert!((amps.unwrap() - expected).abs() < 1e-3);
    }

    #[test]
    fn test_tone_enable_paired() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 16 42 01 FD");
        assert!(s.active_vfo().tone.tx_tone);
        feed(&mut s, "FE FE E0 94 16 42 00 FD");
        assert!(!s.active_vfo().tone.tx_tone);
    }

    #[test]
    fn test_tone_enable_combined_and_unrecognized() {
        let mut s = RadioSession::new(
            0xA2,
            DISPLAY,
            115_200,
            RadioProfile::ic9700(),
            StationConfig::default(),
        );
        let frame = decode("FE FE E0 A2 16 5D 09 FD").unwrap();
        s.handle_frame(&frame, Instant::now()).unwrap();
        assert!(s.active_vfo().tone.tx_tone);
        assert!(s.active_vfo().tone.rx_tone);

        let frame = decode("FE FE E0 A2 16 5D 04 FD").unwrap();
        s.handle_frame(&frame, Instant::now()).unwrap();
        assert!(s
            .drain_events()
            .contains(&SessionEvent::UnrecognizedTone { byte: 0x04 }));
    }

    #[test]
    fn test_tone_value_report_gated_on_enable() {
        let mut s = session();
        // Not enabled: report ignored.
        feed(&mut s, "FE FE E0 94 1B 00 00 08 85 FD");
        assert_eq!(s.active_vfo().tone_cursor.value(), "--");

        feed(&mut s, "FE FE E0 94 16 42 01 FD");
        feed(&mut s, "FE FE E0 94 1B 00 00 08 85 FD");
        assert_eq!(s.active_vfo().tone_cursor.value(), "88.5");
    }

    #[test]
    fn test_dtcs_report_sets_polarity_and_code() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 1B 02 11 00 23 FD");
        let vfo = s.active_vfo();
        assert_eq!(vfo.dtcs_cursor.value(), "023");
        assert_eq!(vfo.dtcs_polarity.prefix(), "11");
    }

    #[test]
    fn test_change_tone_type_paired_both_keeps_active_side() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 16 42 01 FD"); // TX tone already on
        s.drain_outbox();
        s.change_tone_type(ToneType::Tone, false);
        assert_eq!(
            outbox_text(&mut s),
            vec![
                "FE FE 94 E0 16 43 01 FD",
                "FE FE 94 E0 16 42 FD",
                "FE FE 94 E0 16 43 FD"
            ]
        );
    }

    #[test]
    fn test_change_duplex() {
        let mut s = session();
        s.change_duplex(Duplex::Plus);
        assert_eq!(
            outbox_text(&mut s),
            vec!["FE FE 94 E0 0F 12 FD", "FE FE 94 E0 0F FD"]
        );
    }

    #[test]
    fn test_split_report() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 0F 11 FD");
        assert!(!s.active_vfo().split);
        assert_eq!(s.active_vfo().duplex, Duplex::Minus);
    }

    #[test]
    fn test_split_off_report_resets_duplex() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 0F 11 FD");
        assert_eq!(s.active_vfo().duplex, Duplex::Minus);

        feed(&mut s, "FE FE E0 94 0F 00 FD");
        assert!(!s.active_vfo().split);
        assert_eq!(s.active_vfo().duplex, Duplex::Simplex);
    }

    #[test]
    fn test_scope_reassembly() {
        let mut s = session();
        // Segment 2 fills cells 0..50 with 0x07.
        let cells = vec!["07"; 50].join(" ");
        feed(
            &mut s,
            &format!("FE FE E0 94 27 00 00 02 11 {} FD", cells),
        );
        assert_eq!(s.active_vfo().scope[0], 0x07);
        assert!(s.drain_events().is_empty());

        // Segment 11 completes the sweep.
        feed(
            &mut s,
            &format!("FE FE E0 94 27 00 00 11 11 {} FD", cells),
        );
        let events = s.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::ScopeData { .. })));
    }

    #[test]
    fn test_initialize_sequence() {
        let mut s = session();
        s.initialize();
        assert_eq!(
            outbox_text(&mut s),
            vec![
                "FE FE 94 E0 03 FD",
                "FE FE 94 E0 04 FD",
                "FE FE 94 E0 1A 06 FD",
                "FE FE 94 E0 0F FD",
                "FE FE 94 E0 07 00 FD"
            ]
        );
    }

    #[test]
    fn test_frames_from_other_devices_ignored() {
        let mut s = session();
        let frame = decode("FE FE E0 A2 03 00 00 25 14 00 FD").unwrap();
        s.handle_frame(&frame, Instant::now()).unwrap();
        assert_eq!(s.active_vfo().frequency, "0.000.000");
    }

    #[test]
    fn test_operate_mode_and_channel_events_change_gated() {
        let mut s = session();
        s.select_vfo();
        assert_eq!(outbox_text(&mut s), vec!["FE FE 94 E0 07 00 FD"]);

        s.set_operate_mode(OperateMode::Vfo); // no change, no event
        s.set_operate_mode(OperateMode::Memory);
        s.set_memory_channel(1); // default, no event
        s.set_memory_channel(5);
        assert_eq!(
            s.drain_events(),
            vec![
                SessionEvent::OperateModeChanged {
                    mode: OperateMode::Memory
                },
                SessionEvent::MemoryChannel { channel: 5 }
            ]
        );
    }

    #[test]
    fn test_poll_tick_emits_framed_poll() {
        let mut s = session();
        feed(&mut s, "FE FE E0 94 FB FD"); // force on so on-gated polls run
        s.drain_outbox();
        s.start_polling();
        s.poll_tick(Instant::now());
        let out = s.drain_outbox();
        assert_eq!(out.len(), 1);
        assert!(out[0].poll);
        assert_eq!(out[0].text, "FE FE 94 E0 0F FD");
    }
}
