//! Station actor
//!
//! All mutable station state (router, sessions, transport queue,
//! timers) lives inside one async task. The transport task feeds raw
//! inbound text and link notifications in through the command channel;
//! UI or automation sends operations through the same channel; every
//! observable change comes back out on a single event stream.
//!
//! The actor does not own the socket. On link loss it emits
//! [`StationEvent::Reconnecting`] and the transport task is expected
//! to dial again after that delay; on a malformed-traffic overflow it
//! emits [`StationEvent::MalformedOverflow`] and the transport task
//! closes the connection.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::StationConfig;
use crate::events::StationEvent;
use crate::queue::{TransportPayload, TransportQueue};
use crate::router::{DeviceRouter, Routed};
use crate::session::{RadioSession, TimerAction, TimerOp, ToneType, TIMER_SLOTS};
use crate::vfo::{Duplex, Filter, Mode};

/// Commands sent to the station actor
#[derive(Debug)]
pub enum StationCommand {
    /// The transport link opened
    TransportOpened,

    /// The transport link closed
    TransportClosed,

    /// One raw message arrived on the transport
    Inbound {
        /// Message text
        text: String,
    },

    /// Switch the transport between text and binary payloads
    SetBinaryMode {
        /// Send raw bytes instead of ASCII hex
        binary: bool,
    },

    /// Mark the station attended or unattended (poll cadence)
    SetAttended {
        /// Operator present
        attended: bool,
    },

    /// Power a radio on or off
    SetPower {
        /// Radio address
        address: u8,
        /// Desired state
        on: bool,
    },

    /// Set a radio's active-VFO frequency
    SetFrequency {
        /// Radio address
        address: u8,
        /// Frequency in display form
        frequency: String,
    },

    /// Set mode, data mode and filter on a radio's active VFO
    UpdateMode {
        /// Radio address
        address: u8,
        /// Operating mode
        mode: Mode,
        /// Data mode
        data_mode: bool,
        /// IF filter
        filter: Filter,
    },

    /// Toggle transmit on a radio
    ToggleTransmit {
        /// Radio address
        address: u8,
    },

    /// Jump a radio to a band via its stacking registers
    SelectBand {
        /// Radio address
        address: u8,
        /// Band index
        band: usize,
    },

    /// Toggle split operation
    ToggleSplit {
        /// Radio address
        address: u8,
    },

    /// Select the repeater duplex direction
    ChangeDuplex {
        /// Radio address
        address: u8,
        /// Direction
        duplex: Duplex,
    },

    /// Change the tone family on one side
    ChangeToneType {
        /// Radio address
        address: u8,
        /// Tone family
        tone_type: ToneType,
        /// Transmit side (false = receive)
        tx_side: bool,
    },

    /// Step the tone/code value on one side
    ChangeToneValue {
        /// Radio address
        address: u8,
        /// Forward (false = backward)
        next: bool,
        /// Transmit side
        tx_side: bool,
    },

    /// Flip DTCS polarity on one side
    ChangeDtcsPolarity {
        /// Radio address
        address: u8,
        /// Transmit side
        tx_side: bool,
    },

    /// Push the active VFO's tone values to a radio
    SendToneValues {
        /// Radio address
        address: u8,
    },

    /// Re-query tone and duplex configuration
    RequestRepeaterDetails {
        /// Radio address
        address: u8,
    },

    /// Enable the scope and its waveform output
    StartScope {
        /// Radio address
        address: u8,
    },

    /// Stop the scope's waveform output
    StopScope {
        /// Radio address
        address: u8,
    },

    /// Query whether a radio is considered powered on
    QueryPower {
        /// Radio address
        address: u8,
        /// Reply channel
        response: oneshot::Sender<bool>,
    },
}

struct SessionSlot {
    session: RadioSession,
    timers: [Option<(TimerAction, Instant)>; TIMER_SLOTS],
}

/// Run the station actor until the command channel closes
pub async fn run_station(
    config: StationConfig,
    display_address: u8,
    sessions: Vec<RadioSession>,
    mut commands: mpsc::Receiver<StationCommand>,
    events: mpsc::Sender<StationEvent>,
    transport: mpsc::Sender<TransportPayload>,
) {
    info!(display_address, "station actor started");

    let mut router = DeviceRouter::new(display_address, config.clone());
    let mut queue = TransportQueue::new(&config);
    let mut slots: HashMap<u8, SessionSlot> = HashMap::new();
    for session in sessions {
        router.register(session.address());
        slots.insert(
            session.address(),
            SessionSlot {
                session,
                timers: [None; TIMER_SLOTS],
            },
        );
    }

    let mut tick = interval(config.poll_tick());
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut liveness = interval(config.liveness_check());
    liveness.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    info!("command channel closed, stopping station actor");
                    break;
                };
                handle_command(
                    command,
                    &config,
                    &mut router,
                    &mut queue,
                    &mut slots,
                    &events,
                    &transport,
                )
                .await;
            }

            _ = tick.tick() => {
                let now = Instant::now();
                for slot in slots.values_mut() {
                    slot.session.poll_tick(now);
                    fire_due_timers(slot, now);
                    flush_session(slot, &mut queue, &events, &transport, now).await;
                }
                // One drain per tick; the spacing window gates the rest.
                if let Some(payload) = queue.drain_one(Instant::now()) {
                    deliver(&transport, payload).await;
                }
            }

            _ = liveness.tick() => {
                let now = Instant::now();
                for slot in slots.values_mut() {
                    slot.session.check_liveness(now);
                    flush_session(slot, &mut queue, &events, &transport, now).await;
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_command(
    command: StationCommand,
    config: &StationConfig,
    router: &mut DeviceRouter,
    queue: &mut TransportQueue,
    slots: &mut HashMap<u8, SessionSlot>,
    events: &mpsc::Sender<StationEvent>,
    transport: &mpsc::Sender<TransportPayload>,
) {
    let now = Instant::now();
    match command {
        StationCommand::TransportOpened => {
            info!("transport link up");
            router.reset();
            queue.set_link_open(true);
            for slot in slots.values_mut() {
                slot.session.initialize();
                slot.session.start_polling();
                flush_session(slot, queue, events, transport, now).await;
            }
            emit(events, StationEvent::LinkUp).await;
        }

        StationCommand::TransportClosed => {
            info!("transport link down");
            router.reset();
            queue.set_link_open(false);
            queue.clear();
            for slot in slots.values_mut() {
                slot.session.stop_polling();
            }
            emit(events, StationEvent::LinkDown).await;
            emit(
                events,
                StationEvent::Reconnecting {
                    delay_ms: config.reconnect_delay_ms,
                },
            )
            .await;
        }

        StationCommand::Inbound { text } => match router.accept(&text, now) {
            Routed::Frame(frame) => {
                if let Some(slot) = slots.get_mut(&frame.from) {
                    if let Err(err) = slot.session.handle_frame(&frame, now) {
                        warn!("frame from {:02X} not applied: {}", frame.from, err);
                    }
                    flush_session(slot, queue, events, transport, now).await;
                }
            }
            Routed::Overflow => {
                warn!("malformed traffic overflow, asking transport to close");
                emit(
                    events,
                    StationEvent::MalformedOverflow {
                        count: config.malformed_threshold,
                    },
                )
                .await;
            }
            Routed::Ignored | Routed::Duplicate | Routed::Malformed { .. } => {}
        },

        StationCommand::SetBinaryMode { binary } => queue.set_binary_mode(binary),

        StationCommand::SetAttended { attended } => {
            for slot in slots.values_mut() {
                slot.session.set_attended(attended);
            }
        }

        StationCommand::QueryPower { address, response } => {
            let on = slots
                .get(&address)
                .map(|slot| slot.session.powered_on())
                .unwrap_or(false);
            let _ = response.send(on);
        }

        // Addressed radio operations.
        other => {
            let Some(address) = command_address(&other) else {
                return;
            };
            let Some(slot) = slots.get_mut(&address) else {
                debug!("no session for {:02X}", address);
                return;
            };
            apply_radio_command(&mut slot.session, other);
            flush_session(slot, queue, events, transport, now).await;
        }
    }
}

fn command_address(command: &StationCommand) -> Option<u8> {
    match command {
        StationCommand::SetPower { address, .. }
        | StationCommand::SetFrequency { address, .. }
        | StationCommand::UpdateMode { address, .. }
        | StationCommand::ToggleTransmit { address }
        | StationCommand::SelectBand { address, .. }
        | StationCommand::ToggleSplit { address }
        | StationCommand::ChangeDuplex { address, .. }
        | StationCommand::ChangeToneType { address, .. }
        | StationCommand::ChangeToneValue { address, .. }
        | StationCommand::ChangeDtcsPolarity { address, .. }
        | StationCommand::SendToneValues { address }
        | StationCommand::RequestRepeaterDetails { address }
        | StationCommand::StartScope { address }
        | StationCommand::StopScope { address } => Some(*address),
        _ => None,
    }
}

fn apply_radio_command(session: &mut RadioSession, command: StationCommand) {
    match command {
        StationCommand::SetPower { on, .. } => session.set_power(on),
        StationCommand::SetFrequency { frequency, .. } => {
            if let Err(err) = session.set_frequency(&frequency) {
                warn!("rejected frequency {:?}: {}", frequency, err);
            }
        }
        StationCommand::UpdateMode {
            mode,
            data_mode,
            filter,
            ..
        } => {
            if let Err(err) = session.update_mode(mode, data_mode, filter) {
                warn!("rejected mode change: {}", err);
            }
        }
        StationCommand::ToggleTransmit { .. } => session.toggle_transmit(),
        StationCommand::SelectBand { band, .. } => {
            if let Err(err) = session.select_band(band) {
                warn!("rejected band select: {}", err);
            }
        }
        StationCommand::ToggleSplit { .. } => session.toggle_split(),
        StationCommand::ChangeDuplex { duplex, .. } => session.change_duplex(duplex),
        StationCommand::ChangeToneType {
            tone_type, tx_side, ..
        } => session.change_tone_type(tone_type, tx_side),
        StationCommand::ChangeToneValue { next, tx_side, .. } => {
            session.change_tone_value(next, tx_side)
        }
        StationCommand::ChangeDtcsPolarity { tx_side, .. } => {
            session.change_dtcs_polarity(tx_side)
        }
        StationCommand::SendToneValues { .. } => session.send_tone_values(),
        StationCommand::RequestRepeaterDetails { .. } => session.request_repeater_details(),
        StationCommand::StartScope { .. } => session.start_scope(),
        StationCommand::StopScope { .. } => session.stop_scope(),
        _ => {}
    }
}

fn fire_due_timers(slot: &mut SessionSlot, now: Instant) {
    for pending in slot.timers.iter_mut() {
        if let Some((action, deadline)) = *pending {
            if deadline <= now {
                *pending = None;
                slot.session.timer_fired(action);
            }
        }
    }
}

/// Move a session's pending output into the queue, timers and event
/// stream
async fn flush_session(
    slot: &mut SessionSlot,
    queue: &mut TransportQueue,
    events: &mpsc::Sender<StationEvent>,
    transport: &mpsc::Sender<TransportPayload>,
    now: Instant,
) {
    for op in slot.session.drain_timer_ops() {
        match op {
            TimerOp::Schedule { action, delay } => {
                slot.timers[action.slot()] = Some((action, now + delay));
            }
            TimerOp::Cancel(action) => {
                slot.timers[action.slot()] = None;
            }
        }
    }

    for frame in slot.session.drain_outbox() {
        if let Some(payload) = queue.send(&frame.text, frame.poll, now) {
            deliver(transport, payload).await;
        }
    }

    let address = slot.session.address();
    for event in slot.session.drain_events() {
        // Meter streams arrive several times a second; only state
        // changes are worth a log line.
        if !event.is_telemetry() {
            debug!("session {:02X} event: {:?}", address, event);
        }
        emit(events, StationEvent::Session { address, event }).await;
    }
}

async fn deliver(transport: &mpsc::Sender<TransportPayload>, payload: TransportPayload) {
    if transport.send(payload).await.is_err() {
        warn!("transport task gone, dropping outbound payload");
    }
}

async fn emit(events: &mpsc::Sender<StationEvent>, event: StationEvent) {
    if events.send(event).await.is_err() {
        debug!("event receiver gone");
    }
}
