//! CI-V Station Core
//!
//! The stateful half of the station controller: everything between a
//! raw CI-V text transport and a UI or automation layer.
//!
//! # Architecture
//!
//! Inbound, a [`DeviceRouter`](router::DeviceRouter) filters and
//! demultiplexes transport messages to a
//! [`RadioSession`](session::RadioSession) per radio, which updates
//! its two [`VfoState`](vfo::VfoState)s and emits typed
//! [`SessionEvent`](events::SessionEvent)s. Outbound, session
//! operations produce framed command text that a
//! [`TransportQueue`](queue::TransportQueue) paces onto the wire, with
//! a [`PollScheduler`](poll::PollScheduler) keeping state fresh in the
//! gaps.
//!
//! The cores are deterministic and clock-free; the
//! [`actor`](actor::run_station) task owns time, the channels and all
//! mutable state:
//!
//! ```rust,no_run
//! use civ_station::actor::{run_station, StationCommand};
//! use civ_station::config::StationConfig;
//! use civ_station::profile::RadioProfile;
//! use civ_station::session::RadioSession;
//! use tokio::sync::mpsc;
//!
//! let config = StationConfig::default();
//! let session = RadioSession::new(0x94, 0xE0, 115_200, RadioProfile::ic7300(), config.clone());
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//! let (wire_tx, mut wire_rx) = mpsc::channel(256);
//!
//! tokio::spawn(run_station(config, 0xE0, vec![session], cmd_rx, event_tx, wire_tx));
//! # drop(cmd_tx);
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod events;
pub mod poll;
pub mod profile;
pub mod queue;
pub mod router;
pub mod session;
pub mod vfo;

pub use actor::{run_station, StationCommand};
pub use config::StationConfig;
pub use error::StationError;
pub use events::{MeterKind, OperateMode, SessionEvent, StationEvent, ToneKind};
pub use poll::{icom_poll_table, PollEntry, PollScheduler};
pub use profile::{BandStack, RadioProfile, ToneStrategy};
pub use queue::{TransportPayload, TransportQueue};
pub use router::{DeviceRouter, Routed};
pub use session::{OutboundFrame, PowerState, RadioSession, TimerAction, TimerOp, ToneType};
pub use vfo::{Duplex, Filter, Meters, Mode, VfoState};
