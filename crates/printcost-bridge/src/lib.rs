//! # printcost-bridge: Host ⇄ Embedded Calculator Protocol
//!
//! This crate carries messages between a host admin view (the page listing
//! offers) and the calculator embedded in it. The two sides exchange JSON
//! text frames only and never share memory.
//!
//! ## Session Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Bridge Session                                 │
//! │                                                                         │
//! │   BridgeHost (host.rs)                    EmbeddedCalculator            │
//! │   ┌────────────────────┐                  (embedded.rs)                 │
//! │   │ issues token       │ ── INIT ───────► ┌────────────────────┐        │
//! │   │ checks every frame │                  │ waits for INIT     │        │
//! │   │ drops foreign ones │ ◄── CALC_* ───── │ calculates through │        │
//! │   │                    │                  │ CalculationBackend │        │
//! │   │ OFFERS_UPDATED ────┼────────────────► │                    │        │
//! │   └─────────┬──────────┘                  └────────────────────┘        │
//! │             │                                                           │
//! │             ▼                                                           │
//! │   HostEventSink: on_result / on_config_saved / on_error / ...           │
//! │                                                                         │
//! │  STATES:                                                                │
//! │  uninitialized ──INIT──► ready ──RESULT | SAVE_CONFIG | CLOSE──► closed │
//! │                            └──────── teardown ──────────► abandoned     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Bridge settings (`[bridge]` section of pricing.toml)
//! - [`embedded`] - Embedded-view side and the backend trait
//! - [`error`] - Bridge error types
//! - [`host`] - Host session state machine and actor
//! - [`protocol`] - Message types, envelopes and the session token
//! - [`transport`] - In-process frame channels
//!
//! ## Usage
//!
//! ```rust,ignore
//! use printcost_bridge::{frame_pair, BridgeHost, BridgeSettings, EmbeddedCalculator, NoOpSink};
//!
//! let settings = BridgeSettings::default();
//! let (host_port, embedded_port) = frame_pair(settings.channel_capacity);
//!
//! let host = BridgeHost::spawn(options, &settings, host_port, Arc::new(NoOpSink)).await?;
//!
//! let mut calculator = EmbeddedCalculator::new(embedded_port, backend, settings);
//! calculator.wait_for_init().await?;
//! calculator.calculate(&inputs).await?;
//!
//! println!("Session ended: {}", host.finished().await?);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod embedded;
pub mod error;
pub mod host;
pub mod protocol;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::BridgeSettings;
pub use embedded::{CalculationBackend, Delivery, EmbeddedCalculator, EmbeddedSession};
pub use error::{BridgeError, BridgeResult};
pub use host::{
    BridgeHost, BridgeHostHandle, HostEvent, HostEventSink, HostOptions, HostSession,
    HostStatus, NoOpSink, SessionState,
};
pub use protocol::{
    CalcErrorPayload, CalcResultPayload, EmbeddedMessage, Envelope, HostMessage, IblockIds,
    InitPayload, MessageType, OfferPayload, OffersUpdatedPayload, SaveConfigPayload,
    SessionToken,
};
pub use transport::{frame_pair, FramePort};
