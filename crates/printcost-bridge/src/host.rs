//! # Bridge Host
//!
//! Host side of the bridge: issues INIT, authorizes every inbound frame
//! against the session token and drives the session state machine.
//!
//! ## Session State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Uninitialized ──── INIT sent ────► Ready                              │
//! │                                        │                                │
//! │        CALC_REMOVE_OFFER ──► OFFERS_UPDATED, stays Ready                │
//! │        CALC_OPEN_OFFER   ──► host navigates, stays Ready                │
//! │        CALC_ERROR        ──► shown to host UI, stays Ready              │
//! │                                        │                                │
//! │        CALC_RESULT / CALC_SAVE_CONFIG / CALC_CLOSE                      │
//! │                                        ▼                                │
//! │                                     Closed   (host closes the surface)  │
//! │                                                                         │
//! │   Uninitialized / Ready ── teardown or peer gone ──► Abandoned          │
//! │                                                                         │
//! │  A frame with a missing or foreign token is logged and dropped:         │
//! │  no state change, no event.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An abandoned session has no outcome. The host never treats it as a
//! zero-cost result.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BridgeSettings;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{
    CalcErrorPayload, CalcResultPayload, EmbeddedMessage, Envelope, HostMessage, IblockIds,
    InitPayload, OffersUpdatedPayload, SaveConfigPayload, SessionToken,
};
use crate::transport::FramePort;

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of one embedding instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
    Abandoned,
}

impl SessionState {
    /// Whether the session can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Abandoned)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Closed => write!(f, "closed"),
            SessionState::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// What an accepted frame means for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Completed(CalcResultPayload),
    ConfigSaved(SaveConfigPayload),
    Error(CalcErrorPayload),
    OffersChanged(Vec<i64>),
    OpenOffer(i64),
    Closed,
}

// =============================================================================
// Host Session (pure state machine)
// =============================================================================

/// Host-side session state, free of any I/O.
#[derive(Debug)]
pub struct HostSession {
    token: SessionToken,
    state: SessionState,
    offer_ids: Vec<i64>,
}

impl HostSession {
    /// Creates a session with a freshly generated token.
    pub fn new(offer_ids: Vec<i64>) -> Self {
        HostSession {
            token: SessionToken::generate(),
            state: SessionState::Uninitialized,
            offer_ids,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn offer_ids(&self) -> &[i64] {
        &self.offer_ids
    }

    /// Builds the INIT payload and moves to Ready.
    pub fn initialize(
        &mut self,
        api_base: &str,
        iblock_ids: IblockIds,
        settings: &BridgeSettings,
    ) -> BridgeResult<InitPayload> {
        if self.state != SessionState::Uninitialized {
            return Err(BridgeError::UnexpectedMessage {
                message_type: "INIT".into(),
                state: self.state.to_string(),
            });
        }

        let init = InitPayload {
            offer_ids: self.offer_ids.clone(),
            api_base: api_base.to_string(),
            session_token: self.token.as_str().to_string(),
            iblock_ids,
        };
        init.validate(settings)?;

        self.state = SessionState::Ready;
        Ok(init)
    }

    /// Authorizes and applies one inbound frame.
    ///
    /// On any error the session is left exactly as it was.
    pub fn handle_frame(&mut self, frame: &str) -> BridgeResult<HostEvent> {
        let envelope = Envelope::from_json(frame)?;

        if !self.token.matches(envelope.session_token.as_deref()) {
            return Err(BridgeError::Unauthorized {
                message_type: envelope.message_type,
            });
        }

        if self.state != SessionState::Ready {
            return Err(BridgeError::UnexpectedMessage {
                message_type: envelope.message_type,
                state: self.state.to_string(),
            });
        }

        let event = match envelope.decode()? {
            EmbeddedMessage::Result(result) => {
                self.state = SessionState::Closed;
                HostEvent::Completed(result)
            }
            EmbeddedMessage::SaveConfig(config) => {
                self.state = SessionState::Closed;
                HostEvent::ConfigSaved(config)
            }
            EmbeddedMessage::Close => {
                self.state = SessionState::Closed;
                HostEvent::Closed
            }
            EmbeddedMessage::Error(error) => HostEvent::Error(error),
            EmbeddedMessage::RemoveOffer(offer) => {
                self.offer_ids.retain(|id| *id != offer.offer_id);
                HostEvent::OffersChanged(self.offer_ids.clone())
            }
            EmbeddedMessage::OpenOffer(offer) => HostEvent::OpenOffer(offer.offer_id),
        };

        Ok(event)
    }

    /// Ends the session from the host side. Anything short of Closed is abandoned.
    pub fn teardown(&mut self) -> SessionState {
        if self.state != SessionState::Closed {
            self.state = SessionState::Abandoned;
        }
        self.state
    }
}

// =============================================================================
// Event Sink Trait
// =============================================================================

/// Receives host-facing session events (implemented by the host UI glue).
pub trait HostEventSink: Send + Sync {
    /// A result arrived; the host closes its embedding surface.
    fn on_result(&self, result: &CalcResultPayload);

    /// The embedded view persisted a configuration.
    fn on_config_saved(&self, config: &SaveConfigPayload);

    /// A calculation failed inside the embedded view.
    fn on_error(&self, error: &CalcErrorPayload);

    /// The offer list changed after a removal.
    fn on_offers_changed(&self, offer_ids: &[i64]);

    /// The embedded view asked the host to open an offer.
    fn on_open_offer(&self, offer_id: i64);

    /// The session reached Closed or Abandoned.
    fn on_session_end(&self, state: SessionState);
}

/// No-op sink for testing.
pub struct NoOpSink;

impl HostEventSink for NoOpSink {
    fn on_result(&self, _result: &CalcResultPayload) {}
    fn on_config_saved(&self, _config: &SaveConfigPayload) {}
    fn on_error(&self, _error: &CalcErrorPayload) {}
    fn on_offers_changed(&self, _offer_ids: &[i64]) {}
    fn on_open_offer(&self, _offer_id: i64) {}
    fn on_session_end(&self, _state: SessionState) {}
}

// =============================================================================
// Host Actor
// =============================================================================

/// What the host embeds the calculator with.
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub offer_ids: Vec<i64>,
    pub api_base: String,
    pub iblock_ids: IblockIds,
}

/// Snapshot of the host session for external queries.
#[derive(Debug, Clone, PartialEq)]
pub struct HostStatus {
    pub state: SessionState,
    pub offer_ids: Vec<i64>,
    /// Frames dropped as unauthorized, malformed or out of state.
    pub dropped_frames: u64,
}

/// Handle for interacting with a running host actor.
pub struct BridgeHostHandle {
    status: Arc<RwLock<HostStatus>>,
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<SessionState>,
}

impl BridgeHostHandle {
    /// Returns the current session status.
    pub async fn status(&self) -> HostStatus {
        self.status.read().await.clone()
    }

    /// Tears the embedding down and waits for the final state.
    pub async fn teardown(self) -> BridgeResult<SessionState> {
        // The actor may already be gone after a terminal message.
        let _ = self.shutdown_tx.send(()).await;
        self.finished().await
    }

    /// Waits for the session to end on its own.
    pub async fn finished(self) -> BridgeResult<SessionState> {
        let BridgeHostHandle {
            join, shutdown_tx, ..
        } = self;

        // Keep the shutdown sender alive until the actor is done, dropping it
        // early would read as a teardown.
        let result = join
            .await
            .map_err(|e| BridgeError::ChannelClosed(format!("host task failed: {}", e)));
        drop(shutdown_tx);
        result
    }
}

/// Host actor owning one session and its frame port.
///
/// ## Usage
/// ```rust,ignore
/// let (host_port, embedded_port) = frame_pair(settings.channel_capacity);
/// let handle = BridgeHost::spawn(options, &settings, host_port, Arc::new(NoOpSink)).await?;
///
/// // ... embedded view runs on embedded_port ...
///
/// let final_state = handle.finished().await?;
/// ```
pub struct BridgeHost {
    session: HostSession,
    port: FramePort,
    sink: Arc<dyn HostEventSink>,
    status: Arc<RwLock<HostStatus>>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl BridgeHost {
    /// Sends INIT and spawns the actor loop.
    ///
    /// Dropping the returned handle counts as teardown.
    pub async fn spawn(
        options: HostOptions,
        settings: &BridgeSettings,
        port: FramePort,
        sink: Arc<dyn HostEventSink>,
    ) -> BridgeResult<BridgeHostHandle> {
        let mut session = HostSession::new(options.offer_ids);
        let init = session.initialize(&options.api_base, options.iblock_ids, settings)?;

        port.send(HostMessage::Init(init).to_json()?).await?;

        info!(
            offers = session.offer_ids().len(),
            api_base = %options.api_base,
            "Bridge session initialized"
        );

        let status = Arc::new(RwLock::new(HostStatus {
            state: session.state(),
            offer_ids: session.offer_ids().to_vec(),
            dropped_frames: 0,
        }));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let host = BridgeHost {
            session,
            port,
            sink,
            status: status.clone(),
            shutdown_rx,
        };
        let join = tokio::spawn(host.run());

        Ok(BridgeHostHandle {
            status,
            shutdown_tx,
            join,
        })
    }

    /// Main actor loop.
    async fn run(mut self) -> SessionState {
        loop {
            tokio::select! {
                frame = self.port.recv() => match frame {
                    Some(frame) => {
                        if self.on_frame(&frame).await {
                            break;
                        }
                    }
                    None => {
                        info!("Embedded view disconnected");
                        break;
                    }
                },
                _ = self.shutdown_rx.recv() => {
                    info!("Host teardown requested");
                    break;
                }
            }
        }

        let final_state = self.session.teardown();
        if final_state == SessionState::Abandoned {
            warn!(offers = ?self.session.offer_ids(), "Bridge session abandoned before a result");
        } else {
            info!("Bridge session closed");
        }

        self.status.write().await.state = final_state;
        self.sink.on_session_end(final_state);
        final_state
    }

    /// Handles one frame. Returns true once the session is closed.
    async fn on_frame(&mut self, frame: &str) -> bool {
        let event = match self.session.handle_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping bridge frame");
                self.status.write().await.dropped_frames += 1;
                return false;
            }
        };

        match event {
            HostEvent::Completed(result) => {
                info!(offers = ?result.offer_ids, total = %result.total, "Calculation result received");
                self.sink.on_result(&result);
            }
            HostEvent::ConfigSaved(config) => {
                info!(offers = ?config.offer_ids, preset_id = %config.preset_id, "Calculator config saved");
                self.sink.on_config_saved(&config);
            }
            HostEvent::Closed => {
                debug!("Embedded view closed the session");
            }
            HostEvent::Error(error) => {
                warn!(
                    kind = %error.kind,
                    stage_id = ?error.stage_id,
                    message = %error.message,
                    "Calculator reported an error"
                );
                self.sink.on_error(&error);
            }
            HostEvent::OffersChanged(offer_ids) => {
                self.status.write().await.offer_ids = offer_ids.clone();
                self.sink.on_offers_changed(&offer_ids);
                let update = HostMessage::OffersUpdated(OffersUpdatedPayload { offer_ids });
                match update.to_json() {
                    Ok(json) => {
                        if let Err(e) = self.port.send(json).await {
                            warn!(error = %e, "Failed to send OFFERS_UPDATED");
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to encode OFFERS_UPDATED"),
                }
            }
            HostEvent::OpenOffer(offer_id) => {
                debug!(offer_id, "Opening offer");
                self.sink.on_open_offer(offer_id);
            }
        }

        let state = self.session.state();
        self.status.write().await.state = state;
        state.is_terminal()
    }
}

// =============================================================================
// Tests
// =============================================================================
