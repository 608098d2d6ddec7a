//! # Frame Transport
//!
//! In-process channel pair carrying serialized JSON frames between the host
//! and the embedded view.
//!
//! ## Channel Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   host FramePort                          embedded FramePort            │
//! │   ┌──────────────┐   INIT, OFFERS_UPDATED  ┌──────────────┐             │
//! │   │ tx ──────────┼────────────────────────►│ rx           │             │
//! │   │              │                         │              │             │
//! │   │ rx ◄─────────┼─────────────────────────┼─ tx          │             │
//! │   └──────────────┘   CALC_* envelopes      └──────────────┘             │
//! │                                                                         │
//! │  Only `String` frames cross: the two sides share no memory.             │
//! │  Order is preserved per direction (mpsc), not across directions.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

/// One side of a bridge connection.
#[derive(Debug)]
pub struct FramePort {
    tx: mpsc::Sender<String>,
    rx: mpsc::Receiver<String>,
}

/// Creates a connected `(host, embedded)` port pair.
pub fn frame_pair(capacity: usize) -> (FramePort, FramePort) {
    let (host_tx, embedded_rx) = mpsc::channel::<String>(capacity);
    let (embedded_tx, host_rx) = mpsc::channel::<String>(capacity);

    (
        FramePort {
            tx: host_tx,
            rx: host_rx,
        },
        FramePort {
            tx: embedded_tx,
            rx: embedded_rx,
        },
    )
}

impl FramePort {
    /// Sends one frame to the other side.
    pub async fn send(&self, frame: String) -> BridgeResult<()> {
        debug!(bytes = frame.len(), "Sending bridge frame");
        self.tx
            .send(frame)
            .await
            .map_err(|_| BridgeError::ChannelClosed("peer dropped its receiver".into()))
    }

    /// Receives the next frame, `None` once the other side is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Returns a sender for injecting frames from elsewhere (tests, adapters).
    pub fn sender(&self) -> mpsc::Sender<String> {
        self.tx.clone()
    }
}
