//! Outbound seam to the debug target.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::SessionError;
use crate::protocol::OutboundMessage;

/// Channel to a connected debug target.
///
/// Framing and sockets live behind this trait. `disconnect` must not call back
/// into the session synchronously; the owner reports the disconnect through
/// [`DebugSession::on_disconnected`](crate::DebugSession::on_disconnected).
pub trait Transport: Send + Sync {
    fn send(&self, message: OutboundMessage) -> Result<(), SessionError>;
    fn disconnect(&self);
}

/// In-memory transport that records every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    disconnects: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail with [`SessionError::Transport`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    /// Drain recorded messages.
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn send(&self, message: OutboundMessage) -> Result<(), SessionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("connection closed".into()));
        }
        self.sent.lock().push(message);
        Ok(())
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}
