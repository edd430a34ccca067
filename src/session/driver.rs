//! Couples a [`Scanner`] to a [`ScanSession`].

use super::{ScanRecord, ScanSession};
use crate::capture::Camera;
use crate::scanner::{ScanEvent, Scanner, ScannerBuilder, ScannerError, ScannerState};
use tokio::sync::{mpsc, watch};

/// What an incoming scan did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanApplied {
    Recorded(ScanRecord),
    /// Arrived after the planned quantity was reached.
    Rejected(String),
}

/// Owns the scanner, its events and its disable gate.
///
/// After every change to the session the gate is republished from
/// [`ScanSession::limit_reached`], so the scanner stops once the plan is
/// met and can be started again after a deletion.
pub struct ScanDriver<C: Camera + 'static> {
    scanner: Scanner<C>,
    events: mpsc::UnboundedReceiver<ScanEvent>,
    gate: watch::Sender<bool>,
}

impl<C: Camera + 'static> ScanDriver<C> {
    /// Builds the scanner with a gate owned by this driver.
    pub fn new(builder: ScannerBuilder<C>) -> Self {
        let (gate, gate_rx) = watch::channel(false);
        let (scanner, events) = builder.gate(gate_rx).build();
        Self {
            scanner,
            events,
            gate,
        }
    }

    pub fn scanner(&self) -> &Scanner<C> {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut Scanner<C> {
        &mut self.scanner
    }

    /// Syncs the gate with `session` and starts the scanner if allowed.
    pub async fn start(&mut self, session: &ScanSession) -> Result<ScannerState, ScannerError> {
        self.sync(session);
        self.scanner.start().await
    }

    /// Republishes the session's limit on the gate.
    pub fn sync(&self, session: &ScanSession) {
        let limit = session.limit_reached();
        let previous = self.gate.send_replace(limit);
        if previous != limit {
            tracing::debug!(disabled = limit, "Scanner gate changed");
        }
    }

    /// Waits for the next accepted scan and applies it to `session`.
    pub async fn next_scan(&mut self, session: &mut ScanSession) -> Option<ScanApplied> {
        let event = self.events.recv().await?;
        let applied = match session.on_scan(&event.code) {
            Some(record) => ScanApplied::Recorded(record.clone()),
            None => ScanApplied::Rejected(event.code),
        };
        self.sync(session);
        Some(applied)
    }

    /// Stops the scanner and releases the camera.
    pub async fn shutdown(&mut self) {
        self.scanner.stop().await;
    }
}
