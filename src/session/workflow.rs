//! Screen flow: setup, scanning, sent confirmation, back to setup.

use super::{OrderContext, ScanSession, SendError, SessionConfig};
use crate::feedback::FeedbackEmitter;
use chrono::{DateTime, Local};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

/// What was sent for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    order: OrderContext,
    codes: Vec<String>,
    sent_at: DateTime<Local>,
}

impl SendReceipt {
    pub(crate) fn new(order: OrderContext, codes: Vec<String>) -> Self {
        Self {
            order,
            codes,
            sent_at: Local::now(),
        }
    }

    pub fn order(&self) -> &OrderContext {
        &self.order
    }

    /// Codes in scan order, oldest first.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn sent_at(&self) -> DateTime<Local> {
        self.sent_at
    }

    /// Confirmation line shown to the operator.
    pub fn summary(&self) -> String {
        format!(
            "Sent {} package(s) for order {} to {}",
            self.codes.len(),
            self.order.order_number(),
            self.order.counterparty()
        )
    }
}

/// Invalid screen transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("a scanning session is already open")]
    NotInSetup,
    #[error("no scanning session is open")]
    NotScanning,
    #[error(transparent)]
    Send(#[from] SendError),
}

/// The screen currently shown.
#[derive(Debug)]
pub enum Screen {
    Setup,
    Scanning(ScanSession),
    /// Sent confirmation, shown until `until`.
    Confirmation { receipt: SendReceipt, until: Instant },
}

/// Drives the operator through one order at a time.
#[derive(Debug)]
pub struct Workflow {
    screen: Screen,
    config: SessionConfig,
    feedback: Arc<FeedbackEmitter>,
    sends: u64,
    packages_sent: u64,
}

impl Workflow {
    pub fn new(config: SessionConfig, feedback: Arc<FeedbackEmitter>) -> Self {
        Self {
            screen: Screen::Setup,
            config,
            feedback,
            sends: 0,
            packages_sent: 0,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_setup(&self) -> bool {
        matches!(self.screen, Screen::Setup)
    }

    /// Confirmed sends since the workflow was created.
    pub fn sends(&self) -> u64 {
        self.sends
    }

    /// Packages across all confirmed sends.
    pub fn packages_sent(&self) -> u64 {
        self.packages_sent
    }

    pub fn session(&self) -> Option<&ScanSession> {
        match &self.screen {
            Screen::Scanning(session) => Some(session),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut ScanSession> {
        match &mut self.screen {
            Screen::Scanning(session) => Some(session),
            _ => None,
        }
    }

    /// Opens a scanning session for `order`.
    pub fn begin(&mut self, order: OrderContext) -> Result<&mut ScanSession, FlowError> {
        if !self.is_setup() {
            return Err(FlowError::NotInSetup);
        }
        tracing::info!(
            counterparty = order.counterparty(),
            order = order.order_number(),
            planned = ?order.planned_quantity(),
            "Scanning session opened"
        );
        self.screen = Screen::Scanning(ScanSession::new(order, Arc::clone(&self.feedback)));
        self.session_mut().ok_or(FlowError::NotScanning)
    }

    /// Abandons the current session without sending.
    pub fn back(&mut self) {
        if let Screen::Scanning(session) = &self.screen {
            tracing::info!(
                order = session.order().order_number(),
                discarded = session.count(),
                "Scanning session abandoned"
            );
        }
        self.screen = Screen::Setup;
    }

    /// Sends the current session and shows the confirmation.
    pub fn send(&mut self, now: Instant) -> Result<&SendReceipt, FlowError> {
        let receipt = match &self.screen {
            Screen::Scanning(session) => session.prepare_send()?,
            _ => return Err(FlowError::NotScanning),
        };
        self.sends += 1;
        self.packages_sent += receipt.codes().len() as u64;
        tracing::info!(
            order = receipt.order().order_number(),
            packages = receipt.codes().len(),
            "Order sent"
        );
        self.screen = Screen::Confirmation {
            receipt,
            until: now + self.config.confirmation(),
        };
        match &self.screen {
            Screen::Confirmation { receipt, .. } => Ok(receipt),
            _ => Err(FlowError::NotScanning),
        }
    }

    /// Advances a timed-out confirmation back to setup. Returns whether
    /// the screen changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match &self.screen {
            Screen::Confirmation { until, .. } if now >= *until => {
                self.screen = Screen::Setup;
                tracing::debug!("Confirmation dismissed");
                true
            }
            _ => false,
        }
    }

    /// When the confirmation ends, if one is shown.
    pub fn confirmation_deadline(&self) -> Option<Instant> {
        match &self.screen {
            Screen::Confirmation { until, .. } => Some(*until),
            _ => None,
        }
    }
}
