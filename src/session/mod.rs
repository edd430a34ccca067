//! Order sessions: accepted scans, the planned quantity and sending.
//!
//! A [`ScanSession`] holds the scans accepted for one order. It stops
//! taking scans once the planned quantity is reached and only allows
//! sending when the count matches the plan (or, without a plan, when at
//! least one package was scanned).

mod driver;
mod order;
mod workflow;

pub use driver::{ScanApplied, ScanDriver};
pub use order::{CounterpartyDirectory, CounterpartyMode, OrderContext, OrderForm, SetupError};
pub use workflow::{FlowError, Screen, SendReceipt, Workflow};

use crate::feedback::FeedbackEmitter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Session and setup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long the sent confirmation stays up, in milliseconds.
    pub confirmation_ms: u64,
    /// Counterparty entry mode.
    pub counterparty_mode: CounterpartyMode,
    /// Known counterparties.
    pub counterparties: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confirmation_ms: 2_000,
            counterparty_mode: CounterpartyMode::FreeText,
            counterparties: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn confirmation(&self) -> Duration {
        Duration::from_millis(self.confirmation_ms)
    }

    pub fn directory(&self) -> CounterpartyDirectory {
        CounterpartyDirectory::new(self.counterparties.iter().cloned())
    }
}

/// One accepted scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    id: Uuid,
    code: String,
    display_time: String,
}

impl ScanRecord {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Local acceptance time as `HH:MM:SS`.
    pub fn display_time(&self) -> &str {
        &self.display_time
    }
}

/// Why a session cannot be sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("nothing has been scanned")]
    NothingToSend,
    #[error("scanned {scanned} of {planned} planned packages")]
    QuantityMismatch { scanned: usize, planned: u32 },
}

/// Scans accepted for one order.
#[derive(Debug)]
pub struct ScanSession {
    order: OrderContext,
    /// Insertion order, oldest first.
    records: Vec<ScanRecord>,
    feedback: Arc<FeedbackEmitter>,
}

impl ScanSession {
    pub fn new(order: OrderContext, feedback: Arc<FeedbackEmitter>) -> Self {
        Self {
            order,
            records: Vec::new(),
            feedback,
        }
    }

    pub fn order(&self) -> &OrderContext {
        &self.order
    }

    /// Number of accepted scans.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Whether the planned quantity has been reached.
    pub fn limit_reached(&self) -> bool {
        self.order
            .planned_quantity()
            .is_some_and(|planned| self.count() >= planned as usize)
    }

    /// Whether the send action is enabled.
    pub fn can_send(&self) -> bool {
        match self.order.planned_quantity() {
            None => self.count() > 0,
            Some(planned) => self.count() == planned as usize,
        }
    }

    /// Share of the plan scanned so far, capped at 100. Zero without a plan.
    pub fn progress_percent(&self) -> f32 {
        match self.order.planned_quantity() {
            Some(planned) if planned > 0 => {
                (self.count() as f32 / planned as f32 * 100.0).min(100.0)
            }
            _ => 0.0,
        }
    }

    /// Records an accepted scan and emits feedback for it.
    ///
    /// Returns `None` without side effects once the limit is reached.
    pub fn on_scan(&mut self, code: &str) -> Option<&ScanRecord> {
        if self.limit_reached() {
            tracing::debug!(code, "Planned quantity reached, scan dropped");
            return None;
        }

        let record = ScanRecord {
            id: Uuid::new_v4(),
            code: code.to_string(),
            display_time: chrono::Local::now().format("%H:%M:%S").to_string(),
        };
        self.feedback.emit();
        tracing::info!(
            code,
            count = self.count() + 1,
            planned = ?self.order.planned_quantity(),
            "Package scanned"
        );
        self.records.push(record);
        self.records.last()
    }

    /// Removes a record. Returns false for an unknown id.
    pub fn delete(&mut self, id: Uuid) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        let removed = self.records.len() != before;
        if removed {
            tracing::debug!(%id, "Scan deleted");
        }
        removed
    }

    /// Records newest first, each with its display number (the oldest
    /// record is number 1).
    pub fn records_newest_first(&self) -> impl Iterator<Item = (usize, &ScanRecord)> + '_ {
        self.records
            .iter()
            .enumerate()
            .rev()
            .map(|(index, record)| (index + 1, record))
    }

    /// Checks the send precondition and collects the scanned codes.
    pub fn prepare_send(&self) -> Result<SendReceipt, SendError> {
        if !self.can_send() {
            return Err(match self.order.planned_quantity() {
                None => SendError::NothingToSend,
                Some(planned) => SendError::QuantityMismatch {
                    scanned: self.count(),
                    planned,
                },
            });
        }
        Ok(SendReceipt::new(
            self.order.clone(),
            self.records.iter().map(|r| r.code.clone()).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn session(planned: Option<u32>) -> ScanSession {
        ScanSession::new(
            OrderContext::new("A", "2024-001234", planned),
            Arc::new(FeedbackEmitter::silent()),
        )
    }

    fn fill(session: &mut ScanSession, n: usize) {
        for i in 0..n {
            session.on_scan(&format!("code-{i}"));
        }
    }

    #[test]
    fn test_can_send_without_plan() {
        let mut session = session(None);
        assert!(!session.can_send());
        fill(&mut session, 1);
        assert!(session.can_send());
        fill(&mut session, 10);
        assert!(session.can_send());
        assert!(!session.limit_reached());
        assert_eq!(session.progress_percent(), 0.0);
    }

    #[test]
    fn test_can_send_only_at_exact_plan() {
        let mut session = session(Some(5));
        fill(&mut session, 4);
        assert!(!session.can_send());
        assert!(!session.limit_reached());
        assert_eq!(
            session.prepare_send(),
            Err(SendError::QuantityMismatch {
                scanned: 4,
                planned: 5
            })
        );

        fill(&mut session, 1);
        assert!(session.can_send());
        assert!(session.limit_reached());
        assert_eq!(session.progress_percent(), 100.0);
    }

    #[test]
    fn test_limit_blocks_further_scans() {
        let mut session = session(Some(2));
        assert!(session.on_scan("111").is_some());
        assert!(session.on_scan("222").is_some());
        assert!(session.on_scan("333").is_none());
        assert_eq!(session.count(), 2);
    }

    #[test]
    fn test_newest_first_with_numbers() {
        let mut session = session(None);
        fill(&mut session, 3);

        let listed: Vec<(usize, String)> = session
            .records_newest_first()
            .map(|(n, r)| (n, r.code().to_string()))
            .collect();
        assert_eq!(
            listed,
            [
                (3, "code-2".to_string()),
                (2, "code-1".to_string()),
                (1, "code-0".to_string())
            ]
        );
    }

    #[test]
    fn test_delete_by_id() {
        let mut session = session(Some(2));
        let first = session.on_scan("111").unwrap().id();
        session.on_scan("222");
        assert!(session.limit_reached());

        assert!(session.delete(first));
        assert!(!session.delete(first));
        assert_eq!(session.count(), 1);
        assert!(!session.limit_reached());
        assert_eq!(session.records_newest_first().next().unwrap().0, 1);
    }

    #[test]
    fn test_record_fields() {
        let mut session = session(None);
        let record = session.on_scan("0104606203099125").unwrap().clone();
        assert_eq!(record.code(), "0104606203099125");
        assert_eq!(record.display_time().len(), 8);
        assert_eq!(record.display_time().matches(':').count(), 2);
    }

    #[test]
    fn test_send_requires_scans() {
        let session = session(None);
        assert_eq!(session.prepare_send(), Err(SendError::NothingToSend));
    }

    proptest! {
        #[test]
        fn prop_count_never_exceeds_plan(planned in 1u32..20, attempts in 0usize..40) {
            let mut session = session(Some(planned));
            fill(&mut session, attempts);
            prop_assert_eq!(session.count(), attempts.min(planned as usize));
            prop_assert_eq!(session.can_send(), attempts >= planned as usize);
        }

        #[test]
        fn prop_ids_unique(n in 0usize..50) {
            let mut session = session(None);
            fill(&mut session, n);
            let mut ids: Vec<Uuid> = session.records_newest_first().map(|(_, r)| r.id()).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), n);
        }
    }
}
