//! Filtering between the detection loops and the scanner's owner.

use super::clock::Clock;
use super::debounce::DebounceFilter;
use super::ScanEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// What happened to a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forwarded to the owner.
    Accepted,
    /// Same as the previous accepted value, inside the debounce window.
    Duplicate,
    /// The owner has disabled scanning.
    Disabled,
    /// Nothing was decoded.
    Empty,
}

/// Counters shared by every scanner built with the same handle.
#[derive(Debug, Default)]
pub struct ScanStats {
    detections: AtomicU64,
    accepted: AtomicU64,
    duplicates: AtomicU64,
    gated: AtomicU64,
    camera_starts: AtomicU64,
    camera_failures: AtomicU64,
}

/// Point-in-time copy of [`ScanStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStatsSnapshot {
    /// Values reported by a detection strategy.
    pub detections: u64,
    /// Values forwarded to the owner.
    pub accepted: u64,
    /// Values dropped by the debounce filter.
    pub duplicates: u64,
    /// Values dropped because scanning was disabled.
    pub gated: u64,
    /// Successful camera starts.
    pub camera_starts: u64,
    /// Failed camera or scanner starts.
    pub camera_failures: u64,
}

impl ScanStats {
    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            detections: self.detections.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            gated: self.gated.load(Ordering::Relaxed),
            camera_starts: self.camera_starts.load(Ordering::Relaxed),
            camera_failures: self.camera_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_start(&self) {
        self.camera_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.camera_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Applies the disable gate and the debounce filter, then forwards.
///
/// The gate is read on every call so a change made by the owner while a
/// loop is running takes effect on the very next detection.
pub(crate) struct DetectionSink {
    debounce: Mutex<DebounceFilter>,
    gate: watch::Receiver<bool>,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<ScanEvent>,
    stats: Arc<ScanStats>,
}

impl DetectionSink {
    pub(crate) fn new(
        debounce: DebounceFilter,
        gate: watch::Receiver<bool>,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedSender<ScanEvent>,
        stats: Arc<ScanStats>,
    ) -> Self {
        Self {
            debounce: Mutex::new(debounce),
            gate,
            clock,
            events,
            stats,
        }
    }

    pub(crate) fn submit(&self, code: &str) -> Verdict {
        if code.is_empty() {
            return Verdict::Empty;
        }
        self.stats.detections.fetch_add(1, Ordering::Relaxed);

        if *self.gate.borrow() {
            self.stats.gated.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(code, "Scan ignored, scanner disabled");
            return Verdict::Disabled;
        }

        let now = self.clock.now_millis();
        let admitted = self
            .debounce
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .admit(code, now);
        if !admitted {
            self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(code, "Duplicate scan suppressed");
            return Verdict::Duplicate;
        }

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(code, "Scan accepted");
        let event = ScanEvent {
            code: code.to_string(),
            timestamp_millis: now,
        };
        if self.events.send(event).is_err() {
            tracing::debug!("Scan receiver dropped, event discarded");
        }
        Verdict::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::clock::ManualClock;
    use std::time::Duration;

    fn sink(
        gate: watch::Receiver<bool>,
        clock: &ManualClock,
    ) -> (DetectionSink, mpsc::UnboundedReceiver<ScanEvent>, Arc<ScanStats>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(ScanStats::default());
        let sink = DetectionSink::new(
            DebounceFilter::default(),
            gate,
            Arc::new(clock.clone()),
            tx,
            Arc::clone(&stats),
        );
        (sink, rx, stats)
    }

    #[test]
    fn test_accepted_value_forwarded_with_timestamp() {
        let clock = ManualClock::new(42_000);
        let (_gate_tx, gate_rx) = watch::channel(false);
        let (sink, mut rx, stats) = sink(gate_rx, &clock);

        assert_eq!(sink.submit("111"), Verdict::Accepted);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.code, "111");
        assert_eq!(event.timestamp_millis, 42_000);
        assert_eq!(stats.snapshot().accepted, 1);
    }

    #[test]
    fn test_duplicates_suppressed_until_window_passes() {
        let clock = ManualClock::new(0);
        let (_gate_tx, gate_rx) = watch::channel(false);
        let (sink, mut rx, stats) = sink(gate_rx, &clock);

        assert_eq!(sink.submit("ABC123"), Verdict::Accepted);
        clock.advance(Duration::from_millis(1_499));
        assert_eq!(sink.submit("ABC123"), Verdict::Duplicate);
        clock.advance(Duration::from_millis(1));
        assert_eq!(sink.submit("ABC123"), Verdict::Accepted);

        assert_eq!(stats.snapshot().duplicates, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_gate_read_live_and_leaves_debounce_untouched() {
        let clock = ManualClock::new(0);
        let (gate_tx, gate_rx) = watch::channel(false);
        let (sink, mut rx, stats) = sink(gate_rx, &clock);

        assert_eq!(sink.submit("111"), Verdict::Accepted);

        gate_tx.send_replace(true);
        assert_eq!(sink.submit("222"), Verdict::Disabled);

        // "222" never reached the filter, so "111" is still the reference
        gate_tx.send_replace(false);
        assert_eq!(sink.submit("111"), Verdict::Duplicate);
        assert_eq!(sink.submit("222"), Verdict::Accepted);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.gated, 1);
        assert_eq!(snapshot.detections, 4);
        assert_eq!(rx.try_recv().unwrap().code, "111");
        assert_eq!(rx.try_recv().unwrap().code, "222");
    }

    #[test]
    fn test_empty_value_ignored() {
        let clock = ManualClock::new(0);
        let (_gate_tx, gate_rx) = watch::channel(false);
        let (sink, _rx, stats) = sink(gate_rx, &clock);

        assert_eq!(sink.submit(""), Verdict::Empty);
        assert_eq!(stats.snapshot(), ScanStatsSnapshot::default());
    }
}
