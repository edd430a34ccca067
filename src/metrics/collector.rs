//! Metrics collection and registry.

use crate::scanner::ScanStatsSnapshot;
use crate::session::ScanSession;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of scanner and session state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Whether the camera is currently running.
    pub scanner_active: bool,
    /// Values reported by a detection strategy.
    pub detections: u64,
    /// Values that passed the gate and the debounce filter.
    pub accepted: u64,
    /// Values dropped as duplicates.
    pub duplicates: u64,
    /// Values dropped while scanning was disabled.
    pub gated: u64,
    /// Successful camera starts.
    pub camera_starts: u64,
    /// Failed camera or scanner starts.
    pub camera_failures: u64,
    /// Records in the open session.
    pub session_records: u64,
    /// Planned quantity of the open session, 0 without a plan.
    pub planned_quantity: u64,
    /// Progress toward the plan in percent.
    pub progress_percent: f64,
    /// Whether the open session reached its plan.
    pub limit_reached: bool,
    /// Packages sent since startup.
    pub packages_sent: u64,
}

/// Prometheus metrics registry for the scanner.
pub struct MetricsRegistry {
    registry: Registry,

    // Scanner
    scanner_active: IntGauge,
    detections_total: IntCounter,
    accepted_total: IntCounter,
    duplicates_total: IntCounter,
    gated_total: IntCounter,
    camera_starts_total: IntCounter,
    camera_failures_total: IntCounter,

    // Session
    session_records: IntGauge,
    planned_quantity: IntGauge,
    progress_percent: Gauge,
    limit_reached: IntGauge,
    packages_sent_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new registry with all scanner metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let scanner_active = IntGauge::new(
            "marking_scanner_active",
            "Whether the camera is running (1=active, 0=idle)",
        )?;
        let detections_total = IntCounter::new(
            "marking_scanner_detections_total",
            "Decoded values reported by a detection strategy",
        )?;
        let accepted_total = IntCounter::new(
            "marking_scanner_accepted_total",
            "Decoded values delivered to the session",
        )?;
        let duplicates_total = IntCounter::new(
            "marking_scanner_duplicates_total",
            "Decoded values suppressed by the debounce filter",
        )?;
        let gated_total = IntCounter::new(
            "marking_scanner_gated_total",
            "Decoded values dropped while scanning was disabled",
        )?;
        let camera_starts_total = IntCounter::new(
            "marking_scanner_camera_starts_total",
            "Successful camera starts",
        )?;
        let camera_failures_total = IntCounter::new(
            "marking_scanner_camera_failures_total",
            "Failed camera or scanner starts",
        )?;

        let session_records = IntGauge::new(
            "marking_scanner_session_records",
            "Scans recorded in the open session",
        )?;
        let planned_quantity = IntGauge::new(
            "marking_scanner_session_planned_quantity",
            "Planned quantity of the open session (0=no plan)",
        )?;
        let progress_percent = Gauge::new(
            "marking_scanner_session_progress_percent",
            "Progress toward the planned quantity",
        )?;
        let limit_reached = IntGauge::new(
            "marking_scanner_session_limit_reached",
            "Whether the open session reached its planned quantity",
        )?;
        let packages_sent_total = IntCounter::new(
            "marking_scanner_packages_sent_total",
            "Packages sent across all orders",
        )?;

        registry.register(Box::new(scanner_active.clone()))?;
        registry.register(Box::new(detections_total.clone()))?;
        registry.register(Box::new(accepted_total.clone()))?;
        registry.register(Box::new(duplicates_total.clone()))?;
        registry.register(Box::new(gated_total.clone()))?;
        registry.register(Box::new(camera_starts_total.clone()))?;
        registry.register(Box::new(camera_failures_total.clone()))?;
        registry.register(Box::new(session_records.clone()))?;
        registry.register(Box::new(planned_quantity.clone()))?;
        registry.register(Box::new(progress_percent.clone()))?;
        registry.register(Box::new(limit_reached.clone()))?;
        registry.register(Box::new(packages_sent_total.clone()))?;

        Ok(Self {
            registry,
            scanner_active,
            detections_total,
            accepted_total,
            duplicates_total,
            gated_total,
            camera_starts_total,
            camera_failures_total,
            session_records,
            planned_quantity,
            progress_percent,
            limit_reached,
            packages_sent_total,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.scanner_active.set(i64::from(snapshot.scanner_active));

        // Counters only move forward by the difference
        catch_up(&self.detections_total, snapshot.detections);
        catch_up(&self.accepted_total, snapshot.accepted);
        catch_up(&self.duplicates_total, snapshot.duplicates);
        catch_up(&self.gated_total, snapshot.gated);
        catch_up(&self.camera_starts_total, snapshot.camera_starts);
        catch_up(&self.camera_failures_total, snapshot.camera_failures);
        catch_up(&self.packages_sent_total, snapshot.packages_sent);

        self.session_records.set(snapshot.session_records as i64);
        self.planned_quantity.set(snapshot.planned_quantity as i64);
        self.progress_percent.set(snapshot.progress_percent);
        self.limit_reached.set(i64::from(snapshot.limit_reached));
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn catch_up(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from scanner counters and the open session.
    pub fn from_components(
        stats: &ScanStatsSnapshot,
        scanner_active: bool,
        session: Option<&ScanSession>,
        packages_sent: u64,
    ) -> Self {
        let mut snapshot = Self {
            scanner_active,
            detections: stats.detections,
            accepted: stats.accepted,
            duplicates: stats.duplicates,
            gated: stats.gated,
            camera_starts: stats.camera_starts,
            camera_failures: stats.camera_failures,
            packages_sent,
            ..Self::default()
        };
        if let Some(session) = session {
            snapshot.session_records = session.count() as u64;
            snapshot.planned_quantity = session
                .order()
                .planned_quantity()
                .map_or(0, u64::from);
            snapshot.progress_percent = f64::from(session.progress_percent());
            snapshot.limit_reached = session.limit_reached();
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackEmitter;
    use crate::session::OrderContext;
    use std::sync::Arc;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            scanner_active: true,
            detections: 12,
            accepted: 4,
            duplicates: 8,
            camera_starts: 1,
            session_records: 4,
            planned_quantity: 5,
            progress_percent: 80.0,
            ..Default::default()
        };
        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("marking_scanner_active 1"));
        assert!(output.contains("marking_scanner_duplicates_total 8"));
        assert!(output.contains("marking_scanner_session_progress_percent 80"));

        // Counters never move backwards
        registry.update(&MetricsSnapshot::default());
        let output = registry.encode().unwrap();
        assert!(output.contains("marking_scanner_detections_total 12"));
        assert!(output.contains("marking_scanner_active 0"));
    }

    #[test]
    fn test_snapshot_from_session() {
        let mut session = crate::session::ScanSession::new(
            OrderContext::new("A", "2024-001234", Some(2)),
            Arc::new(FeedbackEmitter::silent()),
        );
        session.on_scan("111");
        session.on_scan("222");

        let stats = ScanStatsSnapshot {
            detections: 3,
            accepted: 2,
            duplicates: 1,
            ..Default::default()
        };
        let snapshot = MetricsSnapshot::from_components(&stats, false, Some(&session), 7);

        assert_eq!(snapshot.session_records, 2);
        assert_eq!(snapshot.planned_quantity, 2);
        assert_eq!(snapshot.progress_percent, 100.0);
        assert!(snapshot.limit_reached);
        assert_eq!(snapshot.packages_sent, 7);
        assert_eq!(snapshot.duplicates, 1);
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("marking_scanner_accepted_total"));
        assert!(output.contains("marking_scanner_session_limit_reached"));
        assert!(output.contains("marking_scanner_packages_sent_total"));
    }
}
