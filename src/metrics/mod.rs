//! Prometheus metrics exporter for scanner monitoring.
//!
//! # Metrics Exposed
//!
//! ## Scanner
//! - `marking_scanner_active` - Whether the camera is running (1=active, 0=idle)
//! - `marking_scanner_detections_total` - Values reported by a detection strategy
//! - `marking_scanner_accepted_total` - Values delivered to the session
//! - `marking_scanner_duplicates_total` - Values suppressed by the debounce filter
//! - `marking_scanner_gated_total` - Values dropped while scanning was disabled
//! - `marking_scanner_camera_starts_total` - Successful camera starts
//! - `marking_scanner_camera_failures_total` - Failed camera or scanner starts
//!
//! ## Session
//! - `marking_scanner_session_records` - Scans recorded in the open session
//! - `marking_scanner_session_planned_quantity` - Planned quantity (0=no plan)
//! - `marking_scanner_session_progress_percent` - Progress toward the plan
//! - `marking_scanner_session_limit_reached` - Plan reached (1) or not (0)
//! - `marking_scanner_packages_sent_total` - Packages sent across all orders
//!
//! # Example
//!
//! ```no_run
//! use marking_scanner::metrics::{MetricsRegistry, MetricsSnapshot};
//! use marking_scanner::scanner::ScanStatsSnapshot;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let snapshot = MetricsSnapshot::from_components(&ScanStatsSnapshot::default(), false, None, 0);
//! registry.update(&snapshot);
//! ```
//!
//! The HTTP endpoint is behind the `metrics` feature.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
