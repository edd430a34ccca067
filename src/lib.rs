//! Marking Scanner Library
//!
//! Camera barcode scanning for warehouse order marking. An operator
//! enters an order, scans package codes until the planned quantity is
//! reached and sends the result.
//!
//! # Architecture
//!
//! ```text
//! capture → detect (native | library) → scanner (gate, debounce) → session
//!                                                                    ↓
//!                                                     feedback, metrics
//! ```
//!
//! - [`capture`] opens the camera and yields luma frames.
//! - [`detect`] decodes frames, either with a platform detector polled
//!   per frame or with a self-paced scanning library.
//! - [`scanner`] owns the camera lifecycle, picks the strategy and
//!   filters decoded values through the disable gate and the debounce
//!   window.
//! - [`session`] records accepted scans against an order and drives the
//!   setup, scanning and confirmation screens.
//!
//! # Example
//!
//! ```no_run
//! use marking_scanner::{
//!     capture::MockCamera,
//!     detect::{FrameScanLibrary, ScriptedCodes},
//!     feedback::FeedbackEmitter,
//!     scanner::Scanner,
//!     session::{OrderContext, ScanDriver, SessionConfig, Workflow},
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let codes = ScriptedCodes::new();
//! let library = FrameScanLibrary::new(Arc::new(codes.clone()));
//! let mut driver = ScanDriver::new(Scanner::builder(MockCamera::new(), Box::new(library)));
//!
//! let mut flow = Workflow::new(SessionConfig::default(), Arc::new(FeedbackEmitter::default()));
//! let session = flow.begin(OrderContext::new("Romashka LLC", "2024-001234", Some(1)))?;
//! driver.start(session).await?;
//!
//! codes.push_code("0104606203099125");
//! driver.next_scan(session).await;
//! flow.send(tokio::time::Instant::now())?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod detect;
pub mod feedback;
pub mod host;
pub mod metrics;
pub mod scanner;
pub mod session;

// Re-export commonly used types at crate root
pub use capture::{Camera, CaptureConfig, Frame, MockCamera};
pub use config::FileConfig;
pub use detect::{Platform, SelectionPolicy, Strategy, Symbology};
pub use feedback::FeedbackEmitter;
pub use scanner::{ScanEvent, Scanner, ScannerConfig, ScannerError, ScannerState};
pub use session::{OrderContext, OrderForm, ScanDriver, ScanSession, Workflow};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
