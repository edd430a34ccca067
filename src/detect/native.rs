//! Platform barcode detector and its per-frame polling loop.

use super::{DecodeCallback, Symbology};
use crate::capture::{Camera, CameraError};
use crate::scanner::{with_camera, SharedCamera};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// A barcode found in a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedBarcode {
    /// Decoded payload.
    pub raw_value: String,
    /// Symbology it was encoded with.
    pub format: Symbology,
}

/// Errors reported by a detector for a single frame.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("detection failed: {0}")]
    Failed(String),
    #[error("symbology {0} is not supported")]
    Unsupported(Symbology),
}

/// A barcode detector provided by the platform.
pub trait NativeDetector: Send + Sync {
    /// Looks for barcodes of the given `formats` in `frame`.
    fn detect(
        &self,
        frame: &crate::capture::Frame,
        formats: &[Symbology],
    ) -> Result<Vec<DetectedBarcode>, DetectError>;
}

/// Polls `detector` once per frame until `shutdown` flips to true.
///
/// A tick is only scheduled after the previous detection returned, so
/// callbacks never overlap. Capture and detection run on the blocking
/// pool. Frames without data and detection errors are skipped.
pub(crate) async fn run_native_loop<C: Camera + 'static>(
    camera: SharedCamera<C>,
    detector: Arc<dyn NativeDetector>,
    formats: Vec<Symbology>,
    frame_interval: Duration,
    on_detect: DecodeCallback,
    mut shutdown: watch::Receiver<bool>,
) {
    let formats: Arc<[Symbology]> = formats.into();
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let detector = Arc::clone(&detector);
                let formats = Arc::clone(&formats);
                let found = with_camera(&camera, move |camera| {
                    detect_once(camera, detector.as_ref(), &formats)
                })
                .await;

                match found {
                    Ok(Some(code)) => on_detect(&code),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "Detection task failed"),
                }
            }
        }
    }

    tracing::debug!("Native detection loop stopped");
}

/// Captures one frame and returns the first barcode in it.
fn detect_once<C: Camera>(
    camera: &mut C,
    detector: &dyn NativeDetector,
    formats: &[Symbology],
) -> Option<String> {
    let frame = match camera.capture() {
        Ok(frame) => frame,
        Err(CameraError::NotReady) => return None,
        Err(e) => {
            tracing::trace!(error = %e, "Frame capture failed");
            return None;
        }
    };

    match detector.detect(&frame, formats) {
        Ok(barcodes) => barcodes.into_iter().next().map(|first| first.raw_value),
        Err(e) => {
            tracing::trace!(error = %e, sequence = frame.sequence(), "Detection failed");
            None
        }
    }
}
