//! Continuous-scan library backend.
//!
//! A [`ScanLibrary`] receives a frame source and a decode callback and
//! runs its own capture loop. [`FrameScanLibrary`] is the built-in
//! implementation: it polls the source at the configured scan rate, crops
//! the central scan window and hands the crop to a [`FrameDecoder`].

use super::{DecodeCallback, Symbology};
use crate::capture::{CameraError, ConfigError, Frame, Region};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Pulls the next frame from the scanner's camera. May block on the
/// device, so it is only called from the blocking pool.
pub type FrameSource = Arc<dyn Fn() -> Result<Frame, CameraError> + Send + Sync>;

/// Errors raised by a scanning library.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("scanner is already running")]
    AlreadyScanning,
    #[error("invalid scan configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("decoder supports none of the configured symbologies")]
    NoSupportedSymbology,
    #[error("scan loop terminated abnormally: {0}")]
    Stop(String),
}

/// Central scan window, sized relative to the viewport.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanWindow {
    /// Window width as a share of the viewport width.
    pub width_ratio: f32,
    /// Window height as a share of the viewport height.
    pub height_ratio: f32,
    /// Lower bound for either edge, in pixels.
    pub min_edge: u32,
}

impl Default for ScanWindow {
    fn default() -> Self {
        Self {
            width_ratio: 0.7,
            height_ratio: 0.5,
            min_edge: 50,
        }
    }
}

impl ScanWindow {
    /// Validates the ratios.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for ratio in [self.width_ratio, self.height_ratio] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::InvalidWindowRatio(ratio));
            }
        }
        Ok(())
    }

    /// Window for a viewport region.
    pub fn within(&self, viewport: Region) -> Region {
        let width = ((viewport.width as f32 * self.width_ratio).round() as u32).max(self.min_edge);
        let height = ((viewport.height as f32 * self.height_ratio).round() as u32).max(self.min_edge);
        Region::centered_in(viewport, width, height)
    }
}

/// Continuous-scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryScanConfig {
    /// Target scans per second.
    pub scan_rate: u32,
    /// Scan window geometry.
    pub window: ScanWindow,
    /// Width/height ratio the viewport is cropped to before the window
    /// is placed. `None` keeps the full frame.
    pub aspect_ratio: Option<f32>,
    /// Symbologies the library may report.
    pub formats: Vec<Symbology>,
}

impl Default for LibraryScanConfig {
    fn default() -> Self {
        Self {
            scan_rate: 10,
            window: ScanWindow::default(),
            aspect_ratio: Some(1.0),
            formats: Symbology::library_defaults(),
        }
    }
}

impl LibraryScanConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=15).contains(&self.scan_rate) {
            return Err(ConfigError::InvalidScanRate(self.scan_rate));
        }
        if self.formats.is_empty() {
            return Err(ConfigError::EmptySymbologies("library"));
        }
        self.window.validate()
    }

    /// Region of a `width` x `height` frame that gets decoded.
    pub fn scan_region(&self, width: u32, height: u32) -> Region {
        let frame = Region::full(width, height);
        let viewport = match self.aspect_ratio {
            Some(ratio) if ratio > 0.0 => {
                let by_height = (height as f32 * ratio).round() as u32;
                if by_height <= width {
                    Region::centered_in(frame, by_height, height)
                } else {
                    Region::centered_in(frame, width, (width as f32 / ratio).round() as u32)
                }
            }
            _ => frame,
        };
        self.window.within(viewport)
    }

    /// Delay between two scan attempts.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.scan_rate.max(1)))
    }
}

/// Text decoded from a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Decoded payload.
    pub text: String,
    /// Symbology it was encoded with.
    pub format: Symbology,
}

/// Decodes a single symbol from a frame.
pub trait FrameDecoder: Send + Sync {
    /// Symbologies this decoder can read.
    fn supported(&self) -> &[Symbology];

    /// Decodes the first symbol found in `frame`, if any.
    fn decode(&self, frame: &Frame, formats: &[Symbology]) -> Result<Option<Decoded>, super::DetectError>;
}

/// A scanning library in continuous-scan mode.
#[async_trait]
pub trait ScanLibrary: Send {
    /// Starts scanning frames from `source`, calling `on_decode` for every
    /// decoded value.
    async fn start(
        &mut self,
        source: FrameSource,
        config: &LibraryScanConfig,
        on_decode: DecodeCallback,
    ) -> Result<(), LibraryError>;

    /// Stops scanning. Resolves once the library no longer touches the
    /// frame source.
    async fn stop(&mut self) -> Result<(), LibraryError>;

    /// Whether a scan loop is running.
    fn is_scanning(&self) -> bool;
}

struct ScanTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Built-in [`ScanLibrary`] decoding the scan window of every polled frame.
pub struct FrameScanLibrary {
    decoder: Arc<dyn FrameDecoder>,
    task: Option<ScanTask>,
}

impl FrameScanLibrary {
    pub fn new(decoder: Arc<dyn FrameDecoder>) -> Self {
        Self {
            decoder,
            task: None,
        }
    }
}

impl std::fmt::Debug for FrameScanLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScanLibrary")
            .field("supported", &self.decoder.supported())
            .field("scanning", &self.is_scanning())
            .finish()
    }
}

#[async_trait]
impl ScanLibrary for FrameScanLibrary {
    async fn start(
        &mut self,
        source: FrameSource,
        config: &LibraryScanConfig,
        on_decode: DecodeCallback,
    ) -> Result<(), LibraryError> {
        if self.is_scanning() {
            return Err(LibraryError::AlreadyScanning);
        }
        config.validate()?;

        let (formats, dropped): (Vec<Symbology>, Vec<Symbology>) = config
            .formats
            .iter()
            .copied()
            .partition(|f| self.decoder.supported().contains(f));
        if formats.is_empty() {
            return Err(LibraryError::NoSupportedSymbology);
        }
        if !dropped.is_empty() {
            let names: Vec<&str> = dropped.iter().map(|f| f.as_str()).collect();
            tracing::warn!(
                formats = %names.join(", "),
                "Decoder cannot read some allowlisted symbologies"
            );
        }

        let (shutdown, mut stop_rx) = watch::channel(false);
        let decoder = Arc::clone(&self.decoder);
        let scan_rate = config.scan_rate;
        let formats: Arc<[Symbology]> = formats.into();
        let config = Arc::new(config.clone());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.scan_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let source = Arc::clone(&source);
                        let decoder = Arc::clone(&decoder);
                        let config = Arc::clone(&config);
                        let formats = Arc::clone(&formats);
                        let scanned = tokio::task::spawn_blocking(move || {
                            scan_once(&source, decoder.as_ref(), &config, &formats)
                        })
                        .await;

                        match scanned {
                            Ok(Some(text)) => on_decode(&text),
                            Ok(None) => {}
                            Err(e) => tracing::warn!(error = %e, "Scan task failed"),
                        }
                    }
                }
            }
        });

        tracing::info!(scan_rate, "Frame scan library started");
        self.task = Some(ScanTask { shutdown, handle });
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LibraryError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        let _ = task.shutdown.send(true);
        task.handle
            .await
            .map_err(|e| LibraryError::Stop(e.to_string()))?;
        tracing::debug!("Frame scan library stopped");
        Ok(())
    }

    fn is_scanning(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }
}

/// Pulls one frame and decodes its scan window.
fn scan_once(
    source: &FrameSource,
    decoder: &dyn FrameDecoder,
    config: &LibraryScanConfig,
    formats: &[Symbology],
) -> Option<String> {
    let frame = match source() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::trace!(error = %e, "No frame for scan");
            return None;
        }
    };

    let region = config.scan_region(frame.width(), frame.height());
    match decoder.decode(&frame.crop(region), formats) {
        Ok(decoded) => decoded.map(|decoded| decoded.text),
        Err(e) => {
            tracing::trace!(error = %e, "Decode failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScriptedCodes;
    use std::sync::Mutex;

    fn frames() -> FrameSource {
        Arc::new(|| Ok(Frame::new(vec![0u8; 64 * 48], 64, 48, 1)))
    }

    fn collector() -> (DecodeCallback, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: DecodeCallback = Arc::new(move |code: &str| {
            sink.lock().unwrap().push(code.to_string());
        });
        (callback, seen)
    }

    #[test]
    fn test_default_config_valid() {
        let config = LibraryScanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_scan_rate_bounds() {
        let mut config = LibraryScanConfig::default();
        config.scan_rate = 30;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidScanRate(30))
        ));
    }

    #[test]
    fn test_scan_region_square_viewport() {
        let config = LibraryScanConfig::default();
        let region = config.scan_region(1280, 720);

        // 720x720 viewport, 70% x 50% window
        assert_eq!(region.width, 504);
        assert_eq!(region.height, 360);
        assert_eq!(region.x, 280 + 108);
        assert_eq!(region.y, 180);
    }

    #[test]
    fn test_scan_region_tiny_frame_clamped() {
        let config = LibraryScanConfig {
            aspect_ratio: None,
            ..Default::default()
        };
        let region = config.scan_region(40, 30);
        assert_eq!((region.width, region.height), (40, 30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_library_delivers_decodes() {
        let codes = ScriptedCodes::new();
        codes.push_code("0460620309912");
        let mut library = FrameScanLibrary::new(Arc::new(codes.clone()));
        let (callback, seen) = collector();

        library
            .start(frames(), &LibraryScanConfig::default(), callback)
            .await
            .unwrap();
        assert!(library.is_scanning());

        tokio::time::sleep(Duration::from_millis(350)).await;
        library.stop().await.unwrap();
        assert!(!library.is_scanning());

        assert_eq!(seen.lock().unwrap().as_slice(), ["0460620309912"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_rejected() {
        let mut library = FrameScanLibrary::new(Arc::new(ScriptedCodes::new()));
        let (callback, _) = collector();
        let config = LibraryScanConfig::default();

        library
            .start(frames(), &config, Arc::clone(&callback))
            .await
            .unwrap();
        assert!(matches!(
            library.start(frames(), &config, callback).await,
            Err(LibraryError::AlreadyScanning)
        ));
        library.stop().await.unwrap();

        // Stopping an idle library is a no-op
        library.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_partially_supported_allowlist_still_scans() {
        let codes = ScriptedCodes::new().supporting(vec![Symbology::QrCode]);
        codes.push_code("https://example.test/p/1");
        let mut library = FrameScanLibrary::new(Arc::new(codes.clone()));
        let (callback, seen) = collector();

        library
            .start(frames(), &LibraryScanConfig::default(), callback)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        library.stop().await.unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), ["https://example.test/p/1"]);
    }

    #[tokio::test]
    async fn test_unsupported_symbologies_rejected() {
        let decoder = ScriptedCodes::new().supporting(vec![Symbology::Aztec]);
        let mut library = FrameScanLibrary::new(Arc::new(decoder));
        let (callback, _) = collector();

        let result = library
            .start(frames(), &LibraryScanConfig::default(), callback)
            .await;
        assert!(matches!(result, Err(LibraryError::NoSupportedSymbology)));
        assert!(!library.is_scanning());
    }
}
