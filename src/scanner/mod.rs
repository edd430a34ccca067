//! Camera ownership, backend dispatch and scan filtering.
//!
//! A [`Scanner`] owns one camera. `start()` opens it and runs the
//! strategy picked for the platform, `stop()` tears everything down
//! again. Every decoded value goes through the disable gate and the
//! debounce filter before it is delivered as a [`ScanEvent`].
//!
//! ```text
//! camera ─▶ native loop / scan library ─▶ gate ─▶ debounce ─▶ ScanEvent
//! ```
//!
//! The owner holds the sending half of the gate. Flipping it to `true`
//! rejects further detections immediately and stops the scanner, which
//! releases the camera.

mod clock;
mod debounce;
mod error;
mod gate;

pub use clock::{Clock, ManualClock, SystemClock};
pub use debounce::{DebounceFilter, DEFAULT_DEBOUNCE};
pub use error::ScannerError;
pub use gate::{ScanStats, ScanStatsSnapshot, Verdict};

use crate::capture::{Camera, CameraError, CaptureConfig, ConfigError};
use crate::detect::{
    run_native_loop, DecodeCallback, FrameSource, LibraryScanConfig, Platform, ScanLibrary,
    SelectionPolicy, Strategy, Symbology,
};
use gate::DetectionSink;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::{JoinError, JoinHandle};

/// A camera shared between the scanner and its detection loops.
pub type SharedCamera<C> = Arc<Mutex<C>>;

pub(crate) fn lock_camera<C>(camera: &SharedCamera<C>) -> MutexGuard<'_, C> {
    camera.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs `op` on the camera from the blocking pool.
///
/// Device calls wait on hardware, so they never run on a runtime worker.
pub(crate) async fn with_camera<C, T, F>(camera: &SharedCamera<C>, op: F) -> Result<T, JoinError>
where
    C: Camera + 'static,
    T: Send + 'static,
    F: FnOnce(&mut C) -> T + Send + 'static,
{
    let camera = Arc::clone(camera);
    tokio::task::spawn_blocking(move || {
        let mut guard = lock_camera(&camera);
        op(&mut *guard)
    })
    .await
}

/// A decoded value that passed the gate and the debounce filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    /// Decoded payload.
    pub code: String,
    /// Acceptance time, milliseconds since the Unix epoch.
    pub timestamp_millis: u64,
}

/// Externally visible scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Active(Strategy),
}

/// Scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Suppression window for repeated codes, in milliseconds.
    pub debounce_ms: u64,
    /// Backend selection policy.
    pub policy: SelectionPolicy,
    /// Symbologies requested from the native detector.
    pub native_formats: Vec<Symbology>,
    /// Settings for the scanning library.
    pub library: LibraryScanConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            policy: SelectionPolicy::default(),
            native_formats: Symbology::native_defaults(),
            library: LibraryScanConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::InvalidDebounce);
        }
        if self.native_formats.is_empty() {
            return Err(ConfigError::EmptySymbologies("native"));
        }
        self.library.validate()
    }

    /// Debounce window as a duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Builds a [`Scanner`] and the receiver its events arrive on.
pub struct ScannerBuilder<C: Camera + 'static> {
    camera: C,
    library: Box<dyn ScanLibrary>,
    config: ScannerConfig,
    capture: CaptureConfig,
    platform: Platform,
    clock: Arc<dyn Clock>,
    gate: Option<watch::Receiver<bool>>,
    stats: Option<Arc<ScanStats>>,
}

impl<C: Camera + 'static> ScannerBuilder<C> {
    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Disable gate controlled by the owner. Without one, the scanner is
    /// never disabled.
    pub fn gate(mut self, gate: watch::Receiver<bool>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Counters to accumulate into, e.g. shared across sessions.
    pub fn stats(mut self, stats: Arc<ScanStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn build(self) -> (Scanner<C>, mpsc::UnboundedReceiver<ScanEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (gate, gate_owner) = match self.gate {
            Some(gate) => (gate, None),
            None => {
                let (tx, rx) = watch::channel(false);
                (rx, Some(tx))
            }
        };
        let stats = self.stats.unwrap_or_default();

        let sink = DetectionSink::new(
            DebounceFilter::new(self.config.debounce()),
            gate.clone(),
            self.clock,
            events_tx,
            Arc::clone(&stats),
        );

        let scanner = Scanner {
            config: self.config,
            capture: self.capture,
            camera: Arc::new(Mutex::new(self.camera)),
            platform: self.platform,
            library: Arc::new(AsyncMutex::new(self.library)),
            gate,
            _gate_owner: gate_owner,
            sink: Arc::new(sink),
            stats,
            active: None,
            torch: TorchState::default(),
        };
        (scanner, events_rx)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TorchState {
    available: bool,
    lit: bool,
}

struct ActiveScan {
    strategy: Strategy,
    shutdown: watch::Sender<bool>,
    supervisor: JoinHandle<()>,
}

enum Runner {
    Native {
        stop: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
    Library(Arc<AsyncMutex<Box<dyn ScanLibrary>>>),
}

/// Owns a camera and runs one detection strategy at a time.
pub struct Scanner<C: Camera + 'static> {
    config: ScannerConfig,
    capture: CaptureConfig,
    camera: SharedCamera<C>,
    platform: Platform,
    library: Arc<AsyncMutex<Box<dyn ScanLibrary>>>,
    gate: watch::Receiver<bool>,
    _gate_owner: Option<watch::Sender<bool>>,
    sink: Arc<DetectionSink>,
    stats: Arc<ScanStats>,
    active: Option<ActiveScan>,
    torch: TorchState,
}

impl<C: Camera + 'static> Scanner<C> {
    /// Starts building a scanner around `camera`, falling back to
    /// `library` when the native detector is not used.
    pub fn builder(camera: C, library: Box<dyn ScanLibrary>) -> ScannerBuilder<C> {
        ScannerBuilder {
            camera,
            library,
            config: ScannerConfig::default(),
            capture: CaptureConfig::default(),
            platform: Platform::default(),
            clock: Arc::new(SystemClock),
            gate: None,
            stats: None,
        }
    }

    /// Current state. A scanner disabled by its gate reports `Idle`,
    /// including while its camera is still being released.
    pub fn state(&self) -> ScannerState {
        match &self.active {
            Some(active) if !active.supervisor.is_finished() && !self.is_disabled() => {
                ScannerState::Active(active.strategy)
            }
            _ => ScannerState::Idle,
        }
    }

    /// Whether the owner currently disables scanning.
    pub fn is_disabled(&self) -> bool {
        *self.gate.borrow()
    }

    /// Counters for this scanner.
    pub fn stats(&self) -> ScanStatsSnapshot {
        self.stats.snapshot()
    }

    /// Opens the camera and starts the strategy chosen for the platform.
    ///
    /// Calling this while active is a no-op, as is calling it while the
    /// gate disables scanning; both return the resulting state.
    pub async fn start(&mut self) -> Result<ScannerState, ScannerError> {
        if self.is_disabled() {
            // Wait for a teardown already triggered by the gate
            self.stop().await;
            tracing::info!("Scanner disabled by owner, not starting");
            return Ok(ScannerState::Idle);
        }
        if let ScannerState::Active(strategy) = self.state() {
            tracing::debug!(%strategy, "Scanner already active");
            return Ok(ScannerState::Active(strategy));
        }
        // Reap a run that ended on its own
        self.stop().await;

        self.config.validate()?;
        self.capture.validate()?;

        let strategy = self.platform.strategy(self.config.policy);

        let capture = self.capture.clone();
        let opened = with_camera(&self.camera, move |camera| -> Result<bool, CameraError> {
            camera.open(&capture)?;
            Ok(camera.supports_torch())
        })
        .await
        .unwrap_or_else(|e| Err(CameraError::OpenFailed(e.to_string())));
        let available = match opened {
            Ok(available) => available,
            Err(e) => {
                self.stats.record_failure();
                let err = ScannerError::from(e);
                tracing::warn!(error = %err, "Camera start failed");
                return Err(err);
            }
        };
        self.torch = TorchState {
            available,
            lit: false,
        };

        let on_detect: DecodeCallback = {
            let sink = Arc::clone(&self.sink);
            Arc::new(move |code: &str| {
                sink.submit(code);
            })
        };

        let runner = match (strategy, self.platform.native.clone()) {
            (Strategy::Native, Some(detector)) => {
                let (stop, stop_rx) = watch::channel(false);
                let handle = tokio::spawn(run_native_loop(
                    Arc::clone(&self.camera),
                    detector,
                    self.config.native_formats.clone(),
                    self.capture.frame_interval(),
                    on_detect,
                    stop_rx,
                ));
                Runner::Native { stop, handle }
            }
            _ => {
                let source: FrameSource = {
                    let camera = Arc::clone(&self.camera);
                    Arc::new(move || lock_camera(&camera).capture())
                };
                let started = self
                    .library
                    .lock()
                    .await
                    .start(source, &self.config.library, on_detect)
                    .await;
                if let Err(e) = started {
                    release(&self.camera).await;
                    self.torch = TorchState::default();
                    self.stats.record_failure();
                    tracing::warn!(error = %e, "Scan library failed to start");
                    return Err(ScannerError::ScannerInitFailed(e.to_string()));
                }
                Runner::Library(Arc::clone(&self.library))
            }
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let supervisor = tokio::spawn(supervise(
            runner,
            Arc::clone(&self.camera),
            self.gate.clone(),
            shutdown_rx,
        ));

        self.stats.record_start();
        self.active = Some(ActiveScan {
            strategy,
            shutdown,
            supervisor,
        });
        tracing::info!(
            %strategy,
            torch = available,
            "Scanner active"
        );
        Ok(ScannerState::Active(strategy))
    }

    /// Stops detection and releases the camera. A no-op when idle.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let _ = active.shutdown.send(true);
        if let Err(e) = active.supervisor.await {
            tracing::warn!(error = %e, "Scanner supervisor ended abnormally");
        }
        self.torch = TorchState::default();
    }

    /// Whether the active camera track has a torch.
    pub fn has_torch(&self) -> bool {
        matches!(self.state(), ScannerState::Active(_)) && self.torch.available
    }

    /// Whether the torch is lit.
    pub fn torch_on(&self) -> bool {
        self.has_torch() && self.torch.lit
    }

    /// Flips the torch when the active track has one and returns whether
    /// it is lit afterwards.
    pub async fn toggle_torch(&mut self) -> bool {
        if !self.has_torch() {
            return false;
        }
        let next = !self.torch.lit;
        let changed = with_camera(&self.camera, move |camera| camera.set_torch(next))
            .await
            .unwrap_or_else(|e| Err(CameraError::ConfigFailed(e.to_string())));
        match changed {
            Ok(()) => self.torch.lit = next,
            Err(e) => tracing::debug!(error = %e, "Torch change refused"),
        }
        self.torch.lit
    }
}

impl<C: Camera + 'static> Drop for Scanner<C> {
    fn drop(&mut self) {
        // The supervisor releases the camera on its own once signalled
        if let Some(active) = self.active.take() {
            let _ = active.shutdown.send(true);
        }
    }
}

async fn release<C: Camera + 'static>(camera: &SharedCamera<C>) {
    if let Err(e) = with_camera(camera, |camera| camera.close()).await {
        tracing::warn!(error = %e, "Camera release task failed");
    }
}

/// Resolves once `flag` reads true or its sender is gone.
async fn wait_until_set(flag: &mut watch::Receiver<bool>) {
    loop {
        if *flag.borrow_and_update() {
            return;
        }
        if flag.changed().await.is_err() {
            return;
        }
    }
}

/// Tears down an active run once it is stopped or disabled.
async fn supervise<C: Camera + 'static>(
    runner: Runner,
    camera: SharedCamera<C>,
    mut gate: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let reason = tokio::select! {
        _ = wait_until_set(&mut gate) => "disabled",
        _ = wait_until_set(&mut shutdown) => "stopped",
    };

    match runner {
        Runner::Native { stop, handle } => {
            let _ = stop.send(true);
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Native detection loop ended abnormally");
            }
        }
        Runner::Library(library) => {
            if let Err(e) = library.lock().await.stop().await {
                tracing::warn!(error = %e, "Scan library failed to stop");
            }
        }
    }

    release(&camera).await;
    tracing::info!(reason, "Scanner stopped, camera released");
}
