//! Marking Scanner CLI
//!
//! Runs one order through setup, scanning and sending. Without a camera
//! device the codes come from `--demo-codes`.

use clap::Parser;
use marking_scanner::{
    capture::{Camera, MockCamera},
    config::FileConfig,
    detect::{FrameScanLibrary, Platform, ScriptedCodes},
    feedback::FeedbackEmitter,
    host::{self, HostContainer, StandaloneHost},
    metrics::MetricsSnapshot,
    scanner::{ScanStats, Scanner, ScannerBuilder, ScannerState},
    session::{OrderForm, ScanApplied, ScanDriver, SetupError, Workflow},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// How long a demo run waits for more scans once its codes are used up.
const DEMO_IDLE: Duration = Duration::from_secs(2);

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) marking-scanner";

#[derive(Parser, Debug)]
#[command(name = "marking-scanner", version, about = "Scan package codes for an order")]
struct Args {
    /// Counterparty the order is for
    #[arg(long)]
    counterparty: String,

    /// Order number
    #[arg(long)]
    order: String,

    /// Planned package count
    #[arg(long, default_value = "")]
    planned: String,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// User agent used for backend selection
    #[arg(long, default_value = DESKTOP_USER_AGENT)]
    user_agent: String,

    /// Offer a native detector to the backend selection
    #[arg(long)]
    native: bool,

    /// Comma-separated codes fed to the mock camera
    #[arg(long, value_delimiter = ',')]
    demo_codes: Vec<String>,

    /// Use the configured camera device instead of the mock camera
    #[arg(long)]
    device: bool,

    /// Serve Prometheus metrics on this port
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Marking Scanner v{}", marking_scanner::VERSION);

    let config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid configuration {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };

    let form = OrderForm::new(&args.counterparty, &args.order, &args.planned);
    if !form.can_start() {
        eprintln!("Counterparty and order number are required");
        std::process::exit(1);
    }
    let directory = config.session.directory();
    let order = match form.submit(config.session.counterparty_mode, &directory) {
        Ok(order) => order,
        Err(e) => {
            eprintln!("{}", e);
            if let SetupError::UnknownCounterparty(name) = &e {
                for suggestion in directory.suggestions(name) {
                    eprintln!("  did you mean: {}", suggestion);
                }
            }
            std::process::exit(1);
        }
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    }) {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    let codes = ScriptedCodes::new();
    codes.extend(args.demo_codes.iter().map(|c| c.trim()).filter(|c| !c.is_empty()));

    let mut platform = Platform::new(&args.user_agent);
    if args.native {
        platform = platform.with_native(Arc::new(codes.clone()));
    }

    let stats = Arc::new(ScanStats::default());
    let metrics = Metrics::start(&args, &config, stop_rx.clone());

    #[cfg(feature = "audio")]
    if let Err(e) = marking_scanner::feedback::install_audio_output(Box::new(
        marking_scanner::feedback::SpeakerOutput::new(),
    )) {
        warn!("Speaker output not installed: {}", e);
    }

    let shell: Arc<dyn HostContainer> = Arc::new(StandaloneHost);
    host::announce(shell.as_ref());

    let mut flow = Workflow::new(
        config.session.clone(),
        Arc::new(FeedbackEmitter::new(config.feedback.clone()).with_host(shell)),
    );
    if let Err(e) = flow.begin(order) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let run = Run {
        flow,
        stop: stop_rx,
        demo: (!args.device).then(|| codes.clone()),
        stats: Arc::clone(&stats),
        metrics,
    };

    if args.device {
        #[cfg(feature = "camera")]
        {
            let builder = Scanner::builder(
                marking_scanner::capture::NokhwaCamera::new(),
                Box::new(FrameScanLibrary::new(live_decoder(&codes))),
            );
            run.execute(configure(builder, &config, platform, stats)).await;
            return;
        }
        #[cfg(not(feature = "camera"))]
        {
            eprintln!("Built without camera support, rebuild with --features camera");
            std::process::exit(1);
        }
    }

    let builder = Scanner::builder(
        MockCamera::new(),
        Box::new(FrameScanLibrary::new(Arc::new(codes.clone()))),
    );
    run.execute(configure(builder, &config, platform, stats)).await;
}

fn configure<C: Camera + 'static>(
    builder: ScannerBuilder<C>,
    config: &FileConfig,
    platform: Platform,
    stats: Arc<ScanStats>,
) -> ScannerBuilder<C> {
    builder
        .config(config.scanner.clone())
        .capture(config.capture.clone())
        .platform(platform)
        .stats(stats)
}

/// Decoder for real frames. Without the `decode` feature nothing is read.
#[cfg(feature = "camera")]
fn live_decoder(codes: &ScriptedCodes) -> Arc<dyn marking_scanner::detect::FrameDecoder> {
    #[cfg(feature = "decode")]
    {
        let _ = codes;
        Arc::new(marking_scanner::detect::BarcodeDecoder::new())
    }
    #[cfg(not(feature = "decode"))]
    {
        warn!("Built without barcode decoding, the scanning library decodes nothing");
        Arc::new(codes.clone())
    }
}

struct Run {
    flow: Workflow,
    stop: watch::Receiver<bool>,
    /// Scripted codes when running without a device.
    demo: Option<ScriptedCodes>,
    stats: Arc<ScanStats>,
    metrics: Metrics,
}

impl Run {
    async fn execute<C: Camera + 'static>(mut self, builder: ScannerBuilder<C>) {
        let mut driver = ScanDriver::new(builder);

        if let Some(session) = self.flow.session() {
            match driver.start(session).await {
                Ok(ScannerState::Active(strategy)) => info!("Scanning with {} detector", strategy),
                Ok(ScannerState::Idle) => info!("Scanner not started"),
                Err(e) => {
                    eprintln!("{}", e.user_message());
                    std::process::exit(1);
                }
            }
        }

        loop {
            let Some(session) = self.flow.session_mut() else {
                break;
            };
            if session.limit_reached() {
                info!("Planned quantity reached");
                break;
            }

            tokio::select! {
                applied = driver.next_scan(session) => match applied {
                    Some(ScanApplied::Recorded(record)) => {
                        println!("{:>4}  {}  {}", session.count(), record.display_time(), record.code());
                    }
                    Some(ScanApplied::Rejected(code)) => warn!("Scan {} rejected, order is full", code),
                    None => break,
                },
                _ = stopped(&mut self.stop) => {
                    info!("Interrupted");
                    break;
                }
                _ = tokio::time::sleep(DEMO_IDLE) => {
                    if self.demo.as_ref().is_some_and(|codes| codes.remaining() == 0) {
                        info!("Demo codes exhausted");
                        break;
                    }
                }
            }

            self.publish(driver.scanner().state() != ScannerState::Idle).await;
        }

        driver.shutdown().await;
        self.publish(false).await;
        self.finish().await;
    }

    async fn finish(&mut self) {
        let Some(session) = self.flow.session() else {
            return;
        };

        println!(
            "Order {} for {}: {} scanned",
            session.order().order_number(),
            session.order().counterparty(),
            session.count()
        );
        for (number, record) in session.records_newest_first() {
            println!("{:>4}  {}  {}", number, record.display_time(), record.code());
        }

        match self.flow.send(tokio::time::Instant::now()) {
            Ok(receipt) => println!("{}", receipt.summary()),
            Err(e) => {
                eprintln!("Not sent: {}", e);
                self.flow.back();
                std::process::exit(1);
            }
        }
        self.publish(false).await;

        if let Some(until) = self.flow.confirmation_deadline() {
            tokio::time::sleep_until(until).await;
            self.flow.poll(tokio::time::Instant::now());
        }
        info!(
            "Done. Sends: {}, packages sent: {}",
            self.flow.sends(),
            self.flow.packages_sent()
        );
    }

    async fn publish(&self, scanner_active: bool) {
        let snapshot = MetricsSnapshot::from_components(
            &self.stats.snapshot(),
            scanner_active,
            self.flow.session(),
            self.flow.packages_sent(),
        );
        self.metrics.publish(snapshot).await;
    }
}

/// Resolves once `stop` reads true. Never resolves if its sender is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Metrics endpoint, when enabled and compiled in.
struct Metrics {
    #[cfg(feature = "metrics")]
    state: Option<Arc<tokio::sync::RwLock<marking_scanner::metrics::MetricsState>>>,
}

impl Metrics {
    #[cfg(feature = "metrics")]
    fn start(args: &Args, config: &FileConfig, shutdown: watch::Receiver<bool>) -> Self {
        use marking_scanner::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

        let port = match args.metrics_port {
            Some(port) => port,
            None if config.metrics.enabled => config.metrics.port,
            None => return Self { state: None },
        };
        let registry = match MetricsRegistry::new() {
            Ok(registry) => registry,
            Err(e) => {
                warn!("Metrics disabled: {}", e);
                return Self { state: None };
            }
        };
        let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
        let state = server.state();
        tokio::spawn(async move {
            if let Err(e) = server.run(shutdown).await {
                warn!("Metrics server stopped: {}", e);
            }
        });
        Self { state: Some(state) }
    }

    #[cfg(not(feature = "metrics"))]
    fn start(args: &Args, config: &FileConfig, _shutdown: watch::Receiver<bool>) -> Self {
        if args.metrics_port.is_some() || config.metrics.enabled {
            warn!("Built without metrics support, rebuild with --features metrics");
        }
        Self {}
    }

    /// Applies `snapshot` before returning, so updates land in call order.
    #[cfg(feature = "metrics")]
    async fn publish(&self, snapshot: MetricsSnapshot) {
        if let Some(state) = &self.state {
            state.write().await.update(&snapshot);
        }
    }

    #[cfg(not(feature = "metrics"))]
    async fn publish(&self, _snapshot: MetricsSnapshot) {}
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;
    use marking_scanner::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};
    use marking_scanner::scanner::ScanStatsSnapshot;

    fn snapshot(scanner_active: bool) -> MetricsSnapshot {
        MetricsSnapshot::from_components(&ScanStatsSnapshot::default(), scanner_active, None, 0)
    }

    #[tokio::test]
    async fn test_last_published_snapshot_wins() {
        let server = MetricsServer::new(MetricsServerConfig::default(), MetricsRegistry::new().unwrap());
        let state = server.state();
        let metrics = Metrics {
            state: Some(Arc::clone(&state)),
        };

        for active in [true, true, false] {
            metrics.publish(snapshot(active)).await;
        }
        assert!(!state.read().await.scanner_active());
    }
}
