//! Detection backends and backend selection.
//!
//! Two interchangeable strategies turn camera frames into decoded values:
//!
//! - [`NativeDetector`]: a platform-provided barcode detector polled once
//!   per frame by a loop this crate runs.
//! - [`ScanLibrary`]: a scanning library that owns its own frame loop and
//!   only calls back with decoded text.
//!
//! Exactly one of them runs at a time. Which one is decided by
//! [`select_strategy`] from the platform's capabilities and the configured
//! [`SelectionPolicy`].

#[cfg(feature = "decode")]
mod barcode;
mod library;
mod native;
mod scripted;

#[cfg(feature = "decode")]
pub use barcode::BarcodeDecoder;
pub use library::{
    Decoded, FrameDecoder, FrameScanLibrary, FrameSource, LibraryError, LibraryScanConfig,
    ScanLibrary, ScanWindow,
};
pub use native::{DetectError, DetectedBarcode, NativeDetector};
pub(crate) use native::run_native_loop;
pub use scripted::{Script, ScriptedCodes};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Callback receiving every decoded value, before debounce.
pub type DecodeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Barcode symbologies understood by the detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "code_128")]
    Code128,
    #[serde(rename = "code_39")]
    Code39,
    #[serde(rename = "code_93")]
    Code93,
    #[serde(rename = "codabar")]
    Codabar,
    #[serde(rename = "ean_13")]
    Ean13,
    #[serde(rename = "ean_8")]
    Ean8,
    #[serde(rename = "upc_a")]
    UpcA,
    #[serde(rename = "upc_e")]
    UpcE,
    #[serde(rename = "itf")]
    Itf,
    #[serde(rename = "data_matrix")]
    DataMatrix,
    #[serde(rename = "qr_code")]
    QrCode,
    #[serde(rename = "pdf417")]
    Pdf417,
    #[serde(rename = "aztec")]
    Aztec,
}

impl Symbology {
    /// Format name as used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Symbology::Code128 => "code_128",
            Symbology::Code39 => "code_39",
            Symbology::Code93 => "code_93",
            Symbology::Codabar => "codabar",
            Symbology::Ean13 => "ean_13",
            Symbology::Ean8 => "ean_8",
            Symbology::UpcA => "upc_a",
            Symbology::UpcE => "upc_e",
            Symbology::Itf => "itf",
            Symbology::DataMatrix => "data_matrix",
            Symbology::QrCode => "qr_code",
            Symbology::Pdf417 => "pdf417",
            Symbology::Aztec => "aztec",
        }
    }

    /// Whether this is a two-dimensional symbology.
    pub fn is_2d(self) -> bool {
        matches!(
            self,
            Symbology::DataMatrix | Symbology::QrCode | Symbology::Pdf417 | Symbology::Aztec
        )
    }

    /// Formats handed to the native detector by default.
    pub fn native_defaults() -> Vec<Symbology> {
        vec![
            Symbology::Code128,
            Symbology::Code39,
            Symbology::Ean13,
            Symbology::Ean8,
            Symbology::DataMatrix,
            Symbology::QrCode,
        ]
    }

    /// Allowlist for the scanning library: linear retail and logistics
    /// codes plus the 2D codes used for product marking.
    pub fn library_defaults() -> Vec<Symbology> {
        vec![
            Symbology::Code128,
            Symbology::Code39,
            Symbology::Code93,
            Symbology::Codabar,
            Symbology::Ean13,
            Symbology::Ean8,
            Symbology::UpcA,
            Symbology::UpcE,
            Symbology::Itf,
            Symbology::DataMatrix,
            Symbology::QrCode,
        ]
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The detection backend driving an active scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Platform barcode detector polled per frame.
    Native,
    /// Scanning library in continuous-scan mode.
    Library,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Native => f.write_str("native"),
            Strategy::Library => f.write_str("library"),
        }
    }
}

/// How to pick between the native detector and the scanning library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Native detector whenever the platform has one.
    PreferNative,
    /// Native detector, except on mobile user agents where the library
    /// behaves more reliably.
    #[default]
    PreferNativeExceptMobile,
    /// Never use the native detector.
    AlwaysLibrary,
}

const MOBILE_AGENT_MARKERS: &[&str] = &[
    "android",
    "iphone",
    "ipad",
    "ipod",
    "mobile",
    "opera mini",
    "iemobile",
    "blackberry",
    "webos",
];

/// Whether `user_agent` identifies a phone or tablet.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let agent = user_agent.to_ascii_lowercase();
    MOBILE_AGENT_MARKERS
        .iter()
        .any(|marker| agent.contains(marker))
}

/// Picks the strategy for a new scanning run.
pub fn select_strategy(policy: SelectionPolicy, native_available: bool, user_agent: &str) -> Strategy {
    if !native_available {
        return Strategy::Library;
    }
    match policy {
        SelectionPolicy::PreferNative => Strategy::Native,
        SelectionPolicy::PreferNativeExceptMobile if is_mobile_user_agent(user_agent) => {
            Strategy::Library
        }
        SelectionPolicy::PreferNativeExceptMobile => Strategy::Native,
        SelectionPolicy::AlwaysLibrary => Strategy::Library,
    }
}

/// Capabilities of the platform the scanner runs on.
#[derive(Clone, Default)]
pub struct Platform {
    /// Native barcode detector, when the platform has one.
    pub native: Option<Arc<dyn NativeDetector>>,
    /// User agent string of the client.
    pub user_agent: String,
}

impl Platform {
    /// A platform without a native detector.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            native: None,
            user_agent: user_agent.into(),
        }
    }

    /// Attaches a native detector.
    pub fn with_native(mut self, detector: Arc<dyn NativeDetector>) -> Self {
        self.native = Some(detector);
        self
    }

    /// Whether a native detector is present.
    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }

    /// Strategy this platform should run under `policy`.
    pub fn strategy(&self, policy: SelectionPolicy) -> Strategy {
        select_strategy(policy, self.has_native(), &self.user_agent)
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("native", &self.has_native())
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANDROID: &str =
        "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 Chrome/120.0 Mobile Safari/537.36";
    const IPHONE: &str =
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const DESKTOP: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";

    #[test]
    fn test_mobile_agents() {
        assert!(is_mobile_user_agent(ANDROID));
        assert!(is_mobile_user_agent(IPHONE));
        assert!(!is_mobile_user_agent(DESKTOP));
        assert!(!is_mobile_user_agent(""));
    }

    #[test]
    fn test_selection_matrix() {
        let policy = SelectionPolicy::default();

        assert_eq!(select_strategy(policy, true, ANDROID), Strategy::Library);
        assert_eq!(select_strategy(policy, true, DESKTOP), Strategy::Native);
        assert_eq!(select_strategy(policy, false, ANDROID), Strategy::Library);
        assert_eq!(select_strategy(policy, false, DESKTOP), Strategy::Library);
    }

    #[test]
    fn test_policy_overrides() {
        assert_eq!(
            select_strategy(SelectionPolicy::PreferNative, true, ANDROID),
            Strategy::Native
        );
        assert_eq!(
            select_strategy(SelectionPolicy::AlwaysLibrary, true, DESKTOP),
            Strategy::Library
        );
    }

    #[test]
    fn test_symbology_names_match_serde() {
        for symbology in Symbology::library_defaults() {
            let encoded = toml::Value::try_from(symbology).unwrap();
            assert_eq!(encoded.as_str(), Some(symbology.as_str()));
        }
        assert!(Symbology::DataMatrix.is_2d());
        assert!(!Symbology::Ean13.is_2d());
    }
}
