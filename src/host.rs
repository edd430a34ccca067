//! Integration with an embedding host shell.
//!
//! When the scanner runs inside a host application (a chat client's
//! mini-app container, for instance), the host is told when the app is
//! ready and gets a chance to give its own haptic confirmation for each
//! accepted scan.

/// Callbacks into the embedding host.
pub trait HostContainer: Send + Sync {
    /// The app finished loading.
    fn ready(&self);

    /// Ask the host to give the app the full screen.
    fn expand(&self);

    /// Success haptic for an accepted scan.
    fn notify_success(&self);
}

/// Host used when the scanner runs on its own, as the CLI does. Nothing
/// embeds it, so every callback only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandaloneHost;

impl HostContainer for StandaloneHost {
    fn ready(&self) {
        tracing::debug!("Standalone host ready");
    }

    fn expand(&self) {}

    fn notify_success(&self) {
        tracing::trace!("Scan confirmed");
    }
}

/// Signals readiness and requests full-screen expansion.
pub fn announce(host: &dyn HostContainer) {
    host.ready();
    host.expand();
    tracing::debug!("Host notified of readiness");
}
