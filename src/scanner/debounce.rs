//! Duplicate suppression for decoded values.
//!
//! A barcode held in front of the camera decodes on nearly every frame.
//! The filter lets a value through once, then drops repeats of the same
//! value until the window has elapsed since it was last accepted.

use std::time::Duration;

/// Default suppression window for repeated codes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
struct DebounceState {
    last_code: String,
    last_accepted_at_millis: u64,
}

/// Rejects a code equal to the previous accepted one within the window.
#[derive(Debug, Clone)]
pub struct DebounceFilter {
    window_millis: u64,
    state: Option<DebounceState>,
}

impl Default for DebounceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl DebounceFilter {
    /// Creates a filter with the given suppression window.
    pub fn new(window: Duration) -> Self {
        Self {
            window_millis: window.as_millis() as u64,
            state: None,
        }
    }

    /// Suppression window.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_millis)
    }

    /// Decides whether `code` observed at `now_millis` is accepted.
    ///
    /// Accepting records `code` as the new reference point; rejecting
    /// leaves the state untouched.
    pub fn admit(&mut self, code: &str, now_millis: u64) -> bool {
        if let Some(state) = &self.state {
            let elapsed = now_millis.saturating_sub(state.last_accepted_at_millis);
            if state.last_code == code && elapsed < self.window_millis {
                return false;
            }
        }

        self.state = Some(DebounceState {
            last_code: code.to_string(),
            last_accepted_at_millis: now_millis,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_code_accepted() {
        let mut filter = DebounceFilter::default();
        assert!(filter.admit("0104606203099125", 0));
    }

    #[test]
    fn test_repeat_within_window_rejected() {
        let mut filter = DebounceFilter::default();
        assert!(filter.admit("ABC123", 10_000));
        assert!(!filter.admit("ABC123", 10_001));
        assert!(!filter.admit("ABC123", 11_499));
        assert!(filter.admit("ABC123", 11_500));
    }

    #[test]
    fn test_rejection_does_not_extend_window() {
        let mut filter = DebounceFilter::default();
        assert!(filter.admit("ABC123", 0));
        assert!(!filter.admit("ABC123", 1_000));
        // Measured from the acceptance at 0, not the rejection at 1000
        assert!(filter.admit("ABC123", 1_500));
    }

    #[test]
    fn test_different_code_resets_reference() {
        let mut filter = DebounceFilter::default();
        assert!(filter.admit("111", 0));
        assert!(filter.admit("222", 10));
        // "111" is no longer the previous code
        assert!(filter.admit("111", 20));
    }

    proptest! {
        #[test]
        fn prop_same_code_threshold(code in "[0-9A-Z]{1,20}", t1 in 0u64..1_000_000, gap in 0u64..5_000) {
            let mut filter = DebounceFilter::default();
            prop_assert!(filter.admit(&code, t1));
            prop_assert_eq!(filter.admit(&code, t1 + gap), gap >= 1_500);
        }

        #[test]
        fn prop_distinct_codes_always_accepted(
            a in "[0-9]{4,13}",
            b in "[0-9]{4,13}",
            t in 0u64..1_000_000,
            gap in 0u64..1_500,
        ) {
            prop_assume!(a != b);
            let mut filter = DebounceFilter::default();
            prop_assert!(filter.admit(&a, t));
            prop_assert!(filter.admit(&b, t + gap));
        }
    }
}
