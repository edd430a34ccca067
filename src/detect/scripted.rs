//! Scripted detector used by the demo harness and by tests.
//!
//! Every detection call consumes one [`Script`] step from a shared
//! queue. Once the queue is empty, nothing is detected.

use super::library::{Decoded, FrameDecoder};
use super::native::{DetectError, DetectedBarcode, NativeDetector};
use super::Symbology;
use crate::capture::Frame;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of one detection call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Codes visible in the frame, first one wins.
    Codes(Vec<String>),
    /// Nothing in view.
    Nothing,
    /// The detector fails on this frame.
    Fail(String),
}

/// Detector and decoder that replays a queue of [`Script`] steps.
///
/// Clones share the same queue, so a test can keep one handle and feed
/// codes while the scanner owns the other.
#[derive(Debug, Clone)]
pub struct ScriptedCodes {
    steps: Arc<Mutex<VecDeque<Script>>>,
    format: Symbology,
    supported: Vec<Symbology>,
}

impl Default for ScriptedCodes {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCodes {
    pub fn new() -> Self {
        Self {
            steps: Arc::new(Mutex::new(VecDeque::new())),
            format: Symbology::DataMatrix,
            supported: Symbology::library_defaults(),
        }
    }

    /// Restricts the symbologies reported as supported.
    pub fn supporting(mut self, supported: Vec<Symbology>) -> Self {
        self.supported = supported;
        self
    }

    /// Queues one step.
    pub fn push(&self, step: Script) {
        self.steps().push_back(step);
    }

    /// Queues a frame showing a single code.
    pub fn push_code(&self, code: &str) {
        self.push(Script::Codes(vec![code.to_string()]));
    }

    /// Queues one frame per code.
    pub fn extend<I, S>(&self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut steps = self.steps();
        steps.extend(codes.into_iter().map(|code| Script::Codes(vec![code.into()])));
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.steps().len()
    }

    fn steps(&self) -> MutexGuard<'_, VecDeque<Script>> {
        self.steps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next(&self) -> Script {
        self.steps().pop_front().unwrap_or(Script::Nothing)
    }
}

impl NativeDetector for ScriptedCodes {
    fn detect(&self, _frame: &Frame, _formats: &[Symbology]) -> Result<Vec<DetectedBarcode>, DetectError> {
        match self.next() {
            Script::Codes(codes) => Ok(codes
                .into_iter()
                .map(|raw_value| DetectedBarcode {
                    raw_value,
                    format: self.format,
                })
                .collect()),
            Script::Nothing => Ok(Vec::new()),
            Script::Fail(reason) => Err(DetectError::Failed(reason)),
        }
    }
}

impl FrameDecoder for ScriptedCodes {
    fn supported(&self) -> &[Symbology] {
        &self.supported
    }

    fn decode(&self, _frame: &Frame, _formats: &[Symbology]) -> Result<Option<Decoded>, DetectError> {
        match self.next() {
            Script::Codes(codes) => Ok(codes.into_iter().next().map(|text| Decoded {
                text,
                format: self.format,
            })),
            Script::Nothing => Ok(None),
            Script::Fail(reason) => Err(DetectError::Failed(reason)),
        }
    }
}
