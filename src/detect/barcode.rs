//! Multi-format decoding through `rxing`.

use super::library::{Decoded, FrameDecoder};
use super::native::DetectError;
use super::Symbology;
use crate::capture::Frame;
use rxing::BarcodeFormat;

const SUPPORTED: &[Symbology] = &[
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
    Symbology::Pdf417,
    Symbology::Aztec,
];

fn symbology(format: &BarcodeFormat) -> Option<Symbology> {
    let symbology = match format {
        BarcodeFormat::CODE_128 => Symbology::Code128,
        BarcodeFormat::CODE_39 => Symbology::Code39,
        BarcodeFormat::CODE_93 => Symbology::Code93,
        BarcodeFormat::CODABAR => Symbology::Codabar,
        BarcodeFormat::EAN_13 => Symbology::Ean13,
        BarcodeFormat::EAN_8 => Symbology::Ean8,
        BarcodeFormat::UPC_A => Symbology::UpcA,
        BarcodeFormat::UPC_E => Symbology::UpcE,
        BarcodeFormat::ITF => Symbology::Itf,
        BarcodeFormat::DATA_MATRIX => Symbology::DataMatrix,
        BarcodeFormat::QR_CODE => Symbology::QrCode,
        BarcodeFormat::PDF_417 => Symbology::Pdf417,
        BarcodeFormat::AZTEC => Symbology::Aztec,
        _ => return None,
    };
    Some(symbology)
}

/// Decodes linear and 2D symbols, DataMatrix included, from luma frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct BarcodeDecoder;

impl BarcodeDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for BarcodeDecoder {
    fn supported(&self) -> &[Symbology] {
        SUPPORTED
    }

    fn decode(&self, frame: &Frame, formats: &[Symbology]) -> Result<Option<Decoded>, DetectError> {
        if !frame.is_valid() {
            return Err(DetectError::Failed(format!(
                "frame buffer does not match {}x{}",
                frame.width(),
                frame.height()
            )));
        }

        let result = match rxing::helpers::detect_in_luma(
            frame.pixels().to_vec(),
            frame.width(),
            frame.height(),
            None,
        ) {
            Ok(result) => result,
            Err(e) => {
                // Most frames simply hold no symbol
                tracing::trace!(error = %e, "No symbol decoded");
                return Ok(None);
            }
        };

        match symbology(result.getBarcodeFormat()) {
            Some(format) if formats.contains(&format) => Ok(Some(Decoded {
                text: result.getText().to_string(),
                format,
            })),
            found => {
                tracing::trace!(?found, "Symbol outside the allowlist ignored");
                Ok(None)
            }
        }
    }
}
