//! Frame type representing a captured image with metadata.

use std::time::Instant;

/// A rectangular region inside a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Region width.
    pub width: u32,
    /// Region height.
    pub height: u32,
}

impl Region {
    /// Region covering a whole `width` x `height` surface.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// A `width` x `height` region centered inside `outer`.
    ///
    /// The region is clamped so it never exceeds `outer`.
    pub fn centered_in(outer: Region, width: u32, height: u32) -> Self {
        let width = width.min(outer.width);
        let height = height.min(outer.height);
        Self {
            x: outer.x + (outer.width - width) / 2,
            y: outer.y + (outer.height - height) / 2,
            width,
            height,
        }
    }
}

/// A single captured frame from the camera.
///
/// Pixels are 8-bit luma, which is what every decoder in this crate
/// consumes.
#[derive(Clone)]
pub struct Frame {
    /// Raw grayscale pixel data, row-major.
    pixels: Vec<u8>,
    /// Frame width in pixels.
    width: u32,
    /// Frame height in pixels.
    height: u32,
    /// Capture timestamp.
    timestamp: Instant,
    /// Monotonic sequence number.
    sequence: u64,
}

impl Frame {
    /// Creates a new frame with the given parameters.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count()
    }

    /// Region covering the whole frame.
    pub fn bounds(&self) -> Region {
        Region::full(self.width, self.height)
    }

    /// Copies `region` out into a new frame with the same sequence number.
    ///
    /// The region is clamped to the frame bounds. An invalid frame is
    /// returned unchanged.
    pub fn crop(&self, region: Region) -> Frame {
        if !self.is_valid() || region == self.bounds() {
            return self.clone();
        }

        let x = region.x.min(self.width);
        let y = region.y.min(self.height);
        let width = region.width.min(self.width - x);
        let height = region.height.min(self.height - y);

        let stride = self.width as usize;
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for row in y..y + height {
            let start = row as usize * stride + x as usize;
            pixels.extend_from_slice(&self.pixels[start..start + width as usize]);
        }

        Frame {
            pixels,
            width,
            height,
            timestamp: self.timestamp,
            sequence: self.sequence,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let pixels = vec![0u8; 640 * 480];
        let frame = Frame::new(pixels, 640, 480, 1);

        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.sequence(), 1);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let pixels = vec![0u8; 100]; // Wrong size
        let frame = Frame::new(pixels, 640, 480, 1);

        assert!(!frame.is_valid());
    }

    #[test]
    fn test_crop_copies_rows() {
        // 4x3 frame with pixel value = row * 10 + column
        let pixels: Vec<u8> = (0..3)
            .flat_map(|r| (0..4).map(move |c| (r * 10 + c) as u8))
            .collect();
        let frame = Frame::new(pixels, 4, 3, 7);

        let cropped = frame.crop(Region {
            x: 1,
            y: 1,
            width: 2,
            height: 2,
        });

        assert_eq!(cropped.width(), 2);
        assert_eq!(cropped.height(), 2);
        assert_eq!(cropped.sequence(), 7);
        assert_eq!(cropped.pixels(), &[11, 12, 21, 22]);
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let frame = Frame::new(vec![0u8; 100], 10, 10, 1);
        let cropped = frame.crop(Region {
            x: 8,
            y: 8,
            width: 5,
            height: 5,
        });

        assert_eq!((cropped.width(), cropped.height()), (2, 2));
        assert!(cropped.is_valid());
    }

    #[test]
    fn test_centered_region() {
        let region = Region::centered_in(Region::full(1280, 720), 896, 360);
        assert_eq!(region.x, 192);
        assert_eq!(region.y, 180);

        let clamped = Region::centered_in(Region::full(100, 100), 500, 50);
        assert_eq!(clamped.width, 100);
        assert_eq!(clamped.x, 0);
    }
}
