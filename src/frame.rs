//! Camera frame container.
//!
//! - `RawFrame`: pixel buffer handed over by the camera. Bytes are private and the
//!   frame is released back to its source exactly once.
//! - `FrameDescriptor`: immutable width/height/rotation metadata for one frame.
//! - `Rotation`: sensor-to-display rotation in quarter turns.
//!
//! Detectors read pixels through `RawFrame::pixels()` for the duration of a call.
//! Releasing a frame zeroizes its buffer and runs the source's release hook.

use anyhow::{anyhow, Result};
use std::borrow::Cow;
use std::fmt;
use zeroize::Zeroize;

// ----------------------------------------------------------------------------
// Rotation / FrameDescriptor
// ----------------------------------------------------------------------------

/// Clockwise rotation of the sensor buffer relative to upright display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse a rotation in degrees. Any multiple of 90 is accepted (normalized mod 360).
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(anyhow!(
                "rotation must be a multiple of 90 degrees, got {}",
                degrees
            ));
        }
        Ok(Self::from_quarter_turns(degrees / 90))
    }

    pub fn from_quarter_turns(turns: i32) -> Self {
        match turns.rem_euclid(4) {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
}

impl FrameDescriptor {
    pub fn new(width: u32, height: u32, rotation: Rotation) -> Self {
        Self {
            width,
            height,
            rotation,
        }
    }
}

/// Layout of the pixel buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    /// One luma byte per pixel.
    #[default]
    Gray8,
    Rgb24,
    /// Luma plane followed by interleaved half-resolution chroma.
    Nv12,
}

// ----------------------------------------------------------------------------
// RawFrame
// ----------------------------------------------------------------------------

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// One camera frame. Not `Clone`: the frame is owned by exactly one stage at a time
/// and goes back to the camera through `release` (or on drop).
pub struct RawFrame {
    /// Private pixel data. `None` when the camera delivered no image.
    data: Option<Vec<u8>>,

    pub descriptor: FrameDescriptor,
    pub format: PixelFormat,

    release: Option<ReleaseHook>,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, descriptor: FrameDescriptor, format: PixelFormat) -> Self {
        Self {
            data: Some(data),
            descriptor,
            format,
            release: None,
        }
    }

    /// A frame whose image could not be acquired.
    pub fn empty(descriptor: FrameDescriptor) -> Self {
        Self {
            data: None,
            descriptor,
            format: PixelFormat::default(),
            release: None,
        }
    }

    /// Install the callback that hands the buffer back to the camera pipeline.
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    /// Pixel bytes, or `None` if the frame carries no image data.
    pub fn pixels(&self) -> Option<&[u8]> {
        self.data.as_deref().filter(|data| !data.is_empty())
    }

    pub fn has_pixels(&self) -> bool {
        self.pixels().is_some()
    }

    /// Return the frame to its source. Consumes the frame, so it can only happen once.
    pub fn release(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(mut data) = self.data.take() {
            data.zeroize();
        }
        if let Some(hook) = self.release.take() {
            hook();
        }
    }
}

impl Drop for RawFrame {
    fn drop(&mut self) {
        // No-op when `release` already ran.
        self.release_now();
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("descriptor", &self.descriptor)
            .field("format", &self.format)
            .field("has_pixels", &self.has_pixels())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Luma extraction
// ----------------------------------------------------------------------------

/// Validate a pixel buffer and return its luma plane (`width * height` bytes).
///
/// Gray8 and NV12 buffers are borrowed; RGB is converted with BT.601 weights.
pub fn luma_plane(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Cow<'_, [u8]>> {
    let plane = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

    match format {
        PixelFormat::Gray8 => {
            expect_len(pixels, plane, "Gray8")?;
            Ok(Cow::Borrowed(pixels))
        }
        PixelFormat::Nv12 => {
            let expected = plane
                .checked_add(plane / 2)
                .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
            expect_len(pixels, expected, "NV12")?;
            Ok(Cow::Borrowed(&pixels[..plane]))
        }
        PixelFormat::Rgb24 => {
            let expected = plane
                .checked_mul(3)
                .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
            expect_len(pixels, expected, "RGB")?;
            let luma = pixels
                .chunks_exact(3)
                .map(|px| {
                    let y = 0.299_f32 * px[0] as f32
                        + 0.587_f32 * px[1] as f32
                        + 0.114_f32 * px[2] as f32;
                    y.round().clamp(0.0, 255.0) as u8
                })
                .collect();
            Ok(Cow::Owned(luma))
        }
    }
}

fn expect_len(pixels: &[u8], expected: usize, label: &str) -> Result<()> {
    if pixels.len() != expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            label,
            expected,
            pixels.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counted_frame(counter: &Arc<AtomicUsize>, data: Vec<u8>) -> RawFrame {
        let counter = counter.clone();
        RawFrame::new(
            data,
            FrameDescriptor::new(2, 2, Rotation::Deg0),
            PixelFormat::Gray8,
        )
        .with_release_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn explicit_release_runs_hook_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let frame = counted_frame(&counter, vec![1, 2, 3, 4]);
        frame.release();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_unreleased_frame() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let _frame = counted_frame(&counter, vec![1, 2, 3, 4]);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_frame_has_no_pixels() {
        let frame = RawFrame::empty(FrameDescriptor::new(640, 480, Rotation::Deg90));
        assert!(!frame.has_pixels());

        let zero_len = RawFrame::new(
            Vec::new(),
            FrameDescriptor::new(640, 480, Rotation::Deg0),
            PixelFormat::Gray8,
        );
        assert!(zero_len.pixels().is_none());
    }

    #[test]
    fn rotation_parsing() -> Result<()> {
        assert_eq!(Rotation::from_degrees(0)?, Rotation::Deg0);
        assert_eq!(Rotation::from_degrees(270)?, Rotation::Deg270);
        assert_eq!(Rotation::from_degrees(450)?, Rotation::Deg90);
        assert_eq!(Rotation::from_degrees(-90)?, Rotation::Deg270);
        assert!(Rotation::from_degrees(45).is_err());
        Ok(())
    }

    #[test]
    fn nv12_luma_is_borrowed_y_plane() -> Result<()> {
        let nv12 = [vec![7u8; 4], vec![128u8; 2]].concat();
        let luma = luma_plane(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert!(matches!(luma, Cow::Borrowed(_)));
        assert_eq!(&*luma, &[7u8; 4]);
        Ok(())
    }

    #[test]
    fn rgb_luma_conversion() -> Result<()> {
        let rgb = vec![255u8, 255, 255, 0, 0, 0];
        let luma = luma_plane(&rgb, 2, 1, PixelFormat::Rgb24)?;
        assert_eq!(&*luma, &[255u8, 0]);
        Ok(())
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(luma_plane(&[0u8; 3], 2, 2, PixelFormat::Gray8).is_err());
        assert!(luma_plane(&[0u8; 4], 2, 2, PixelFormat::Nv12).is_err());
    }
}
