use anyhow::Result;
use serde::Deserialize;

use crate::detect::result::FaceBox;
use crate::frame::{FrameDescriptor, PixelFormat};

/// Speed/accuracy trade-off requested from a backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMode {
    #[default]
    Fast,
    Accurate,
}

/// Options handed to a backend when it is created.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorOptions {
    pub performance_mode: PerformanceMode,
    /// Smallest face to report, as a fraction of the image width.
    pub min_face_size: f32,
    /// Ask the backend to keep face identities across frames.
    pub tracking: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            performance_mode: PerformanceMode::Fast,
            min_face_size: 0.15,
            tracking: false,
        }
    }
}

/// Face detector backend.
///
/// The analyzer owns exactly one backend and calls it from its worker thread, one
/// frame at a time. Implementations must treat the pixel slice as read-only and
/// must not keep it past the call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Detect faces in a frame.
    ///
    /// Boxes are reported in the coordinates of the unrotated buffer; `descriptor`
    /// carries the rotation for backends that need upright input.
    fn detect(
        &mut self,
        pixels: &[u8],
        descriptor: &FrameDescriptor,
        format: PixelFormat,
    ) -> Result<Vec<FaceBox>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release model resources. Called once when the analyzer shuts down.
    fn close(&mut self) {}
}
