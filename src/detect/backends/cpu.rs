use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectorBackend, DetectorOptions, PerformanceMode};
use crate::detect::result::FaceBox;
use crate::frame::{luma_plane, FrameDescriptor, PixelFormat};

/// Luma level a pixel must reach to count as part of the subject.
const LUMA_THRESHOLD: u8 = 200;

/// CPU backend that reports the bounding box of the bright region in the frame.
///
/// This is a stand-in for a real face model: it works against the synthetic camera
/// (a bright square on a dark background) and against lit subjects in front of a
/// dark backdrop. At most one box is reported.
pub struct CpuBackend {
    options: DetectorOptions,
    closed: bool,
}

impl CpuBackend {
    pub fn new(options: DetectorOptions) -> Self {
        Self {
            options,
            closed: false,
        }
    }

    fn stride(&self) -> usize {
        match self.options.performance_mode {
            PerformanceMode::Fast => 2,
            PerformanceMode::Accurate => 1,
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new(DetectorOptions::default())
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(
        &mut self,
        pixels: &[u8],
        descriptor: &FrameDescriptor,
        format: PixelFormat,
    ) -> Result<Vec<FaceBox>> {
        if self.closed {
            return Err(anyhow!("cpu detector is closed"));
        }
        let width = descriptor.width as usize;
        let height = descriptor.height as usize;
        let luma = luma_plane(pixels, descriptor.width, descriptor.height, format)?;
        let stride = self.stride();

        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for y in (0..height).step_by(stride) {
            let row = &luma[y * width..(y + 1) * width];
            for x in (0..width).step_by(stride) {
                if row[x] < LUMA_THRESHOLD {
                    continue;
                }
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }

        let Some((x0, y0, x1, y1)) = bounds else {
            return Ok(Vec::new());
        };
        let face = FaceBox::new(x0 as i32, y0 as i32, (x1 + 1) as i32, (y1 + 1) as i32);

        let min_width = self.options.min_face_size * descriptor.width as f32;
        if (face.width() as f32) < min_width {
            log::trace!(
                "cpu detector: region {}px wide below minimum {:.0}px",
                face.width(),
                min_width
            );
            return Ok(Vec::new());
        }
        Ok(vec![face])
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
