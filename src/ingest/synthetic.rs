//! Synthetic camera.
//!
//! Produces Gray8 frames with a bright square moving over a dark, noisy background,
//! so the pipeline runs end to end without camera hardware. The square stands in
//! for a face; its center in buffer pixels is known for every frame.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::frame::{FrameDescriptor, PixelFormat, RawFrame, Rotation};

const BACKGROUND_MAX: u8 = 64;
const SUBJECT_LUMA: u8 = 240;

/// Configuration for the synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub target_fps: u32,
    /// Side of the square as a fraction of the frame width.
    pub subject_size: f32,
    /// Every n-th frame arrives without pixel data.
    pub empty_every: Option<u64>,
    /// Every n-th frame shows only background.
    pub vacant_every: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            rotation: Rotation::Deg90,
            target_fps: 15,
            subject_size: 0.25,
            empty_every: None,
            vacant_every: None,
        }
    }
}

/// Counters shared with release hooks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub frames_released: u64,
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    rng: StdRng,
    released: Arc<AtomicU64>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic source for reproducible runs.
    pub fn with_seed(config: SyntheticConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SyntheticConfig, rng: StdRng) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic frame dimensions must be non-zero"));
        }
        if config.target_fps == 0 {
            return Err(anyhow!("synthetic target_fps must be >= 1"));
        }
        if !(config.subject_size > 0.0 && config.subject_size <= 1.0) {
            return Err(anyhow!("synthetic subject_size must be in (0, 1]"));
        }
        Ok(Self {
            config,
            frame_count: 0,
            rng,
            released: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.target_fps as f64)
    }

    pub fn descriptor(&self) -> FrameDescriptor {
        FrameDescriptor::new(self.config.width, self.config.height, self.config.rotation)
    }

    /// Capture the next frame.
    pub fn next_frame(&mut self) -> RawFrame {
        self.frame_count += 1;
        let index = self.frame_count;
        let descriptor = self.descriptor();

        let frame = if every(self.config.empty_every, index) {
            RawFrame::empty(descriptor)
        } else {
            let pixels = self.render(index);
            RawFrame::new(pixels, descriptor, PixelFormat::Gray8)
        };

        let released = self.released.clone();
        frame.with_release_hook(move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }

    /// Whether frame `index` (1-based) shows the subject.
    pub fn subject_visible(&self, index: u64) -> bool {
        !every(self.config.empty_every, index) && !every(self.config.vacant_every, index)
    }

    /// Subject center in buffer pixels for frame `index`.
    pub fn subject_center(&self, index: u64) -> (f32, f32) {
        let (w, h) = (self.config.width as f32, self.config.height as f32);
        let t = index as f32 * 0.05;
        (w * 0.5 + w * 0.25 * t.cos(), h * 0.5 + h * 0.25 * (t * 0.7).sin())
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            frames_released: self.released.load(Ordering::SeqCst),
        }
    }

    fn render(&mut self, index: u64) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels: Vec<u8> = (0..width * height)
            .map(|_| self.rng.gen_range(0..BACKGROUND_MAX))
            .collect();

        if every(self.config.vacant_every, index) {
            return pixels;
        }

        let (cx, cy) = self.subject_center(index);
        let half = self.config.subject_size * self.config.width as f32 * 0.5;
        let x0 = (cx - half).max(0.0) as usize;
        let x1 = ((cx + half).max(0.0) as usize).min(width);
        let y0 = (cy - half).max(0.0) as usize;
        let y1 = ((cy + half).max(0.0) as usize).min(height);
        for y in y0..y1 {
            pixels[y * width + x0..y * width + x1].fill(SUBJECT_LUMA);
        }
        pixels
    }
}

fn every(period: Option<u64>, index: u64) -> bool {
    matches!(period, Some(n) if n > 0 && index % n == 0)
}
