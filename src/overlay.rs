//! Overlay renderer.
//!
//! The analyzer thread writes the latest face position into a `PositionCell`; the
//! UI thread reads it when it paints. The cell is a single atomic word, so a
//! reader never observes half of an update and the last completed write wins.
//!
//! Pixel positions and the marker radius are derived from the view size passed to
//! `render`, never from a size remembered at `set_position` time.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::mapping::{NormalizedPosition, ViewGeometry};

/// Bit pattern meaning "no face". Both halves are NaN, which a clamped position
/// never contains.
const ABSENT: u64 = u64::MAX;

// ----------------------------------------------------------------------------
// PositionCell: cross-thread single-slot holder
// ----------------------------------------------------------------------------

/// Latest normalized face position, shared between analyzer and UI thread.
#[derive(Debug)]
pub struct PositionCell {
    packed: AtomicU64,
    generation: AtomicU64,
}

impl PositionCell {
    pub fn new() -> Self {
        Self {
            packed: AtomicU64::new(ABSENT),
            generation: AtomicU64::new(0),
        }
    }

    /// Overwrite the current position. Non-finite positions are stored as absent.
    pub fn store(&self, position: Option<NormalizedPosition>) {
        let position = position
            .filter(NormalizedPosition::is_finite)
            .map(|p| NormalizedPosition::clamped(p.x, p.y));
        self.packed.store(pack(position), Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn load(&self) -> Option<NormalizedPosition> {
        unpack(self.packed.load(Ordering::Acquire))
    }

    /// Number of stores so far; changes whenever a repaint is due.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for PositionCell {
    fn default() -> Self {
        Self::new()
    }
}

fn pack(position: Option<NormalizedPosition>) -> u64 {
    match position {
        Some(p) => ((p.x.to_bits() as u64) << 32) | p.y.to_bits() as u64,
        None => ABSENT,
    }
}

fn unpack(bits: u64) -> Option<NormalizedPosition> {
    if bits == ABSENT {
        return None;
    }
    Some(NormalizedPosition::new(
        f32::from_bits((bits >> 32) as u32),
        f32::from_bits(bits as u32),
    ))
}

/// Current display surface size, written by the UI thread on resize and read by
/// the analyzer when it maps a detection.
#[derive(Debug, Default)]
pub struct SharedViewGeometry {
    packed: AtomicU64,
}

impl SharedViewGeometry {
    pub fn new(view: ViewGeometry) -> Self {
        Self {
            packed: AtomicU64::new(pack_view(view)),
        }
    }

    pub fn set(&self, view: ViewGeometry) {
        self.packed.store(pack_view(view), Ordering::Release);
    }

    pub fn get(&self) -> ViewGeometry {
        let bits = self.packed.load(Ordering::Acquire);
        ViewGeometry::new((bits >> 32) as u32, bits as u32)
    }
}

fn pack_view(view: ViewGeometry) -> u64 {
    ((view.width as u64) << 32) | view.height as u64
}

// ----------------------------------------------------------------------------
// Marker / Canvas
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerStyle {
    /// Radius as a fraction of the view width.
    pub radius_fraction: f32,
    /// Floor for very small views, in pixels.
    pub min_radius: f32,
    pub color: [u8; 3],
}

impl MarkerStyle {
    pub fn radius_for(&self, view_width: u32) -> f32 {
        (view_width as f32 * self.radius_fraction).max(self.min_radius)
    }
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            radius_fraction: 0.028,
            min_radius: 4.0,
            color: [255, 0, 0],
        }
    }
}

/// Marker geometry resolved for one draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// Drawing surface the overlay paints into.
pub trait Canvas {
    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: [u8; 3]);
}

/// In-memory RGB canvas.
pub struct RasterCanvas {
    image: RgbImage,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.image.get_pixel_checked(x, y).map(|px| px.0)
    }

    pub fn clear(&mut self) {
        for px in self.image.pixels_mut() {
            *px = Rgb([0, 0, 0]);
        }
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    /// Write the canvas as a JPEG snapshot.
    pub fn save_jpeg(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Jpeg)
            .map_err(|e| anyhow!("failed to write snapshot {}: {}", path.display(), e))
    }
}

impl Canvas for RasterCanvas {
    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: [u8; 3]) {
        if !(cx.is_finite() && cy.is_finite() && radius.is_finite()) || radius <= 0.0 {
            return;
        }
        let (w, h) = (self.image.width() as f32, self.image.height() as f32);
        let x0 = (cx - radius).floor().clamp(0.0, w) as u32;
        let x1 = (cx + radius).ceil().clamp(0.0, w) as u32;
        let y0 = (cy - radius).floor().clamp(0.0, h) as u32;
        let y1 = (cy + radius).ceil().clamp(0.0, h) as u32;
        let r2 = radius * radius;
        for y in y0..y1 {
            let dy = y as f32 + 0.5 - cy;
            for x in x0..x1 {
                let dx = x as f32 + 0.5 - cx;
                if dx * dx + dy * dy <= r2 {
                    self.image.put_pixel(x, y, Rgb(color));
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// OverlayRenderer
// ----------------------------------------------------------------------------

/// Paints a marker at the latest face position. Owned by the UI thread.
pub struct OverlayRenderer {
    cell: Arc<PositionCell>,
    style: MarkerStyle,
    seen_generation: u64,
}

impl OverlayRenderer {
    pub fn new(style: MarkerStyle) -> Self {
        Self {
            cell: Arc::new(PositionCell::new()),
            style,
            seen_generation: 0,
        }
    }

    /// Writer side for the analyzer thread.
    pub fn handle(&self) -> OverlayHandle {
        OverlayHandle {
            cell: self.cell.clone(),
        }
    }

    pub fn style(&self) -> &MarkerStyle {
        &self.style
    }

    pub fn set_position(&self, position: Option<NormalizedPosition>) {
        self.cell.store(position);
    }

    pub fn position(&self) -> Option<NormalizedPosition> {
        self.cell.load()
    }

    /// Returns true once per batch of position updates since the last call.
    pub fn take_redraw_request(&mut self) -> bool {
        let generation = self.cell.generation();
        if generation == self.seen_generation {
            return false;
        }
        self.seen_generation = generation;
        true
    }

    /// Marker geometry for a view of the given size, if anything should be drawn.
    pub fn marker(&self, view: ViewGeometry) -> Option<Marker> {
        if view.is_empty() {
            return None;
        }
        let (x, y) = self.cell.load()?.to_pixels(view);
        Some(Marker {
            x,
            y,
            radius: self.style.radius_for(view.width),
        })
    }

    /// Draw the marker for the current position. Draws nothing when absent.
    pub fn render<C: Canvas + ?Sized>(&self, canvas: &mut C, view_width: u32, view_height: u32) {
        if let Some(marker) = self.marker(ViewGeometry::new(view_width, view_height)) {
            canvas.fill_circle(marker.x, marker.y, marker.radius, self.style.color);
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(MarkerStyle::default())
    }
}

/// Cloneable writer for the overlay position.
#[derive(Clone, Debug)]
pub struct OverlayHandle {
    cell: Arc<PositionCell>,
}

impl OverlayHandle {
    /// Replace the current position and request a repaint.
    pub fn set_position(&self, position: Option<NormalizedPosition>) {
        self.cell.store(position);
    }

    pub fn position(&self) -> Option<NormalizedPosition> {
        self.cell.load()
    }
}
