//! Camera-image to view-space coordinate mapping.
//!
//! A raw face position in sensor-buffer pixels becomes a normalized `[0,1]²` view
//! position in three steps:
//!
//! 1. normalize against the unrotated buffer size,
//! 2. apply an `OrientationTransform` (axis swap plus mirrors) looked up from the
//!    frame's rotation and the camera facing, or pinned for the session,
//! 3. compensate for the aspect-ratio mismatch between the upright image and the
//!    view according to the preview's `ScaleMode`,
//!
//! and is finally clamped. Degenerate geometry yields `None`; callers skip drawing.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::str::FromStr;

use crate::frame::{FrameDescriptor, Rotation};

/// Position expressed as a fraction of the view size on each axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedPosition {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPosition {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Build a position clamped into `[0,1]²`.
    pub fn clamped(x: f32, y: f32) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Pixel location inside a view of the given size.
    pub fn to_pixels(self, view: ViewGeometry) -> (f32, f32) {
        (self.x * view.width as f32, self.y * view.height as f32)
    }
}

/// Size of the display surface in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewGeometry {
    pub width: u32,
    pub height: u32,
}

impl ViewGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Parse `WIDTHxHEIGHT`, e.g. `1080x1920`.
    pub fn parse(value: &str) -> Result<Self> {
        let (w, h) = value
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow!("view size must look like WIDTHxHEIGHT, got '{}'", value))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid view width '{}'", w))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid view height '{}'", h))?;
        Ok(Self { width, height })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl FromStr for CameraFacing {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "back" | "rear" => Ok(Self::Back),
            "front" | "selfie" => Ok(Self::Front),
            other => Err(anyhow!("unknown camera facing '{}'", other)),
        }
    }
}

/// How the camera preview is fitted into the view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Scale to cover the view and crop the overflow around the center.
    #[default]
    Fill,
    /// Scale to fit inside the view, leaving bars on the short axis.
    Fit,
}

// ----------------------------------------------------------------------------
// Orientation
// ----------------------------------------------------------------------------

/// Axis swap and mirrors taking normalized buffer coordinates to display orientation.
///
/// Applied in order: swap, mirror x, mirror y.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct OrientationTransform {
    #[serde(default)]
    pub swap_axes: bool,
    #[serde(default)]
    pub mirror_x: bool,
    #[serde(default)]
    pub mirror_y: bool,
}

impl OrientationTransform {
    pub const IDENTITY: Self = Self {
        swap_axes: false,
        mirror_x: false,
        mirror_y: false,
    };

    /// Transform for a buffer with the given relative rotation.
    ///
    /// | rotation | back camera           | front camera              |
    /// |----------|-----------------------|---------------------------|
    /// | 0        | identity              | mirror x                  |
    /// | 90, 270  | swap, mirror y        | swap, mirror x, mirror y  |
    /// | 180      | mirror x, mirror y    | mirror y                  |
    pub fn for_rotation(rotation: Rotation, facing: CameraFacing) -> Self {
        let base = match rotation {
            Rotation::Deg0 => Self::IDENTITY,
            Rotation::Deg180 => Self {
                swap_axes: false,
                mirror_x: true,
                mirror_y: true,
            },
            Rotation::Deg90 | Rotation::Deg270 => Self {
                swap_axes: true,
                mirror_x: false,
                mirror_y: true,
            },
        };
        match facing {
            CameraFacing::Back => base,
            CameraFacing::Front => base.mirrored_horizontally(),
        }
    }

    /// Resolve the transform for a camera session.
    pub fn resolve(
        facing: CameraFacing,
        sensor_orientation: Rotation,
        device_rotation: Rotation,
    ) -> Self {
        Self::for_rotation(
            relative_rotation(facing, sensor_orientation, device_rotation),
            facing,
        )
    }

    fn mirrored_horizontally(self) -> Self {
        Self {
            mirror_x: !self.mirror_x,
            ..self
        }
    }

    pub fn apply(self, x: f32, y: f32) -> (f32, f32) {
        let (mut x, mut y) = if self.swap_axes { (y, x) } else { (x, y) };
        if self.mirror_x {
            x = 1.0 - x;
        }
        if self.mirror_y {
            y = 1.0 - y;
        }
        (x, y)
    }
}

/// Rotation of the sensor buffer relative to the display for the current device pose.
pub fn relative_rotation(
    facing: CameraFacing,
    sensor_orientation: Rotation,
    device_rotation: Rotation,
) -> Rotation {
    let sensor = sensor_orientation.degrees();
    let device = device_rotation.degrees();
    let degrees = match facing {
        CameraFacing::Back => sensor - device,
        CameraFacing::Front => sensor + device,
    };
    Rotation::from_quarter_turns(degrees.rem_euclid(360) / 90)
}

// ----------------------------------------------------------------------------
// Mapper
// ----------------------------------------------------------------------------

/// Session-scoped mapping parameters.
///
/// The orientation transform is resolved per frame from the frame's own rotation
/// and the camera facing, unless a fixed transform has been pinned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mapper {
    pub facing: CameraFacing,
    pub transform_override: Option<OrientationTransform>,
    pub scale_mode: ScaleMode,
}

impl Mapper {
    pub fn new(facing: CameraFacing, scale_mode: ScaleMode) -> Self {
        Self {
            facing,
            transform_override: None,
            scale_mode,
        }
    }

    pub fn transform_for(&self, rotation: Rotation) -> OrientationTransform {
        self.transform_override
            .unwrap_or_else(|| OrientationTransform::for_rotation(rotation, self.facing))
    }

    pub fn map(
        &self,
        raw_x: f32,
        raw_y: f32,
        descriptor: &FrameDescriptor,
        view: ViewGeometry,
    ) -> Option<NormalizedPosition> {
        map_to_view(
            raw_x,
            raw_y,
            descriptor.width,
            descriptor.height,
            self.transform_for(descriptor.rotation),
            self.scale_mode,
            view,
        )
    }
}

/// Map a raw buffer coordinate into normalized view space.
///
/// Returns `None` when any dimension is zero or the raw coordinate is not finite.
pub fn map_to_view(
    raw_x: f32,
    raw_y: f32,
    image_width: u32,
    image_height: u32,
    transform: OrientationTransform,
    scale_mode: ScaleMode,
    view: ViewGeometry,
) -> Option<NormalizedPosition> {
    if image_width == 0 || image_height == 0 || view.is_empty() {
        return None;
    }
    if !raw_x.is_finite() || !raw_y.is_finite() {
        return None;
    }

    let nx = raw_x / image_width as f32;
    let ny = raw_y / image_height as f32;
    let (x, y) = transform.apply(nx, ny);

    let (upright_w, upright_h) = if transform.swap_axes {
        (image_height, image_width)
    } else {
        (image_width, image_height)
    };
    let image_aspect = upright_w as f32 / upright_h as f32;
    let view_aspect = view.width as f32 / view.height as f32;
    let (x, y) = compensate_aspect(x, y, image_aspect, view_aspect, scale_mode);

    Some(NormalizedPosition::clamped(x, y))
}

/// Map using the degrees-based contract: back camera, center-crop preview.
///
/// Rotations other than 0/90/180/270 (mod 360) have no mapping.
pub fn map(
    raw_x: f32,
    raw_y: f32,
    image_width: u32,
    image_height: u32,
    rotation_degrees: i32,
    view_width: u32,
    view_height: u32,
) -> Option<NormalizedPosition> {
    let rotation = Rotation::from_degrees(rotation_degrees).ok()?;
    Mapper::new(CameraFacing::Back, ScaleMode::Fill).map(
        raw_x,
        raw_y,
        &FrameDescriptor::new(image_width, image_height, rotation),
        ViewGeometry::new(view_width, view_height),
    )
}

fn compensate_aspect(
    x: f32,
    y: f32,
    image_aspect: f32,
    view_aspect: f32,
    mode: ScaleMode,
) -> (f32, f32) {
    if image_aspect > view_aspect {
        let ratio = image_aspect / view_aspect;
        match mode {
            ScaleMode::Fill => (rescale(x, ratio), y),
            ScaleMode::Fit => (x, rescale(y, 1.0 / ratio)),
        }
    } else if image_aspect < view_aspect {
        let ratio = view_aspect / image_aspect;
        match mode {
            ScaleMode::Fill => (x, rescale(y, ratio)),
            ScaleMode::Fit => (rescale(x, 1.0 / ratio), y),
        }
    } else {
        (x, y)
    }
}

fn rescale(value: f32, factor: f32) -> f32 {
    (value - 0.5) * factor + 0.5
}
