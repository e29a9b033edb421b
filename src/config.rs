use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::detect::{DetectorOptions, PerformanceMode};
use crate::frame::Rotation;
use crate::mapping::{
    relative_rotation, CameraFacing, Mapper, OrientationTransform, ScaleMode, ViewGeometry,
};
use crate::overlay::MarkerStyle;

const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 15;
const DEFAULT_SENSOR_ORIENTATION: i32 = 90;
const DEFAULT_DEVICE_ROTATION: i32 = 0;
const DEFAULT_BACKEND: &str = "cpu";
const DEFAULT_VIEW_WIDTH: u32 = 1080;
const DEFAULT_VIEW_HEIGHT: u32 = 1920;

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    mapping: Option<MappingConfigFile>,
    marker: Option<MarkerConfigFile>,
    view: Option<ViewConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    facing: Option<CameraFacing>,
    sensor_orientation: Option<i32>,
    device_rotation: Option<i32>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    performance_mode: Option<PerformanceMode>,
    min_face_size: Option<f32>,
    tracking: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct MappingConfigFile {
    scale_mode: Option<ScaleMode>,
    transform: Option<OrientationTransform>,
}

#[derive(Debug, Deserialize, Default)]
struct MarkerConfigFile {
    radius_fraction: Option<f32>,
    min_radius: Option<f32>,
    color: Option<[u8; 3]>,
}

#[derive(Debug, Deserialize, Default)]
struct ViewConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub mapping: MappingSettings,
    pub marker: MarkerStyle,
    pub view: ViewGeometry,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub facing: CameraFacing,
    pub sensor_orientation: Rotation,
    pub device_rotation: Rotation,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub options: DetectorOptions,
}

#[derive(Debug, Clone)]
pub struct MappingSettings {
    pub scale_mode: ScaleMode,
    /// Pins the orientation transform instead of deriving it from the camera pose.
    pub transform_override: Option<OrientationTransform>,
}

impl TrackerConfig {
    /// Load from `HEADTRACKER_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HEADTRACKER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Built-in defaults, ignoring file and environment.
    pub fn defaults() -> Result<Self> {
        let mut cfg = Self::from_file(TrackerConfigFile::default())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TrackerConfigFile) -> Result<Self> {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            facing: camera_file.facing.unwrap_or_default(),
            sensor_orientation: Rotation::from_degrees(
                camera_file
                    .sensor_orientation
                    .unwrap_or(DEFAULT_SENSOR_ORIENTATION),
            )?,
            device_rotation: Rotation::from_degrees(
                camera_file.device_rotation.unwrap_or(DEFAULT_DEVICE_ROTATION),
            )?,
            width: camera_file.width.unwrap_or(DEFAULT_FRAME_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
        };

        let detector_file = file.detector.unwrap_or_default();
        let defaults = DetectorOptions::default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            options: DetectorOptions {
                performance_mode: detector_file
                    .performance_mode
                    .unwrap_or(defaults.performance_mode),
                min_face_size: detector_file.min_face_size.unwrap_or(defaults.min_face_size),
                tracking: detector_file.tracking.unwrap_or(defaults.tracking),
            },
        };

        let mapping = file
            .mapping
            .map(|mapping| MappingSettings {
                scale_mode: mapping.scale_mode.unwrap_or_default(),
                transform_override: mapping.transform,
            })
            .unwrap_or(MappingSettings {
                scale_mode: ScaleMode::default(),
                transform_override: None,
            });

        let marker_defaults = MarkerStyle::default();
        let marker = file
            .marker
            .map(|marker| MarkerStyle {
                radius_fraction: marker
                    .radius_fraction
                    .unwrap_or(marker_defaults.radius_fraction),
                min_radius: marker.min_radius.unwrap_or(marker_defaults.min_radius),
                color: marker.color.unwrap_or(marker_defaults.color),
            })
            .unwrap_or(marker_defaults);

        let view = ViewGeometry::new(
            file.view
                .as_ref()
                .and_then(|view| view.width)
                .unwrap_or(DEFAULT_VIEW_WIDTH),
            file.view
                .as_ref()
                .and_then(|view| view.height)
                .unwrap_or(DEFAULT_VIEW_HEIGHT),
        );

        Ok(Self {
            camera,
            detector,
            mapping,
            marker,
            view,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("HEADTRACKER_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(facing) = std::env::var("HEADTRACKER_CAMERA_FACING") {
            if !facing.trim().is_empty() {
                self.camera.facing = facing.parse()?;
            }
        }
        if let Ok(rotation) = std::env::var("HEADTRACKER_DEVICE_ROTATION") {
            let degrees: i32 = rotation.trim().parse().map_err(|_| {
                anyhow!("HEADTRACKER_DEVICE_ROTATION must be an integer number of degrees")
            })?;
            self.camera.device_rotation = Rotation::from_degrees(degrees)?;
        }
        if let Ok(size) = std::env::var("HEADTRACKER_VIEW_SIZE") {
            if !size.trim().is_empty() {
                self.view = ViewGeometry::parse(&size)?;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera frame dimensions must be greater than zero"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be >= 1"));
        }
        if self.view.is_empty() {
            return Err(anyhow!("view dimensions must be greater than zero"));
        }
        let min_face_size = self.detector.options.min_face_size;
        if !(min_face_size > 0.0 && min_face_size <= 1.0) {
            return Err(anyhow!(
                "detector min_face_size must be in (0, 1], got {}",
                min_face_size
            ));
        }
        if !(self.marker.radius_fraction.is_finite() && self.marker.radius_fraction > 0.0) {
            return Err(anyhow!("marker radius_fraction must be greater than zero"));
        }
        if !(self.marker.min_radius.is_finite() && self.marker.min_radius >= 0.0) {
            return Err(anyhow!("marker min_radius must not be negative"));
        }
        self.detector.backend = self.detector.backend.to_lowercase();
        Ok(())
    }

    /// Rotation of delivered frames for the configured camera pose.
    pub fn frame_rotation(&self) -> Rotation {
        relative_rotation(
            self.camera.facing,
            self.camera.sensor_orientation,
            self.camera.device_rotation,
        )
    }

    /// Orientation transform for frames delivered at the configured camera pose:
    /// the override if pinned, else the lookup for that pose.
    pub fn orientation_transform(&self) -> OrientationTransform {
        self.mapping.transform_override.unwrap_or_else(|| {
            OrientationTransform::resolve(
                self.camera.facing,
                self.camera.sensor_orientation,
                self.camera.device_rotation,
            )
        })
    }

    /// Mapper for this session. Without an override the transform follows each
    /// frame's rotation.
    pub fn mapper(&self) -> Mapper {
        Mapper {
            facing: self.camera.facing,
            transform_override: self.mapping.transform_override,
            scale_mode: self.mapping.scale_mode,
        }
    }
}

fn read_config_file(path: &Path) -> Result<TrackerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: TrackerConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
