//! Head tracker
//!
//! Follows a face in a live camera feed and keeps a marker on top of it.
//!
//! # Architecture
//!
//! Data flows one way:
//!
//! ```text
//! camera ──► LatestFrameSlot ──► FrameAnalyzer ──► Mapper ──► PositionCell ──► OverlayRenderer
//!            (keep latest)       (worker thread)   (pure)     (atomic word)     (UI thread)
//! ```
//!
//! 1. **Frame Analyzer**: runs the face detector on one frame at a time, takes the
//!    first face's bounding-box center and releases the frame exactly once.
//! 2. **Coordinate Mapper**: turns that raw buffer coordinate into a normalized
//!    `[0,1]²` view coordinate (rotation correction, aspect compensation, clamp).
//! 3. **Overlay Renderer**: holds the latest position and paints a marker sized to
//!    the view at draw time.
//!
//! The face model is an external collaborator behind `DetectorBackend`.
//!
//! # Module Structure
//!
//! - `frame`: RawFrame, FrameDescriptor, Rotation, pixel formats
//! - `detect`: detector backends and detection results
//! - `mapping`: orientation lookup and coordinate mapping
//! - `overlay`: cross-thread position cell, marker rendering, canvases
//! - `analyzer`: FrameAnalyzer and its worker thread
//! - `ingest`: keep-only-latest frame slot, synthetic camera
//! - `config`: file + environment configuration

pub mod analyzer;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod mapping;
pub mod overlay;

pub use analyzer::{AnalyzerStats, AnalyzerWorker, FrameAnalyzer, StatsSnapshot};
pub use config::TrackerConfig;
pub use detect::{
    BackendRegistry, CpuBackend, Detection, DetectorBackend, DetectorOptions, FaceBox,
    PerformanceMode, StubBackend, StubResponse,
};
pub use frame::{FrameDescriptor, PixelFormat, RawFrame, Rotation};
pub use ingest::{LatestFrameSlot, SourceStats, SyntheticConfig, SyntheticSource};
pub use mapping::{
    map, map_to_view, relative_rotation, CameraFacing, Mapper, NormalizedPosition,
    OrientationTransform, ScaleMode, ViewGeometry,
};
pub use overlay::{
    Canvas, Marker, MarkerStyle, OverlayHandle, OverlayRenderer, PositionCell, RasterCanvas,
    SharedViewGeometry,
};
