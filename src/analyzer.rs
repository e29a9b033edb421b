//! Frame analyzer.
//!
//! Runs the face detector on each frame, maps the primary face into view space and
//! publishes the result to the overlay. Every frame handed to `analyze` is released
//! exactly once, whatever the outcome. Nothing here is fatal: detector errors,
//! empty frames and degenerate geometry all end as "no marker".

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::detect::{Detection, DetectorBackend};
use crate::frame::{FrameDescriptor, RawFrame};
use crate::ingest::LatestFrameSlot;
use crate::mapping::Mapper;
use crate::overlay::{OverlayHandle, SharedViewGeometry};

/// Counters updated by the analyzer thread.
#[derive(Debug, Default)]
pub struct AnalyzerStats {
    frames_analyzed: AtomicU64,
    empty_frames: AtomicU64,
    faces_detected: AtomicU64,
    detector_failures: AtomicU64,
    unmapped: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_analyzed: u64,
    pub empty_frames: u64,
    pub faces_detected: u64,
    pub detector_failures: u64,
    /// Faces found whose position could not be mapped into the view.
    pub unmapped: u64,
}

impl AnalyzerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            empty_frames: self.empty_frames.load(Ordering::Relaxed),
            faces_detected: self.faces_detected.load(Ordering::Relaxed),
            detector_failures: self.detector_failures.load(Ordering::Relaxed),
            unmapped: self.unmapped.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct FrameAnalyzer {
    detector: Box<dyn DetectorBackend>,
    mapper: Mapper,
    view: Arc<SharedViewGeometry>,
    overlay: OverlayHandle,
    stopped: Arc<AtomicBool>,
    stats: Arc<AnalyzerStats>,
    detector_closed: bool,
}

impl FrameAnalyzer {
    pub fn new(
        detector: Box<dyn DetectorBackend>,
        mapper: Mapper,
        view: Arc<SharedViewGeometry>,
        overlay: OverlayHandle,
    ) -> Self {
        Self {
            detector,
            mapper,
            view,
            overlay,
            stopped: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(AnalyzerStats::default()),
            detector_closed: false,
        }
    }

    pub fn stats(&self) -> Arc<AnalyzerStats> {
        self.stats.clone()
    }

    /// Flag that, once set, turns further frames and pending results into no-ops.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stopped.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Analyze one frame and publish the outcome. Always releases the frame.
    pub fn analyze(&mut self, frame: RawFrame) {
        if self.is_stopped() {
            frame.release();
            return;
        }

        let descriptor = frame.descriptor;
        let outcome = self.detect(&frame);
        frame.release();

        let Some(detection) = outcome else {
            AnalyzerStats::bump(&self.stats.empty_frames);
            log::debug!(
                "frame {}x{} without pixel data skipped",
                descriptor.width,
                descriptor.height
            );
            return;
        };
        self.publish(detection, &descriptor);
        AnalyzerStats::bump(&self.stats.frames_analyzed);
    }

    /// `None` when the frame carries no pixels.
    fn detect(&mut self, frame: &RawFrame) -> Option<Detection> {
        let pixels = frame.pixels()?;
        match self.detector.detect(pixels, &frame.descriptor, frame.format) {
            Ok(faces) => Some(Detection::from_faces(&faces)),
            Err(err) => {
                AnalyzerStats::bump(&self.stats.detector_failures);
                log::warn!("face detection failed ({}): {}", self.detector.name(), err);
                Some(Detection::NoFace)
            }
        }
    }

    fn publish(&self, detection: Detection, descriptor: &FrameDescriptor) {
        if self.is_stopped() {
            log::debug!("analyzer stopped; discarding {:?}", detection);
            return;
        }
        let position = match detection {
            Detection::NoFace => None,
            Detection::Face { center_x, center_y } => {
                AnalyzerStats::bump(&self.stats.faces_detected);
                let view = self.view.get();
                let mapped = self.mapper.map(center_x, center_y, descriptor, view);
                if mapped.is_none() {
                    AnalyzerStats::bump(&self.stats.unmapped);
                    log::debug!(
                        "no mapping for face at ({:.1}, {:.1}) in {}x{} at {} onto {}x{} view",
                        center_x,
                        center_y,
                        descriptor.width,
                        descriptor.height,
                        descriptor.rotation,
                        view.width,
                        view.height
                    );
                } else {
                    log::trace!("face at ({:.1}, {:.1}) -> {:?}", center_x, center_y, mapped);
                }
                mapped
            }
        };
        self.overlay.set_position(position);
    }

    /// Stop accepting frames and release the detector.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.close_detector();
    }

    fn close_detector(&mut self) {
        if self.detector_closed {
            return;
        }
        self.detector.close();
        self.detector_closed = true;
        log::info!("detector '{}' closed", self.detector.name());
    }
}

impl Drop for FrameAnalyzer {
    fn drop(&mut self) {
        self.close_detector();
    }
}

// ----------------------------------------------------------------------------
// AnalyzerWorker: dedicated analyzer thread
// ----------------------------------------------------------------------------

/// Runs a `FrameAnalyzer` on its own thread, fed from a `LatestFrameSlot`.
pub struct AnalyzerWorker {
    slot: Arc<LatestFrameSlot>,
    stopped: Arc<AtomicBool>,
    stats: Arc<AnalyzerStats>,
    join: Option<JoinHandle<()>>,
}

impl AnalyzerWorker {
    pub fn spawn(mut analyzer: FrameAnalyzer, slot: Arc<LatestFrameSlot>) -> Result<Self> {
        let stopped = analyzer.stop_flag();
        let stats = analyzer.stats();
        let worker_slot = slot.clone();
        let join = std::thread::Builder::new()
            .name("frame-analyzer".to_string())
            .spawn(move || {
                loop {
                    match worker_slot.take() {
                        Ok(Some(frame)) => analyzer.analyze(frame),
                        Ok(None) => break,
                        Err(err) => {
                            log::error!("frame analyzer stopped: {}", err);
                            break;
                        }
                    }
                }
                analyzer.stop();
            })
            .map_err(|e| anyhow!("failed to spawn analyzer thread: {}", e))?;

        Ok(Self {
            slot,
            stopped,
            stats,
            join: Some(join),
        })
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the worker, release any pending frame and close the detector.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        self.slot.close()?;
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("analyzer thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for AnalyzerWorker {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("analyzer shutdown failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{FaceBox, StubBackend, StubResponse};
    use crate::frame::{PixelFormat, Rotation};
    use crate::mapping::{CameraFacing, NormalizedPosition, ScaleMode, ViewGeometry};
    use crate::overlay::OverlayRenderer;
    use std::sync::atomic::AtomicUsize;

    fn analyzer_with(
        responses: Vec<StubResponse>,
        renderer: &OverlayRenderer,
    ) -> FrameAnalyzer {
        FrameAnalyzer::new(
            Box::new(StubBackend::with_responses(responses)),
            Mapper::new(CameraFacing::Back, ScaleMode::Fill),
            Arc::new(SharedViewGeometry::new(ViewGeometry::new(640, 480))),
            renderer.handle(),
        )
    }

    fn frame(released: &Arc<AtomicUsize>) -> RawFrame {
        let released = released.clone();
        RawFrame::new(
            vec![0u8; 640 * 480],
            FrameDescriptor::new(640, 480, Rotation::Deg0),
            PixelFormat::Gray8,
        )
        .with_release_hook(move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn face_is_mapped_and_published() {
        let renderer = OverlayRenderer::default();
        let released = Arc::new(AtomicUsize::new(0));
        let mut analyzer = analyzer_with(
            vec![StubResponse::Faces(vec![FaceBox::new(140, 100, 180, 140)])],
            &renderer,
        );

        analyzer.analyze(frame(&released));

        assert_eq!(renderer.position(), Some(NormalizedPosition::new(0.25, 0.25)));
        assert_eq!(released.load(Ordering::SeqCst), 1);
        let stats = analyzer.stats().snapshot();
        assert_eq!(stats.frames_analyzed, 1);
        assert_eq!(stats.faces_detected, 1);
    }

    #[test]
    fn no_face_clears_marker() {
        let renderer = OverlayRenderer::default();
        renderer.set_position(Some(NormalizedPosition::new(0.5, 0.5)));
        let released = Arc::new(AtomicUsize::new(0));
        let mut analyzer = analyzer_with(vec![StubResponse::Faces(vec![])], &renderer);

        analyzer.analyze(frame(&released));

        assert_eq!(renderer.position(), None);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detector_failure_is_treated_as_no_face() {
        let renderer = OverlayRenderer::default();
        renderer.set_position(Some(NormalizedPosition::new(0.5, 0.5)));
        let released = Arc::new(AtomicUsize::new(0));
        let mut analyzer =
            analyzer_with(vec![StubResponse::Fail("inference error".into())], &renderer);

        analyzer.analyze(frame(&released));

        assert_eq!(renderer.position(), None);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(analyzer.stats().snapshot().detector_failures, 1);
    }

    #[test]
    fn empty_frame_is_released_without_output() {
        let mut renderer = OverlayRenderer::default();
        let released = Arc::new(AtomicUsize::new(0));
        let mut analyzer = analyzer_with(vec![], &renderer);

        let counter = released.clone();
        let empty = RawFrame::empty(FrameDescriptor::new(640, 480, Rotation::Deg0))
            .with_release_hook(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        analyzer.analyze(empty);

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!renderer.take_redraw_request());
        assert_eq!(analyzer.stats().snapshot().empty_frames, 1);
    }

    #[test]
    fn degenerate_view_suppresses_marker() {
        let renderer = OverlayRenderer::default();
        renderer.set_position(Some(NormalizedPosition::new(0.5, 0.5)));
        let released = Arc::new(AtomicUsize::new(0));
        let mut analyzer = FrameAnalyzer::new(
            Box::new(StubBackend::with_responses(vec![StubResponse::Faces(vec![
                FaceBox::new(0, 0, 10, 10),
            ])])),
            Mapper::default(),
            Arc::new(SharedViewGeometry::new(ViewGeometry::new(0, 0))),
            renderer.handle(),
        );

        analyzer.analyze(frame(&released));

        assert_eq!(renderer.position(), None);
        assert_eq!(analyzer.stats().snapshot().unmapped, 1);
    }

    #[test]
    fn stopped_analyzer_releases_frames_and_publishes_nothing() {
        let mut renderer = OverlayRenderer::default();
        let released = Arc::new(AtomicUsize::new(0));
        let mut analyzer = analyzer_with(
            vec![StubResponse::Faces(vec![FaceBox::new(0, 0, 10, 10)])],
            &renderer,
        );

        analyzer.stop();
        analyzer.analyze(frame(&released));

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!renderer.take_redraw_request());
        assert_eq!(renderer.position(), None);
    }

    #[test]
    fn worker_processes_frames_until_stopped() -> Result<()> {
        let renderer = OverlayRenderer::default();
        let released = Arc::new(AtomicUsize::new(0));
        let analyzer = analyzer_with(
            vec![StubResponse::Faces(vec![FaceBox::new(300, 220, 340, 260)])],
            &renderer,
        );
        let slot = Arc::new(LatestFrameSlot::new());
        let worker = AnalyzerWorker::spawn(analyzer, slot.clone())?;

        slot.offer(frame(&released))?;
        for _ in 0..200 {
            if worker.stats().frames_analyzed == 1 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        worker.stop()?;

        assert_eq!(renderer.position(), Some(NormalizedPosition::new(0.5, 0.5)));
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!slot.offer(frame(&released))?);
        assert_eq!(released.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
