use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::FaceBox;
use crate::frame::{FrameDescriptor, PixelFormat};

/// One scripted reply of the stub backend.
#[derive(Clone, Debug)]
pub enum StubResponse {
    Faces(Vec<FaceBox>),
    Fail(String),
}

/// Stub backend for testing. Replays a script of responses, then reports no faces.
#[derive(Default)]
pub struct StubBackend {
    script: VecDeque<StubResponse>,
    calls: u64,
    closed: bool,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: impl IntoIterator<Item = StubResponse>) -> Self {
        Self {
            script: responses.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn push_faces(&mut self, faces: Vec<FaceBox>) {
        self.script.push_back(StubResponse::Faces(faces));
    }

    pub fn push_failure(&mut self, message: impl Into<String>) {
        self.script.push_back(StubResponse::Fail(message.into()));
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        _pixels: &[u8],
        _descriptor: &FrameDescriptor,
        _format: PixelFormat,
    ) -> Result<Vec<FaceBox>> {
        if self.closed {
            return Err(anyhow!("stub detector is closed"));
        }
        self.calls += 1;
        match self.script.pop_front() {
            Some(StubResponse::Faces(faces)) => Ok(faces),
            Some(StubResponse::Fail(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Rotation;

    #[test]
    fn replays_script_then_reports_nothing() {
        let desc = FrameDescriptor::new(4, 4, Rotation::Deg0);
        let mut backend = StubBackend::new();
        backend.push_faces(vec![FaceBox::new(0, 0, 2, 2)]);
        backend.push_failure("model crashed");

        let first = backend.detect(&[0u8; 16], &desc, PixelFormat::Gray8).unwrap();
        assert_eq!(first, vec![FaceBox::new(0, 0, 2, 2)]);

        let err = backend
            .detect(&[0u8; 16], &desc, PixelFormat::Gray8)
            .unwrap_err();
        assert!(err.to_string().contains("model crashed"));

        let rest = backend.detect(&[0u8; 16], &desc, PixelFormat::Gray8).unwrap();
        assert!(rest.is_empty());
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn closed_backend_refuses_work() {
        let desc = FrameDescriptor::new(4, 4, Rotation::Deg0);
        let mut backend = StubBackend::new();
        backend.close();
        assert!(backend.is_closed());
        assert!(backend.detect(&[0u8; 16], &desc, PixelFormat::Gray8).is_err());
    }
}
