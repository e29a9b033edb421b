mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{DetectorBackend, DetectorOptions, PerformanceMode};
pub use backends::{CpuBackend, StubBackend, StubResponse};
pub use registry::BackendRegistry;
pub use result::{Detection, FaceBox};
