//! Frame sources.
//!
//! - `LatestFrameSlot`: keep-only-latest handoff from the camera thread to the
//!   analyzer. The camera never blocks; frames the analyzer could not keep up with
//!   are released and counted.
//! - `SyntheticSource`: hardware-free camera for the daemon and tests.
//!
//! Sources hand every `RawFrame` downstream with a release hook attached; whoever
//! holds the frame last releases it.

mod latest;
mod synthetic;

pub use latest::LatestFrameSlot;
pub use synthetic::{SourceStats, SyntheticConfig, SyntheticSource};
