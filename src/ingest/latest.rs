//! Keep-only-latest frame handoff between the camera and the analyzer.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

use crate::frame::RawFrame;

#[derive(Default)]
struct SlotState {
    pending: Option<RawFrame>,
    closed: bool,
}

/// Single-slot mailbox. The producer never blocks: a newer frame replaces the
/// pending one, and the replaced frame is released immediately.
#[derive(Default)]
pub struct LatestFrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
    dropped: AtomicU64,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a frame. Returns `false` (and releases the frame) once the slot is closed.
    pub fn offer(&self, frame: RawFrame) -> Result<bool> {
        let replaced = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| anyhow!("frame slot lock poisoned"))?;
            if state.closed {
                drop(state);
                frame.release();
                return Ok(false);
            }
            state.pending.replace(frame)
        };
        self.ready.notify_one();
        if let Some(stale) = replaced {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            stale.release();
        }
        Ok(true)
    }

    /// Block until a frame is available. `None` once the slot is closed.
    pub fn take(&self) -> Result<Option<RawFrame>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("frame slot lock poisoned"))?;
        loop {
            if state.closed {
                return Ok(None);
            }
            if let Some(frame) = state.pending.take() {
                return Ok(Some(frame));
            }
            state = self
                .ready
                .wait(state)
                .map_err(|_| anyhow!("frame slot lock poisoned"))?;
        }
    }

    /// Take the pending frame without waiting.
    pub fn try_take(&self) -> Result<Option<RawFrame>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("frame slot lock poisoned"))?;
        Ok(state.pending.take())
    }

    /// Stop accepting frames and wake the consumer. A pending frame is released.
    pub fn close(&self) -> Result<()> {
        let pending = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| anyhow!("frame slot lock poisoned"))?;
            state.closed = true;
            state.pending.take()
        };
        self.ready.notify_all();
        if let Some(frame) = pending {
            frame.release();
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|state| state.closed).unwrap_or(true)
    }

    /// Frames replaced before the consumer picked them up.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
