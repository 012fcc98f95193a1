//! Emulator-thread/presenter-thread handoff.
//!
//! The hardware's own renderer publishes a finished frame under a mutex plus
//! two condition variables (one for "frame ready", one for "frame consumed").
//! That idiom doesn't belong on this crate's public surface, so it's
//! replaced with a pair of capacity-1 [`rtrb`] ring buffers carrying unit
//! tokens in each direction, plus three plain atomics for the counters both
//! threads need to read without locking.
//!
//! `FrameSync::new` returns the emulator-thread handle and its matching
//! [`FramePresenter`] together, rather than handing out `rtrb::Producer`/
//! `Consumer` directly - `rtrb` already names its two ends clearly, so
//! wrapping each token-pair in its own named struct states which *thread*
//! the handle belongs to instead of which *ring buffer slot* it is.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

struct Shared {
    turbo: AtomicBool,
    frameskip: AtomicU32,
    frames_pending: AtomicU64,
    shutdown: AtomicBool,
}

/// Emulator-thread side: owns `finish_frame`, the sole suspension point in
/// the renderer's public contract.
pub struct FrameSync {
    shared: Arc<Shared>,
    ready_tx: rtrb::Producer<()>,
    consumed_rx: rtrb::Consumer<()>,
}

/// Presenter-thread side: drains ready frames and signals consumption.
pub struct FramePresenter {
    shared: Arc<Shared>,
    ready_rx: rtrb::Consumer<()>,
    consumed_tx: rtrb::Producer<()>,
}

impl FrameSync {
    #[must_use]
    pub fn new() -> (Self, FramePresenter) {
        let shared = Arc::new(Shared {
            turbo: AtomicBool::new(false),
            frameskip: AtomicU32::new(0),
            frames_pending: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        });
        let (ready_tx, ready_rx) = rtrb::RingBuffer::new(1);
        let (consumed_tx, consumed_rx) = rtrb::RingBuffer::new(1);

        (
            Self {
                shared: shared.clone(),
                ready_tx,
                consumed_rx,
            },
            FramePresenter {
                shared,
                ready_rx,
                consumed_tx,
            },
        )
    }

    pub fn set_turbo(&self, turbo: bool) {
        self.shared.turbo.store(turbo, Ordering::Relaxed);
    }

    #[must_use]
    pub fn turbo(&self) -> bool {
        self.shared.turbo.load(Ordering::Relaxed)
    }

    pub fn set_frameskip(&self, frames: u32) {
        self.shared.frameskip.store(frames, Ordering::Relaxed);
    }

    #[must_use]
    pub fn frameskip(&self) -> u32 {
        self.shared.frameskip.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn frames_pending(&self) -> u64 {
        self.shared.frames_pending.load(Ordering::Relaxed)
    }

    /// Invoked once per 160 scanlines. If `frameskip` is nonzero, decrements
    /// it and returns without publishing. Otherwise increments
    /// `frames_pending`, pushes a ready token, and - unless `turbo` is set -
    /// spin-parks until the presenter signals it has drained the previous
    /// frame.
    pub fn finish_frame(&mut self) {
        let skip = self.shared.frameskip.load(Ordering::Relaxed);
        if skip > 0 {
            self.shared.frameskip.store(skip - 1, Ordering::Relaxed);
            return;
        }

        self.shared.frames_pending.fetch_add(1, Ordering::Relaxed);
        let _ = self.ready_tx.push(());

        if !self.shared.turbo.load(Ordering::Relaxed) {
            while self.consumed_rx.pop().is_err() {
                if self.shared.shutdown.load(Ordering::Relaxed) {
                    break;
                }
                std::hint::spin_loop();
            }
        }
    }

    /// Wakes a blocked `finish_frame` and marks this handoff defunct.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
    }
}

impl FramePresenter {
    /// Blocks (spin-parking) until a frame is ready, then signals it has
    /// been consumed.
    pub fn wait_for_frame(&mut self) {
        while self.ready_rx.pop().is_err() {
            if self.shared.shutdown.load(Ordering::Relaxed) {
                return;
            }
            std::hint::spin_loop();
        }
        let _ = self.consumed_tx.push(());
    }

    /// Non-blocking variant of [`FramePresenter::wait_for_frame`]: returns
    /// `true` and signals consumption if a frame was ready, `false`
    /// otherwise.
    pub fn try_take_frame(&mut self) -> bool {
        if self.ready_rx.pop().is_ok() {
            let _ = self.consumed_tx.push(());
            true
        } else {
            false
        }
    }
}
