//! Indexing progress state and the single-run guard.
//!
//! One [`IndexState`] lives for the whole process: the active indexing run
//! writes through an [`IndexRunGuard`], polling clients read snapshots.
//! Readers must detect completion via `running`, not `percent` — the
//! percentage can plateau before the run finishes.
//!
//! `try_begin` enforces the at-most-one-run invariant: a second trigger
//! while a run is active is rejected instead of spawning an overlapping run
//! that could corrupt the persisted index.
//!
//! Progress is echoed on stderr when stderr is a terminal, so stdout stays
//! parseable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use serde::Serialize;

/// Snapshot of the current indexing run, safe to hand to polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct IndexProgress {
    pub percent: u32,
    pub message: String,
    pub running: bool,
}

/// Process-wide indexing state: single writer, many readers.
pub struct IndexState {
    inner: Mutex<IndexProgress>,
    active: AtomicBool,
}

impl IndexState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(IndexProgress {
                percent: 0,
                message: "Menunggu proses indexing...".to_string(),
                running: false,
            }),
            active: AtomicBool::new(false),
        }
    }

    /// Claim the run slot. Fails if a run is already in flight.
    pub fn try_begin(self: &Arc<Self>) -> Result<IndexRunGuard> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            bail!("An indexing run is already in progress");
        }

        {
            let mut inner = self.inner.lock().unwrap();
            inner.percent = 0;
            inner.message = "Menyiapkan proses indexing...".to_string();
            inner.running = true;
        }

        Ok(IndexRunGuard {
            state: Arc::clone(self),
            echo: atty::is(atty::Stream::Stderr),
        })
    }

    pub fn snapshot(&self) -> IndexProgress {
        self.inner.lock().unwrap().clone()
    }

    fn set(&self, percent: u32, message: String) {
        let mut inner = self.inner.lock().unwrap();
        inner.percent = percent.min(100);
        inner.message = message;
    }
}

impl Default for IndexState {
    fn default() -> Self {
        Self::new()
    }
}

/// Write handle for the active run. Dropping it clears the running flag,
/// whether the run finished or bailed out.
pub struct IndexRunGuard {
    state: Arc<IndexState>,
    echo: bool,
}

impl IndexRunGuard {
    pub fn update(&self, percent: u32, message: impl Into<String>) {
        let message = message.into();
        if self.echo {
            eprintln!("[{:>3}%] {}", percent.min(100), message);
        }
        self.state.set(percent, message);
    }

    /// Mark the run complete with the terminal `percent = 100` state.
    pub fn finish(&self, message: impl Into<String>) {
        self.update(100, message);
    }
}

impl Drop for IndexRunGuard {
    fn drop(&mut self) {
        let mut inner = self.state.inner.lock().unwrap();
        inner.running = false;
        self.state.active.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_rejects_concurrent_run() {
        let state = Arc::new(IndexState::new());
        let guard = state.try_begin().unwrap();
        assert!(state.snapshot().running);
        assert!(state.try_begin().is_err());
        drop(guard);
        // Slot is free again after the guard drops.
        let _second = state.try_begin().unwrap();
    }

    #[test]
    fn drop_clears_running_even_without_finish() {
        let state = Arc::new(IndexState::new());
        {
            let guard = state.try_begin().unwrap();
            guard.update(40, "Memproses dokumen 2/5...");
        }
        let snap = state.snapshot();
        assert!(!snap.running);
        assert_eq!(snap.percent, 40);
    }

    #[test]
    fn finish_reaches_terminal_state() {
        let state = Arc::new(IndexState::new());
        {
            let guard = state.try_begin().unwrap();
            guard.finish("Indexing selesai!");
        }
        let snap = state.snapshot();
        assert_eq!(snap.percent, 100);
        assert!(!snap.running);
    }

    #[test]
    fn percent_is_clamped() {
        let state = Arc::new(IndexState::new());
        let guard = state.try_begin().unwrap();
        guard.update(250, "overshoot");
        assert_eq!(state.snapshot().percent, 100);
        drop(guard);
    }
}
