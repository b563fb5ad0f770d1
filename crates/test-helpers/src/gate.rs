// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

/// A latch that suspends callers of [`Gate::pass`] while closed.
#[derive(Debug)]
pub struct Gate {
    open: watch::Sender<bool>,
    waiting: AtomicUsize,
}

impl Default for Gate {
    fn default() -> Self {
        Self::open()
    }
}

impl Gate {
    pub fn open() -> Self {
        Self::with_state(true)
    }

    pub fn closed() -> Self {
        Self::with_state(false)
    }

    fn with_state(open: bool) -> Self {
        let (open, _) = watch::channel(open);
        Self {
            open,
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn close(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    /// Number of callers currently held at the gate.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub async fn pass(&self) {
        let mut rx = self.open.subscribe();
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _ = rx.wait_for(|open| *open).await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}
