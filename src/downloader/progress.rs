// Progress tracker: byte-level events -> job percentage

use std::sync::Arc;

use tokio::sync::watch;

use super::models::{JobId, ProgressEvent};
use super::store::JobStore;

/// Percentage for an in-flight event. `None` for the finished marker or a
/// zero/unknown total.
pub fn percent_for(event: &ProgressEvent) -> Option<u8> {
    match *event {
        ProgressEvent::Exact { downloaded, total } => ratio_percent(downloaded, total),
        // Estimates overshoot near the end; never claim 100 from one.
        ProgressEvent::Estimated { downloaded, estimate } => {
            ratio_percent(downloaded, estimate).map(|p| p.min(99))
        }
        ProgressEvent::Finished => None,
    }
}

fn ratio_percent(downloaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let pct = (downloaded as u128 * 100) / total as u128;
    Some(pct.min(100) as u8)
}

/// Writes progress into the job store
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    store: Arc<JobStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    /// Apply one event. Events for jobs no longer in the store are dropped.
    pub fn on_event(&self, id: &JobId, event: ProgressEvent) {
        let percent = match event {
            // Status stays `downloading`; completion waits for verification.
            ProgressEvent::Finished => 100,
            other => match percent_for(&other) {
                Some(p) => p,
                None => return,
            },
        };
        self.store.raise_progress(id, percent);
    }

    /// Drain a progress channel until its sender is dropped. Only the most
    /// recent value is applied on each wake-up.
    pub async fn consume(self, id: JobId, mut rx: watch::Receiver<Option<ProgressEvent>>) {
        while rx.changed().await.is_ok() {
            let latest = *rx.borrow_and_update();
            if let Some(event) = latest {
                self.on_event(&id, event);
            }
        }
        // The sender may have published one last value before closing.
        let last = *rx.borrow();
        if let Some(event) = last {
            self.on_event(&id, event);
        }
    }
}
