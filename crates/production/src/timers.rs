//! Wall-clock view-change resumption.
//!
//! The coordinator keeps at most one resumption pending and tags each with a
//! fresh generation, so a single abortable tokio task is enough.

use quorumsim_core::{Event, TimerId};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct Armed {
    id: TimerId,
    task: JoinHandle<()>,
}

/// Holds the one resumption the coordinator is waiting for.
///
/// When it elapses, the sleeping task delivers `id.into_event()` on the timer
/// channel. Arming a new resumption aborts the previous one.
pub struct ResumptionTimer {
    armed: Option<Armed>,
    event_tx: mpsc::Sender<Event>,
}

impl ResumptionTimer {
    pub fn new(event_tx: mpsc::Sender<Event>) -> Self {
        Self {
            armed: None,
            event_tx,
        }
    }

    /// Arm `id` to fire after `duration`, aborting whatever was armed.
    pub fn arm(&mut self, id: TimerId, duration: Duration) {
        if let Some(previous) = self.armed.take() {
            previous.task.abort();
            debug!(superseded = ?previous.id, ?id, "Superseded pending resumption");
        }

        let event_tx = self.event_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // The runner may have stopped while we slept.
            let _ = event_tx.send(id.into_event()).await;
        });
        self.armed = Some(Armed { id, task });
        debug!(?id, ?duration, "Resumption armed");
    }

    /// Abort the armed resumption if it carries `id`.
    ///
    /// Returns false when nothing with that id is armed; a different armed
    /// generation is left running.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        if !self.armed.as_ref().is_some_and(|armed| armed.id == id) {
            trace!(?id, "No matching resumption to cancel");
            return false;
        }
        if let Some(armed) = self.armed.take() {
            armed.task.abort();
        }
        debug!(?id, "Resumption cancelled");
        true
    }

    /// The armed resumption, unless it already fired.
    pub fn pending(&self) -> Option<TimerId> {
        self.armed
            .as_ref()
            .filter(|armed| !armed.task.is_finished())
            .map(|armed| armed.id)
    }

    /// Abort without reporting. Used when the runner stops.
    pub fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.task.abort();
            trace!(id = ?armed.id, "Resumption disarmed");
        }
    }
}

impl Drop for ResumptionTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
