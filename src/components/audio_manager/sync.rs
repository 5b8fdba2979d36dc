// Checkpoint projection and the one-per-second persistence timer.
use super::platform::{Scheduler, Subscription};
use crate::db::PersistedState;
use std::cell::RefCell;
use std::time::Duration;

/// Where the track should be now, given the last checkpoint.
///
/// Returns `None` when nothing was playing or the checkpoint sits at the
/// start. Elapsed time is linear from `saved_at_ms` and computed in floating
/// point, since the timestamp is shared with other scripts and may hold any
/// value. A clock that went backwards pulls the position back; a known
/// duration wraps the result since the track loops forever.
pub fn project_position(
    saved: &PersistedState,
    now_ms: i64,
    duration: Option<f64>,
) -> Option<f64> {
    if !saved.playing || saved.position <= 0.0 {
        return None;
    }
    let elapsed = (now_ms as f64 - saved.saved_at_ms as f64) / 1000.0;
    let projected = saved.position + elapsed;
    Some(match duration {
        Some(duration) if duration.is_finite() && duration > 0.0 => projected % duration,
        _ => projected,
    })
}

/// Holds at most one recurring persistence task.
#[derive(Debug, Default)]
pub struct PersistTimer {
    active: RefCell<Option<Subscription>>,
}

impl PersistTimer {
    /// Replace any running task with a new one.
    pub fn start(&self, scheduler: &dyn Scheduler, period: Duration, tick: Box<dyn FnMut()>) {
        self.stop();
        let task = scheduler.every(period, tick);
        *self.active.borrow_mut() = Some(task);
    }

    pub fn stop(&self) {
        let previous = self.active.borrow_mut().take();
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .borrow()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }
}
