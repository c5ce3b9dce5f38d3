//! Status markers and the status tracker
//!
//! A tracker holds one current high-priority marker plus an append-only set
//! of low-priority markers. Every marker ever recorded stays queryable.

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Priority tag of a status marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// At most one high marker is current at a time
    High,
    /// Low markers accumulate and are never removed
    Low,
}

/// Lifecycle checkpoints of a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusMarker {
    LoadInProgress,
    Loaded,
    EnableInProgress,
    Enabled,
    DisableInProgress,
    Disabled,
    Failed,
}

impl StatusMarker {
    pub const fn priority(self) -> Priority {
        match self {
            Self::Loaded => Priority::Low,
            Self::LoadInProgress
            | Self::EnableInProgress
            | Self::Enabled
            | Self::DisableInProgress
            | Self::Disabled
            | Self::Failed => Priority::High,
        }
    }

    pub const fn is_high(self) -> bool {
        matches!(self.priority(), Priority::High)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::LoadInProgress => "LOAD_IN_PROGRESS",
            Self::Loaded => "LOADED",
            Self::EnableInProgress => "ENABLE_IN_PROGRESS",
            Self::Enabled => "ENABLED",
            Self::DisableInProgress => "DISABLE_IN_PROGRESS",
            Self::Disabled => "DISABLED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for StatusMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observer notified synchronously on every recorded marker.
///
/// Watchers run on the thread recording the marker, which is often the boot
/// thread, so they must not block.
pub trait StatusWatcher: Send + Sync {
    fn on_status(&self, marker: StatusMarker) -> anyhow::Result<()>;
}

impl<F> StatusWatcher for F
where
    F: Fn(StatusMarker) -> anyhow::Result<()> + Send + Sync,
{
    fn on_status(&self, marker: StatusMarker) -> anyhow::Result<()> {
        self(marker)
    }
}

/// Status query errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("Only one high-priority status can be current, but {0:?} were queried together")]
    MultipleHighPriority(Vec<StatusMarker>),
}

#[derive(Debug, Default)]
struct StatusState {
    high: Option<StatusMarker>,
    low: Vec<StatusMarker>,
    recorded: HashSet<StatusMarker>,
}

/// Records status markers and notifies watchers
#[derive(Default)]
pub struct StatusTracker {
    state: Mutex<StatusState>,
    watchers: RwLock<Vec<Arc<dyn StatusWatcher>>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watcher; watchers run in registration order
    pub fn add_watcher<W>(&self, watcher: W)
    where
        W: StatusWatcher + 'static,
    {
        self.watchers.write().push(Arc::new(watcher));
    }

    /// Record a marker and notify every watcher.
    ///
    /// A high marker deposes the current one; a low marker joins the
    /// accumulated set. A failing watcher is logged and skipped.
    pub fn set_status(&self, marker: StatusMarker) {
        {
            let mut state = self.state.lock();
            match marker.priority() {
                Priority::High => {
                    state.high = Some(marker);
                }
                Priority::Low => {
                    if !state.low.contains(&marker) {
                        state.low.push(marker);
                    }
                }
            }
            state.recorded.insert(marker);
        }

        let watchers = self.watchers.read().clone();
        for watcher in &watchers {
            match catch_unwind(AssertUnwindSafe(|| watcher.on_status(marker))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Status watcher failed on {}: {}", marker, e),
                Err(payload) => tracing::error!(
                    "Status watcher panicked on {}: {}",
                    marker,
                    crate::error::panic_message(payload.as_ref())
                ),
            }
        }
    }

    /// Whether the marker was ever recorded
    pub fn contains(&self, marker: StatusMarker) -> bool {
        self.state.lock().recorded.contains(&marker)
    }

    /// Whether any of the markers was ever recorded
    pub fn contains_any(&self, markers: &[StatusMarker]) -> bool {
        let state = self.state.lock();
        markers.iter().any(|marker| state.recorded.contains(marker))
    }

    /// Whether every marker was recorded.
    ///
    /// Querying more than one high-priority marker at once is rejected.
    pub fn contains_all(&self, markers: &[StatusMarker]) -> Result<bool, StatusError> {
        let high: Vec<StatusMarker> = markers.iter().copied().filter(|marker| marker.is_high()).collect();
        if high.len() > 1 {
            return Err(StatusError::MultipleHighPriority(high));
        }

        let state = self.state.lock();
        Ok(markers.iter().all(|marker| state.recorded.contains(marker)))
    }

    /// The current high-priority marker
    pub fn high_status(&self) -> Option<StatusMarker> {
        self.state.lock().high
    }

    /// Low-priority markers in the order they were first recorded
    pub fn low_statuses(&self) -> Vec<StatusMarker> {
        self.state.lock().low.clone()
    }
}

impl fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StatusTracker")
            .field("high", &state.high)
            .field("low", &state.low)
            .field("watchers", &self.watchers.read().len())
            .finish()
    }
}
