use crate::{AssetStatus, Assets, HaltCallback, HandleId, LoaderError};
use serde::Serialize;
use std::{fmt, str::FromStr};

/// Delivered to listeners when an asset changes state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub resource: HandleId,
    /// Registry id of the asset.
    pub id: String,
    pub status: AssetStatus,
    pub loaded: bool,
    pub error: bool,
    pub timed_out: bool,
    pub completed_count: usize,
    pub total_count: usize,
}

impl Progress {
    pub fn is_queue_complete(&self) -> bool {
        self.completed_count == self.total_count
    }
}

/// Result of [`Preloader::get_percentage_loaded`](crate::Preloader::get_percentage_loaded).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentageLoaded {
    /// Weighted completion as a fraction rounded to two places. `None` for an empty queue.
    pub percent: Option<f64>,
    pub loaded: usize,
    pub total: usize,
}

/// Completed/total counts over every registered asset, raw and weighted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressCounts {
    pub completed: usize,
    pub total: usize,
    pub weighted_completed: f64,
    pub weighted_total: f64,
}

impl ProgressCounts {
    pub fn of(assets: &Assets) -> Self {
        assets.iter().fold(Self::default(), |mut counts, entry| {
            counts.total += 1;
            counts.weighted_total += entry.weight;
            if entry.status.is_terminal() {
                counts.completed += 1;
                counts.weighted_completed += entry.weight;
            }
            counts
        })
    }

    pub fn percentage(&self) -> Option<f64> {
        if self.weighted_total > 0.0 {
            Some(round2(self.weighted_completed / self.weighted_total))
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

impl From<ProgressCounts> for PercentageLoaded {
    fn from(counts: ProgressCounts) -> Self {
        PercentageLoaded {
            percent: counts.percentage(),
            loaded: counts.completed,
            total: counts.total,
        }
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Events a listener can subscribe to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum LoaderEvent {
    Progress,
    Completion,
}

impl FromStr for LoaderEvent {
    type Err = LoaderError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "progress" => Ok(LoaderEvent::Progress),
            "completion" => Ok(LoaderEvent::Completion),
            other => Err(LoaderError::UnknownEvent(other.to_owned())),
        }
    }
}

impl fmt::Display for LoaderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderEvent::Progress => f.write_str("progress"),
            LoaderEvent::Completion => f.write_str("completion"),
        }
    }
}

/// Token returned by `on`, used to remove that listener with `off`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type ListenerFn = Box<dyn FnMut(&Progress)>;

struct Listener {
    id: ListenerId,
    event: LoaderEvent,
    asset: Option<String>,
    fired: bool,
    callback: ListenerFn,
}

impl Listener {
    fn matches(&self, event: LoaderEvent, listener: Option<ListenerId>, asset: Option<&str>) -> bool {
        self.event == event
            && listener.map_or(true, |id| id == self.id)
            && asset.map_or(true, |asset| self.asset.as_deref() == Some(asset))
    }
}

/// Generic listeners fire for every asset; unique listeners are bound to one asset id.
#[derive(Default)]
pub struct Listeners {
    generic: Vec<Listener>,
    unique: Vec<Listener>,
    next_id: u64,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: LoaderEvent, callback: ListenerFn, asset: Option<String>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        let listener = Listener {
            id,
            event,
            fired: false,
            callback,
            asset,
        };
        if listener.asset.is_some() {
            self.unique.push(listener);
        } else {
            self.generic.push(listener);
        }
        id
    }

    /// Removes the first listener matching every given criterion, searching the unique
    /// list when `asset` is given and the generic list otherwise.
    pub fn remove(&mut self, event: LoaderEvent, listener: Option<ListenerId>, asset: Option<&str>) -> bool {
        let list = if asset.is_some() {
            &mut self.unique
        } else {
            &mut self.generic
        };
        match list.iter().position(|l| l.matches(event, listener, asset)) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn generic_len(&self) -> usize {
        self.generic.len()
    }

    pub fn unique_len(&self) -> usize {
        self.unique.len()
    }

    /// Dispatches a terminal transition. A halted asset's progress goes to its halt
    /// callback instead of the generic listeners.
    pub fn dispatch_transition(&mut self, progress: &Progress, halted: bool, halt_callback: Option<HaltCallback>) {
        if halted {
            if let Some(callback) = halt_callback {
                callback(progress);
            }
        } else {
            for listener in &mut self.generic {
                match listener.event {
                    LoaderEvent::Progress => (listener.callback)(progress),
                    LoaderEvent::Completion if progress.is_queue_complete() => {
                        (listener.callback)(progress)
                    }
                    LoaderEvent::Completion => {}
                }
            }
        }

        for listener in &mut self.unique {
            if listener.asset.as_deref() != Some(progress.id.as_str()) {
                continue;
            }
            if listener.event == LoaderEvent::Completion
                && progress.status == AssetStatus::Loaded
                && !listener.fired
            {
                listener.fired = true;
                (listener.callback)(progress);
            }
        }
    }

    /// Dispatches an asset becoming active to its unique progress listeners.
    pub fn dispatch_activation(&mut self, progress: &Progress) {
        for listener in &mut self.unique {
            if listener.event == LoaderEvent::Progress
                && listener.asset.as_deref() == Some(progress.id.as_str())
            {
                (listener.callback)(progress);
            }
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("generic", &self.generic.len())
            .field("unique", &self.unique.len())
            .finish()
    }
}
