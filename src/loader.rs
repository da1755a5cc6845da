use crate::{
    poller::{has_stalled, START_POLL_DELAY},
    AddOptions, AssetConstructor, AssetEntry, AssetStatus, AssetTypeRegistry, Assets, Clock,
    Handle, HandleId, ListenerId, Listeners, LoadReport, LoadReporter, LoaderEvent,
    LoaderSettings, Outcome, PercentageLoaded, Progress, ProgressCounts, StatusPoller,
    SystemClock, Tags, DEFAULT_WEIGHT,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::{
    cell::RefCell,
    io,
    path::PathBuf,
    rc::Rc,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Errors reported by the loader and its handles.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("unavailable listener event: {0}")]
    UnknownEvent(String),
    #[error("failed to read {}: {}", .path.display(), .source)]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {}: {}", .path.display(), .reason)]
    Decode { path: PathBuf, reason: String },
    #[error("encountered an io error")]
    Io(#[from] io::Error),
    #[error("invalid loader settings")]
    Json(#[from] serde_json::Error),
}

/// Something that can be queued: a locator resolved by extension, or a ready-made handle.
pub enum AssetSource {
    Locator(String),
    Handle(Handle),
}

impl From<&str> for AssetSource {
    fn from(locator: &str) -> Self {
        AssetSource::Locator(locator.to_owned())
    }
}

impl From<String> for AssetSource {
    fn from(locator: String) -> Self {
        AssetSource::Locator(locator)
    }
}

impl From<Handle> for AssetSource {
    fn from(handle: Handle) -> Self {
        AssetSource::Handle(handle)
    }
}

impl From<&Handle> for AssetSource {
    fn from(handle: &Handle) -> Self {
        AssetSource::Handle(handle.clone())
    }
}

/// Called once every asset that was in flight at `halt` time has reported. Receives the
/// last reported progress, or `None` when nothing was in flight.
pub type HaltCompleteFn = Box<dyn FnOnce(Option<&Progress>)>;

struct HaltTracker {
    complete: usize,
    total: usize,
    callback: Option<HaltCompleteFn>,
}

/// Queues assets, starts them, polls the ones in flight and tells listeners how far
/// along the queue is.
///
/// The loader is driven by its host: call [`update`](Preloader::update) from the event
/// loop to route outcomes reported by handles and to run the status poller.
pub struct Preloader {
    settings: LoaderSettings,
    assets: Assets,
    listeners: Listeners,
    asset_types: AssetTypeRegistry,
    poller: StatusPoller,
    clock: Box<dyn Clock>,
    progress_changed: Instant,
    frozen: bool,
    id_counter: u64,
    report_tx: Sender<LoadReport>,
    report_rx: Receiver<LoadReport>,
}

impl Default for Preloader {
    fn default() -> Self {
        Self::new(LoaderSettings::default())
    }
}

impl Preloader {
    pub fn new(settings: LoaderSettings) -> Self {
        Self::with_clock(settings, SystemClock)
    }

    pub fn with_clock<C: Clock + 'static>(settings: LoaderSettings, clock: C) -> Self {
        let (report_tx, report_rx) = unbounded();
        let progress_changed = clock.now();
        Preloader {
            settings,
            assets: Assets::new(),
            listeners: Listeners::new(),
            asset_types: AssetTypeRegistry::default(),
            poller: StatusPoller::new(),
            clock: Box::new(clock),
            progress_changed,
            frozen: false,
            id_counter: 0,
            report_tx,
            report_rx,
        }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn assets(&self) -> &Assets {
        &self.assets
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// When the next status poll is due, if one is scheduled.
    pub fn next_poll(&self) -> Option<Instant> {
        self.poller.deadline()
    }

    pub fn status_of(&self, id: &str) -> Option<AssetStatus> {
        self.assets.get_by_id(id).map(|entry| entry.status)
    }

    pub fn register_asset_type<S: Into<String>>(&mut self, extension: S, construct: AssetConstructor) {
        self.asset_types.register(extension, construct);
    }

    /// Builds a handle for a locator from its extension without queueing it.
    pub fn create_asset_by_url(&self, locator: &str) -> Handle {
        self.asset_types.create(locator)
    }

    /// Adds an asset to the queue and returns its handle.
    ///
    /// With `instance_only` the handle is built but not queued, so it can be added later.
    /// The id counter advances either way.
    pub fn add<A: Into<AssetSource>>(&mut self, asset: A, options: AddOptions, instance_only: bool) -> Handle {
        let handle = match asset.into() {
            AssetSource::Locator(locator) => self.create_asset_by_url(&locator),
            AssetSource::Handle(handle) => handle,
        };

        if !instance_only {
            let id = options
                .id
                .unwrap_or_else(|| self.id_counter.to_string());
            let weight = if options.weight.is_finite() && options.weight > 0.0 {
                options.weight
            } else {
                log::warn!(
                    "asset {} has invalid weight {}, using {}",
                    id,
                    options.weight,
                    DEFAULT_WEIGHT
                );
                DEFAULT_WEIGHT
            };
            log::debug!("queued asset {} ({:?})", id, handle);
            self.assets
                .add(AssetEntry::new(id, handle.clone(), weight, options.tags));
        }

        self.id_counter += 1;
        handle
    }

    /// Starts every queued asset.
    pub fn start(&mut self) {
        self.start_with_tags(Tags::new());
    }

    /// Starts the queued assets carrying all of `tags`, or every queued asset when `tags`
    /// is empty. Always re-arms the status poller.
    pub fn start_with_tags<T: Into<Tags>>(&mut self, tags: T) {
        let tags = tags.into();
        let now = self.clock.now();
        self.frozen = false;
        self.progress_changed = now;

        for index in 0..self.assets.len() {
            let started = match self.assets.entry_at_mut(index) {
                Some(entry) if entry.status == AssetStatus::Queued && entry.tags.contains_all(&tags) => {
                    if !entry.resource.is_supported() {
                        log::warn!("asset {} has no loader and stays queued", entry.id);
                        continue;
                    }
                    entry.status = AssetStatus::Active;
                    let reporter = LoadReporter::new(entry.handle_id(), self.report_tx.clone());
                    let mut asset = entry.resource.borrow_mut();
                    asset.state_mut().resume();
                    asset.start(reporter);
                    true
                }
                _ => false,
            };
            if started {
                if let Some(progress) = self.progress_at(index) {
                    self.listeners.dispatch_activation(&progress);
                }
            }
        }

        self.poller.schedule(now, START_POLL_DELAY);
    }

    /// Freezes the loader and cancels status polling. Loads already in flight keep going.
    pub fn stop(&mut self) {
        self.frozen = true;
        self.poller.cancel();
    }

    /// Stops the loader and marks every handle halted.
    pub fn halt(&mut self) {
        self.halt_inner(None);
    }

    /// Stops the loader and marks every handle halted. `callback` fires once after every
    /// asset that was active has reported, or right away if none was active.
    pub fn halt_with<F>(&mut self, callback: F)
    where
        F: FnOnce(Option<&Progress>) + 'static,
    {
        self.halt_inner(Some(Box::new(callback)));
    }

    fn halt_inner(&mut self, callback: Option<HaltCompleteFn>) {
        self.stop();

        let total = self.assets.count_with_status(AssetStatus::Active);
        let tracker = Rc::new(RefCell::new(HaltTracker {
            complete: 0,
            total,
            callback,
        }));

        for entry in self.assets.iter() {
            let mut asset = entry.resource.borrow_mut();
            if entry.status == AssetStatus::Active {
                let tracker = tracker.clone();
                asset.stop(Some(Box::new(move |progress: &Progress| {
                    let callback = {
                        let mut tracker = tracker.borrow_mut();
                        tracker.complete += 1;
                        if tracker.complete == tracker.total {
                            tracker.callback.take()
                        } else {
                            None
                        }
                    };
                    if let Some(callback) = callback {
                        callback(Some(progress));
                    }
                })));
            } else {
                asset.stop(None);
            }
        }

        log::info!("halted with {} assets in flight", total);
        if total == 0 {
            let callback = tracker.borrow_mut().callback.take();
            if let Some(callback) = callback {
                callback(None);
            }
        }
    }

    /// Updates the advisory concurrency cap, halting first when `force_stop` is set.
    pub fn set_cap(&mut self, max_simultaneous_loads: usize, force_stop: bool) {
        if force_stop {
            self.halt();
        }
        self.settings.max_simultaneous_loads = max_simultaneous_loads;
    }

    /// Stops the loader and empties the queue. Listeners are kept.
    pub fn clear(&mut self) {
        self.stop();
        self.assets.clear();
    }

    pub fn get_percentage_loaded(&self) -> PercentageLoaded {
        ProgressCounts::of(&self.assets).into()
    }

    /// Registers a listener for `"progress"` or `"completion"`, bound to one asset when
    /// `id` is given. Unknown event names are logged and ignored.
    pub fn on<F>(&mut self, event_name: &str, callback: F, id: Option<&str>) -> Option<ListenerId>
    where
        F: FnMut(&Progress) + 'static,
    {
        match event_name.parse() {
            Ok(event) => Some(self.on_event(event, callback, id)),
            Err(err) => {
                log::warn!("{}", err);
                None
            }
        }
    }

    pub fn on_event<F>(&mut self, event: LoaderEvent, callback: F, id: Option<&str>) -> ListenerId
    where
        F: FnMut(&Progress) + 'static,
    {
        self.listeners
            .add(event, Box::new(callback), id.map(str::to_owned))
    }

    /// Removes the first listener matching `event` and the given listener and/or asset id.
    pub fn off(&mut self, event_name: &str, listener: Option<ListenerId>, id: Option<&str>) -> bool {
        match event_name.parse() {
            Ok(event) => self.listeners.remove(event, listener, id),
            Err(err) => {
                log::warn!("{}", err);
                false
            }
        }
    }

    pub fn on_load(&mut self, handle: HandleId) {
        self.on_progress(handle, AssetStatus::Loaded);
    }

    pub fn on_error(&mut self, handle: HandleId) {
        self.on_progress(handle, AssetStatus::Errored);
    }

    pub fn on_timeout(&mut self, handle: HandleId) {
        self.on_progress(handle, AssetStatus::TimedOut);
    }

    fn route(&mut self, handle: HandleId, outcome: Outcome) {
        match outcome {
            Outcome::Loaded => self.on_load(handle),
            Outcome::Errored => self.on_error(handle),
            Outcome::TimedOut => self.on_timeout(handle),
        }
    }

    fn route_report(&mut self, report: LoadReport) {
        if let Some(message) = &report.message {
            log::warn!("asset {} reported {:?}: {}", report.handle, report.outcome, message);
        }
        self.route(report.handle, report.outcome);
    }

    fn on_progress(&mut self, handle: HandleId, status: AssetStatus) {
        let index = match self.assets.position(handle) {
            Some(index) => index,
            None => {
                log::debug!("ignoring {:?} for unknown handle {}", status, handle);
                return;
            }
        };

        let (halted, halt_callback) = match self.assets.entry_at_mut(index) {
            Some(entry) if entry.status == AssetStatus::Active => {
                entry.status = status;
                let mut asset = entry.resource.borrow_mut();
                let halted = asset.is_halted();
                let callback = if halted {
                    asset.state_mut().take_halt_callback()
                } else {
                    None
                };
                (halted, callback)
            }
            _ => return,
        };
        self.progress_changed = self.clock.now();

        if let Some(progress) = self.progress_at(index) {
            log::debug!(
                "asset {} is {:?} ({}/{})",
                progress.id,
                progress.status,
                progress.completed_count,
                progress.total_count
            );
            self.listeners
                .dispatch_transition(&progress, halted, halt_callback);
        }
    }

    fn progress_at(&self, index: usize) -> Option<Progress> {
        let entry = self.assets.get_at(index)?;
        let counts = ProgressCounts::of(&self.assets);
        Some(Progress {
            resource: entry.handle_id(),
            id: entry.id.clone(),
            status: entry.status,
            loaded: entry.status == AssetStatus::Loaded,
            error: entry.status == AssetStatus::Errored,
            timed_out: entry.status == AssetStatus::TimedOut,
            completed_count: counts.completed,
            total_count: counts.total,
        })
    }

    /// Routes every outcome reported since the last call, then runs the status poll if
    /// it is due. Returns the number of routed reports.
    pub fn update(&mut self) -> usize {
        let mut routed = 0;
        while let Ok(report) = self.report_rx.try_recv() {
            self.route_report(report);
            routed += 1;
        }

        let now = self.clock.now();
        if self.poller.take_due(now) {
            self.check_asset_status(now);
        }
        routed
    }

    fn check_asset_status(&mut self, now: Instant) {
        let timed_out = has_stalled(self.progress_changed, now, self.settings.no_progress_timeout);
        let mut check_again = false;

        for index in 0..self.assets.len() {
            let (handle, resource) = match self.assets.get_at(index) {
                Some(entry) if entry.status == AssetStatus::Active => {
                    (entry.handle_id(), entry.resource.clone())
                }
                _ => continue,
            };

            let polled = resource.borrow_mut().check_status();
            if let Some(outcome) = polled {
                self.route(handle, outcome);
            }

            if self.assets.get_at(index).map(|entry| entry.status) == Some(AssetStatus::Active) {
                if timed_out {
                    let outcome = resource.borrow_mut().on_timeout();
                    match outcome {
                        Some(outcome) => {
                            log::info!("asset {} made no progress, resolved as {:?}", handle, outcome);
                            self.route(handle, outcome);
                        }
                        None => check_again = true,
                    }
                } else {
                    check_again = true;
                }
            }
        }

        if check_again {
            self.poller.schedule(now, self.settings.status_interval);
        }
    }

    /// Pumps [`update`](Preloader::update) until no asset is active or `limit` passes,
    /// sleeping on the report channel in between. Returns whether the queue went idle.
    ///
    /// Meant for hosts without an event loop. `limit` is wall-clock time, whatever clock
    /// the loader was built with; polls still fire on the loader's clock.
    pub fn wait_idle(&mut self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            self.update();
            if !self.assets.has_active() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining == Duration::from_secs(0) {
                return false;
            }
            let until_poll = self.poller.deadline().map_or(remaining, |poll| {
                poll.saturating_duration_since(self.clock.now())
            });
            let wait = until_poll.min(remaining).max(Duration::from_millis(1));
            match self.report_rx.recv_timeout(wait) {
                Ok(report) => self.route_report(report),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }
}
