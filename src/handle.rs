use crate::Progress;
use crossbeam_channel::Sender;
use serde::Serialize;
use std::{
    cell::{Ref, RefCell, RefMut},
    fmt::{self, Debug},
    hash::{Hash, Hasher},
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

/// Allocates handle ids. Id 0 is never handed out.
pub(crate) static HANDLE_ALLOCATOR: AtomicHandleAllocator = AtomicHandleAllocator::new(1);

pub(crate) struct AtomicHandleAllocator(AtomicU64);

impl AtomicHandleAllocator {
    pub const fn new(starting_value: u64) -> Self {
        Self(AtomicU64::new(starting_value))
    }

    pub fn alloc(&self) -> HandleId {
        HandleId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of a single asset handle. Used to route outcomes back to the registry entry
/// that owns the handle.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
#[repr(transparent)]
pub struct HandleId(pub u64);

impl HandleId {
    pub fn new() -> Self {
        HANDLE_ALLOCATOR.alloc()
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal result of loading one asset.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Outcome {
    Loaded,
    Errored,
    TimedOut,
}

/// An outcome sent from a handle (usually from its I/O thread) to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub handle: HandleId,
    pub outcome: Outcome,
    pub message: Option<String>,
}

/// Given to a handle when it is started. The controller drains these reports on
/// [`Preloader::update`](crate::Preloader::update).
#[derive(Clone)]
pub struct LoadReporter {
    handle: HandleId,
    tx: Sender<LoadReport>,
}

impl LoadReporter {
    pub fn new(handle: HandleId, tx: Sender<LoadReport>) -> Self {
        Self { handle, tx }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn loaded(&self) {
        self.send(Outcome::Loaded, None);
    }

    pub fn errored<E: fmt::Display>(&self, err: E) {
        self.send(Outcome::Errored, Some(err.to_string()));
    }

    pub fn timed_out(&self) {
        self.send(Outcome::TimedOut, None);
    }

    fn send(&self, outcome: Outcome, message: Option<String>) {
        let report = LoadReport {
            handle: self.handle,
            outcome,
            message,
        };
        // the receiving side is gone once the controller is dropped
        if self.tx.send(report).is_err() {
            log::debug!("dropping {:?} for {}: loader is gone", outcome, self.handle);
        }
    }
}

impl Debug for LoadReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadReporter")
            .field("handle", &self.handle)
            .finish()
    }
}

/// One-shot callback that receives a halted asset's eventual progress instead of the
/// regular listeners.
pub type HaltCallback = Box<dyn FnOnce(&Progress)>;

/// Per-handle state shared by every handle variant: identity plus halt bookkeeping.
pub struct HandleState {
    id: HandleId,
    halted: bool,
    halt_callback: Option<HaltCallback>,
    fired: bool,
}

impl HandleState {
    pub fn new() -> Self {
        Self {
            id: HandleId::new(),
            halted: false,
            halt_callback: None,
            fired: false,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn halt(&mut self, callback: Option<HaltCallback>) {
        self.halted = true;
        self.halt_callback = callback;
        self.fired = false;
    }

    /// Clears the halt flag so a restarted handle reports to the regular listeners again.
    pub fn resume(&mut self) {
        self.halted = false;
        self.halt_callback = None;
        self.fired = false;
    }

    /// Takes the halt callback at most once.
    pub fn take_halt_callback(&mut self) -> Option<HaltCallback> {
        if self.fired {
            return None;
        }
        let callback = self.halt_callback.take();
        if callback.is_some() {
            self.fired = true;
        }
        callback
    }
}

impl Default for HandleState {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleState")
            .field("id", &self.id)
            .field("halted", &self.halted)
            .field("has_halt_callback", &self.halt_callback.is_some())
            .field("fired", &self.fired)
            .finish()
    }
}

/// A single loadable resource.
///
/// Implementors compose a [`HandleState`] and expose it through [`state`](LoadAsset::state) /
/// [`state_mut`](LoadAsset::state_mut); halting and identity come from the default methods.
/// A started handle produces exactly one terminal outcome: through the reporter, or as
/// the return value of [`check_status`](LoadAsset::check_status) or
/// [`on_timeout`](LoadAsset::on_timeout). Once one of them has produced it, the others
/// stay silent.
pub trait LoadAsset {
    fn state(&self) -> &HandleState;
    fn state_mut(&mut self) -> &mut HandleState;

    fn start(&mut self, reporter: LoadReporter);

    /// Non-blocking poll, called by the status poller while the asset is active.
    fn check_status(&mut self) -> Option<Outcome> {
        None
    }

    /// Called when the poller gives up waiting on this asset. `None` means the outcome
    /// was already sent through the reporter.
    fn on_timeout(&mut self) -> Option<Outcome> {
        Some(Outcome::TimedOut)
    }

    fn stop(&mut self, callback: Option<HaltCallback>) {
        self.state_mut().halt(callback);
    }

    fn id(&self) -> HandleId {
        self.state().id()
    }

    fn is_halted(&self) -> bool {
        self.state().is_halted()
    }

    /// Inert placeholders return `false` and are never activated.
    fn is_supported(&self) -> bool {
        true
    }

    fn locator(&self) -> Option<&str> {
        None
    }
}

/// Placeholder produced for a locator whose extension has no registered constructor.
#[derive(Debug)]
pub struct Unsupported {
    state: HandleState,
    locator: String,
}

impl Unsupported {
    pub fn new<S: Into<String>>(locator: S) -> Self {
        Self {
            state: HandleState::new(),
            locator: locator.into(),
        }
    }
}

impl LoadAsset for Unsupported {
    fn state(&self) -> &HandleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut HandleState {
        &mut self.state
    }

    fn start(&mut self, _reporter: LoadReporter) {}

    fn is_supported(&self) -> bool {
        false
    }

    fn locator(&self) -> Option<&str> {
        Some(&self.locator)
    }
}

/// A shared reference to a handle. Cloning is cheap; equality and hashing follow the
/// handle's id.
#[derive(Clone)]
pub struct Handle {
    id: HandleId,
    inner: Rc<RefCell<Box<dyn LoadAsset>>>,
}

impl Handle {
    pub fn new<A: LoadAsset + 'static>(asset: A) -> Self {
        Self::from_boxed(Box::new(asset))
    }

    pub fn from_boxed(asset: Box<dyn LoadAsset>) -> Self {
        Self {
            id: asset.id(),
            inner: Rc::new(RefCell::new(asset)),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn borrow(&self) -> Ref<'_, Box<dyn LoadAsset>> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Box<dyn LoadAsset>> {
        self.inner.borrow_mut()
    }

    pub fn is_supported(&self) -> bool {
        self.borrow().is_supported()
    }

    pub fn is_halted(&self) -> bool {
        self.borrow().is_halted()
    }
}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handle {}

impl Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(asset) => write!(f, "Handle({}, {:?})", self.id, asset.locator()),
            Err(_) => write!(f, "Handle({})", self.id),
        }
    }
}

impl<A: LoadAsset + 'static> From<A> for Handle {
    fn from(asset: A) -> Self {
        Handle::new(asset)
    }
}
