#![allow(dead_code)]

use asset_preloader::{Handle, HandleState, LoadAsset, LoadReporter, Outcome, Progress};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

#[derive(Default)]
struct Shared {
    reporter: RefCell<Option<LoadReporter>>,
    starts: Cell<usize>,
    complete: Cell<bool>,
    pollable: Cell<bool>,
}

/// A handle whose outcome is decided by the test through its [`Control`].
struct Scripted {
    state: HandleState,
    shared: Rc<Shared>,
}

impl LoadAsset for Scripted {
    fn state(&self) -> &HandleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut HandleState {
        &mut self.state
    }

    fn start(&mut self, reporter: LoadReporter) {
        self.shared.starts.set(self.shared.starts.get() + 1);
        *self.shared.reporter.borrow_mut() = Some(reporter);
    }

    fn check_status(&mut self) -> Option<Outcome> {
        if self.shared.pollable.get() && self.shared.complete.get() {
            Some(Outcome::Loaded)
        } else {
            None
        }
    }

    fn on_timeout(&mut self) -> Option<Outcome> {
        if self.shared.complete.get() {
            Some(Outcome::Loaded)
        } else {
            Some(Outcome::TimedOut)
        }
    }
}

pub struct Control {
    shared: Rc<Shared>,
}

impl Control {
    pub fn starts(&self) -> usize {
        self.shared.starts.get()
    }

    pub fn load(&self) {
        self.reporter().loaded();
    }

    pub fn fail(&self) {
        self.reporter().errored("connection reset");
    }

    pub fn time_out(&self) {
        self.reporter().timed_out();
    }

    /// Completes without reporting; only a status poll can notice.
    pub fn complete_silently(&self) {
        self.shared.complete.set(true);
        self.shared.pollable.set(true);
    }

    /// Completes without reporting, and without answering status polls either.
    pub fn complete_unobserved(&self) {
        self.shared.complete.set(true);
        self.shared.pollable.set(false);
    }

    fn reporter(&self) -> LoadReporter {
        self.shared
            .reporter
            .borrow()
            .clone()
            .expect("handle was never started")
    }
}

pub fn scripted() -> (Handle, Control) {
    let shared = Rc::new(Shared::default());
    let handle = Handle::new(Scripted {
        state: HandleState::new(),
        shared: shared.clone(),
    });
    (handle, Control { shared })
}

/// Collects every progress a listener receives.
pub fn recorder() -> (Rc<RefCell<Vec<Progress>>>, impl FnMut(&Progress) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |progress: &Progress| {
        sink.borrow_mut().push(progress.clone())
    })
}
