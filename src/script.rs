use crate::{HandleState, LoadAsset, LoadReporter, LoadRequest, LoaderError, Outcome};
use std::path::{Path, PathBuf};

/// Extensions routed to [`ScriptAsset`] by default.
pub const SCRIPT_EXTENSIONS: &[&str] = &["js", "json"];

/// Mirrors the ready states a script element goes through.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReadyState {
    /// Not started.
    Uninitialized,
    Loading,
    /// Read, with the outcome not yet reported.
    Loaded,
    /// Read and reported.
    Complete,
}

/// Script-backed handle. The source is read as UTF-8 text; `json` sources must also parse.
///
/// Status polls only report in the `Loaded` ready state, so the outcome is produced once
/// whether the worker thread or a poll gets there first.
pub struct ScriptAsset {
    state: HandleState,
    locator: String,
    request: Option<LoadRequest<String>>,
}

impl ScriptAsset {
    pub fn new<S: Into<String>>(locator: S) -> Self {
        Self {
            state: HandleState::new(),
            locator: locator.into(),
            request: None,
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        match &self.request {
            None => ReadyState::Uninitialized,
            Some(request) if !request.status().is_finished() => ReadyState::Loading,
            Some(request) if request.is_reported() => ReadyState::Complete,
            Some(_) => ReadyState::Loaded,
        }
    }

    /// The script source, once it has been read.
    pub fn source(&self) -> Option<String> {
        self.request.as_ref().and_then(LoadRequest::output)
    }
}

fn decode_source(path: PathBuf, bytes: Vec<u8>) -> Result<String, LoaderError> {
    let source = String::from_utf8(bytes).map_err(|err| LoaderError::Decode {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    if is_json(&path) {
        serde_json::from_str::<serde_json::Value>(&source).map_err(|err| LoaderError::Decode {
            path,
            reason: err.to_string(),
        })?;
    }
    Ok(source)
}

fn is_json(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "json")
}

impl LoadAsset for ScriptAsset {
    fn state(&self) -> &HandleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut HandleState {
        &mut self.state
    }

    fn start(&mut self, reporter: LoadReporter) {
        let path = PathBuf::from(&self.locator);
        log::debug!("loading script {}", path.display());
        self.request = Some(LoadRequest::spawn(path.clone(), reporter, move |bytes| {
            decode_source(path, bytes)
        }));
    }

    fn check_status(&mut self) -> Option<Outcome> {
        match self.ready_state() {
            ReadyState::Loaded => self.request.as_ref()?.take_outcome(),
            _ => None,
        }
    }

    fn on_timeout(&mut self) -> Option<Outcome> {
        let request = match &self.request {
            Some(request) => request,
            None => return Some(Outcome::TimedOut),
        };
        if !request.claim_report() {
            return None;
        }
        if request.is_complete() {
            Some(Outcome::Loaded)
        } else {
            Some(Outcome::TimedOut)
        }
    }

    fn locator(&self) -> Option<&str> {
        Some(&self.locator)
    }
}
