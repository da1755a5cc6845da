use crate::{LoadReporter, LoaderError, Outcome};
use parking_lot::Mutex;
use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

/// Where a background load currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestStatus<T> {
    Pending,
    Complete(T),
    Failed(String),
}

impl<T> RequestStatus<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, RequestStatus::Complete(_))
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// Reads one file on a worker thread and decodes it into `T`.
///
/// The outcome is kept so the owning handle can answer status polls. Exactly one side
/// reports it: the worker thread through the [`LoadReporter`], or the handle through
/// [`claim_report`](LoadRequest::claim_report), whichever comes first.
pub struct LoadRequest<T> {
    status: Arc<Mutex<RequestStatus<T>>>,
    reported: Arc<AtomicBool>,
}

impl<T> LoadRequest<T>
where
    T: Clone + Send + 'static,
{
    pub fn spawn<P, F>(path: P, reporter: LoadReporter, decode: F) -> Self
    where
        P: AsRef<Path>,
        F: FnOnce(Vec<u8>) -> Result<T, LoaderError> + Send + 'static,
    {
        let path = path.as_ref().to_owned();
        let request = LoadRequest {
            status: Arc::new(Mutex::new(RequestStatus::Pending)),
            reported: Arc::new(AtomicBool::new(false)),
        };

        let status = request.status.clone();
        let reported = request.reported.clone();
        let thread_reporter = reporter.clone();
        let thread_path = path.clone();
        let spawned = thread::Builder::new()
            .name(format!("load {}", path.display()))
            .spawn(move || {
                let path = thread_path;
                let result = fs::read(&path)
                    .map_err(|source| LoaderError::Load {
                        path: path.clone(),
                        source,
                    })
                    .and_then(decode);
                match result {
                    Ok(output) => {
                        *status.lock() = RequestStatus::Complete(output);
                        if !reported.swap(true, Ordering::AcqRel) {
                            thread_reporter.loaded();
                        }
                    }
                    Err(err) => {
                        log::warn!("failed to load {}: {}", path.display(), err);
                        *status.lock() = RequestStatus::Failed(err.to_string());
                        if !reported.swap(true, Ordering::AcqRel) {
                            thread_reporter.errored(err);
                        }
                    }
                }
            });

        if let Err(err) = spawned {
            log::error!("could not spawn a load thread for {}: {}", path.display(), err);
            *request.status.lock() = RequestStatus::Failed(err.to_string());
            if request.claim_report() {
                reporter.errored(err);
            }
        }
        request
    }

    pub fn status(&self) -> RequestStatus<T> {
        self.status.lock().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.status.lock().is_complete()
    }

    pub fn output(&self) -> Option<T> {
        match &*self.status.lock() {
            RequestStatus::Complete(output) => Some(output.clone()),
            _ => None,
        }
    }

    /// Whether the outcome was already reported, by either side.
    pub fn is_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }

    /// Takes the right to report this request's outcome. Returns false if the worker
    /// thread or an earlier claim already reported it; the worker stays silent after a
    /// successful claim.
    pub fn claim_report(&self) -> bool {
        !self.reported.swap(true, Ordering::AcqRel)
    }

    /// The finished outcome, claimed for the caller. `None` while pending or once it
    /// has been reported.
    pub fn take_outcome(&self) -> Option<Outcome> {
        let outcome = match &*self.status.lock() {
            RequestStatus::Pending => return None,
            RequestStatus::Complete(_) => Outcome::Loaded,
            RequestStatus::Failed(_) => Outcome::Errored,
        };
        if self.claim_report() {
            Some(outcome)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HandleId, LoadReport, Outcome};
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    fn reporter() -> (LoadReporter, crossbeam_channel::Receiver<LoadReport>) {
        let (tx, rx) = unbounded();
        (LoadReporter::new(HandleId::new(), tx), rx)
    }

    #[test]
    fn reports_loaded_with_decoded_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, b"hello").unwrap();

        let (reporter, rx) = reporter();
        let request = LoadRequest::spawn(&path, reporter, |bytes| Ok(bytes.len()));
        let report = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(report.outcome, Outcome::Loaded);
        assert!(request.is_complete());
        assert_eq!(request.output(), Some(5));
    }

    #[test]
    fn missing_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let (reporter, rx) = reporter();
        let request: LoadRequest<()> =
            LoadRequest::spawn(dir.path().join("missing.png"), reporter, |_| Ok(()));
        let report = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(report.outcome, Outcome::Errored);
        assert!(report.message.is_some());
        assert!(matches!(request.status(), RequestStatus::Failed(_)));
        assert_eq!(request.output(), None);
    }

    #[test]
    fn decode_failure_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"garbage").unwrap();

        let (reporter, rx) = reporter();
        let _request: LoadRequest<()> = LoadRequest::spawn(&path, reporter, |_| {
            Err(LoaderError::Decode {
                path: "data.bin".into(),
                reason: "bad bytes".into(),
            })
        });
        let report = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.outcome, Outcome::Errored);
    }

    #[test]
    fn reported_outcome_cannot_be_taken_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, b"hello").unwrap();

        let (reporter, rx) = reporter();
        let request = LoadRequest::spawn(&path, reporter, |bytes| Ok(bytes.len()));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(request.is_reported());
        assert_eq!(request.take_outcome(), None);
        assert!(!request.claim_report());
    }

    #[test]
    fn claimed_request_keeps_the_worker_silent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, b"hello").unwrap();

        let (gate_tx, gate_rx) = unbounded::<()>();
        let (reporter, rx) = reporter();
        let request = LoadRequest::spawn(&path, reporter, move |bytes| {
            gate_rx.recv().ok();
            Ok(bytes.len())
        });
        assert_eq!(request.take_outcome(), None);
        assert!(request.claim_report());
        gate_tx.send(()).unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
        assert!(request.is_complete());
        assert_eq!(request.take_outcome(), None);
    }
}
