use crate::LoaderError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Options accepted when constructing a [`Preloader`](crate::Preloader).
///
/// Field names on the wire are camelCase and durations are milliseconds, e.g.
/// `{"maxSimultaneousLoads": 4, "statusInterval": 250, "noProgressTimeout": 10000}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderSettings {
    /// Advisory concurrency cap. Not enforced by the queue.
    pub max_simultaneous_loads: usize,
    /// Reserved.
    #[serde(with = "millis")]
    pub progress_poll_time: Duration,
    /// Delay between status polls of active assets.
    #[serde(with = "millis")]
    pub status_interval: Duration,
    /// How long an active asset may go without progress before it is timed out.
    /// `None` waits forever.
    #[serde(with = "optional_millis")]
    pub no_progress_timeout: Option<Duration>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_simultaneous_loads: 2,
            progress_poll_time: Duration::from_millis(500),
            status_interval: Duration::from_millis(5000),
            no_progress_timeout: None,
        }
    }
}

impl LoaderSettings {
    pub fn from_json_str(json: &str) -> Result<Self, LoaderError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoaderError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_max_simultaneous_loads(mut self, loads: usize) -> Self {
        self.max_simultaneous_loads = loads;
        self
    }

    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    pub fn with_no_progress_timeout(mut self, timeout: Duration) -> Self {
        self.no_progress_timeout = Some(timeout);
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = LoaderSettings::default();
        assert_eq!(settings.max_simultaneous_loads, 2);
        assert_eq!(settings.progress_poll_time, Duration::from_millis(500));
        assert_eq!(settings.status_interval, Duration::from_secs(5));
        assert_eq!(settings.no_progress_timeout, None);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings =
            LoaderSettings::from_json_str(r#"{"statusInterval": 250, "noProgressTimeout": 1000}"#)
                .unwrap();
        assert_eq!(settings.status_interval, Duration::from_millis(250));
        assert_eq!(settings.no_progress_timeout, Some(Duration::from_secs(1)));
        assert_eq!(settings.max_simultaneous_loads, 2);
    }

    #[test]
    fn null_timeout_is_unbounded() {
        let settings = LoaderSettings::from_json_str(r#"{"noProgressTimeout": null}"#).unwrap();
        assert_eq!(settings.no_progress_timeout, None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            LoaderSettings::from_json_str("{\"statusInterval\": \"soon\"}"),
            Err(LoaderError::Json(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.json");
        fs::write(&path, r#"{"maxSimultaneousLoads": 6}"#).unwrap();
        assert_eq!(LoaderSettings::load(&path).unwrap().max_simultaneous_loads, 6);
        assert!(matches!(
            LoaderSettings::load(dir.path().join("missing.json")),
            Err(LoaderError::Io(_))
        ));
    }
}
