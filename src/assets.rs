use crate::{Handle, HandleId, Outcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Load state of a queued asset.
///
/// `Queued -> Active -> {Loaded | Errored | TimedOut}`; the last three are terminal.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AssetStatus {
    Queued,
    Active,
    Loaded,
    Errored,
    TimedOut,
}

impl AssetStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AssetStatus::Loaded | AssetStatus::Errored | AssetStatus::TimedOut
        )
    }
}

impl From<Outcome> for AssetStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Loaded => AssetStatus::Loaded,
            Outcome::Errored => AssetStatus::Errored,
            Outcome::TimedOut => AssetStatus::TimedOut,
        }
    }
}

/// Labels used to start a subset of the queue.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a comma-delimited list and trims each tag.
    pub fn parse(list: &str) -> Self {
        Tags(
            list.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// True if every requested tag is one of ours. Our tags are compared lower-cased.
    pub fn contains_all(&self, requested: &Tags) -> bool {
        requested
            .iter()
            .all(|wanted| self.iter().any(|tag| tag.to_lowercase() == wanted))
    }
}

impl From<&str> for Tags {
    fn from(list: &str) -> Self {
        Tags::parse(list)
    }
}

impl From<String> for Tags {
    fn from(list: String) -> Self {
        Tags::parse(&list)
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        Tags(tags)
    }
}

impl From<Vec<&str>> for Tags {
    fn from(tags: Vec<&str>) -> Self {
        tags.as_slice().into()
    }
}

impl From<&[&str]> for Tags {
    fn from(tags: &[&str]) -> Self {
        Tags(tags.iter().map(|tag| (*tag).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Tags {
    fn from(tags: [&str; N]) -> Self {
        Tags::from(&tags[..])
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Per-asset options accepted by [`Preloader::add`](crate::Preloader::add).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddOptions {
    /// Overrides the generated id.
    pub id: Option<String>,
    pub weight: f64,
    pub tags: Tags,
}

impl AddOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_tags<T: Into<Tags>>(mut self, tags: T) -> Self {
        self.tags = tags.into();
        self
    }
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            id: None,
            weight: DEFAULT_WEIGHT,
            tags: Tags::default(),
        }
    }
}

/// One queued asset and its metadata.
#[derive(Debug)]
pub struct AssetEntry {
    pub id: String,
    pub resource: Handle,
    pub weight: f64,
    pub tags: Tags,
    pub status: AssetStatus,
}

impl AssetEntry {
    pub fn new(id: String, resource: Handle, weight: f64, tags: Tags) -> Self {
        Self {
            id,
            resource,
            weight,
            tags,
            status: AssetStatus::Queued,
        }
    }

    pub fn handle_id(&self) -> HandleId {
        self.resource.id()
    }
}

/// Ordered collection of queued assets, in insertion order.
#[derive(Debug, Default)]
pub struct Assets {
    entries: Vec<AssetEntry>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: AssetEntry) {
        self.entries.push(entry);
    }

    pub fn get(&self, handle: HandleId) -> Option<&AssetEntry> {
        self.entries.iter().find(|entry| entry.handle_id() == handle)
    }

    pub fn get_mut(&mut self, handle: HandleId) -> Option<&mut AssetEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.handle_id() == handle)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&AssetEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn position(&self, handle: HandleId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.handle_id() == handle)
    }

    /// Drops every entry. In-flight loads are not stopped.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AssetEntry> {
        self.entries.iter()
    }

    pub fn get_at(&self, index: usize) -> Option<&AssetEntry> {
        self.entries.get(index)
    }

    pub(crate) fn entry_at_mut(&mut self, index: usize) -> Option<&mut AssetEntry> {
        self.entries.get_mut(index)
    }

    pub fn count_with_status(&self, status: AssetStatus) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }

    pub fn has_active(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.status == AssetStatus::Active)
    }
}

impl<'a> IntoIterator for &'a Assets {
    type Item = &'a AssetEntry;
    type IntoIter = std::slice::Iter<'a, AssetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
