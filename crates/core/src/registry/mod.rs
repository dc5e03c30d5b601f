//! Registry of context sets: tag -> curated URLs.
//!
//! The registry holds an immutable [`RegistrySnapshot`] behind an `Arc`.
//! Reload parses the whole document first and only then swaps the pointer,
//! so readers see either the old or the new sets and a failed reload leaves
//! the active snapshot untouched.

mod source;

pub use source::parse_context_sets;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::tags::strip_sigil;

/// The URLs and metadata behind one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContextSet {
    /// Tag without the leading `@`.
    pub tag: String,
    /// Canonical URLs, references expanded, duplicates removed.
    pub urls: Vec<String>,
    /// Display name.
    pub name: Option<String>,
    pub language: Option<String>,
}

impl ContextSet {
    pub fn new(tag: impl Into<String>, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { tag: tag.into(), urls: urls.into_iter().map(Into::into).collect(), name: None, language: None }
    }
}

/// Where a context set document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySource {
    File(PathBuf),
    /// Document text supplied directly, e.g. by an admin call.
    Inline(String),
}

impl RegistrySource {
    fn read(&self) -> Result<String, Error> {
        match self {
            RegistrySource::File(path) => std::fs::read_to_string(path)
                .map_err(|e| Error::RegistryIo(format!("{}: {e}", path.display()))),
            RegistrySource::Inline(text) => Ok(text.clone()),
        }
    }

    /// Short human-readable origin for status reports.
    pub fn describe(&self) -> String {
        match self {
            RegistrySource::File(path) => path.display().to_string(),
            RegistrySource::Inline(_) => "inline".to_string(),
        }
    }
}

/// One immutable generation of the registry.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    sets: BTreeMap<String, ContextSet>,
    origin: Option<String>,
    loaded_at: Option<DateTime<Utc>>,
}

impl RegistrySnapshot {
    pub fn get(&self, tag: &str) -> Option<&ContextSet> {
        self.sets.get(strip_sigil(tag))
    }

    /// URLs for `tag`; empty when the tag is unknown.
    pub fn resolve(&self, tag: &str) -> Vec<String> {
        self.get(tag).map(|s| s.urls.clone()).unwrap_or_default()
    }

    /// Sets ordered by tag.
    pub fn sets(&self) -> impl Iterator<Item = &ContextSet> {
        self.sets.values()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Load state reported by the health check.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegistryStatus {
    /// Whether a document has been loaded successfully.
    pub loaded: bool,
    pub origin: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub set_count: usize,
    /// Error of the most recent load attempt, if it failed.
    pub last_error: Option<String>,
}

/// Context set registry with atomic reload.
#[derive(Debug, Default)]
pub struct Registry {
    current: RwLock<Arc<RegistrySnapshot>>,
    default_source: Option<RegistrySource>,
    last_error: RwLock<Option<String>>,
}

impl Registry {
    /// An empty registry with no configured source.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding `sets` directly.
    pub fn from_sets(sets: impl IntoIterator<Item = ContextSet>) -> Self {
        let sets = sets.into_iter().map(|s| (s.tag.clone(), s)).collect();
        let snapshot = RegistrySnapshot { sets, origin: Some("inline".into()), loaded_at: Some(Utc::now()) };
        Self { current: RwLock::new(Arc::new(snapshot)), ..Default::default() }
    }

    /// Load from `source`, failing if it cannot be read or parsed.
    ///
    /// The source becomes the default for [`Registry::reload_default`].
    pub fn load(source: RegistrySource) -> Result<Self, Error> {
        let registry = Self { default_source: Some(source.clone()), ..Default::default() };
        registry.reload(&source)?;
        Ok(registry)
    }

    /// Load from `source`, starting empty if that fails.
    ///
    /// The failure is logged and kept in [`RegistryStatus::last_error`].
    pub fn load_or_empty(source: RegistrySource) -> Self {
        let registry = Self { default_source: Some(source.clone()), ..Default::default() };
        if let Err(e) = registry.reload(&source) {
            tracing::warn!(source = %source.describe(), error = %e, "starting with empty context set registry");
        }
        registry
    }

    /// The current generation. Hold on to it for a consistent view across
    /// several lookups.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().clone()
    }

    /// URLs for `tag` (with or without `@`); empty when unknown.
    pub fn resolve(&self, tag: &str) -> Vec<String> {
        self.snapshot().resolve(tag)
    }

    /// All sets ordered by tag.
    pub fn list_all(&self) -> Vec<ContextSet> {
        self.snapshot().sets().cloned().collect()
    }

    /// Parse `source` and swap it in.
    ///
    /// # Errors
    ///
    /// Returns `Error::RegistryIo` or `Error::RegistryParse`; the previous
    /// snapshot stays active in both cases.
    pub fn reload(&self, source: &RegistrySource) -> Result<Arc<RegistrySnapshot>, Error> {
        let parsed = source.read().and_then(|text| parse_context_sets(&text));

        let sets = match parsed {
            Ok(sets) => sets,
            Err(e) => {
                tracing::warn!(source = %source.describe(), error = %e, "context set reload rejected");
                *self.last_error.write() = Some(e.to_string());
                return Err(e);
            }
        };

        let snapshot =
            Arc::new(RegistrySnapshot { sets, origin: Some(source.describe()), loaded_at: Some(Utc::now()) });
        *self.current.write() = snapshot.clone();
        *self.last_error.write() = None;

        tracing::info!(source = %source.describe(), sets = snapshot.len(), "loaded context sets");
        Ok(snapshot)
    }

    /// Reload from the source the registry was created with.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` when no default source is configured,
    /// otherwise the same errors as [`Registry::reload`].
    pub fn reload_default(&self) -> Result<Arc<RegistrySnapshot>, Error> {
        match &self.default_source {
            Some(source) => self.reload(source),
            None => Err(Error::InvalidInput("no context set source configured".into())),
        }
    }

    pub fn status(&self) -> RegistryStatus {
        let snapshot = self.snapshot();
        RegistryStatus {
            loaded: snapshot.loaded_at.is_some(),
            origin: snapshot.origin.clone(),
            loaded_at: snapshot.loaded_at,
            set_count: snapshot.len(),
            last_error: self.last_error.read().clone(),
        }
    }
}
