//! Observation store: per-class vtable observations collected from many binaries.
//!
//! Each analyzed binary contributes one [`ObservationDocument`]. When two
//! documents observe the same class, the later one replaces the earlier one
//! wholesale; observations are never merged slot by slot at this stage.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::model::Observation;

/// One binary's observations: class name to ordered vtable observations.
pub type ObservationDocument = BTreeMap<String, Vec<Observation>>;

/// Counts from ingesting one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Classes taken into the store.
    pub accepted: usize,
    /// Classes ignored because the hierarchy does not know them.
    pub dropped: usize,
    /// Accepted classes that replaced an earlier document's observations.
    pub replaced: usize,
}

#[derive(Debug, Clone)]
struct ClassObservations {
    source: String,
    slots: Vec<Observation>,
}

/// Observations per class, last writer wins.
#[derive(Debug, Clone, Default)]
pub struct ObservationStore {
    by_class: HashMap<String, ClassObservations>,
}

impl ObservationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        ObservationStore::default()
    }

    /// Store the observations of one class, replacing any earlier entry.
    ///
    /// Placeholder labels are cleared from names on the way in. Returns the
    /// source label of the replaced entry, if there was one.
    pub fn insert_class(
        &mut self,
        class_name: impl Into<String>,
        slots: Vec<Observation>,
        source: impl Into<String>,
    ) -> Option<String> {
        let class_name = class_name.into();
        let source = source.into();
        let slots = slots.into_iter().map(Observation::normalized).collect();
        let previous = self
            .by_class
            .insert(class_name.clone(), ClassObservations { source, slots })?;
        debug!(
            class = %class_name,
            replaced = %previous.source,
            "observations replaced by later document"
        );
        Some(previous.source)
    }

    /// Ingest a whole document, keeping only classes accepted by `known`.
    pub fn ingest_document(
        &mut self,
        document: ObservationDocument,
        source: &str,
        known: impl Fn(&str) -> bool,
    ) -> IngestStats {
        let mut stats = IngestStats::default();
        for (class_name, slots) in document {
            if !known(&class_name) {
                stats.dropped += 1;
                continue;
            }
            stats.accepted += 1;
            if self.insert_class(class_name, slots, source).is_some() {
                stats.replaced += 1;
            }
        }
        stats
    }

    /// Observations for `class_name`.
    pub fn get(&self, class_name: &str) -> Option<&[Observation]> {
        self.by_class.get(class_name).map(|c| c.slots.as_slice())
    }

    /// Returns true if `class_name` was observed.
    pub fn contains(&self, class_name: &str) -> bool {
        self.by_class.contains_key(class_name)
    }

    /// Number of observed classes.
    pub fn len(&self) -> usize {
        self.by_class.len()
    }

    /// Returns true if no class was observed.
    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }
}
