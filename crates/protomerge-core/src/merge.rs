//! Hierarchy merger: resolves every class's vtable against the shared prototype table.
//!
//! Classes are resolved depth-first, parent before child, each at most once.
//! A class whose parent resolved reuses the parent's prototypes for the
//! inherited prefix of its vtable and enriches them with its own
//! observations; slots past the parent's length create new prototypes
//! declared by the class.
//!
//! ## Outcomes
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | no observations for the class | unobserved, children start a fresh vtable |
//! | fewer observed slots than the parent's vtable | failed, `slot_count_shrink` |
//! | the class is its own ancestor | failed, `cyclic_ancestry` |
//! | the parent failed | failed, `unresolved_ancestor` |
//! | the parent is not in the hierarchy | resolved as a root, `missing_parent` |
//!
//! A failed class never inherits partially: its own new slots are not
//! created either, so no prototype identity is assigned from a misaligned
//! vtable.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::enrich::enrich;
use crate::hierarchy::ClassHierarchy;
use crate::model::{ClassNode, Observation, ProtoId, PrototypeSeed, VtableSlot};
use crate::observations::ObservationStore;
use crate::table::{PrototypeSnapshot, PrototypeTable};

/// Resolution state of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassOutcome {
    /// The class has a vtable.
    Resolved(Vec<VtableSlot>),
    /// No binary observed the class.
    Unobserved,
    /// The class failed an integrity check, or inherits from one that did.
    Failed,
}

/// Class counts of a merge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub classes_total: usize,
    pub classes_resolved: usize,
    pub classes_unobserved: usize,
    pub classes_failed: usize,
    pub prototypes: usize,
}

/// Result of a merge: classes with their resolved vtables, the frozen
/// prototype table, and what was found along the way.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// Classes in hierarchy order; `resolved_slots` is set for resolved classes.
    pub classes: Vec<ClassNode>,
    pub prototypes: PrototypeSnapshot,
    pub diagnostics: Diagnostics,
    pub stats: MergeStats,
}

/// Merge state carried across the traversal.
pub struct Merger<'a> {
    hierarchy: &'a ClassHierarchy,
    observations: &'a ObservationStore,
    table: PrototypeTable,
    outcomes: HashMap<String, ClassOutcome>,
    diagnostics: Diagnostics,
}

impl<'a> Merger<'a> {
    /// Create a merger over a hierarchy and its observations.
    pub fn new(hierarchy: &'a ClassHierarchy, observations: &'a ObservationStore) -> Self {
        Merger {
            hierarchy,
            observations,
            table: PrototypeTable::new(),
            outcomes: HashMap::with_capacity(hierarchy.len()),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Resolve every class, in hierarchy order, and finish.
    pub fn run(mut self) -> MergeOutput {
        let hierarchy = self.hierarchy;
        let _span = info_span!("merge", classes = hierarchy.len()).entered();
        for class in hierarchy.iter() {
            self.resolve(&class.name);
        }
        self.finish()
    }

    /// Resolve `name` and, first, its ancestors. Does nothing for a class
    /// already resolved or not in the hierarchy.
    pub fn resolve(&mut self, name: &str) {
        if self.outcomes.contains_key(name) {
            return;
        }
        let hierarchy = self.hierarchy;
        let Some(class) = hierarchy.get(name) else {
            return;
        };
        let outcome = self.resolve_class(class);
        self.outcomes.insert(class.name.clone(), outcome);
    }

    fn resolve_class(&mut self, class: &'a ClassNode) -> ClassOutcome {
        let observations = self.observations;
        let Some(observed) = observations.get(&class.name) else {
            debug!(class = %class.name, "class not observed in any binary");
            return ClassOutcome::Unobserved;
        };

        if self.hierarchy.is_cyclic(&class.name) {
            self.diagnostics.record(Diagnostic::new(
                &class.name,
                DiagnosticKind::CyclicAncestry,
                format!("{} is its own ancestor", class.name),
            ));
            return ClassOutcome::Failed;
        }

        let Some(inherited) = self.inherited_prototypes(class) else {
            return ClassOutcome::Failed;
        };

        if observed.len() < inherited.len() {
            self.diagnostics.record(Diagnostic::new(
                &class.name,
                DiagnosticKind::SlotCountShrink,
                format!(
                    "expected at least {} slots inherited from {}, observed {}",
                    inherited.len(),
                    class.parent.as_deref().unwrap_or_default(),
                    observed.len()
                ),
            ));
            return ClassOutcome::Failed;
        }

        let slots = self.build_slots(class, observed, &inherited);
        debug!(
            class = %class.name,
            slots = slots.len(),
            inherited = inherited.len(),
            "class resolved"
        );
        ClassOutcome::Resolved(slots)
    }

    /// Prototype IDs of the parent's vtable, or `None` if inheriting through
    /// the parent is impossible.
    fn inherited_prototypes(&mut self, class: &'a ClassNode) -> Option<Vec<ProtoId>> {
        let Some(parent) = class.parent.as_deref() else {
            return Some(Vec::new());
        };

        if !self.hierarchy.contains(parent) {
            self.diagnostics.record(Diagnostic::new(
                &class.name,
                DiagnosticKind::MissingParent,
                format!("parent {} is not in the hierarchy; resolving as a root", parent),
            ));
            return Some(Vec::new());
        }

        self.resolve(parent);
        match self.outcomes.get(parent) {
            Some(ClassOutcome::Resolved(slots)) => {
                Some(slots.iter().map(|slot| slot.proto_index).collect())
            }
            Some(ClassOutcome::Failed) => {
                self.diagnostics.record(Diagnostic::new(
                    &class.name,
                    DiagnosticKind::UnresolvedAncestor,
                    format!("parent {} failed to resolve", parent),
                ));
                None
            }
            Some(ClassOutcome::Unobserved) | None => Some(Vec::new()),
        }
    }

    fn build_slots(
        &mut self,
        class: &ClassNode,
        observed: &[Observation],
        inherited: &[ProtoId],
    ) -> Vec<VtableSlot> {
        let mut slots = Vec::with_capacity(observed.len());
        for (slot_index, observation) in observed.iter().enumerate() {
            let proto_index = match inherited.get(slot_index) {
                Some(&id) => {
                    if let Some(record) = self.table.get_mut(id) {
                        enrich(
                            record,
                            observation,
                            &class.name,
                            slot_index,
                            &mut self.diagnostics,
                        );
                    }
                    id
                }
                None => self.table.create(
                    &class.name,
                    slot_index,
                    PrototypeSeed::from_observation(observation),
                ),
            };
            slots.push(VtableSlot::from_observation(proto_index, observation));
        }
        slots
    }

    /// Freeze the table and attach resolved vtables to the classes.
    pub fn finish(mut self) -> MergeOutput {
        let mut stats = MergeStats {
            classes_total: self.hierarchy.len(),
            prototypes: self.table.len(),
            ..MergeStats::default()
        };

        let classes = self
            .hierarchy
            .iter()
            .map(|class| {
                let mut node = class.clone();
                match self.outcomes.remove(&class.name) {
                    Some(ClassOutcome::Resolved(slots)) => {
                        stats.classes_resolved += 1;
                        node.resolved_slots = Some(slots);
                    }
                    Some(ClassOutcome::Failed) => stats.classes_failed += 1,
                    Some(ClassOutcome::Unobserved) | None => stats.classes_unobserved += 1,
                }
                node
            })
            .collect();

        info!(
            resolved = stats.classes_resolved,
            failed = stats.classes_failed,
            unobserved = stats.classes_unobserved,
            prototypes = stats.prototypes,
            diagnostics = self.diagnostics.len(),
            "merge finished"
        );

        MergeOutput {
            classes,
            prototypes: self.table.finalize(),
            diagnostics: self.diagnostics,
            stats,
        }
    }
}

/// Merge `observations` over `hierarchy`.
pub fn merge(hierarchy: &ClassHierarchy, observations: &ObservationStore) -> MergeOutput {
    Merger::new(hierarchy, observations).run()
}
