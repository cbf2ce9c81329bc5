//! Structured merge diagnostics.
//!
//! Nothing the merge finds in the data is fatal. Integrity failures leave a
//! class unresolved, conflicts keep the value already recorded, and each case
//! is collected here as a [`Diagnostic`] so reviewers can triage them instead
//! of grepping log text. Every diagnostic is also logged at `warn` when it is
//! recorded.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Broad grouping of diagnostic kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    /// The class could not be resolved.
    Integrity,
    /// Two classes disagree about a shared prototype.
    Conflict,
    /// The hierarchy document references something it does not define.
    Hierarchy,
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Fewer observed slots than the parent's resolved vtable.
    SlotCountShrink,
    /// The class is its own ancestor.
    CyclicAncestry,
    /// An ancestor failed to resolve, so slot identity cannot be inherited.
    UnresolvedAncestor,
    /// The parent named by the class is not in the hierarchy.
    MissingParent,
    /// A class names a shared slot differently from the recorded prototype.
    NameMismatch,
    /// A class disagrees on the parameter count of a shared slot.
    ParameterCountMismatch,
}

impl DiagnosticKind {
    /// Stable code for JSON output.
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::SlotCountShrink => "slot_count_shrink",
            DiagnosticKind::CyclicAncestry => "cyclic_ancestry",
            DiagnosticKind::UnresolvedAncestor => "unresolved_ancestor",
            DiagnosticKind::MissingParent => "missing_parent",
            DiagnosticKind::NameMismatch => "name_mismatch",
            DiagnosticKind::ParameterCountMismatch => "parameter_count_mismatch",
        }
    }

    /// Category of this kind.
    pub fn category(self) -> DiagnosticCategory {
        match self {
            DiagnosticKind::SlotCountShrink
            | DiagnosticKind::CyclicAncestry
            | DiagnosticKind::UnresolvedAncestor => DiagnosticCategory::Integrity,
            DiagnosticKind::NameMismatch | DiagnosticKind::ParameterCountMismatch => {
                DiagnosticCategory::Conflict
            }
            DiagnosticKind::MissingParent => DiagnosticCategory::Hierarchy,
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One finding of the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Class being merged when the finding was made.
    pub class_name: String,
    /// Slot concerned, when the finding is about one slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_index: Option<usize>,
    /// What went wrong.
    pub kind: DiagnosticKind,
    /// Grouping of `kind`, for filtering reports.
    pub category: DiagnosticCategory,
    /// Human-readable detail.
    pub detail: String,
}

impl Diagnostic {
    /// Create a class-level diagnostic.
    pub fn new(class_name: impl Into<String>, kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Diagnostic {
            class_name: class_name.into(),
            slot_index: None,
            kind,
            category: kind.category(),
            detail: detail.into(),
        }
    }

    /// Attach the slot concerned.
    pub fn at_slot(mut self, slot_index: usize) -> Self {
        self.slot_index = Some(slot_index);
        self
    }
}

/// Collector for diagnostics, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Record a diagnostic.
    pub fn record(&mut self, diagnostic: Diagnostic) {
        match diagnostic.slot_index {
            Some(slot) => warn!(
                class = %diagnostic.class_name,
                slot,
                kind = %diagnostic.kind,
                "{}",
                diagnostic.detail
            ),
            None => warn!(
                class = %diagnostic.class_name,
                kind = %diagnostic.kind,
                "{}",
                diagnostic.detail
            ),
        }
        self.items.push(diagnostic);
    }

    /// Number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Number of diagnostics of `kind`.
    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }

    /// Diagnostics recorded against `class_name`.
    pub fn for_class<'a>(&'a self, class_name: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.items.iter().filter(move |d| d.class_name == class_name)
    }

    /// Consume the collector.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
