//! Data model: classes, per-binary observations, prototype records, vtable slots.
//!
//! This module provides the tables the merge works over:
//! - [`ClassNode`]: One class of the hierarchy forest
//! - [`Observation`]: One binary's recovered data for one vtable slot
//! - [`PrototypeRecord`]: The hierarchy-wide signature shared by every class
//!   inheriting a slot
//! - [`VtableSlot`]: One entry of a class's resolved vtable
//!
//! Prototypes are addressed by [`ProtoId`], an index into the
//! [`PrototypeTable`](crate::table::PrototypeTable). Slots hold the index,
//! never the record itself, so every class sharing a slot sees the same record.
//!
//! # Unknown Markers
//!
//! The extraction side writes [`UNKNOWN`] for any type it could not recover.
//! A parameter list consisting of exactly one UNKNOWN-typed entry means
//! "nothing known about the parameters", which is different from the empty
//! list of a method that genuinely takes no arguments.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sentinel for a type that was not recovered.
pub const UNKNOWN: &str = "???";

/// Disassembler-assigned function labels (`sub_FFFFFE0007A1C2D0`, `nullsub_12`,
/// `j_sub_1234`). These carry no name information.
static PLACEHOLDER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:j_)*(?:sub|nullsub)_[0-9A-Fa-f]+$").expect("valid placeholder label pattern")
});

/// Returns true if `name` is an auto-generated disassembler label.
pub fn is_placeholder_label(name: &str) -> bool {
    PLACEHOLDER_LABEL.is_match(name)
}

/// Returns true if `name` carries no usable method name.
pub fn is_unnamed(name: &str) -> bool {
    name.is_empty() || is_placeholder_label(name)
}

/// Returns true if `name` follows the destructor pattern (`~Class`).
pub fn is_destructor_name(name: &str) -> bool {
    name.starts_with('~')
}

// ============================================================================
// ID Types
// ============================================================================

/// Index of a prototype in the global prototype table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ProtoId(pub u32);

impl ProtoId {
    /// Create a new prototype ID.
    pub fn new(id: u32) -> Self {
        ProtoId(id)
    }

    /// Position of the prototype in the table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ProtoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "proto_{}", self.0)
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// A method parameter: a type and, when recovered, a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodParam {
    /// Parameter type, or [`UNKNOWN`].
    #[serde(rename = "type")]
    pub ty: String,
    /// Parameter name, if recovered.
    #[serde(default)]
    pub name: Option<String>,
}

impl MethodParam {
    /// Create a parameter with a type and no name.
    pub fn new(ty: impl Into<String>) -> Self {
        MethodParam {
            ty: ty.into(),
            name: None,
        }
    }

    /// Create a named parameter.
    pub fn named(ty: impl Into<String>, name: impl Into<String>) -> Self {
        MethodParam {
            ty: ty.into(),
            name: Some(name.into()),
        }
    }

    /// Create a parameter of unknown type.
    pub fn unknown() -> Self {
        MethodParam::new(UNKNOWN)
    }

    /// Returns true if the type was not recovered.
    pub fn is_unknown(&self) -> bool {
        self.ty == UNKNOWN
    }
}

/// The "nothing known" parameter list.
pub fn unknown_parameters() -> Vec<MethodParam> {
    vec![MethodParam::unknown()]
}

/// Returns true if `params` is the "nothing known" placeholder list.
pub fn is_unknown_parameters(params: &[MethodParam]) -> bool {
    matches!(params, [only] if only.is_unknown())
}

// ============================================================================
// Classes
// ============================================================================

/// A class in the hierarchy forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNode {
    /// Class name (unique key).
    pub name: String,
    /// Name of the parent class, if any. Lookup only.
    #[serde(default)]
    pub parent: Option<String>,
    /// Whether any slot of the class is pure virtual.
    #[serde(alias = "isAbstract")]
    pub is_abstract: bool,
    /// Resolved vtable, populated by the merger. `None` until merged, and
    /// for classes the merge could not resolve.
    #[serde(skip)]
    pub resolved_slots: Option<Vec<VtableSlot>>,
}

impl ClassNode {
    /// Create a root class.
    pub fn new(name: impl Into<String>) -> Self {
        ClassNode {
            name: name.into(),
            parent: None,
            is_abstract: false,
            resolved_slots: None,
        }
    }

    /// Set the parent class.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Mark the class abstract.
    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    /// Returns true once the merger produced a vtable for this class.
    pub fn is_resolved(&self) -> bool {
        self.resolved_slots.is_some()
    }
}

// ============================================================================
// Observations
// ============================================================================

/// One binary's recovered data for one vtable slot of one class.
///
/// Field names follow the extraction output (`vtable_index`,
/// `is_implemented_by_current_class`); the shorter `slot_index` and
/// `implemented_here` are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Position of the slot in the binary's recovered vtable.
    #[serde(rename = "vtable_index", alias = "slot_index")]
    pub slot_index: usize,
    /// Method name. Empty when unknown.
    pub name: String,
    /// Mangled symbol. Empty when unknown.
    #[serde(default)]
    pub mangled_name: String,
    /// Return type, or [`UNKNOWN`].
    pub return_type: String,
    /// Parameters, excluding `this`.
    pub parameters: Vec<MethodParam>,
    /// The slot had no body in this binary.
    pub is_pure_virtual: bool,
    /// The slot's defining class in this binary is the observed class.
    #[serde(
        rename = "is_implemented_by_current_class",
        alias = "implemented_here"
    )]
    pub implemented_here: bool,
}

impl Observation {
    /// Create a concrete observation with an unknown signature.
    pub fn new(slot_index: usize, name: impl Into<String>) -> Self {
        Observation {
            slot_index,
            name: name.into(),
            mangled_name: String::new(),
            return_type: UNKNOWN.to_string(),
            parameters: unknown_parameters(),
            is_pure_virtual: false,
            implemented_here: false,
        }
    }

    /// Create a pure-virtual observation.
    pub fn pure_virtual(slot_index: usize) -> Self {
        Observation {
            is_pure_virtual: true,
            ..Observation::new(slot_index, "")
        }
    }

    /// Set the mangled name.
    pub fn with_mangled_name(mut self, mangled_name: impl Into<String>) -> Self {
        self.mangled_name = mangled_name.into();
        self
    }

    /// Set the return type.
    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = return_type.into();
        self
    }

    /// Set the parameters.
    pub fn with_parameters(mut self, parameters: Vec<MethodParam>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Mark the slot as implemented by the observed class.
    pub fn implemented(mut self) -> Self {
        self.implemented_here = true;
        self
    }

    /// Clear disassembler labels from the name fields.
    pub fn normalized(mut self) -> Self {
        if is_placeholder_label(&self.name) {
            self.name.clear();
        }
        if is_placeholder_label(&self.mangled_name) {
            self.mangled_name.clear();
        }
        self
    }
}

// ============================================================================
// Prototypes
// ============================================================================

/// Initial signature of a newly declared prototype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrototypeSeed {
    pub name: String,
    pub mangled_name: String,
    pub return_type: String,
    pub parameters: Vec<MethodParam>,
}

impl PrototypeSeed {
    /// A seed that carries no signature.
    pub fn unknown() -> Self {
        PrototypeSeed {
            name: String::new(),
            mangled_name: String::new(),
            return_type: UNKNOWN.to_string(),
            parameters: unknown_parameters(),
        }
    }

    /// Seed from an observation. Pure-virtual observations carry no
    /// signature and seed [`PrototypeSeed::unknown`].
    pub fn from_observation(observation: &Observation) -> Self {
        if observation.is_pure_virtual {
            return PrototypeSeed::unknown();
        }
        PrototypeSeed {
            name: observation.name.clone(),
            mangled_name: observation.mangled_name.clone(),
            return_type: observation.return_type.clone(),
            parameters: observation.parameters.clone(),
        }
    }
}

/// The canonical, hierarchy-wide signature of a virtual method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrototypeRecord {
    /// Position in the prototype table.
    pub proto_index: ProtoId,
    /// Method name. Empty until some class contributes one.
    pub name: String,
    /// Mangled symbol of the first contributing implementation.
    pub mangled_name: String,
    /// Return type, or [`UNKNOWN`].
    pub return_type: String,
    /// Parameters, excluding `this`.
    pub parameters: Vec<MethodParam>,
    /// Slot position at the declaring class.
    pub original_slot_index: usize,
    /// Class that introduced the slot.
    pub declaring_class: String,
}

impl PrototypeRecord {
    /// Returns true if the record has a method name.
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    /// Returns true if the return type is unknown.
    pub fn has_unknown_return(&self) -> bool {
        self.return_type == UNKNOWN
    }

    /// Returns true if nothing is known about the parameters.
    pub fn has_unknown_parameters(&self) -> bool {
        is_unknown_parameters(&self.parameters)
    }
}

// ============================================================================
// Vtable Slots
// ============================================================================

/// One entry of a class's resolved vtable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtableSlot {
    /// Prototype shared by every class inheriting this slot.
    pub proto_index: ProtoId,
    /// The class supplies its own implementation of the slot.
    pub is_overridden: bool,
    /// The slot had no body in this class's observation.
    pub is_pure_virtual: bool,
    /// Mangled symbol of this class's implementation. `None` for inherited
    /// and pure-virtual slots; `Some("")` when the class implements the slot
    /// but its symbol is unknown.
    pub mangled_name: Option<String>,
}

impl VtableSlot {
    /// Build the slot for `observation`, pointing at `proto_index`.
    pub fn from_observation(proto_index: ProtoId, observation: &Observation) -> Self {
        let mangled_name = if observation.implemented_here && !observation.is_pure_virtual {
            Some(observation.mangled_name.clone())
        } else {
            None
        };
        VtableSlot {
            proto_index,
            is_overridden: observation.implemented_here,
            is_pure_virtual: observation.is_pure_virtual,
            mangled_name,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
