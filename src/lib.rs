//! Protomerge: hierarchy-aware merging of C++ vtable prototypes.
//!
//! Per-binary vtable observations are folded into one prototype table
//! shared across a class hierarchy, then exported as a class document and a
//! prototype document.
//!
//! ## Modules
//!
//! - `cli` - Pipeline behind the `protomerge` subcommands

// Core engine - re-exported from protomerge-core
pub use protomerge_core::config;
pub use protomerge_core::diagnostics;
pub use protomerge_core::enrich;
pub use protomerge_core::error;
pub use protomerge_core::hierarchy;
pub use protomerge_core::load;
pub use protomerge_core::lookup;
pub use protomerge_core::merge;
pub use protomerge_core::model;
pub use protomerge_core::observations;
pub use protomerge_core::output;
pub use protomerge_core::synth;
pub use protomerge_core::table;

pub mod cli;

// Re-export common types for convenience
pub use protomerge_core::error::{MergeError, OutputErrorCode};
pub use protomerge_core::merge::{merge as merge_hierarchy, MergeOutput};
pub use protomerge_core::model::{ClassNode, Observation, ProtoId, PrototypeRecord, VtableSlot, UNKNOWN};
pub use protomerge_core::output::{ErrorResponse, MergeReport, SCHEMA_VERSION};
