//! Core merge engine for protomerge.
//!
//! This crate turns per-binary vtable observations into one hierarchy-wide
//! table of virtual method prototypes:
//! - Data model for classes, observations, prototypes and vtable slots
//! - Class hierarchy and observation store
//! - Prototype table (arena addressed by `ProtoId`)
//! - Enrichment rules and the parent-before-child hierarchy merger
//! - Placeholder synthesis and getter fix-up post-passes
//! - Structured diagnostics
//! - Input loading, output documents and effective vtable lookup
//! - Error types, exit codes and run configuration

pub mod config;
pub mod diagnostics;
pub mod enrich;
pub mod error;
pub mod hierarchy;
pub mod load;
pub mod lookup;
pub mod merge;
pub mod model;
pub mod observations;
pub mod output;
pub mod synth;
pub mod table;
