//! JSON output documents and response types.
//!
//! Two documents are exported after a merge:
//!
//! - the prototype document: a list of [`PrototypeEntry`], one per record of
//!   the prototype table, in `protoIndex` order
//! - the class document: a list of [`ClassEntry`], the hierarchy in input
//!   order with a `vtable` on every resolved class
//!
//! Keys are camelCase because that is what the downstream consumers read.
//! Vtable entries come in two encodings (see [`VtableEncoding`]); both
//! deserialize, so `protomerge show` reads either.
//!
//! On stdout the CLI prints a [`MergeReport`], a [`ShowResponse`] or an
//! [`ErrorResponse`], each carrying `status` and `schema_version`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;
use crate::error::{MergeError, OutputErrorCode};
use crate::load::DocumentDigest;
use crate::lookup::EffectiveVtable;
use crate::model::{ClassNode, MethodParam, ProtoId, PrototypeRecord, VtableSlot};
use crate::table::PrototypeSnapshot;

/// Current schema version for JSON output.
pub const SCHEMA_VERSION: &str = "1";

/// File name of the prototype document.
pub const PROTOTYPES_FILE: &str = "prototypes.json";
/// File name of the class document.
pub const CLASSES_FILE: &str = "classes.json";
/// File name of the merge report.
pub const REPORT_FILE: &str = "report.json";

// ============================================================================
// Prototype Document
// ============================================================================

/// One exported prototype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrototypeEntry {
    pub name: String,
    pub mangled_name: String,
    pub return_type: String,
    pub parameters: Vec<MethodParam>,
    /// Slot position at the declaring class.
    pub vtable_index: usize,
    pub declaring_class: String,
    pub proto_index: ProtoId,
}

impl From<&PrototypeRecord> for PrototypeEntry {
    fn from(record: &PrototypeRecord) -> Self {
        PrototypeEntry {
            name: record.name.clone(),
            mangled_name: record.mangled_name.clone(),
            return_type: record.return_type.clone(),
            parameters: record.parameters.clone(),
            vtable_index: record.original_slot_index,
            declaring_class: record.declaring_class.clone(),
            proto_index: record.proto_index,
        }
    }
}

/// Export every record of `snapshot`.
pub fn prototype_entries(snapshot: &PrototypeSnapshot) -> Vec<PrototypeEntry> {
    snapshot.iter().map(PrototypeEntry::from).collect()
}

// ============================================================================
// Class Document
// ============================================================================

/// How vtable entries are written in the class document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VtableEncoding {
    /// `{protoIndex, isOverridden, isPureVirtual, mangledName}` objects.
    #[default]
    Objects,
    /// `[protoIndex, isOverridden, isPureVirtual, mangledName]` tuples.
    Compact,
}

impl VtableEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            VtableEncoding::Objects => "objects",
            VtableEncoding::Compact => "compact",
        }
    }
}

impl FromStr for VtableEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "objects" | "object" => Ok(VtableEncoding::Objects),
            "compact" | "tuple" => Ok(VtableEncoding::Compact),
            other => Err(format!(
                "unknown vtable format '{}' (expected 'objects' or 'compact')",
                other
            )),
        }
    }
}

impl std::fmt::Display for VtableEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One vtable entry in object form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtableEntry {
    pub proto_index: ProtoId,
    pub is_overridden: bool,
    pub is_pure_virtual: bool,
    #[serde(default)]
    pub mangled_name: Option<String>,
}

/// A vtable entry in either encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VtableEntryRepr {
    Compact(ProtoId, bool, bool, Option<String>),
    Object(VtableEntry),
}

impl VtableEntryRepr {
    /// Encode `slot`.
    pub fn encode(slot: &VtableSlot, encoding: VtableEncoding) -> Self {
        match encoding {
            VtableEncoding::Objects => VtableEntryRepr::Object(VtableEntry {
                proto_index: slot.proto_index,
                is_overridden: slot.is_overridden,
                is_pure_virtual: slot.is_pure_virtual,
                mangled_name: slot.mangled_name.clone(),
            }),
            VtableEncoding::Compact => VtableEntryRepr::Compact(
                slot.proto_index,
                slot.is_overridden,
                slot.is_pure_virtual,
                slot.mangled_name.clone(),
            ),
        }
    }

    /// Decode back to a slot.
    pub fn to_slot(&self) -> VtableSlot {
        match self {
            VtableEntryRepr::Compact(proto_index, is_overridden, is_pure_virtual, mangled_name) => {
                VtableSlot {
                    proto_index: *proto_index,
                    is_overridden: *is_overridden,
                    is_pure_virtual: *is_pure_virtual,
                    mangled_name: mangled_name.clone(),
                }
            }
            VtableEntryRepr::Object(entry) => VtableSlot {
                proto_index: entry.proto_index,
                is_overridden: entry.is_overridden,
                is_pure_virtual: entry.is_pure_virtual,
                mangled_name: entry.mangled_name.clone(),
            },
        }
    }
}

/// One exported class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassEntry {
    pub name: String,
    pub parent: Option<String>,
    #[serde(alias = "is_abstract")]
    pub is_abstract: bool,
    /// Resolved vtable; `null` for classes the merge did not resolve.
    #[serde(default)]
    pub vtable: Option<Vec<VtableEntryRepr>>,
}

impl ClassEntry {
    /// Decoded vtable, if the class has one.
    pub fn slots(&self) -> Option<Vec<VtableSlot>> {
        self.vtable
            .as_ref()
            .map(|entries| entries.iter().map(VtableEntryRepr::to_slot).collect())
    }
}

/// Export `classes` with their vtables in `encoding`.
pub fn class_entries(classes: &[ClassNode], encoding: VtableEncoding) -> Vec<ClassEntry> {
    classes
        .iter()
        .map(|class| ClassEntry {
            name: class.name.clone(),
            parent: class.parent.clone(),
            is_abstract: class.is_abstract,
            vtable: class.resolved_slots.as_ref().map(|slots| {
                slots
                    .iter()
                    .map(|slot| VtableEntryRepr::encode(slot, encoding))
                    .collect()
            }),
        })
        .collect()
}

// ============================================================================
// Merge Report
// ============================================================================

/// Counts reported after a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCounts {
    pub classes: usize,
    pub classes_resolved: usize,
    pub classes_unobserved: usize,
    pub classes_failed: usize,
    pub classes_dropped: usize,
    pub prototypes: usize,
    pub placeholders_synthesized: usize,
    pub getters_fixed: usize,
    pub diagnostics: usize,
}

/// Paths of the written documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenOutputs {
    pub classes: String,
    pub prototypes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

/// Summary printed by `protomerge merge`.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    /// UTC time the report was generated (ISO 8601).
    pub generated_at: String,
    pub counts: ReportCounts,
    pub documents: Vec<DocumentDigest>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<WrittenOutputs>,
}

impl MergeReport {
    /// Create a report stamped with the current time.
    pub fn new(
        counts: ReportCounts,
        documents: Vec<DocumentDigest>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        MergeReport {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: format_timestamp(SystemTime::now()),
            counts,
            documents,
            diagnostics,
            outputs: None,
        }
    }
}

/// Response of `protomerge show`.
#[derive(Debug, Clone, Serialize)]
pub struct ShowResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    #[serde(flatten)]
    pub vtable: EffectiveVtable,
}

impl ShowResponse {
    pub fn new(vtable: EffectiveVtable) -> Self {
        ShowResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            vtable,
        }
    }
}

/// Format a timestamp for JSON output (ISO 8601).
pub fn format_timestamp(time: SystemTime) -> String {
    use chrono::{DateTime, Utc};

    let datetime: DateTime<Utc> = time.into();
    datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

// ============================================================================
// Error Response
// ============================================================================

/// Error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code (also the process exit code).
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Create from a MergeError.
    pub fn from_error(err: &MergeError) -> Self {
        let details = match err {
            MergeError::InvalidArguments { details, .. } => details.clone(),
            MergeError::InputNotFound { path }
            | MergeError::MalformedInput { path, .. }
            | MergeError::WriteFailed { path, .. } => {
                Some(serde_json::json!({ "path": path }))
            }
            MergeError::ClassNotFound { name } | MergeError::NoVtable { name } => {
                Some(serde_json::json!({ "class": name }))
            }
            MergeError::Internal { .. } => None,
        };
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
            details,
        }
    }
}

/// Error response printed on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Create an error response from a MergeError.
    pub fn from_error(err: &MergeError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Emission
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// Emit a response as compact JSON (single line) to a writer.
pub fn emit_response_compact<T: Serialize>(
    response: &T,
    writer: &mut impl Write,
) -> io::Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// Write `value` as a JSON document at `path`.
pub fn write_document<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<(), MergeError> {
    let write_failed = |message: String| MergeError::WriteFailed {
        path: path.display().to_string(),
        message,
    };
    let mut buf = Vec::new();
    let result = if pretty {
        emit_response(value, &mut buf)
    } else {
        emit_response_compact(value, &mut buf)
    };
    result.map_err(|e| write_failed(e.to_string()))?;
    fs::write(path, buf).map_err(|e| write_failed(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
