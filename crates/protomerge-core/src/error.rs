//! Error types and exit codes for protomerge.
//!
//! Subsystem errors ([`LoadError`], [`LookupError`], [`ConfigError`]) are
//! bridged into the unified [`MergeError`], which the CLI renders as a JSON
//! error response.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad flags or environment values)
//! - `3`: Input not found (missing file, unknown class)
//! - `4`: Malformed input document
//! - `5`: Failed to write an output document
//! - `10`: Internal errors
//!
//! Per-class merge diagnostics are not errors and never reach this module.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::load::LoadError;
use crate::lookup::LookupError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output and process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// An input file or requested class does not exist.
    NotFound = 3,
    /// An input document could not be parsed.
    MalformedInput = 4,
    /// An output document could not be written.
    WriteFailed = 5,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// An input path does not exist.
    #[error("input not found: {path}")]
    InputNotFound { path: String },

    /// An input document is not what it should be.
    #[error("malformed input {path}: {message}")]
    MalformedInput { path: String, message: String },

    /// The requested class is not in the class document.
    #[error("class not found: {name}")]
    ClassNotFound { name: String },

    /// Neither the class nor any ancestor has a vtable.
    #[error("no vtable for {name} or any of its ancestors")]
    NoVtable { name: String },

    /// An output document could not be written.
    #[error("failed to write {path}: {message}")]
    WriteFailed { path: String, message: String },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl MergeError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        MergeError::InvalidArguments {
            message: message.into(),
            details: None,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        MergeError::Internal {
            message: message.into(),
        }
    }

    /// Output error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

impl From<&MergeError> for OutputErrorCode {
    fn from(err: &MergeError) -> Self {
        match err {
            MergeError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            MergeError::InputNotFound { .. }
            | MergeError::ClassNotFound { .. }
            | MergeError::NoVtable { .. } => OutputErrorCode::NotFound,
            MergeError::MalformedInput { .. } => OutputErrorCode::MalformedInput,
            MergeError::WriteFailed { .. } => OutputErrorCode::WriteFailed,
            MergeError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<LoadError> for MergeError {
    fn from(err: LoadError) -> Self {
        let path = err
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        match err {
            LoadError::NotFound { .. } => MergeError::InputNotFound { path },
            LoadError::NotADirectory { .. } | LoadError::InvalidGlob { .. } => {
                MergeError::InvalidArguments {
                    message: err.to_string(),
                    details: None,
                }
            }
            LoadError::Io { ref source, .. } => MergeError::MalformedInput {
                message: source.to_string(),
                path,
            },
            LoadError::Malformed { ref source, .. } => MergeError::MalformedInput {
                message: source.to_string(),
                path,
            },
            LoadError::Hierarchy { ref source, .. } => MergeError::MalformedInput {
                message: source.to_string(),
                path,
            },
        }
    }
}

impl From<LookupError> for MergeError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::UnknownClass { name } => MergeError::ClassNotFound { name },
            LookupError::NoVtable { name } => MergeError::NoVtable { name },
            LookupError::DanglingPrototype { .. } => MergeError::MalformedInput {
                path: String::new(),
                message: err.to_string(),
            },
        }
    }
}

impl From<ConfigError> for MergeError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidEnvValue { ref var, ref value, .. } => {
                MergeError::InvalidArguments {
                    details: Some(serde_json::json!({ "var": var, "value": value })),
                    message: err.to_string(),
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn invalid_arguments_maps_to_2() {
            let err = MergeError::invalid_args("bad flag");
            assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
            assert_eq!(err.error_code().code(), 2);
        }

        #[test]
        fn not_found_variants_map_to_3() {
            for err in [
                MergeError::InputNotFound {
                    path: "x".to_string(),
                },
                MergeError::ClassNotFound {
                    name: "A".to_string(),
                },
                MergeError::NoVtable {
                    name: "A".to_string(),
                },
            ] {
                assert_eq!(err.error_code().code(), 3);
            }
        }

        #[test]
        fn remaining_codes() {
            let malformed = MergeError::MalformedInput {
                path: "a.json".to_string(),
                message: "eof".to_string(),
            };
            let write = MergeError::WriteFailed {
                path: "out".to_string(),
                message: "denied".to_string(),
            };
            assert_eq!(malformed.error_code().code(), 4);
            assert_eq!(write.error_code().code(), 5);
            assert_eq!(MergeError::internal("oops").error_code().code(), 10);
        }
    }

    mod bridges {
        use super::*;

        #[test]
        fn load_not_found_keeps_path() {
            let err = MergeError::from(LoadError::NotFound {
                path: PathBuf::from("classes.json"),
            });
            assert!(matches!(err, MergeError::InputNotFound { ref path } if path == "classes.json"));
        }

        #[test]
        fn load_malformed_maps_to_malformed_input() {
            let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
            let err = MergeError::from(LoadError::Malformed {
                path: PathBuf::from("kernel.json"),
                source,
            });
            assert_eq!(err.error_code(), OutputErrorCode::MalformedInput);
            assert!(err.to_string().contains("kernel.json"));
        }

        #[test]
        fn invalid_glob_is_an_argument_error() {
            let err = MergeError::from(LoadError::InvalidGlob {
                pattern: "[".to_string(),
                message: "unclosed".to_string(),
            });
            assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);
        }

        #[test]
        fn lookup_errors_map_to_not_found() {
            let err = MergeError::from(LookupError::UnknownClass {
                name: "Ghost".to_string(),
            });
            assert!(matches!(err, MergeError::ClassNotFound { .. }));
        }

        #[test]
        fn config_error_carries_details() {
            let err = MergeError::from(ConfigError::InvalidEnvValue {
                var: "PROTOMERGE_GLOB".to_string(),
                value: "[".to_string(),
                reason: "bad".to_string(),
            });
            match err {
                MergeError::InvalidArguments { details, .. } => {
                    assert_eq!(details.unwrap()["var"], "PROTOMERGE_GLOB");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn display_code() {
        assert_eq!(OutputErrorCode::WriteFailed.to_string(), "5");
    }
}
