//! Compile errors and diagnostics.
//!
//! Every failure produced by the compiler carries a closed [`ErrorKind`], a
//! rendered schema path pointing into the failing construct, and a message.
//! Warnings use the same shape with [`Severity::Warning`] and accumulate in
//! the compile report; errors are fatal and abort the module compile.

use thiserror::Error;

/// Closed error taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// Malformed statement argument (restriction expression, path, date).
    Syntax,
    /// Unknown name or unresolved prefix.
    Reference,
    /// Construct disallowed by a schema rule (status, context, node type).
    Denied,
    /// Duplicate definition.
    Exists,
    /// Referenced entity does not exist.
    NotFound,
    /// Invariant violated (subset rule, bounds, key shape).
    Semantic,
    /// Dependency cycle (typedef, feature, uses, leafref).
    Cycle,
    /// Conflicting deviations from different modules.
    Conflict,
    /// Extension plugin rejected an instance.
    Extension,
    /// Allocation limit exceeded.
    Memory,
    /// Internal inconsistency; always a bug.
    Internal,
}

impl ErrorKind {
    /// Stable lowercase name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Reference => "reference",
            Self::Denied => "denied",
            Self::Exists => "exists",
            Self::NotFound => "not-found",
            Self::Semantic => "semantic",
            Self::Cycle => "cycle",
            Self::Conflict => "conflict",
            Self::Extension => "extension",
            Self::Memory => "memory",
            Self::Internal => "internal",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Fatal; the module compile is aborted and rolled back.
    Error,
    /// Informational; compilation continues.
    Warning,
}

/// A single diagnostic message.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// Severity level.
    pub severity: Severity,
    /// Error kind.
    pub kind: ErrorKind,
    /// Rendered schema path of the failing construct.
    pub path: String,
    /// Human-readable message.
    pub message: String,
    /// Name of the module being compiled, if known.
    pub module: Option<String>,
    /// Revision of the module being compiled, if known.
    pub revision: Option<String>,
}

/// A fatal compile error.
///
/// The first fatal error aborts the module compile; `diagnostics` holds the
/// warnings accumulated up to that point plus the error itself.
#[derive(Clone, Debug, Error)]
#[error("{kind} error: {message} (path: {path})")]
pub struct CompileError {
    /// Error kind.
    pub kind: ErrorKind,
    /// Rendered schema path of the failing construct.
    pub path: String,
    /// Human-readable message.
    pub message: String,
    /// Name of the module being compiled, if known.
    pub module: Option<String>,
    /// All diagnostics gathered during the failed compile.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    /// Create a new error with the given kind, path and message.
    #[must_use]
    pub fn new(kind: ErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
            module: None,
            diagnostics: Vec::new(),
        }
    }

    /// Attach the name of the module being compiled.
    #[must_use]
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Convert into a diagnostic of error severity.
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            kind: self.kind,
            path: self.path.clone(),
            message: self.message.clone(),
            module: self.module.clone(),
            revision: None,
        }
    }
}

/// Compiler-internal result alias.
pub type Result<T> = core::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_as_str() {
        assert_eq!(ErrorKind::Reference.as_str(), "reference");
        assert_eq!(ErrorKind::NotFound.as_str(), "not-found");
        assert_eq!(ErrorKind::Cycle.as_str(), "cycle");
    }

    #[test]
    fn test_error_display() {
        let err = CompileError::new(ErrorKind::Semantic, "/m:cont/m:lf", "range is not a subset");
        let text = err.to_string();
        assert!(text.contains("semantic"));
        assert!(text.contains("/m:cont/m:lf"));
    }

    #[test]
    fn test_error_to_diagnostic() {
        let err = CompileError::new(ErrorKind::Exists, "/m:x", "duplicate").in_module("m");
        let diag = err.to_diagnostic();
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.kind, ErrorKind::Exists);
        assert_eq!(diag.module.as_deref(), Some("m"));
    }
}
