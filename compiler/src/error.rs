use std::ops::Range;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use thiserror::Error;

/// Problems found while compiling nodes to IR. None of them stop compilation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("block end `{name}` has no open block to close")]
    UnmatchedBlockEnd { name: String },
    #[error("block `{name}` is never closed")]
    UnclosedBlock { name: String },
}

/// A compile error or warning enriched with source location information.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct DiagnosticError {
    pub error: CompileError,
    pub span: Option<Range<usize>>,
    pub source_id: usize,
    pub is_warning: bool,
}

impl DiagnosticError {
    /// Create a warning diagnostic with a source span.
    pub fn warning(error: CompileError, span: Range<usize>, source_id: usize) -> Self {
        DiagnosticError {
            error,
            span: Some(span),
            source_id,
            is_warning: true,
        }
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let severity = if self.is_warning {
            Severity::Warning
        } else {
            Severity::Error
        };
        let diagnostic = Diagnostic::new(severity).with_message(self.to_string());
        match &self.span {
            Some(span) => diagnostic.with_labels(vec![Label::primary(self.source_id, span.clone())]),
            None => diagnostic,
        }
    }
}

/// The mapping table could not be loaded.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("cannot read mapping table '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid mapping table: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A whole document could not be compiled, labelled with its id.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{document_id}: {message}")]
pub struct DocumentFailure {
    pub document_id: String,
    pub message: String,
}

impl DocumentFailure {
    pub fn new(document_id: impl Into<String>, message: impl Into<String>) -> Self {
        DocumentFailure {
            document_id: document_id.into(),
            message: message.into(),
        }
    }
}
