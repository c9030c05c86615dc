use std::path::Path;

use codespan_reporting::diagnostic::Diagnostic;
use tracing::debug;
use wikitext::parser::{ParseError, Parser};

use crate::compile::compile;
use crate::error::{DiagnosticError, DocumentFailure};
use crate::ir::IrNode;
use crate::mapping::MappingTable;

#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// Group content under headings before compiling. When off, every
    /// heading compiles to an empty `Section` in place.
    pub sections: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { sections: true }
    }
}

/// One document carried through parse and compile.
#[derive(Debug, Clone)]
pub struct CompiledDocument {
    pub document_id: String,
    pub source: String,
    pub ir: Vec<IrNode>,
    pub parse_warnings: Vec<ParseError>,
    pub compile_warnings: Vec<DiagnosticError>,
}

impl CompiledDocument {
    /// Every warning from both stages, parse warnings first.
    pub fn diagnostics(&self) -> Vec<Diagnostic<usize>> {
        self.parse_warnings
            .iter()
            .map(ParseError::to_diagnostic)
            .chain(self.compile_warnings.iter().map(DiagnosticError::to_diagnostic))
            .collect()
    }

    pub fn warning_count(&self) -> usize {
        self.parse_warnings.len() + self.compile_warnings.len()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.ir)
    }
}

/// Parse and compile one document held in memory.
pub fn compile_source(
    document_id: impl Into<String>,
    source: String,
    source_id: usize,
    mapping: &MappingTable,
    options: CompileOptions,
) -> CompiledDocument {
    let document_id = document_id.into();
    let document = Parser::new(source.clone(), source_id).parse();
    let content = if options.sections {
        document.sections()
    } else {
        document.flat()
    };
    let (ir, compile_warnings) = compile(&content, mapping, source_id);
    debug!(
        document = %document_id,
        nodes = ir.len(),
        warnings = document.warnings.len() + compile_warnings.len(),
        "compiled"
    );

    CompiledDocument {
        document_id,
        source,
        ir,
        parse_warnings: document.warnings,
        compile_warnings,
    }
}

/// Read and compile one file, labelling a failure with the file's path.
pub fn compile_file(
    path: &Path,
    source_id: usize,
    mapping: &MappingTable,
    options: CompileOptions,
) -> Result<CompiledDocument, DocumentFailure> {
    let document_id = path.display().to_string();
    let bytes = std::fs::read(path)
        .map_err(|e| DocumentFailure::new(&document_id, format!("cannot read file: {}", e)))?;
    let source = String::from_utf8(bytes)
        .map_err(|e| DocumentFailure::new(&document_id, format!("not valid UTF-8: {}", e)))?;
    Ok(compile_source(document_id, source, source_id, mapping, options))
}
