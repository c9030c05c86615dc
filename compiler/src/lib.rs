pub mod compile;
pub mod error;
pub mod ir;
pub mod mapping;
pub mod pipeline;
pub mod scope;

pub use compile::{compile, compile_nodes};
pub use error::{CompileError, DiagnosticError, DocumentFailure, MappingError};
pub use ir::{Component, IrNode};
pub use mapping::{EntryType, MappingEntry, MappingTable, Scalar, TemplateKind};
pub use pipeline::{CompileOptions, CompiledDocument, compile_file, compile_source};
