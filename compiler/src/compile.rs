use std::ops::Range;

use tracing::{debug, warn};
use wikitext::node::{OrderedNode, ParamValue, TemplateInvocation};
use wikitext::section::{self, Content, Section};

use crate::error::{CompileError, DiagnosticError};
use crate::ir::{Component, DEFAULT_SLOT, IrNode, SECTION_COMPONENT};
use crate::mapping::{MappingEntry, MappingTable, Scalar, TemplateKind};
use crate::scope::ScopeStack;

/// Compile organised content into an IR forest.
///
/// Never fails: imbalance and unclosed blocks come back as warnings next to
/// the tree. The output depends only on `content` and `mapping`.
pub fn compile(
    content: &[Content],
    mapping: &MappingTable,
    source_id: usize,
) -> (Vec<IrNode>, Vec<DiagnosticError>) {
    let mut compiler = Compiler::new(mapping, source_id);
    let ir = compiler.compile_content(content);
    (ir, compiler.diagnostics)
}

/// Organise a flat node list into sections, then compile it.
pub fn compile_nodes(
    nodes: &[OrderedNode],
    mapping: &MappingTable,
    source_id: usize,
) -> (Vec<IrNode>, Vec<DiagnosticError>) {
    compile(&section::organize(nodes.iter().cloned()), mapping, source_id)
}

struct Compiler<'m> {
    mapping: &'m MappingTable,
    source_id: usize,
    diagnostics: Vec<DiagnosticError>,
}

impl<'m> Compiler<'m> {
    fn new(mapping: &'m MappingTable, source_id: usize) -> Self {
        Compiler {
            mapping,
            source_id,
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, error: CompileError, span: Range<usize>) {
        warn!(source_id = self.source_id, span = ?span, "{}", error);
        self.diagnostics
            .push(DiagnosticError::warning(error, span, self.source_id));
    }

    /// Each call owns its scope stack, so blocks never leak out of a
    /// section or a parameter value.
    fn compile_content(&mut self, content: &[Content]) -> Vec<IrNode> {
        let mut scope = ScopeStack::new();

        for item in content {
            match item {
                Content::Text(text) => scope.append(IrNode::text(text.clone())),
                Content::Section(section) => {
                    let component = self.compile_section(section);
                    scope.append(component.into());
                }
                Content::Template(invocation) => self.compile_template(invocation, &mut scope),
            }
        }

        let (nodes, unclosed) = scope.finish();
        for block in unclosed {
            debug!(block = %block.opened_by, "closing block at end of input");
            self.report(
                CompileError::UnclosedBlock {
                    name: block.opened_by,
                },
                block.span,
            );
        }
        nodes
    }

    fn compile_section(&mut self, section: &Section) -> Component {
        let mut component = Component::new(SECTION_COMPONENT);
        component
            .props
            .insert("title".to_string(), Scalar::String(section.title.clone()));
        component
            .props
            .insert("level".to_string(), Scalar::Integer(section.level as i64));
        let children = self.compile_content(&section.content);
        component.slots.insert(DEFAULT_SLOT.to_string(), children);
        component
    }

    fn compile_template(&mut self, invocation: &TemplateInvocation, scope: &mut ScopeStack) {
        let mapping = self.mapping;
        match mapping.classify(&invocation.name) {
            TemplateKind::Unmapped => {
                debug!(template = %invocation.name, "no mapping, kept as text");
                scope.append(IrNode::text(invocation.to_string()));
            }
            TemplateKind::Standalone(entry) | TemplateKind::PlainSubstitution(entry) => {
                let component = self.build_component(invocation, entry);
                scope.append(component.into());
            }
            TemplateKind::BlockStart(entry) => {
                let component = self.build_component(invocation, entry);
                scope.push(component, invocation.name.as_str(), invocation.span.clone());
            }
            TemplateKind::BlockEnd => {
                if scope.pop().is_none() {
                    self.report(
                        CompileError::UnmatchedBlockEnd {
                            name: invocation.name.clone(),
                        },
                        invocation.span.clone(),
                    );
                }
            }
        }
    }

    fn build_component(&mut self, invocation: &TemplateInvocation, entry: &MappingEntry) -> Component {
        let name = entry
            .component
            .clone()
            .unwrap_or_else(|| invocation.name.clone());
        let mut component = Component::new(name);
        component.props = entry.intrinsic.clone();

        // Parameters without a slot are dropped; a later parameter mapped to
        // the same slot replaces an earlier one.
        for (key, value) in &invocation.params {
            if let Some(slot) = entry.params.get(key) {
                let nodes = self.compile_value(value);
                component.slots.insert(slot.clone(), nodes);
            }
        }
        component
    }

    fn compile_value(&mut self, value: &ParamValue) -> Vec<IrNode> {
        match value {
            ParamValue::Text(text) => vec![IrNode::text(text.clone())],
            ParamValue::Template(nested) => {
                self.compile_content(&[Content::Template(nested.clone())])
            }
            ParamValue::Nodes(nodes) => {
                self.compile_content(&section::organize(nodes.iter().cloned()))
            }
        }
    }
}
