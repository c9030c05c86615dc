pub mod node;
pub mod parser;
pub mod section;

use crate::node::OrderedNode;
use crate::parser::ParseError;
use crate::section::Content;

/// A parsed wikitext document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Top-level nodes in source order.
    pub nodes: Vec<OrderedNode>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
    /// Nodes that failed to parse and were degraded to text.
    pub warnings: Vec<ParseError>,
}

impl Document {
    /// Regroup the flat node list into sections, one per heading.
    pub fn sections(&self) -> Vec<Content> {
        section::organize(self.nodes.iter().cloned())
    }

    /// Keep the flat layout; each heading becomes an empty section in place.
    pub fn flat(&self) -> Vec<Content> {
        section::flatten(self.nodes.iter().cloned())
    }
}
