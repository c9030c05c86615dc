pub mod error;
pub mod markup;
mod sequence;
mod template;

pub use error::ParseError;

use crate::Document;
use crate::parser::sequence::Sequencer;

/// How deeply templates may nest inside parameter values before the
/// innermost levels are kept as plain text.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the source into an ordered node list.
    ///
    /// Never fails: malformed nodes are degraded to text and reported in
    /// [`Document::warnings`].
    pub fn parse(&self) -> Document {
        let mut sequencer = Sequencer::new(self.file_id);
        let nodes = sequencer.sequence(&self.source, 0, 0);
        Document {
            nodes,
            source_id: self.file_id,
            warnings: sequencer.into_diagnostics(),
        }
    }
}
