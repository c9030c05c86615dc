use tracing::warn;

use crate::node::OrderedNode;
use crate::parser::error::ParseError;
use crate::parser::markup::{self, Fragment};

// ---------------------------------------------------------------------------
// Sequencer state
// ---------------------------------------------------------------------------

/// Turns fragment streams into ordered nodes. One instance serves a whole
/// document, including every nested re-parse of a parameter value, so all
/// warnings end up in one place.
pub(crate) struct Sequencer {
    pub(crate) file_id: usize,
    diagnostics: Vec<ParseError>,
}

impl Sequencer {
    pub(crate) fn new(file_id: usize) -> Self {
        Sequencer {
            file_id,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn into_diagnostics(self) -> Vec<ParseError> {
        self.diagnostics
    }

    /// Log a degraded node and keep it for the caller.
    pub(crate) fn report(&mut self, error: ParseError) {
        warn!(file_id = self.file_id, span = ?error.span, "{}", error.message);
        self.diagnostics.push(error);
    }

    /// Scan `text` (found at `offset` in the document) and sequence it.
    pub(crate) fn sequence(&mut self, text: &str, offset: usize, depth: usize) -> Vec<OrderedNode> {
        let fragments = markup::scan(text, offset);
        self.sequence_fragments(&fragments, depth)
    }

    pub(crate) fn sequence_fragments(
        &mut self,
        fragments: &[Fragment<'_>],
        depth: usize,
    ) -> Vec<OrderedNode> {
        let mut nodes = Vec::new();
        let mut pending = String::new();

        for fragment in fragments {
            match fragment {
                Fragment::Template(raw) => {
                    flush_text(&mut pending, &mut nodes);
                    let invocation = self.resolve_template(raw, depth);
                    nodes.push(OrderedNode::Template(invocation));
                }

                Fragment::Heading { raw, span } => match parse_heading(raw) {
                    Ok((level, title)) => {
                        flush_text(&mut pending, &mut nodes);
                        nodes.push(OrderedNode::SectionHeading { level, title });
                    }
                    Err(reason) => {
                        self.report(
                            ParseError::warning(
                                format!("malformed heading: {}", reason),
                                span.clone(),
                                self.file_id,
                            )
                            .with_note("kept as text"),
                        );
                        pending.push_str(raw);
                    }
                },

                // Comments stay in the text they interrupt
                Fragment::Text { raw, .. } | Fragment::Comment { raw, .. } => {
                    pending.push_str(raw);
                }
            }
        }

        flush_text(&mut pending, &mut nodes);
        nodes
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Emit the pending run as one trimmed text node; whitespace-only runs vanish.
fn flush_text(pending: &mut String, nodes: &mut Vec<OrderedNode>) {
    let text = pending.trim();
    if !text.is_empty() {
        nodes.push(OrderedNode::Text(text.to_string()));
    }
    pending.clear();
}

/// Level is the number of leading `=`; the title is what remains after
/// removing that many characters from both ends.
fn parse_heading(raw: &str) -> Result<(usize, String), String> {
    let trimmed = raw.trim();
    let level = trimmed.chars().take_while(|&c| c == '=').count();
    if level == 0 || !trimmed.ends_with('=') {
        return Err(format!("`{}` is not delimited by '='", trimmed));
    }

    let len = trimmed.chars().count();
    if len < level * 2 {
        return Err(format!("`{}` has no room for a title", trimmed));
    }

    let title: String = trimmed.chars().skip(level).take(len - level * 2).collect();
    Ok((level, title.trim().to_string()))
}
