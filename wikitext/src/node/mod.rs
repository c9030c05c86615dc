pub mod params;

use std::fmt;
use std::ops::Range;

use serde::ser::{Serialize, SerializeMap, Serializer};

pub use params::Params;

/// Name given to an invocation that could not be resolved at all.
/// Nothing maps it, so it falls through to literal re-emission.
pub const RESOLUTION_FAILED: &str = "parse_error";

/// A single node of a parsed wikitext document, in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderedNode {
    /// A run of literal text, trimmed, never empty.
    Text(String),
    /// A template invocation: `{{name|positional|key=value}}`.
    Template(TemplateInvocation),
    /// A `== Title ==` heading line. Consumed by the section organizer.
    SectionHeading { level: usize, title: String },
}

/// A resolved template invocation.
#[derive(Debug, Clone)]
pub struct TemplateInvocation {
    /// Template name, trimmed.
    pub name: String,
    /// Parameters in declaration order. Positional parameters are keyed "1", "2", ...
    pub params: Params,
    /// Byte span of the whole invocation in the source.
    pub span: Range<usize>,
}

/// The value of one template parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Plain text, trimmed.
    Text(String),
    /// The parameter is exactly one nested invocation and nothing else.
    Template(TemplateInvocation),
    /// Invocations mixed with other content.
    Nodes(Vec<OrderedNode>),
}

impl TemplateInvocation {
    pub fn new(name: impl Into<String>, params: Params, span: Range<usize>) -> Self {
        TemplateInvocation {
            name: name.into(),
            params,
            span,
        }
    }

    /// The sentinel returned when an invocation cannot be resolved.
    pub fn resolution_failed(span: Range<usize>) -> Self {
        TemplateInvocation::new(RESOLUTION_FAILED, Params::new(), span)
    }

    pub fn is_resolution_failure(&self) -> bool {
        self.name == RESOLUTION_FAILED && self.params.is_empty()
    }
}

// Spans locate an invocation for diagnostics; they do not take part in equality.
impl PartialEq for TemplateInvocation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params
    }
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&TemplateInvocation> {
        match self {
            ParamValue::Template(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[OrderedNode]> {
        match self {
            ParamValue::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<TemplateInvocation> for ParamValue {
    fn from(t: TemplateInvocation) -> Self {
        ParamValue::Template(t)
    }
}

// ---------------------------------------------------------------------------
// Re-rendering back to call syntax
// ---------------------------------------------------------------------------

impl fmt::Display for TemplateInvocation {
    /// `{{ Name | a=1 | b=2 }}`, or `{{ Name }}` without parameters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{ {}", self.name)?;
        for (key, value) in &self.params {
            write!(f, " | {}={}", key, value)?;
        }
        write!(f, " }}}}")
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "{}", s),
            ParamValue::Template(t) => write!(f, "{}", t),
            ParamValue::Nodes(nodes) => {
                for (i, node) in nodes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", node)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for OrderedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderedNode::Text(s) => write!(f, "{}", s),
            OrderedNode::Template(t) => write!(f, "{}", t),
            OrderedNode::SectionHeading { level, title } => {
                let marks = "=".repeat(*level);
                write!(f, "{} {} {}", marks, title, marks)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON shape: {"type": "text" | "template" | "section", ...}
// ---------------------------------------------------------------------------

impl Serialize for TemplateInvocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("type", "template")?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("named_params", &self.params)?;
        map.end()
    }
}

impl Serialize for OrderedNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OrderedNode::Text(content) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "text")?;
                map.serialize_entry("content", content)?;
                map.end()
            }
            OrderedNode::Template(t) => t.serialize(serializer),
            OrderedNode::SectionHeading { level, title } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", "section")?;
                map.serialize_entry("level", level)?;
                map.serialize_entry("title", title)?;
                map.end()
            }
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Text(s) => serializer.serialize_str(s),
            ParamValue::Template(t) => t.serialize(serializer),
            ParamValue::Nodes(nodes) => nodes.serialize(serializer),
        }
    }
}
