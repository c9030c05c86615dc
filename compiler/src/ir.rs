use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::mapping::Scalar;

/// Component emitted for every organised section, whatever the mapping says.
pub const SECTION_COMPONENT: &str = "Section";

/// Slot that receives a component's children.
pub const DEFAULT_SLOT: &str = "default";

/// One node of the compiled output tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IrNode {
    Text { content: String },
    Component(Component),
}

impl IrNode {
    pub fn text(content: impl Into<String>) -> Self {
        IrNode::Text {
            content: content.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            IrNode::Text { content } => Some(content),
            IrNode::Component(_) => None,
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match self {
            IrNode::Component(c) => Some(c),
            IrNode::Text { .. } => None,
        }
    }
}

impl From<Component> for IrNode {
    fn from(component: Component) -> Self {
        IrNode::Component(component)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub component_name: String,
    /// Kept in insertion order, so JSON output follows the mapping table.
    #[serde(default)]
    pub props: IndexMap<String, Scalar>,
    #[serde(default)]
    pub slots: BTreeMap<String, Vec<IrNode>>,
}

impl Component {
    pub fn new(component_name: impl Into<String>) -> Self {
        Component {
            component_name: component_name.into(),
            props: IndexMap::new(),
            slots: BTreeMap::new(),
        }
    }

    /// Append to the default slot, creating it on first use.
    pub fn push_child(&mut self, node: IrNode) {
        self.slots.entry(DEFAULT_SLOT.to_string()).or_default().push(node);
    }

    pub fn slot(&self, name: &str) -> Option<&[IrNode]> {
        self.slots.get(name).map(Vec::as_slice)
    }

    pub fn children(&self) -> &[IrNode] {
        self.slot(DEFAULT_SLOT).unwrap_or(&[])
    }
}

impl fmt::Display for IrNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrNode::Text { content } => write!(f, "{:?}", content),
            IrNode::Component(c) => write!(f, "{}", c),
        }
    }
}

/// Compact one-line rendering, used in logs and test failure output.
impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.component_name)?;
        for (key, value) in &self.props {
            write!(f, " {}={}", key, value)?;
        }
        if self.slots.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        for (name, nodes) in &self.slots {
            if name != DEFAULT_SLOT {
                write!(f, "[{}:", name)?;
            }
            for (i, node) in nodes.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", node)?;
            }
            if name != DEFAULT_SLOT {
                write!(f, "]")?;
            }
        }
        write!(f, "</{}>", self.component_name)
    }
}
