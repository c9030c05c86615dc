use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::node::{OrderedNode, TemplateInvocation};

/// A node after section organization. Headings no longer appear on their own;
/// each one has become a [`Section`] owning the content that followed it.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Template(TemplateInvocation),
    Section(Section),
}

/// A heading together with everything up to the next heading of any level.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub level: usize,
    pub title: String,
    pub content: Vec<Content>,
}

impl Section {
    fn open(level: usize, title: String) -> Self {
        Section {
            level,
            title,
            content: Vec::new(),
        }
    }
}

/// Replace heading markers with section containers.
///
/// Grouping is sequential and flat: a level-3 heading after a level-2 one
/// starts a sibling section, not a child.
pub fn organize(nodes: impl IntoIterator<Item = OrderedNode>) -> Vec<Content> {
    let mut organized = Vec::new();
    let mut current: Option<Section> = None;

    for node in nodes {
        let item = match node {
            OrderedNode::SectionHeading { level, title } => {
                if let Some(done) = current.take() {
                    organized.push(Content::Section(done));
                }
                current = Some(Section::open(level, title));
                continue;
            }
            OrderedNode::Text(s) => Content::Text(s),
            OrderedNode::Template(t) => Content::Template(t),
        };

        match current.as_mut() {
            Some(section) => section.content.push(item),
            None => organized.push(item),
        }
    }

    if let Some(done) = current {
        organized.push(Content::Section(done));
    }

    organized
}

/// Convert without grouping: every heading becomes an empty section in place.
pub fn flatten(nodes: impl IntoIterator<Item = OrderedNode>) -> Vec<Content> {
    nodes
        .into_iter()
        .map(|node| match node {
            OrderedNode::Text(s) => Content::Text(s),
            OrderedNode::Template(t) => Content::Template(t),
            OrderedNode::SectionHeading { level, title } => {
                Content::Section(Section::open(level, title))
            }
        })
        .collect()
}

impl Serialize for Content {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Content::Text(content) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "text")?;
                map.serialize_entry("content", content)?;
                map.end()
            }
            Content::Template(t) => t.serialize(serializer),
            Content::Section(section) => section.serialize(serializer),
        }
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("type", "section")?;
        map.serialize_entry("level", &self.level)?;
        map.serialize_entry("title", &self.title)?;
        map.serialize_entry("content", &self.content)?;
        map.end()
    }
}
