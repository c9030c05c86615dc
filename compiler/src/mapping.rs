use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// A flat property value: the TOML scalars a mapping entry may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Integer(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Boolean(b)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Integer(n) => write!(f, "{}", n),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

/// The `type` field of a mapping entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Standalone,
    Blockstart,
    Blockend,
}

/// How one template name turns into IR.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Component to emit. Falls back to the template name when absent.
    #[serde(default)]
    pub component: Option<String>,
    /// Absent for plain substitution templates.
    #[serde(default, rename = "type")]
    pub kind: Option<EntryType>,
    /// Props copied verbatim onto the component, in table order.
    #[serde(default)]
    pub intrinsic: IndexMap<String, Scalar>,
    /// Template parameter key → slot name.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl MappingEntry {
    pub fn component(name: impl Into<String>) -> Self {
        MappingEntry {
            component: Some(name.into()),
            ..MappingEntry::default()
        }
    }

    pub fn with_kind(mut self, kind: EntryType) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.intrinsic.insert(key.into(), value.into());
        self
    }

    pub fn with_slot(mut self, param: impl Into<String>, slot: impl Into<String>) -> Self {
        self.params.insert(param.into(), slot.into());
        self
    }
}

/// What a template invocation does, decided once per invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemplateKind<'a> {
    /// A component in place, no scope change.
    Standalone(&'a MappingEntry),
    /// A component that becomes the parent of the following siblings.
    BlockStart(&'a MappingEntry),
    /// Closes the innermost open block.
    BlockEnd,
    /// Mapped without a `type`: built like a standalone component.
    PlainSubstitution(&'a MappingEntry),
    /// Not in the table; re-emitted as literal text.
    Unmapped,
}

/// Template name → mapping entry. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    entries: BTreeMap<String, MappingEntry>,
}

impl MappingTable {
    pub fn new() -> Self {
        MappingTable::default()
    }

    /// Load a table from a TOML file with one `[TemplateName]` table per entry.
    pub fn load(path: &Path) -> Result<Self, MappingError> {
        let text = std::fs::read_to_string(path).map_err(|source| MappingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, MappingError> {
        Ok(toml::from_str(text)?)
    }

    pub fn insert(&mut self, template: impl Into<String>, entry: MappingEntry) -> Option<MappingEntry> {
        self.entries.insert(template.into(), entry)
    }

    pub fn get(&self, template: &str) -> Option<&MappingEntry> {
        self.entries.get(template)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn classify(&self, template: &str) -> TemplateKind<'_> {
        match self.entries.get(template) {
            None => TemplateKind::Unmapped,
            Some(entry) => match entry.kind {
                None => TemplateKind::PlainSubstitution(entry),
                Some(EntryType::Standalone) => TemplateKind::Standalone(entry),
                Some(EntryType::Blockstart) => TemplateKind::BlockStart(entry),
                Some(EntryType::Blockend) => TemplateKind::BlockEnd,
            },
        }
    }
}

impl<K: Into<String>> FromIterator<(K, MappingEntry)> for MappingTable {
    fn from_iter<I: IntoIterator<Item = (K, MappingEntry)>>(iter: I) -> Self {
        MappingTable {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
[Start]
component = "Box"
type = "blockstart"
intrinsic = { variant = "note", collapsible = true, depth = 2 }
params = { "1" = "title" }

[End]
type = "blockend"

[Badge]
component = "Badge"
type = "standalone"

[Plain]
component = "Span"
"#;

    #[test]
    fn loads_all_entry_kinds() {
        let table = MappingTable::from_toml_str(TABLE).expect("valid table");
        assert_eq!(table.len(), 4);

        let start = table.get("Start").expect("Start");
        assert_eq!(start.component.as_deref(), Some("Box"));
        assert_eq!(start.intrinsic.get("variant"), Some(&Scalar::from("note")));
        assert_eq!(start.intrinsic.get("collapsible"), Some(&Scalar::Boolean(true)));
        assert_eq!(start.intrinsic.get("depth"), Some(&Scalar::Integer(2)));
        assert_eq!(start.params.get("1").map(String::as_str), Some("title"));

        assert!(matches!(table.classify("Start"), TemplateKind::BlockStart(_)));
        assert_eq!(table.classify("End"), TemplateKind::BlockEnd);
        assert!(matches!(table.classify("Badge"), TemplateKind::Standalone(_)));
        assert!(matches!(table.classify("Plain"), TemplateKind::PlainSubstitution(_)));
        assert_eq!(table.classify("Missing"), TemplateKind::Unmapped);
    }

    #[test]
    fn intrinsic_props_keep_table_order() {
        let table = MappingTable::from_toml_str("[Note]\nintrinsic = { zeta = 1, alpha = 2, mid = 3 }\n")
            .expect("valid table");
        let keys: Vec<&str> = table.get("Note").expect("Note").intrinsic.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn builder_matches_toml() {
        let mut built: MappingTable = [
            (
                "Start",
                MappingEntry::component("Box")
                    .with_kind(EntryType::Blockstart)
                    .with_prop("variant", "note")
                    .with_prop("collapsible", true)
                    .with_prop("depth", 2i64)
                    .with_slot("1", "title"),
            ),
            ("End", MappingEntry::default().with_kind(EntryType::Blockend)),
            ("Badge", MappingEntry::component("Badge").with_kind(EntryType::Standalone)),
        ]
        .into_iter()
        .collect();

        assert_eq!(built.insert("Plain", MappingEntry::component("Span")), None);
        assert_eq!(built, MappingTable::from_toml_str(TABLE).expect("valid table"));
    }

    #[test]
    fn lookup_is_exact() {
        let table = MappingTable::from_toml_str(TABLE).expect("valid table");
        assert_eq!(table.classify("start"), TemplateKind::Unmapped);
    }

    #[test]
    fn unknown_type_is_rejected_at_load() {
        let err = MappingTable::from_toml_str("[X]\ntype = \"blockmiddle\"\n").unwrap_err();
        assert!(matches!(err, MappingError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = MappingTable::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/config.toml"));
    }
}
