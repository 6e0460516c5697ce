//! The logical structure of a report, independent of any output format.

use serde::Serialize;
use serde_json::{Map, Value};

pub const KEY_COLUMNS: [&str; 2] = ["Key", "Value"];
pub const TAG_COLUMNS: [&str; 2] = ["Tag", "Value"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tree {
    pub title: String,
    pub sections: Vec<Section>,
}

impl Tree {
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.title == title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Table(Table),
    NotPresent,
    Section(Section),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub title: String,
    pub children: Vec<Node>,
}

impl Section {
    pub fn new(title: impl Into<String>) -> Self {
        Section {
            title: title.into(),
            children: Vec::new(),
        }
    }

    /// A section holding a single table, or the not-present marker when
    /// the table has no rows.
    pub fn table(title: impl Into<String>, table: Table) -> Self {
        Section::new(title).with_table(table)
    }

    pub fn not_present(title: impl Into<String>) -> Self {
        Section::new(title).with(Node::NotPresent)
    }

    pub fn with(mut self, node: Node) -> Self {
        self.children.push(node);
        self
    }

    pub fn with_table(self, table: Table) -> Self {
        if table.rows.is_empty() {
            self.with(Node::NotPresent)
        } else {
            self.with(Node::Table(table))
        }
    }

    pub fn with_section(self, section: Section) -> Self {
        self.with(Node::Section(section))
    }

    pub fn push(&mut self, section: Section) {
        self.children.push(Node::Section(section));
    }

    pub fn subsection(&self, title: &str) -> Option<&Section> {
        self.children.iter().find_map(|node| match node {
            Node::Section(section) if section.title == title => Some(section),
            _ => None,
        })
    }

    /// The first table directly below this section.
    pub fn first_table(&self) -> Option<&Table> {
        self.children.iter().find_map(|node| match node {
            Node::Table(table) => Some(table),
            _ => None,
        })
    }

    pub fn is_not_present(&self) -> bool {
        matches!(self.children.as_slice(), [Node::NotPresent])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<C: AsRef<str>>(columns: &[C]) -> Self {
        Table {
            columns: columns.iter().map(|column| column.as_ref().to_owned()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn key_value<K, V>(columns: [&str; 2], rows: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut table = Table::new(&columns);
        for (key, value) in rows {
            table.rows.push(vec![key.into(), value.into()]);
        }
        table
    }

    /// Scalar fields of a JSON object. Objects and lists holding anything
    /// but scalars are left out; those get tables of their own.
    pub fn primitives(object: &Map<String, Value>) -> Self {
        Table::key_value(
            KEY_COLUMNS,
            object
                .iter()
                .filter_map(|(key, value)| primitive_text(value).map(|text| (key.as_str(), text))),
        )
    }

    pub fn row(mut self, cells: Vec<String>) -> Self {
        self.rows.push(cells);
        self
    }

    /// Value of the second column in the row whose first column is `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.first().map(String::as_str) == Some(key))
            .and_then(|row| row.get(1))
            .map(String::as_str)
    }
}

pub fn is_primitive(value: &Value) -> bool {
    match value {
        Value::Object(_) => false,
        Value::Array(items) => items.iter().all(is_scalar),
        _ => true,
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

/// Display text of a primitive value, `None` for composites.
pub fn primitive_text(value: &Value) -> Option<String> {
    if !is_primitive(value) {
        return None;
    }
    Some(match value {
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(", "),
        scalar => scalar_text(scalar),
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_skip_composites() {
        let object = json!({
            "name": "fraud",
            "count": 3,
            "ready": true,
            "description": null,
            "aliases": ["a", "b"],
            "tags": { "team": "risk" },
            "versions": [{ "version": "1" }]
        });
        let table = Table::primitives(object.as_object().unwrap());
        assert_eq!(table.get("name"), Some("fraud"));
        assert_eq!(table.get("count"), Some("3"));
        assert_eq!(table.get("ready"), Some("true"));
        assert_eq!(table.get("description"), Some(""));
        assert_eq!(table.get("aliases"), Some("a, b"));
        assert_eq!(table.get("tags"), None);
        assert_eq!(table.get("versions"), None);
    }

    #[test]
    fn empty_tables_become_not_present() {
        let section = Section::table("Tags", Table::new(&TAG_COLUMNS));
        assert!(section.is_not_present());
        let section = Section::table("Tags", Table::key_value(TAG_COLUMNS, vec![("team", "risk")]));
        assert_eq!(section.first_table().and_then(|table| table.get("team")), Some("risk"));
    }
}
