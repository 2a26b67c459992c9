//! Column type metadata describing what a dataset field holds and how it is shown.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    TextSegment,
    Url,
    Boolean,
    Scalar,
    Integer,
    CategoryLabel,
    TokenList,
    Embeddings,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::TextSegment => "TextSegment",
            FieldType::Url => "URL",
            FieldType::Boolean => "Boolean",
            FieldType::Scalar => "Scalar",
            FieldType::Integer => "Integer",
            FieldType::CategoryLabel => "CategoryLabel",
            FieldType::TokenList => "TokenList",
            FieldType::Embeddings => "Embeddings",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub vocab: Option<Vec<String>>,
    pub show_in_data_table: bool,
}

impl FieldSpec {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            vocab: None,
            show_in_data_table: field_type != FieldType::Embeddings,
        }
    }

    pub fn with_vocab(mut self, vocab: Vec<String>) -> Self {
        self.vocab = Some(vocab);
        self
    }
}

/// Ordered field name to type mapping of a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spec {
    fields: Vec<(String, FieldSpec)>,
}

impl Spec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, spec: FieldSpec) {
        self.fields.push((name.into(), spec));
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|(n, _)| n.clone()).collect()
    }
}

impl FromIterator<(String, FieldSpec)> for Spec {
    fn from_iter<I: IntoIterator<Item = (String, FieldSpec)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Display vocabulary used for every boolean column, true first.
pub const BOOLEAN_VOCAB: [&str; 2] = ["✔", " "];

/// Width of the synthetic index column.
pub const INDEX_COLUMN_WIDTH: usize = 6;

/// [min, max] render widths in terminal cells per field type.
const COLUMN_WIDTH_HINTS: &[(&str, [usize; 2])] = &[
    ("Boolean", [3, 5]),
    ("CategoryLabel", [6, 20]),
    ("Integer", [4, 10]),
    ("Scalar", [6, 12]),
    ("String", [8, 30]),
    ("TextSegment", [20, 60]),
    ("TokenList", [12, 40]),
    ("URL", [10, 40]),
];

pub fn width_hint(field_type: FieldType) -> Option<[usize; 2]> {
    let name = field_type.name();
    COLUMN_WIDTH_HINTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, hint)| *hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_hints_cover_table_types_only() {
        assert_eq!(width_hint(FieldType::Boolean), Some([3, 5]));
        assert_eq!(width_hint(FieldType::Url), Some([10, 40]));
        assert_eq!(width_hint(FieldType::Embeddings), None);
    }

    #[test]
    fn embeddings_are_hidden_by_default() {
        assert!(!FieldSpec::new(FieldType::Embeddings).show_in_data_table);
        assert!(FieldSpec::new(FieldType::TextSegment).show_in_data_table);
    }

    #[test]
    fn spec_keeps_insertion_order() {
        let mut spec = Spec::new();
        spec.push("sentence", FieldSpec::new(FieldType::TextSegment));
        spec.push("label", FieldSpec::new(FieldType::CategoryLabel));
        assert_eq!(spec.names(), vec!["sentence", "label"]);
        assert_eq!(
            spec.get("label").map(|s| s.field_type),
            Some(FieldType::CategoryLabel)
        );
        assert!(spec.get("missing").is_none());
    }
}
