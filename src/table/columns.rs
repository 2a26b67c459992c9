use std::collections::BTreeMap;

use crate::services::DataColumn;
use crate::types::{BOOLEAN_VOCAB, FieldSpec, FieldType, INDEX_COLUMN_WIDTH, Spec, width_hint};

/// Synthetic column holding the row's position in the dataset.
pub const INDEX_COLUMN: &str = "index";

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHeader {
    pub name: String,
    pub field_type: Option<FieldType>,
    pub min_width: Option<usize>,
    pub max_width: Option<usize>,
    /// Fixed width, overrides min/max.
    pub width: Option<usize>,
    pub vocab: Option<Vec<String>>,
    /// Set for columns that do not come from the data.
    pub synthetic: bool,
}

impl ColumnHeader {
    fn index() -> Self {
        Self {
            name: INDEX_COLUMN.to_string(),
            field_type: None,
            min_width: None,
            max_width: None,
            width: Some(INDEX_COLUMN_WIDTH),
            vocab: None,
            synthetic: true,
        }
    }

    fn from_spec(name: &str, spec: &FieldSpec) -> Self {
        let hint = width_hint(spec.field_type);
        let vocab = if spec.field_type == FieldType::Boolean {
            Some(BOOLEAN_VOCAB.iter().map(|s| s.to_string()).collect())
        } else {
            spec.vocab.clone()
        };
        Self {
            name: name.to_string(),
            field_type: Some(spec.field_type),
            min_width: hint.map(|h| h[0]),
            max_width: hint.map(|h| h[1]),
            width: None,
            vocab,
            synthetic: false,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Render width for content of the given natural width.
    pub fn render_width(&self, content_width: usize, max_column_width: usize) -> usize {
        if let Some(width) = self.width {
            return width;
        }
        let min = self.min_width.unwrap_or(3);
        let max = self.max_width.unwrap_or(max_column_width).min(max_column_width);
        content_width.clamp(min.min(max), max)
    }
}

/// Headers for the dataset fields followed by the derived data columns,
/// with the synthetic index column first.
pub fn build_headers(spec: &Spec, data_columns: &[DataColumn]) -> Vec<ColumnHeader> {
    let mut headers = vec![ColumnHeader::index()];
    headers.extend(spec.iter().map(|(name, fs)| ColumnHeader::from_spec(name, fs)));
    headers.extend(
        data_columns
            .iter()
            .map(|c| ColumnHeader::from_spec(&c.name, &c.spec)),
    );
    headers
}

/// Fresh visibility map: the index plus every field flagged for the table is on.
pub fn default_visibility(spec: &Spec, data_columns: &[DataColumn]) -> BTreeMap<String, bool> {
    let mut visibility = BTreeMap::new();
    visibility.insert(INDEX_COLUMN.to_string(), true);
    for (name, fs) in spec.iter() {
        visibility.insert(name.to_string(), fs.show_in_data_table);
    }
    for column in data_columns {
        visibility.insert(column.name.clone(), column.spec.show_in_data_table);
    }
    visibility
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec() -> Spec {
        let mut spec = Spec::new();
        spec.push("sentence", FieldSpec::new(FieldType::TextSegment));
        spec.push(
            "correct",
            FieldSpec::new(FieldType::Boolean).with_vocab(vec!["yes".into(), "no".into()]),
        );
        spec.push("emb", FieldSpec::new(FieldType::Embeddings));
        spec
    }

    #[test]
    fn headers_start_with_index_and_carry_hints() {
        let headers = build_headers(&spec(), &[]);
        let names: Vec<&str> = headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["index", "sentence", "correct", "emb"]);
        assert_eq!(headers[0].width, Some(INDEX_COLUMN_WIDTH));
        assert_eq!(headers[1].min_width, Some(20));
        assert_eq!(headers[3].min_width, None);
    }

    #[test]
    fn boolean_vocab_overrides_type_vocab() {
        let headers = build_headers(&spec(), &[]);
        assert_eq!(
            headers[2].vocab,
            Some(vec!["✔".to_string(), " ".to_string()])
        );
    }

    #[test]
    fn data_columns_follow_dataset_fields() {
        let data = vec![DataColumn {
            name: "m:pred".to_string(),
            spec: FieldSpec::new(FieldType::CategoryLabel),
            source: "m".to_string(),
        }];
        let headers = build_headers(&spec(), &data);
        assert_eq!(headers.last().map(|h| h.name.as_str()), Some("m:pred"));
        let visibility = default_visibility(&spec(), &data);
        assert_eq!(visibility.get("m:pred"), Some(&true));
        assert_eq!(visibility.get("emb"), Some(&false));
        assert_eq!(visibility.get(INDEX_COLUMN), Some(&true));
    }

    #[test]
    fn render_width_respects_hints() {
        let headers = build_headers(&spec(), &[]);
        assert_eq!(headers[0].render_width(100, 40), INDEX_COLUMN_WIDTH);
        assert_eq!(headers[1].render_width(5, 40), 20);
        assert_eq!(headers[1].render_width(100, 40), 40);
        assert_eq!(headers[3].render_width(100, 30), 30);
    }
}
