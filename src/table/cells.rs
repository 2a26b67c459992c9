use crate::dataset::CellValue;
use crate::types::{BOOLEAN_VOCAB, FieldSpec, FieldType};

/// Maximum number of words shown for text when word limiting is on.
pub const MAX_DISPLAY_WORDS: usize = 25;

/// One cell handed to the table widget.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEntry {
    Value(String),
    /// Display text with its own sort key. `link` marks cells whose
    /// activation opens the value instead of selecting the row.
    Rendered {
        display: String,
        sort_value: String,
        link: bool,
    },
}

impl TableEntry {
    pub fn display(&self) -> &str {
        match self {
            TableEntry::Value(s) => s,
            TableEntry::Rendered { display, .. } => display,
        }
    }

    pub fn sort_value(&self) -> &str {
        match self {
            TableEntry::Value(s) => s,
            TableEntry::Rendered { sort_value, .. } => sort_value,
        }
    }

    pub fn link(&self) -> Option<&str> {
        match self {
            TableEntry::Rendered {
                sort_value,
                link: true,
                ..
            } => Some(sort_value.as_str()),
            _ => None,
        }
    }
}

/// Generic value formatter shared by every column type without a special case.
pub fn format_for_display(value: &CellValue, spec: Option<&FieldSpec>, limit_words: bool) -> String {
    match value {
        CellValue::Null => "∅".to_string(),
        CellValue::Bool(b) => {
            let symbol = if *b { BOOLEAN_VOCAB[0] } else { BOOLEAN_VOCAB[1] };
            symbol.to_string()
        }
        CellValue::Number(n) => {
            let is_bool = spec.is_some_and(|s| s.field_type == FieldType::Boolean);
            if is_bool {
                format_for_display(&CellValue::Bool(*n != 0.0), spec, limit_words)
            } else {
                format_number(*n)
            }
        }
        CellValue::Text(s) => {
            let is_bool = spec.is_some_and(|s| s.field_type == FieldType::Boolean);
            match value.as_bool() {
                Some(b) if is_bool => format_for_display(&CellValue::Bool(b), spec, limit_words),
                _ => format_text(s, limit_words),
            }
        }
        CellValue::List(items) => items
            .iter()
            .map(|item| format_for_display(item, None, false))
            .collect::<Vec<String>>()
            .join(", "),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n:.3}")
    }
}

fn format_text(s: &str, limit_words: bool) -> String {
    let flat = s.replace("\r\n", " ↵ ").replace('\n', " ↵ ");
    if !limit_words {
        return flat;
    }
    let words: Vec<&str> = flat.split_whitespace().collect();
    if words.len() <= MAX_DISPLAY_WORDS {
        flat
    } else {
        format!("{} …", words[..MAX_DISPLAY_WORDS].join(" "))
    }
}

/// Formats a single cell. URLs become links that still sort on the raw string.
pub fn format_cell(value: &CellValue, spec: Option<&FieldSpec>, limit_words: bool) -> TableEntry {
    match (spec.map(|s| s.field_type), value) {
        (Some(FieldType::Url), CellValue::Text(url)) => TableEntry::Rendered {
            display: url.clone(),
            sort_value: url.clone(),
            link: true,
        },
        _ => TableEntry::Value(format_for_display(value, spec, limit_words)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn url_cells_are_links_sorted_by_raw_string() {
        let spec = FieldSpec::new(FieldType::Url);
        let entry = format_cell(
            &CellValue::Text("https://example.org/a".to_string()),
            Some(&spec),
            true,
        );
        assert_eq!(entry.sort_value(), "https://example.org/a");
        assert_eq!(entry.link(), Some("https://example.org/a"));
    }

    #[test]
    fn booleans_use_check_vocab() {
        let spec = FieldSpec::new(FieldType::Boolean);
        assert_eq!(format_cell(&CellValue::Bool(true), Some(&spec), false).display(), "✔");
        assert_eq!(format_cell(&CellValue::Bool(false), Some(&spec), false).display(), " ");
        let text = CellValue::Text("true".to_string());
        assert_eq!(format_for_display(&text, Some(&spec), false), "✔");
    }

    #[test]
    fn numbers_and_lists() {
        assert_eq!(format_for_display(&CellValue::Number(3.0), None, false), "3");
        assert_eq!(format_for_display(&CellValue::Number(0.12345), None, false), "0.123");
        let list = CellValue::List(vec![
            CellValue::Text("a".to_string()),
            CellValue::Number(2.0),
        ]);
        assert_eq!(format_for_display(&list, None, false), "a, 2");
        assert_eq!(format_for_display(&CellValue::Null, None, false), "∅");
    }

    #[test]
    fn long_text_is_cut_when_limited() {
        let long = (0..40).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let value = CellValue::Text(long.clone());
        let limited = format_for_display(&value, None, true);
        assert!(limited.ends_with(" …"));
        assert_eq!(limited.split_whitespace().count(), MAX_DISPLAY_WORDS + 1);
        assert_eq!(format_for_display(&value, None, false), long);
    }

    #[test]
    fn newlines_are_flattened() {
        let value = CellValue::Text("a\nb".to_string());
        assert_eq!(format_for_display(&value, None, false), "a ↵ b");
    }
}
