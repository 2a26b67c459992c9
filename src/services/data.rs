use std::collections::HashMap;
use tracing::{debug, warn};

use crate::dataset::CellValue;
use crate::types::FieldSpec;

#[derive(Debug, Clone)]
pub struct DataColumn {
    pub name: String,
    pub spec: FieldSpec,
    /// Where the values came from, usually a model name.
    pub source: String,
}

/// Columns computed outside the dataset, such as model predictions.
#[derive(Debug, Default)]
pub struct DataService {
    columns: Vec<DataColumn>,
    values: HashMap<String, HashMap<String, CellValue>>,
    columns_revision: u64,
    values_revision: u64,
}

impl DataService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns_revision(&self) -> u64 {
        self.columns_revision
    }

    pub fn values_revision(&self) -> u64 {
        self.values_revision
    }

    pub fn cols(&self) -> &[DataColumn] {
        &self.columns
    }

    pub fn col_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Adds a column, or replaces the values of an existing one with the same name.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        spec: FieldSpec,
        source: impl Into<String>,
        values: HashMap<String, CellValue>,
    ) {
        let name = name.into();
        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == name) {
            warn!("Replacing values of data column {name}");
            if existing.spec != spec {
                existing.spec = spec;
                self.columns_revision += 1;
            }
        } else {
            debug!("Adding data column {name} with {} values", values.len());
            self.columns.push(DataColumn {
                name: name.clone(),
                spec,
                source: source.into(),
            });
            self.columns_revision += 1;
        }
        self.values.insert(name, values);
        self.values_revision += 1;
    }

    pub fn get_val(&self, id: &str, column: &str) -> Option<&CellValue> {
        self.values.get(column).and_then(|vals| vals.get(id))
    }

    pub fn clear(&mut self) {
        if !self.columns.is_empty() {
            self.columns.clear();
            self.values.clear();
            self.columns_revision += 1;
            self.values_revision += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;

    #[test]
    fn columns_revision_only_moves_for_new_columns() {
        let mut data = DataService::new();
        let values: HashMap<String, CellValue> =
            [("r1".to_string(), CellValue::Number(0.5))].into_iter().collect();
        data.add_column("m:score", FieldSpec::new(FieldType::Scalar), "m", values.clone());
        assert_eq!(data.columns_revision(), 1);
        data.add_column("m:score", FieldSpec::new(FieldType::Scalar), "m", values);
        assert_eq!(data.columns_revision(), 1);
        assert_eq!(data.values_revision(), 2);
        assert_eq!(data.get_val("r1", "m:score"), Some(&CellValue::Number(0.5)));
        assert_eq!(data.get_val("r2", "m:score"), None);
        assert_eq!(data.col_names(), vec!["m:score".to_string()]);
    }

    #[test]
    fn changed_spec_counts_as_a_column_change() {
        let mut data = DataService::new();
        data.add_column("m:label", FieldSpec::new(FieldType::String), "m", HashMap::new());
        data.add_column("m:label", FieldSpec::new(FieldType::CategoryLabel), "m", HashMap::new());
        assert_eq!(data.columns_revision(), 2);
        assert_eq!(data.cols()[0].spec.field_type, FieldType::CategoryLabel);
    }
}
