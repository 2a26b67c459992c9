use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::dataset::{Dataset, IndexedInput};
use crate::types::Spec;

/// The active dataset and model set shared by every view.
#[derive(Debug, Default)]
pub struct AppState {
    dataset_name: String,
    models: Vec<String>,
    inputs: Vec<IndexedInput>,
    indices_by_id: HashMap<String, usize>,
    spec: Spec,
    compare_examples_enabled: bool,
    rows_revision: u64,
    models_revision: u64,
}

impl AppState {
    pub fn new(dataset: Dataset) -> Self {
        let mut state = Self::default();
        state.set_dataset(dataset);
        state
    }

    /// Replaces the active dataset. Models are tied to a dataset and are dropped too.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        info!(
            "Activating dataset {} with {} rows",
            dataset.name,
            dataset.inputs.len()
        );
        // Reversed so the first row wins for duplicate ids.
        self.indices_by_id = dataset
            .inputs
            .iter()
            .enumerate()
            .rev()
            .map(|(idx, input)| (input.id.clone(), idx))
            .collect();
        self.dataset_name = dataset.name;
        self.spec = dataset.spec;
        self.inputs = dataset.inputs;
        self.compare_examples_enabled = false;
        self.rows_revision += 1;
        if !self.models.is_empty() {
            self.models.clear();
            self.models_revision += 1;
        }
    }

    pub fn add_model(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.models.contains(&name) {
            self.models.push(name);
            self.models_revision += 1;
        }
    }

    pub fn current_dataset(&self) -> &str {
        &self.dataset_name
    }

    pub fn current_models(&self) -> &[String] {
        &self.models
    }

    pub fn current_inputs(&self) -> &[IndexedInput] {
        &self.inputs
    }

    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    pub fn rows_revision(&self) -> u64 {
        self.rows_revision
    }

    pub fn models_revision(&self) -> u64 {
        self.models_revision
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.indices_by_id.get(id).copied()
    }

    pub fn get_input(&self, id: &str) -> Option<&IndexedInput> {
        self.index_of(id).and_then(|idx| self.inputs.get(idx))
    }

    pub fn is_added(&self, id: &str) -> bool {
        self.get_input(id).is_some_and(|i| i.meta.added)
    }

    /// Lineage of `id`, starting with `id` itself and walking parent links.
    ///
    /// The walk stops at the first parent that is not in the dataset and
    /// never visits an id twice.
    pub fn ancestry(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.get_input(id);
        while let Some(input) = current {
            if !seen.insert(input.id.as_str()) {
                break;
            }
            chain.push(input.id.clone());
            current = input
                .meta
                .parent_id
                .as_deref()
                .and_then(|parent| self.get_input(parent));
        }
        chain
    }

    pub fn compare_examples_enabled(&self) -> bool {
        self.compare_examples_enabled
    }

    pub fn set_compare_examples(&mut self, enabled: bool) {
        self.compare_examples_enabled = enabled;
    }
}
