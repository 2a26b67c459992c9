use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::domain::TVError;

/// Reserved slice holding the user's starred examples.
pub const STARRED_SLICE_NAME: &str = "Starred";

/// Named, user-curated subsets of example ids.
#[derive(Debug)]
pub struct SliceService {
    slices: BTreeMap<String, Vec<String>>,
    revision: u64,
}

impl Default for SliceService {
    fn default() -> Self {
        let mut slices = BTreeMap::new();
        slices.insert(STARRED_SLICE_NAME.to_string(), Vec::new());
        Self {
            slices,
            revision: 0,
        }
    }
}

impl SliceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn slice_names(&self) -> Vec<&str> {
        self.slices.keys().map(String::as_str).collect()
    }

    pub fn get_slice_by_name(&self, name: &str) -> Option<&[String]> {
        self.slices.get(name).map(Vec::as_slice)
    }

    pub fn is_in_slice(&self, id: &str, name: &str) -> bool {
        self.slices
            .get(name)
            .is_some_and(|ids| ids.iter().any(|i| i == id))
    }

    /// Creates or replaces a slice.
    pub fn create_slice(&mut self, name: &str, ids: Vec<String>) -> Result<(), TVError> {
        if name.trim().is_empty() {
            return Err(TVError::InvalidCommand("slice name must not be empty".into()));
        }
        info!("Create slice {name} with {} ids", ids.len());
        self.slices.insert(name.to_string(), ids);
        self.revision += 1;
        Ok(())
    }

    pub fn delete_slice(&mut self, name: &str) -> Result<(), TVError> {
        if name == STARRED_SLICE_NAME {
            return Err(TVError::InvalidCommand(format!(
                "the {STARRED_SLICE_NAME} slice cannot be deleted"
            )));
        }
        match self.slices.remove(name) {
            Some(_) => {
                self.revision += 1;
                Ok(())
            }
            None => Err(TVError::InvalidCommand(format!("no slice named {name}"))),
        }
    }

    /// Appends ids that are not yet members. Unknown slices are created.
    pub fn add_ids_to_slice(&mut self, name: &str, ids: &[String]) {
        let members = self.slices.entry(name.to_string()).or_default();
        let before = members.len();
        for id in ids {
            if !members.contains(id) {
                members.push(id.clone());
            }
        }
        if members.len() != before {
            debug!("Added {} ids to slice {name}", members.len() - before);
            self.revision += 1;
        }
    }

    pub fn remove_ids_from_slice(&mut self, name: &str, ids: &[String]) {
        if let Some(members) = self.slices.get_mut(name) {
            let before = members.len();
            members.retain(|m| !ids.contains(m));
            if members.len() != before {
                debug!("Removed {} ids from slice {name}", before - members.len());
                self.revision += 1;
            }
        }
    }

    /// Drops all members from every slice, keeping the starred slice itself.
    pub fn clear_members(&mut self) {
        self.slices.retain(|name, _| name == STARRED_SLICE_NAME);
        if let Some(starred) = self.slices.get_mut(STARRED_SLICE_NAME) {
            starred.clear();
        }
        self.revision += 1;
    }
}
