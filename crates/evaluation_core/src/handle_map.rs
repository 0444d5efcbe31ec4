//! crates/evaluation_core/src/handle_map.rs
//!
//! Resolves an evaluated subject back to the file it was produced from, so a
//! single subject can be re-evaluated without uploading again.

use std::collections::HashMap;

use crate::domain::{ScoreRecord, UploadedFileHandle};

/// Subject name and position to upload handle.
///
/// Names are only a secondary key: a name shared by several subjects is left
/// out of the by-name table so those subjects resolve by position instead.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandleMap {
    by_name: HashMap<String, UploadedFileHandle>,
    by_index: Vec<Option<UploadedFileHandle>>,
}

impl HandleMap {
    /// Pairs score `i` with handle `i`.
    ///
    /// `echoed` are the handles the evaluation response sent back; when it is
    /// empty the handles captured from the upload call are used instead.
    pub fn build(
        records: &[ScoreRecord],
        echoed: &[UploadedFileHandle],
        uploaded: &[UploadedFileHandle],
    ) -> Self {
        let source = if echoed.is_empty() { uploaded } else { echoed };
        let paired = records.len().min(source.len());

        let mut name_counts: HashMap<&str, usize> = HashMap::new();
        for record in records {
            if let Some(name) = record.name.as_deref() {
                *name_counts.entry(name).or_default() += 1;
            }
        }

        let mut map = HandleMap {
            by_name: HashMap::new(),
            by_index: vec![None; records.len()],
        };
        for (index, handle) in source.iter().take(paired).enumerate() {
            map.by_index[index] = Some(handle.clone());
            if let Some(name) = records[index].name.as_deref() {
                if name_counts.get(name) == Some(&1) {
                    map.by_name.insert(name.to_string(), handle.clone());
                }
            }
        }
        map
    }

    /// Name first, then position.
    pub fn resolve(&self, name: &str, index: usize) -> Option<&UploadedFileHandle> {
        self.by_name(name).or_else(|| self.by_index(index))
    }

    pub fn by_name(&self, name: &str) -> Option<&UploadedFileHandle> {
        self.by_name.get(name)
    }

    pub fn by_index(&self, index: usize) -> Option<&UploadedFileHandle> {
        self.by_index.get(index).and_then(Option::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty() && self.by_index.iter().all(Option::is_none)
    }
}
