// Batch Index - task ids grouped by caller-supplied tag

use super::task::TaskId;
use std::collections::HashMap;

/// Append-only mapping of batch tag to task ids in submission order
#[derive(Debug, Default, Clone)]
pub struct BatchIndex {
    batches: HashMap<String, Vec<TaskId>>,
}

impl BatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, batch_tag: &str, task_id: TaskId) {
        self.batches
            .entry(batch_tag.to_string())
            .or_default()
            .push(task_id);
    }

    /// Task ids of a batch; empty if the tag is unknown
    pub fn task_ids(&self, batch_tag: &str) -> &[TaskId] {
        self.batches
            .get(batch_tag)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
