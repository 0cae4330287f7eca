use crate::config::ENV_RUN;
use std::sync::{Arc, PoisonError, RwLock};

/// Process-scoped holder of the resolved run id.
///
/// Clones share the same slot, so a handle given to several clients (or to
/// code that spawns worker processes) observes the id as soon as one client
/// has created the run.
#[derive(Debug, Clone, Default)]
pub struct RunStore {
    run_id: Arc<RwLock<Option<String>>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_id(run_id: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(run_id);
        store
    }

    pub fn get(&self) -> Option<String> {
        self.run_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, run_id: impl Into<String>) {
        *self.run_id.write().unwrap_or_else(PoisonError::into_inner) = Some(run_id.into());
    }

    pub fn is_set(&self) -> bool {
        self.get().is_some()
    }

    /// `KEY=value` line other processes can source to join the run.
    pub fn export_line(&self) -> Option<String> {
        self.get().map(|run_id| format!("{}={}", ENV_RUN, run_id))
    }
}
