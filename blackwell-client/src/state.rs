use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::storage::SessionStore;

pub const THREAD_KEY: &str = "blackwell-thread";
pub const REPORT_KEY: &str = "blackwell-latest-report";
pub const EVALUATION_KEY: &str = "blackwell-final-evaluation";
pub const TRIGGER_KEY: &str = "blackwell-trigger-evaluation";

/// Typed view over the four keys both pages share.
#[derive(Clone)]
pub struct SessionState {
    store: Arc<dyn SessionStore>,
}

impl SessionState {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn thread_id(&self) -> Option<String> {
        self.non_empty(THREAD_KEY)
    }

    pub fn set_thread_id(&self, thread_id: &str) -> Result<()> {
        self.store.set(THREAD_KEY, thread_id)
    }

    pub fn report(&self) -> Option<String> {
        self.non_empty(REPORT_KEY)
    }

    pub fn set_report(&self, report: &str) -> Result<()> {
        self.store.set(REPORT_KEY, report)
    }

    pub fn evaluation(&self) -> Option<String> {
        self.non_empty(EVALUATION_KEY)
    }

    pub fn set_evaluation(&self, evaluation: &str) -> Result<()> {
        self.store.set(EVALUATION_KEY, evaluation)
    }

    pub fn evaluation_requested(&self) -> bool {
        self.store.get(TRIGGER_KEY).as_deref() == Some("true")
    }

    pub fn request_evaluation(&self) -> Result<()> {
        self.store.set(TRIGGER_KEY, "true")
    }

    /// Read and clear the one-shot trigger flag.
    pub fn take_evaluation_request(&self) -> Result<bool> {
        let requested = self.evaluation_requested();
        if requested {
            self.store.remove(TRIGGER_KEY)?;
        }
        Ok(requested)
    }

    /// A new conversational turn invalidates everything derived from the
    /// previous report.
    pub fn clear_derived(&self) -> Result<()> {
        self.store.remove(REPORT_KEY)?;
        self.store.remove(EVALUATION_KEY)?;
        self.store.remove(TRIGGER_KEY)
    }

    pub fn clear_all(&self) -> Result<()> {
        for key in [THREAD_KEY, REPORT_KEY, EVALUATION_KEY, TRIGGER_KEY] {
            self.store.remove(key)?;
        }
        Ok(())
    }

    /// Storage failures are logged, not surfaced.
    pub(crate) fn log_failure(result: Result<()>, action: &str) {
        if let Err(e) = result {
            warn!("Failed to {} in session storage: {}", action, e);
        }
    }

    fn non_empty(&self, key: &str) -> Option<String> {
        self.store.get(key).filter(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemorySessionStore;

    fn state() -> (SessionState, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        (SessionState::new(store.clone()), store)
    }

    #[test]
    fn absent_and_empty_values_read_as_none() {
        let (state, store) = state();
        assert!(state.thread_id().is_none());
        store.set(THREAD_KEY, "").unwrap();
        assert!(state.thread_id().is_none());
    }

    #[test]
    fn trigger_flag_is_one_shot() {
        let (state, store) = state();
        state.request_evaluation().unwrap();
        assert_eq!(store.get(TRIGGER_KEY).as_deref(), Some("true"));

        assert!(state.take_evaluation_request().unwrap());
        assert!(!state.take_evaluation_request().unwrap());
        assert!(store.get(TRIGGER_KEY).is_none());
    }

    #[test]
    fn clear_derived_keeps_thread() {
        let (state, _) = state();
        state.set_thread_id("t-1").unwrap();
        state.set_report("report").unwrap();
        state.set_evaluation("evaluation").unwrap();
        state.request_evaluation().unwrap();

        state.clear_derived().unwrap();
        assert_eq!(state.thread_id().as_deref(), Some("t-1"));
        assert!(state.report().is_none());
        assert!(state.evaluation().is_none());
        assert!(!state.evaluation_requested());

        state.clear_all().unwrap();
        assert!(state.thread_id().is_none());
    }
}
