use std::sync::atomic::{AtomicUsize, Ordering};

use super::SummarizationError;

/// Run-wide count of failed completion attempts, shared by every node task.
#[derive(Debug)]
pub(crate) struct FailureBudget {
    limit: usize,
    failures: AtomicUsize,
}

impl FailureBudget {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            failures: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Fails once more than `limit` failures have been recorded.
    pub(crate) fn ensure_available(&self) -> Result<(), SummarizationError> {
        let failures = self.failures();
        if failures > self.limit {
            return Err(self.exhausted(failures));
        }
        Ok(())
    }

    /// Count one failure; the increment and the limit check observe the same value.
    pub(crate) fn record_failure(&self) -> Result<usize, SummarizationError> {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures > self.limit {
            return Err(self.exhausted(failures));
        }
        Ok(failures)
    }

    fn exhausted(&self, failures: usize) -> SummarizationError {
        SummarizationError::FailureBudgetExhausted {
            limit: self.limit,
            failures,
        }
    }
}
