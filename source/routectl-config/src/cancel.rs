//! Cooperative cancellation: a plain `AtomicBool` flag threaded
//! through the long-running operations (`merge_directory`, `backup`,
//! `restore`, `restart_for`) so a caller can interrupt them between steps
//! without reaching for an async runtime the synchronous core doesn't need.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, RouterConfigError};

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `RouterConfigError::Cancelled` if cancellation has been
    /// requested. Call this between steps of a long operation; never
    /// swallow the result.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RouterConfigError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncancelled_token_checks_ok() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancelled_token_fails_checks() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(token.check(), Err(RouterConfigError::Cancelled)));
    }

    #[test]
    fn clones_share_cancellation_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
