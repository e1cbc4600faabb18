//! Per-call cancellation and deadlines.
//!
//! Every client method takes a [`CallContext`]. Cancelling its token, or letting its
//! deadline pass, aborts the in-flight HTTP request and stops any further operation
//! polling with [`Error::Cancelled`].

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation signal and optional deadline supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Create a context that is never cancelled and has no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context driven by an existing cancellation token.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline. An earlier existing deadline is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Derive a context whose cancellation follows this one but can also be
    /// cancelled on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context (and every child derived from it).
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Access the underlying cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The effective deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns an error if the context is already cancelled or past its deadline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the call must not proceed.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled("call cancelled by caller".to_string()));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::Cancelled("deadline exceeded".to_string()));
            }
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context fires first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the context fires before `fut` completes,
    /// otherwise whatever `fut` returns.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            result = fut => result,
        }
    }

    /// Sleep for `duration`, waking early with an error if the context fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the context fires during the sleep.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }

    async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => Error::Cancelled("call cancelled by caller".to_string()),
                () = tokio::time::sleep_until(deadline) => Error::Cancelled("deadline exceeded".to_string()),
            },
            None => {
                self.token.cancelled().await;
                Error::Cancelled("call cancelled by caller".to_string())
            }
        }
    }
}
