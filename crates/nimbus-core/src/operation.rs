//! Asynchronous operations and the operation poller.
//!
//! Mutating API calls return an [`Operation`] rather than the resource itself. The
//! [`OperationPoller`] fetches `GET /operation/{id}` until the operation leaves the
//! `pending` state, then hands back the terminal operation or the failure.

use crate::client::PollPolicy;
use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::string_enum;
use crate::transport::{path_segment, Transport};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

string_enum! {
    /// State of an asynchronous operation.
    pub enum OperationState {
        /// Still running; the only non-terminal state
        Pending => "pending",
        /// Completed successfully
        Success => "success",
        /// Completed with an error
        Failure => "failure",
        /// Abandoned by the server after running too long
        Timeout => "timeout",
    }
}

impl OperationState {
    /// Returns true for every state except `pending`.
    ///
    /// Unrecognised states count as terminal: the poller cannot know they will
    /// ever change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Pointer to the resource an operation acted upon.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reference {
    /// Resource identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Resource name, for resources addressed by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// API link to the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Reference {
    /// Identifier to re-fetch the resource with: the id, or failing that the name.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.name.as_deref().filter(|name| !name.is_empty()))
    }
}

/// Server-side handle for an in-progress mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Operation {
    /// Operation identifier
    pub id: String,
    /// Current state; always present in well-formed responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<OperationState>,
    /// Affected resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    /// Human readable status or error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Machine readable failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Operation {
    /// Returns true once the operation can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.as_ref().is_some_and(OperationState::is_terminal)
    }

    /// Identifier of the affected resource (reference id, falling back to name).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the operation references nothing.
    pub fn reference_key(&self) -> Result<&str> {
        self.reference
            .as_ref()
            .and_then(Reference::key)
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "operation {} does not reference a resource",
                    self.id
                ))
            })
    }

    fn failure_message(&self) -> String {
        match (&self.message, &self.reason) {
            (Some(message), Some(reason)) => format!("{message} ({reason})"),
            (Some(message), None) => message.clone(),
            (None, Some(reason)) => reason.clone(),
            (None, None) => format!(
                "operation ended in state `{}`",
                self.state.as_ref().map_or("unknown", OperationState::as_str)
            ),
        }
    }
}

/// Polls an operation until it reaches a terminal state.
#[derive(Clone)]
pub struct OperationPoller {
    transport: Arc<dyn Transport>,
    policy: PollPolicy,
}

impl OperationPoller {
    /// Create a poller over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, policy: PollPolicy) -> Self {
        Self { transport, policy }
    }

    /// The poll policy in use.
    #[must_use]
    pub const fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Fetch the current state of an operation once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an id that is not a single path segment,
    /// transport and cancellation errors unchanged, and [`Error::Protocol`] for
    /// malformed responses.
    pub async fn get_operation(&self, ctx: &CallContext, operation_id: &str) -> Result<Operation> {
        let path = format!("operation/{}", path_segment("operation id", operation_id)?);
        let body = ctx
            .run(self.transport.execute(Method::GET, &path, None))
            .await?
            .into_success()?;

        let operation = serde_json::from_str::<Operation>(&body).map_err(|err| {
            Error::Protocol(format!("Failed to parse operation {operation_id}: {err}"))
        })?;

        if operation.id != operation_id {
            return Err(Error::Protocol(format!(
                "requested operation {operation_id} but server returned {}",
                operation.id
            )));
        }

        Ok(operation)
    }

    /// Wait until the operation leaves the `pending` state.
    ///
    /// The first poll is immediate; later polls back off according to the
    /// [`PollPolicy`]. Transport failures are never retried.
    ///
    /// # Errors
    ///
    /// * [`Error::OperationFailed`] - the operation ended in `failure` or `timeout`
    /// * [`Error::Protocol`] - a response lacked a state or carried an unknown one
    /// * [`Error::Cancelled`] - the context or the policy timeout fired first
    /// * any transport error from a poll request
    pub async fn await_operation(&self, ctx: &CallContext, operation_id: &str) -> Result<Operation> {
        path_segment("operation id", operation_id)?;

        let ctx = match self.policy.timeout {
            Some(timeout) => ctx.child().with_timeout(timeout),
            None => ctx.child(),
        };

        let mut attempt: u32 = 0;
        loop {
            let delay = self.policy.delay_for_attempt(attempt);
            let polled = if delay.is_zero() {
                match ctx.check() {
                    Ok(()) => self.get_operation(&ctx, operation_id).await,
                    Err(err) => Err(err),
                }
            } else {
                debug!(operation_id, attempt, "Next operation poll in {:?}", delay);
                match ctx.sleep(delay).await {
                    Ok(()) => self.get_operation(&ctx, operation_id).await,
                    Err(err) => Err(err),
                }
            };

            let operation = match polled {
                Ok(operation) => operation,
                Err(err) => {
                    if err.is_cancelled() {
                        warn!(operation_id, attempt, "Stopped waiting for operation: {err}");
                    }
                    return Err(err);
                }
            };

            match &operation.state {
                None => {
                    return Err(Error::Protocol(format!(
                        "operation {operation_id} has no state"
                    )));
                }
                Some(OperationState::Pending) => {
                    debug!(operation_id, attempt, "Operation pending");
                }
                Some(OperationState::Success) => {
                    debug!(operation_id, attempt, "Operation succeeded");
                    return Ok(operation);
                }
                Some(OperationState::Failure | OperationState::Timeout) => {
                    let message = operation.failure_message();
                    warn!(operation_id, attempt, "Operation failed: {message}");
                    return Err(Error::OperationFailed {
                        operation_id: operation_id.to_string(),
                        message,
                    });
                }
                Some(OperationState::Unknown(raw)) => {
                    return Err(Error::Protocol(format!(
                        "operation {operation_id} is in unrecognised state `{raw}`"
                    )));
                }
            }

            attempt = attempt.saturating_add(1);
        }
    }
}
