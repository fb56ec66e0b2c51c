use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
};

use futures::FutureExt;
use serde_json::Value;
use shared::{
    domain::EntitySchema,
    error::{FailureKind, WorkError},
    protocol::ResponseEnvelope,
};
use tracing::{error, warn};

/// Outcome of validating the request model before any work runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelState {
    errors: Vec<String>,
}

impl ModelState {
    pub fn valid() -> Self {
        Self::default()
    }

    /// Required-field check over a posted record.
    pub fn for_entity<T: EntitySchema>(record: &T) -> Self {
        Self {
            errors: record
                .missing_fields()
                .into_iter()
                .map(|spec| format!("The {} field is required.", spec.label))
                .collect(),
        }
    }

    /// A body that could not be turned into a record at all.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Runs `work` unless the model state is invalid and folds every failure,
/// panics included, into an envelope. A successful envelope is returned
/// untouched.
pub fn create_http_response<F>(model_state: &ModelState, work: F) -> ResponseEnvelope
where
    F: FnOnce() -> Result<ResponseEnvelope, WorkError>,
{
    if !model_state.is_valid() {
        return ResponseEnvelope::validation_errors(model_state.errors().to_vec());
    }
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(envelope)) => envelope,
        Ok(Err(failure)) => failure_envelope(&failure),
        Err(payload) => failure_envelope(&panic_failure(payload)),
    }
}

pub async fn create_http_response_async<F, Fut>(
    model_state: &ModelState,
    work: F,
) -> ResponseEnvelope
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResponseEnvelope, WorkError>>,
{
    if !model_state.is_valid() {
        return ResponseEnvelope::validation_errors(model_state.errors().to_vec());
    }
    match AssertUnwindSafe(async move { work().await })
        .catch_unwind()
        .await
    {
        Ok(Ok(envelope)) => envelope,
        Ok(Err(failure)) => failure_envelope(&failure),
        Err(payload) => failure_envelope(&panic_failure(payload)),
    }
}

pub fn failure_envelope(failure: &WorkError) -> ResponseEnvelope {
    let kind = failure.kind();
    let message = failure.innermost_message();
    match kind {
        FailureKind::ClientFault => {
            warn!(%message, "request rejected");
            ResponseEnvelope::failure(kind.status_code(), message, Value::String(String::new()))
        }
        FailureKind::PersistenceFault | FailureKind::Unclassified => {
            let diagnostic = failure.diagnostic();
            error!(?kind, %message, %diagnostic, "request failed");
            ResponseEnvelope::failure(kind.status_code(), message, Value::String(diagnostic))
        }
    }
}

fn panic_failure(payload: Box<dyn Any + Send>) -> WorkError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "request handler panicked".to_string());
    WorkError::Unclassified(anyhow::Error::msg(message))
}
