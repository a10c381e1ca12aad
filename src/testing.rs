//! Testing utilities for code built on the transport and reconciler.
//!
//! [`MockDispatcher`] replaces the HTTP layer with a scripted queue of
//! responses and records every request it receives, so tests can assert on
//! exactly what would have gone over the wire (including that nothing did).
//!
//! # Example
//!
//! ```
//! use hemmer_provider_rest::testing::MockDispatcher;
//! use hemmer_provider_rest::{EndpointConfig, HttpMethod, Transport};
//!
//! # tokio_test::block_on(async {
//! let config = EndpointConfig::new("https://api.example.com", "token").unwrap();
//! let transport = Transport::with_dispatcher(config, MockDispatcher::new().respond(204, ""));
//!
//! transport
//!     .exchange_json_unit(HttpMethod::Delete, "/tags/1/", None::<&()>)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(transport.dispatcher().request_count(), 1);
//! # });
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::EndpointConfig;
use crate::error::RestError;
use crate::http::{RawResponse, RequestEnvelope};
use crate::schema::{Diagnostic, DiagnosticSeverity};
use crate::transport::Dispatch;
use crate::types::Plan;

/// An in-memory [`Dispatch`] that answers from a scripted queue.
///
/// Responses are handed out in the order they were scripted. Once the queue
/// is empty every further request fails with [`RestError::Transport`], which
/// makes unexpected requests visible in tests.
#[derive(Debug, Default)]
pub struct MockDispatcher {
    responses: Mutex<VecDeque<Result<RawResponse, RestError>>>,
    requests: Mutex<Vec<RequestEnvelope>>,
    delay: Option<Duration>,
}

impl MockDispatcher {
    /// Create a dispatcher with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        lock(&self.responses).push_back(Ok(RawResponse::new(status, body)));
        self
    }

    /// Queue a connection-level failure.
    pub fn fail(self, error: RestError) -> Self {
        lock(&self.responses).push_back(Err(error));
        self
    }

    /// Wait this long before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<RequestEnvelope> {
        lock(&self.requests).clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

#[async_trait]
impl Dispatch for MockDispatcher {
    async fn dispatch(
        &self,
        _config: &EndpointConfig,
        request: RequestEnvelope,
    ) -> Result<RawResponse, RestError> {
        let description = format!("{} {}", request.method, request.path);
        lock(&self.requests).push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        lock(&self.responses).pop_front().unwrap_or_else(|| {
            Err(RestError::Transport(format!(
                "no scripted response for {}",
                description
            )))
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates the entity.
///
/// # Panics
///
/// Panics if the plan is anything other than [`Plan::Create`].
pub fn assert_plan_creates(plan: &Plan) {
    assert!(
        matches!(plan, Plan::Create),
        "Expected plan to create, but got {:?}",
        plan
    );
}

/// Assert that a plan changes nothing.
///
/// # Panics
///
/// Panics if the plan is not [`Plan::NoOp`].
pub fn assert_plan_no_changes(plan: &Plan) {
    assert!(
        plan.is_noop(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes().len(),
        changed_paths(plan)
    );
}

/// Assert that a plan requires replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &Plan) {
    assert!(
        plan.requires_replace(),
        "Expected plan to require replacement, but got {:?}",
        changed_paths(plan)
    );
}

/// Assert that a plan updates in place.
///
/// # Panics
///
/// Panics if the plan is not [`Plan::Update`].
pub fn assert_plan_updates_in_place(plan: &Plan) {
    assert!(
        matches!(plan, Plan::Update { .. }),
        "Expected plan to update in place, but got {:?}",
        plan
    );
}

/// Assert that a plan changes a specific attribute.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given attribute.
pub fn assert_plan_changes_attribute(plan: &Plan, path: &str) {
    let has_change = plan.changes().iter().any(|c| c.path == path);
    assert!(
        has_change,
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        changed_paths(plan)
    );
}

/// Assert that a plan leaves an attribute alone.
///
/// # Panics
///
/// Panics if the plan has a change for the given attribute.
pub fn assert_plan_does_not_change_attribute(plan: &Plan, path: &str) {
    let has_change = plan.changes().iter().any(|c| c.path == path);
    assert!(
        !has_change,
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

fn changed_paths(plan: &Plan) -> Vec<&str> {
    plan.changes().iter().map(|c| c.path.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::types::AttributeChange;
    use serde_json::json;

    fn config() -> EndpointConfig {
        EndpointConfig::new("https://api.example.com", "token").unwrap()
    }

    #[tokio::test]
    async fn test_mock_dispatcher_scripted_queue() {
        let mock = MockDispatcher::new()
            .respond(200, "{}")
            .fail(RestError::Transport("connection reset".to_string()));
        assert_eq!(mock.remaining(), 2);

        let first = mock
            .dispatch(&config(), RequestEnvelope::new(HttpMethod::Get, "/a"))
            .await;
        tokio_test::assert_ok!(&first);

        let second = mock
            .dispatch(&config(), RequestEnvelope::new(HttpMethod::Get, "/b"))
            .await;
        tokio_test::assert_err!(&second);

        let third = mock
            .dispatch(&config(), RequestEnvelope::new(HttpMethod::Post, "/c"))
            .await
            .unwrap_err();
        assert!(third.to_string().contains("POST /c"));

        let paths: Vec<_> = mock.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn test_plan_assertions() {
        let update = Plan::Update {
            changes: vec![AttributeChange::modified("email", json!("a"), json!("b"))],
        };
        assert_plan_updates_in_place(&update);
        assert_plan_changes_attribute(&update, "email");
        assert_plan_does_not_change_attribute(&update, "username");

        assert_plan_creates(&Plan::Create);
        assert_plan_no_changes(&Plan::NoOp);
        assert_plan_replaces(&Plan::Replace { changes: vec![] });
    }

    #[test]
    #[should_panic(expected = "Expected no changes")]
    fn test_assert_plan_no_changes_panics() {
        assert_plan_no_changes(&Plan::Create);
    }

    #[test]
    fn test_diagnostic_assertions() {
        let diagnostics = vec![
            Diagnostic::warning("Attribute 'created' is read-only"),
            Diagnostic::error("Missing required attribute 'username'"),
        ];
        assert_has_errors(&diagnostics);
        assert_error_contains(&diagnostics, "username");
        assert_no_errors(&diagnostics[..1]);
    }

    #[test]
    #[should_panic(expected = "Expected an error containing")]
    fn test_assert_error_contains_ignores_warnings() {
        assert_error_contains(&[Diagnostic::warning("read-only")], "read-only");
    }
}
