//! Request context injection
//!
//! This module provides thread-local storage for the identity of the
//! request currently being served on a thread: the acting user and the
//! remote address the request came from. Log writes that are not given an
//! explicit source address fall back to the address stored here.

use std::cell::RefCell;

use uuid::Uuid;

/// Request context data stored in thread-local storage
#[derive(Debug, Clone)]
pub struct RequestContextData {
    /// The acting user's identifier
    pub user: String,
    /// Remote network address of the request
    pub remote_addr: String,
    /// Unique id for this request
    pub request_id: Uuid,
}

thread_local! {
    static REQUEST_CONTEXT: RefCell<Option<RequestContextData>> = const { RefCell::new(None) };
}

/// RAII guard for request context
///
/// When this guard is created, it sets the request context for the current
/// thread. When it's dropped, it restores the previous context (if any).
///
/// # Example
///
/// ```
/// use elections_logging::context::RequestContextGuard;
///
/// {
///     let _guard = RequestContextGuard::new("alice", "10.0.0.7");
///     assert_eq!(
///         RequestContextGuard::current_remote_addr().as_deref(),
///         Some("10.0.0.7")
///     );
/// }
/// assert!(RequestContextGuard::current().is_none());
/// ```
pub struct RequestContextGuard {
    previous: Option<RequestContextData>,
}

impl RequestContextGuard {
    /// Create a new request context guard
    pub fn new(user: impl Into<String>, remote_addr: impl Into<String>) -> Self {
        Self::with_request_id(user, remote_addr, Uuid::new_v4())
    }

    /// Create a guard with a specific request id
    ///
    /// Useful when an upstream proxy already assigned one.
    pub fn with_request_id(
        user: impl Into<String>,
        remote_addr: impl Into<String>,
        request_id: Uuid,
    ) -> Self {
        let previous = REQUEST_CONTEXT.with(|ctx| ctx.borrow().clone());

        let new_ctx = RequestContextData {
            user: user.into(),
            remote_addr: remote_addr.into(),
            request_id,
        };

        REQUEST_CONTEXT.with(|ctx| *ctx.borrow_mut() = Some(new_ctx));

        Self { previous }
    }

    /// Get the current request context (if any)
    pub fn current() -> Option<RequestContextData> {
        REQUEST_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current acting user (if set)
    pub fn current_user() -> Option<String> {
        Self::current().map(|ctx| ctx.user)
    }

    /// Get the current remote address (if set)
    pub fn current_remote_addr() -> Option<String> {
        Self::current().map(|ctx| ctx.remote_addr)
    }

    /// Get the current request id (if set)
    pub fn current_request_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.request_id)
    }
}

impl Drop for RequestContextGuard {
    fn drop(&mut self) {
        REQUEST_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Convenience macro to run a block inside a request context
///
/// # Example
///
/// ```ignore
/// with_request_context!("alice", "10.0.0.7", {
///     logger.info("Ballot submitted")?;
/// });
/// ```
#[macro_export]
macro_rules! with_request_context {
    ($user:expr, $addr:expr, $body:block) => {{
        let _guard = $crate::context::RequestContextGuard::new($user, $addr);
        $body
    }};
}
