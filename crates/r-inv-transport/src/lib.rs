//! ---
//! inv_section: "03-call-primitive"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Call primitive used to reach the remote property collector."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
//! The single synchronous call primitive the R-INV core talks through.
//!
//! Session handling, wire encoding and connection management live behind
//! [`Invoke`]. The core only shapes [`Request`] values and interprets
//! [`Response`] values; failures come back as [`CallError`] and are passed
//! on untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use r_inv_types::{Request, Response, ServerFault};

/// Result alias for calls through the primitive.
pub type Result<T> = std::result::Result<T, CallError>;

/// Failures surfaced by the call primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The request never produced a well-formed response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The remote service rejected the request.
    #[error("server fault {0}")]
    Fault(ServerFault),
    /// The caller aborted the call.
    #[error("call cancelled")]
    Cancelled,
}

/// Cooperative cancellation flag shared between a caller and in-flight calls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`CallError::Cancelled`] when cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CallError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Synchronous call primitive supplied by the session/transport layer.
pub trait Invoke: Send + Sync {
    /// Issue `request` and block until the service answers.
    fn invoke(&self, request: Request) -> Result<Response>;

    /// Issue `request`, aborting when `cancel` fires.
    ///
    /// The default only checks the token before the call. Transports able to
    /// abort an in-flight long-poll should override it.
    fn invoke_cancellable(&self, request: Request, cancel: &CancelToken) -> Result<Response> {
        cancel.check()?;
        self.invoke(request)
    }

    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

impl<T: Invoke + ?Sized> Invoke for Arc<T> {
    fn invoke(&self, request: Request) -> Result<Response> {
        (**self).invoke(request)
    }

    fn invoke_cancellable(&self, request: Request, cancel: &CancelToken) -> Result<Response> {
        (**self).invoke_cancellable(request, cancel)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Adapter turning a closure into a call primitive.
pub struct FnTransport<F> {
    handler: F,
}

impl<F> FnTransport<F>
where
    F: Fn(Request) -> Result<Response> + Send + Sync,
{
    /// Wrap `handler`.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> Invoke for FnTransport<F>
where
    F: Fn(Request) -> Result<Response> + Send + Sync,
{
    fn invoke(&self, request: Request) -> Result<Response> {
        (self.handler)(request)
    }

    fn name(&self) -> &'static str {
        "fn"
    }
}

/// Round tripper that logs every call passing through it.
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: Invoke> LoggingTransport<T> {
    /// Wrap `inner`.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    fn observe(&self, method: &'static str, started: Instant, result: &Result<Response>) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(response) => tracing::debug!(
                transport = self.inner.name(),
                method,
                response = response.kind(),
                elapsed_ms,
                "call completed"
            ),
            Err(err) => tracing::debug!(
                transport = self.inner.name(),
                method,
                error = %err,
                elapsed_ms,
                "call failed"
            ),
        }
    }
}

impl<T: Invoke> Invoke for LoggingTransport<T> {
    fn invoke(&self, request: Request) -> Result<Response> {
        let method = request.method();
        let started = Instant::now();
        let result = self.inner.invoke(request);
        self.observe(method, started, &result);
        result
    }

    fn invoke_cancellable(&self, request: Request, cancel: &CancelToken) -> Result<Response> {
        let method = request.method();
        let started = Instant::now();
        let result = self.inner.invoke_cancellable(request, cancel);
        self.observe(method, started, &result);
        result
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r_inv_types::ObjectReference;

    fn destroy_request() -> Request {
        Request::DestroyPropertyCollector {
            this: ObjectReference::new("PropertyCollector", "session[1]"),
        }
    }

    #[test]
    fn cancelled_token_short_circuits_default_invoke() {
        let transport = FnTransport::new(|_| Ok(Response::Empty));
        let token = CancelToken::new();
        let observer = token.clone();
        token.cancel();
        assert!(observer.is_cancelled());
        assert_eq!(
            transport.invoke_cancellable(destroy_request(), &observer),
            Err(CallError::Cancelled)
        );
    }

    #[test]
    fn logging_transport_passes_results_through() {
        let fault = ServerFault::new("InvalidArgument", "bad spec");
        let expected = fault.clone();
        let transport = LoggingTransport::new(FnTransport::new(move |_| {
            Err(CallError::Fault(fault.clone()))
        }));
        assert_eq!(
            transport.invoke(destroy_request()),
            Err(CallError::Fault(expected))
        );
    }

    #[test]
    fn arc_forwards_to_inner_transport() {
        let transport: Arc<dyn Invoke> = Arc::new(FnTransport::new(|_| Ok(Response::Empty)));
        assert_eq!(transport.invoke(destroy_request()), Ok(Response::Empty));
        assert_eq!(transport.name(), "fn");
    }
}
