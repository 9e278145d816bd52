use chromiumoxide::cdp::js_protocol::runtime::ExceptionDetails;
use starbeam_engine::dom::DomError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when context is not found (page navigating).
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Markers thrown by the page-side functions in `dom.rs`.
pub(crate) const DETACHED_MARKER: &str = "starbeam:detached";
pub(crate) const NOT_EDITABLE_MARKER: &str = "starbeam:not-editable:";

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("Could not find object with given id")
        || err.contains("-32000")
}

/// Map a protocol-level failure. Lost contexts and stale object ids mean the
/// page re-rendered, which the engine treats as a detached node.
pub(crate) fn protocol_error(err: impl Display) -> DomError {
    let err = err.to_string();
    if is_context_error(&err) {
        DomError::Detached
    } else {
        DomError::Protocol(err)
    }
}

/// Map an exception thrown inside the page.
pub(crate) fn exception_error(details: &ExceptionDetails) -> DomError {
    let message = details
        .exception
        .as_ref()
        .and_then(|e| e.description.clone())
        .unwrap_or_else(|| details.text.clone());

    if message.contains(DETACHED_MARKER) {
        DomError::Detached
    } else if let Some(pos) = message.find(NOT_EDITABLE_MARKER) {
        let tag = message[pos + NOT_EDITABLE_MARKER.len()..]
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_string();
        DomError::NotEditable { tag }
    } else if message.contains("is not a valid selector") {
        DomError::InvalidSelector(message)
    } else {
        DomError::Script(message)
    }
}

/// Bound a protocol call; a dialog (alert/confirm/prompt) can block the page's
/// JS thread indefinitely.
pub(crate) async fn with_timeout<T, E, Fut>(limit: Duration, call: Fut) -> Result<T, DomError>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, call).await {
        Err(_) => Err(DomError::Timeout),
        Ok(Err(e)) => Err(protocol_error(e)),
        Ok(Ok(value)) => Ok(value),
    }
}

/// Retry an operation that may fail while the page is navigating.
/// Returns immediately on success or on errors other than a lost context.
pub(crate) async fn retry_on_context_error<T, F, Fut>(
    operation_name: &str,
    mut operation: F,
) -> Result<T, DomError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomError>>,
{
    for attempt in 0..MAX_CONTEXT_RETRIES {
        match operation().await {
            Err(DomError::Detached) => {
                tracing::debug!(
                    "{} context error (attempt {}/{}), retrying...",
                    operation_name,
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            other => return other,
        }
    }
    Err(DomError::Detached)
}
