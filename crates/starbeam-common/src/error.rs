//! Error taxonomy shared by every layer of the beam pipeline.
//!
//! `DomError` is raised by a `Dom` implementation, `AutomationError` by the
//! engine, and `TransportError` by whatever carries a command to the engine.
//! Only the last two are ever shown to a user.

use thiserror::Error;

/// Failures raised while reading or writing the target document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("node is no longer attached to the document")]
    Detached,

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("element <{tag}> does not accept a value")]
    NotEditable { tag: String },

    #[error("page script error: {0}")]
    Script(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("page evaluation timed out")]
    Timeout,
}

impl DomError {
    /// Whether the error is expected to clear up on the next poll because the
    /// target re-rendered underneath us.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomError::Detached)
    }

    pub fn code(&self) -> &'static str {
        match self {
            DomError::Detached => "NODE_DETACHED",
            DomError::InvalidSelector(_) => "SELECTOR_INVALID",
            DomError::NotEditable { .. } => "NOT_EDITABLE",
            DomError::Script(_) => "SCRIPT_ERROR",
            DomError::Protocol(_) => "PROTOCOL_ERROR",
            DomError::Timeout => "EVAL_TIMEOUT",
        }
    }
}

/// Engine-level failures. Every variant is converted into a
/// `Failure { message }` at the gateway boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutomationError {
    /// A strategy evaluated synchronously produced no match.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The waiter exceeded its bound.
    #[error("{what} did not appear within {timeout_ms} ms")]
    Timeout { what: String, timeout_ms: u64 },

    /// The navigation steps ran but the target never rendered.
    #[error("{what} did not appear after navigation")]
    NavigationTimeout { what: String, timeout_ms: u64 },

    /// Unexpected failure while touching the DOM.
    #[error("dispatch fault: {0}")]
    DispatchFault(#[from] DomError),

    /// A panic escaped the navigation sequence.
    #[error("internal fault: {0}")]
    Internal(String),
}

impl AutomationError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AutomationError::NotFound { what: what.into() }
    }

    /// Re-label a waiter timeout as the end of a navigation sequence.
    pub fn after_navigation(self) -> Self {
        match self {
            AutomationError::Timeout { what, timeout_ms } => {
                AutomationError::NavigationTimeout { what, timeout_ms }
            }
            other => other,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AutomationError::NotFound { .. } => "NOT_FOUND",
            AutomationError::Timeout { .. } | AutomationError::NavigationTimeout { .. } => {
                "TIMEOUT"
            }
            AutomationError::DispatchFault(_) => "DISPATCH_FAULT",
            AutomationError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            AutomationError::NotFound { .. } => {
                "The page layout may have changed; add a selector variant to the configuration"
            }
            AutomationError::Timeout { .. } | AutomationError::NavigationTimeout { .. } => {
                "Retry the beam, or raise engine.wait_timeout_ms"
            }
            AutomationError::DispatchFault(_) | AutomationError::Internal(_) => {
                "Reload the target page and retry the beam"
            }
        }
    }
}

/// The engine could not be reached at all. Kept apart from engine failures so
/// the caller can tell "open the page" from "retry".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("no open tab matches {host}")]
    TargetNotFound { host: String },

    #[error("target tab is unreachable: {0}")]
    Unreachable(String),
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::TargetNotFound { .. } => "TARGET_NOT_FOUND",
            TransportError::Unreachable(_) => "UNREACHABLE",
        }
    }

    /// User-facing remediation text.
    pub fn remediation(&self) -> String {
        match self {
            TransportError::TargetNotFound { host } => {
                format!("No {} tab found. Open {} and try again.", host, host)
            }
            TransportError::Unreachable(_) => {
                "Could not reach the target tab. Reload the page once and retry.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = AutomationError::not_found("menu trigger");
        assert_eq!(err.to_string(), "menu trigger not found");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_timeout_message() {
        let err = AutomationError::Timeout {
            what: "input".into(),
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "input did not appear within 5000 ms");

        let err = err.after_navigation();
        assert_eq!(err.to_string(), "input did not appear after navigation");
        assert_eq!(err.code(), "TIMEOUT");
    }

    #[test]
    fn test_after_navigation_keeps_other_errors() {
        let err = AutomationError::not_found("option").after_navigation();
        assert_eq!(err, AutomationError::not_found("option"));
    }

    #[test]
    fn test_dom_error_wraps_into_dispatch_fault() {
        let err: AutomationError = DomError::Detached.into();
        assert_eq!(err.code(), "DISPATCH_FAULT");
        assert!(err.to_string().contains("no longer attached"));
    }

    #[test]
    fn test_only_detached_is_transient() {
        assert!(DomError::Detached.is_transient());
        assert!(!DomError::Protocol("closed".into()).is_transient());
        assert!(!DomError::InvalidSelector("[".into()).is_transient());
    }

    #[test]
    fn test_transport_remediation_differs() {
        let missing = TransportError::TargetNotFound {
            host: "notebooklm.google.com".into(),
        };
        let unreachable = TransportError::Unreachable("context destroyed".into());
        assert!(missing.remediation().contains("Open notebooklm.google.com"));
        assert!(unreachable.remediation().contains("Reload"));
        assert_ne!(missing.code(), unreachable.code());
    }
}
