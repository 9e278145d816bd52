use crate::dom::Dom;
use crate::gateway::AutomationGateway;
use async_trait::async_trait;
use starbeam_common::error::TransportError;
use starbeam_common::protocol::{AutomationResult, BeamCommand};
use std::sync::Arc;

/// Carries a command to an engine instance and brings back its result.
///
/// `Err` means no engine answered; an engine that ran and failed answers
/// `Ok(AutomationResult::Failure { .. })`.
#[async_trait]
pub trait BeamTransport: Send + Sync {
    async fn send(&self, command: BeamCommand) -> Result<AutomationResult, TransportError>;
}

/// Transport to a gateway living in the same process.
pub struct LocalTransport<D: Dom> {
    gateway: Arc<AutomationGateway<D>>,
}

impl<D: Dom> LocalTransport<D> {
    pub fn new(gateway: Arc<AutomationGateway<D>>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl<D: Dom + 'static> BeamTransport for LocalTransport<D> {
    async fn send(&self, command: BeamCommand) -> Result<AutomationResult, TransportError> {
        Ok(self.gateway.handle(command).await)
    }
}

/// One-line, user-facing summary of a beam attempt.
pub fn describe_outcome(outcome: &Result<AutomationResult, TransportError>) -> String {
    match outcome {
        Ok(AutomationResult::Success) => "Beam successful.".to_string(),
        Ok(AutomationResult::Failure { message }) => {
            format!("Beam failed: {}. Retry the action.", message)
        }
        Err(e) => e.remediation(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_are_described_differently() {
        let ok = describe_outcome(&Ok(AutomationResult::Success));
        let failed = describe_outcome(&Ok(AutomationResult::failure("option not found")));
        let missing = describe_outcome(&Err(TransportError::TargetNotFound {
            host: "notebooklm.google.com".into(),
        }));
        assert_eq!(ok, "Beam successful.");
        assert!(failed.contains("option not found"));
        assert!(missing.contains("Open notebooklm.google.com"));
        assert_ne!(failed, missing);
    }
}
