use serde::{Deserialize, Serialize};

/// Action name carried by a beam request.
pub const ACTIVATE_BEAM: &str = "ACTIVATE_BEAM";

/// Commands accepted by the automation engine.
///
/// Serialized as `{ "action": "ACTIVATE_BEAM", "payload": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum BeamCommand {
    #[serde(rename = "ACTIVATE_BEAM")]
    ActivateBeam {
        /// Newline-separated URL list. Passed through untouched.
        payload: String,
    },
}

impl BeamCommand {
    pub fn activate(payload: impl Into<String>) -> Self {
        BeamCommand::ActivateBeam {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            BeamCommand::ActivateBeam { payload } => payload,
        }
    }
}

/// Outcome of one command, delivered exactly once to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BeamResponse", from = "BeamResponse")]
pub enum AutomationResult {
    Success,
    Failure { message: String },
}

impl AutomationResult {
    pub fn failure(message: impl Into<String>) -> Self {
        AutomationResult::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AutomationResult::Success)
    }
}

/// Wire shape of [`AutomationResult`]: `{ "success": true }` or
/// `{ "success": false, "message": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<AutomationResult> for BeamResponse {
    fn from(result: AutomationResult) -> Self {
        match result {
            AutomationResult::Success => BeamResponse {
                success: true,
                message: None,
            },
            AutomationResult::Failure { message } => BeamResponse {
                success: false,
                message: Some(message),
            },
        }
    }
}

impl From<BeamResponse> for AutomationResult {
    fn from(response: BeamResponse) -> Self {
        if response.success {
            AutomationResult::Success
        } else {
            AutomationResult::Failure {
                message: response
                    .message
                    .unwrap_or_else(|| "the engine reported a failure without a message".into()),
            }
        }
    }
}
