//! Message-level entry point of the engine.
//!
//! Every command yields exactly one [`AutomationResult`]. Errors, including a
//! panic inside the sequence, never cross this boundary as faults.

use crate::config::StarbeamConfig;
use crate::dom::Dom;
use crate::events::commit_value;
use crate::navigation::{NavigationPlan, NavigationSequencer};
use futures::FutureExt;
use starbeam_common::error::AutomationError;
use starbeam_common::protocol::{ACTIVATE_BEAM, AutomationResult, BeamCommand};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct AutomationGateway<D: Dom> {
    dom: D,
    plan: NavigationPlan,
    // At most one command runs at a time; later ones queue here.
    in_flight: Mutex<()>,
}

impl<D: Dom> AutomationGateway<D> {
    pub fn new(dom: D, config: &StarbeamConfig) -> Self {
        Self::with_plan(dom, NavigationPlan::from_config(config))
    }

    pub fn with_plan(dom: D, plan: NavigationPlan) -> Self {
        Self {
            dom,
            plan,
            in_flight: Mutex::new(()),
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn plan(&self) -> &NavigationPlan {
        &self.plan
    }

    /// Run one command to completion.
    pub async fn handle(&self, command: BeamCommand) -> AutomationResult {
        let _guard = self.in_flight.lock().await;

        match AssertUnwindSafe(self.execute(&command)).catch_unwind().await {
            Ok(Ok(())) => {
                info!("Beam delivered");
                AutomationResult::Success
            }
            Ok(Err(e)) => {
                warn!("Beam failed [{}]: {} ({})", e.code(), e, e.recovery_hint());
                AutomationResult::failure(e.to_string())
            }
            Err(panic) => {
                let e = AutomationError::Internal(panic_message(panic.as_ref()));
                warn!("Beam aborted: {}", e);
                AutomationResult::failure(e.to_string())
            }
        }
    }

    /// Handle an untyped message. Returns `None` when the message is not
    /// addressed to this engine, so another listener may answer it.
    pub async fn handle_message(&self, message: &serde_json::Value) -> Option<AutomationResult> {
        let action = message.get("action")?.as_str()?;
        if action != ACTIVATE_BEAM {
            return None;
        }
        match serde_json::from_value::<BeamCommand>(message.clone()) {
            Ok(command) => Some(self.handle(command).await),
            Err(e) => Some(AutomationResult::failure(format!(
                "malformed {} request: {}",
                ACTIVATE_BEAM, e
            ))),
        }
    }

    async fn execute(&self, command: &BeamCommand) -> Result<(), AutomationError> {
        match command {
            BeamCommand::ActivateBeam { payload } => {
                info!("Beam requested ({} lines)", payload.lines().count());
                let input = NavigationSequencer::new(&self.dom, &self.plan).run().await?;
                commit_value(&self.dom, &input, payload).await?;
                Ok(())
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
