//! The navigation state machine that produces the URL input.
//!
//! ```text
//! Probe ──found──────────────────────────────────────────────▶ Done
//!   │ missing
//!   ▼
//! Activate{0} (menu trigger) ──missing──▶ Failed(NotFound)
//!   │ clicked, settle
//!   ▼
//! Activate{1} (option) ──────missing──▶ Failed(NotFound)
//!   │ clicked
//!   ▼
//! AwaitTarget ──found──▶ Done
//!   └──timeout──▶ Failed(NavigationTimeout)
//! ```
//!
//! A run is entered once per command and keeps no memory between runs: UI
//! state left over from a failed attempt is not trusted.

use crate::config::StarbeamConfig;
use crate::dom::Dom;
use crate::events::simulate_activation;
use crate::query::{DomLocation, locate};
use crate::waiter::ElementWaiter;
use starbeam_common::error::AutomationError;
use starbeam_common::strategy::SelectorStrategy;
use std::time::Duration;
use tracing::{debug, info};

/// A control that has to be activated on the way to the target.
#[derive(Debug, Clone)]
pub struct NavigationStep {
    pub label: String,
    pub strategy: SelectorStrategy,
    /// Pause after activation so transitions can finish.
    pub settle: Duration,
}

#[derive(Debug, Clone)]
pub struct NavigationPlan {
    pub target_label: String,
    pub target: SelectorStrategy,
    pub steps: Vec<NavigationStep>,
    pub waiter: ElementWaiter,
}

impl NavigationPlan {
    /// "input visible?" → "add source" menu → "website" option → wait for input.
    pub fn from_config(config: &StarbeamConfig) -> Self {
        Self {
            target_label: "input".to_string(),
            target: config.selectors.target_input.clone(),
            steps: vec![
                NavigationStep {
                    label: "menu trigger".to_string(),
                    strategy: config.selectors.menu_trigger.clone(),
                    settle: config.engine.settle_delay(),
                },
                NavigationStep {
                    label: "option".to_string(),
                    strategy: config.selectors.option.clone(),
                    settle: Duration::ZERO,
                },
            ],
            waiter: ElementWaiter::new(
                config.engine.poll_interval(),
                config.engine.wait_timeout(),
            ),
        }
    }
}

#[derive(Debug)]
pub enum NavState<N> {
    Probe,
    Activate { step: usize },
    AwaitTarget,
    Done(N),
    Failed(AutomationError),
}

impl<N> NavState<N> {
    pub fn name(&self) -> &'static str {
        match self {
            NavState::Probe => "probe",
            NavState::Activate { .. } => "activate",
            NavState::AwaitTarget => "await-target",
            NavState::Done(_) => "done",
            NavState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NavState::Done(_) | NavState::Failed(_))
    }
}

pub struct NavigationSequencer<'a, D: Dom + ?Sized> {
    dom: &'a D,
    plan: &'a NavigationPlan,
}

impl<'a, D: Dom + ?Sized> NavigationSequencer<'a, D> {
    pub fn new(dom: &'a D, plan: &'a NavigationPlan) -> Self {
        Self { dom, plan }
    }

    /// Drive the machine from `Probe` to a terminal state.
    pub async fn run(&self) -> Result<D::Node, AutomationError> {
        let mut state = NavState::Probe;
        loop {
            state = match state {
                NavState::Done(node) => return Ok(node),
                NavState::Failed(err) => return Err(err),
                current => self.step(current).await,
            };
        }
    }

    /// Perform one transition. Terminal states are returned unchanged.
    pub async fn step(&self, state: NavState<D::Node>) -> NavState<D::Node> {
        let from = state.name();
        let next = match state {
            NavState::Probe => self.probe().await,
            NavState::Activate { step } => self.activate(step).await,
            NavState::AwaitTarget => self.await_target().await,
            terminal => terminal,
        };
        info!("Navigation: {} -> {}", from, next.name());
        next
    }

    fn after_steps(&self, step: usize) -> NavState<D::Node> {
        if step < self.plan.steps.len() {
            NavState::Activate { step }
        } else {
            NavState::AwaitTarget
        }
    }

    async fn probe(&self) -> NavState<D::Node> {
        match locate(self.dom, &self.plan.target).await {
            Ok(DomLocation::Found { node, .. }) => NavState::Done(node),
            Ok(DomLocation::NotFound) => self.after_steps(0),
            Err(e) if e.is_transient() => {
                debug!("Probe raced a re-render ({}), navigating instead", e);
                self.after_steps(0)
            }
            Err(e) => NavState::Failed(e.into()),
        }
    }

    async fn activate(&self, step: usize) -> NavState<D::Node> {
        let Some(nav) = self.plan.steps.get(step) else {
            return NavState::AwaitTarget;
        };

        let node = match locate(self.dom, &nav.strategy).await {
            Ok(DomLocation::Found { node, matcher }) => {
                debug!("Found {} via matcher #{}", nav.label, matcher);
                node
            }
            Ok(DomLocation::NotFound) => {
                return NavState::Failed(AutomationError::not_found(nav.label.clone()));
            }
            Err(e) => return NavState::Failed(e.into()),
        };

        if let Err(e) = simulate_activation(self.dom, &node).await {
            return NavState::Failed(e.into());
        }

        if !nav.settle.is_zero() {
            tokio::time::sleep(nav.settle).await;
        }
        self.after_steps(step + 1)
    }

    async fn await_target(&self) -> NavState<D::Node> {
        match self
            .plan
            .waiter
            .wait_for(self.dom, &self.plan.target, &self.plan.target_label)
            .await
        {
            Ok(node) => NavState::Done(node),
            Err(e) => NavState::Failed(e.after_navigation()),
        }
    }
}
