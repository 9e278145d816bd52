use crate::dom::Dom;
use crate::query::{DomLocation, locate};
use starbeam_common::error::AutomationError;
use starbeam_common::strategy::SelectorStrategy;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::debug;

/// Polls a strategy until it matches or the timeout elapses.
///
/// Polling rather than observing mutations: the target re-renders in ways we
/// cannot subscribe to, and every poll re-resolves from the document root.
/// There is no cancellation; a caller that stops waiting simply drops the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementWaiter {
    poll_interval: Duration,
    timeout: Duration,
}

impl ElementWaiter {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            // tokio's interval panics on a zero period
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            timeout,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for `strategy` to match. `what` names the control in the timeout error.
    pub async fn wait_for<D: Dom + ?Sized>(
        &self,
        dom: &D,
        strategy: &SelectorStrategy,
        what: &str,
    ) -> Result<D::Node, AutomationError> {
        let start = Instant::now();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls: u32 = 0;

        loop {
            ticker.tick().await;
            polls += 1;

            match locate(dom, strategy).await {
                Ok(DomLocation::Found { node, matcher }) => {
                    debug!(
                        "{} appeared after {} polls ({:?}, matcher #{})",
                        what,
                        polls,
                        start.elapsed(),
                        matcher
                    );
                    return Ok(node);
                }
                Ok(DomLocation::NotFound) => {}
                Err(e) if e.is_transient() => {
                    debug!("Poll {} hit a re-render: {}", polls, e);
                }
                Err(e) => return Err(e.into()),
            }

            if start.elapsed() >= self.timeout {
                return Err(AutomationError::Timeout {
                    what: what.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        }
    }
}
