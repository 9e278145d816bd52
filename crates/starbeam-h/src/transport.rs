use crate::cdp::CdpClient;
use crate::dom::CdpDom;
use async_trait::async_trait;
use starbeam_engine::config::StarbeamConfig;
use starbeam_engine::dom::Dom;
use starbeam_engine::error::TransportError;
use starbeam_engine::gateway::AutomationGateway;
use starbeam_engine::protocol::{AutomationResult, BeamCommand};
use starbeam_engine::transport::BeamTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Delivers beams to the target tab of a browser over the DevTools protocol.
pub struct CdpTransport {
    client: Arc<CdpClient>,
    config: Arc<StarbeamConfig>,
    // One beam at a time per browser.
    in_flight: Mutex<()>,
}

impl CdpTransport {
    pub fn new(client: Arc<CdpClient>, config: Arc<StarbeamConfig>) -> Self {
        Self {
            client,
            config,
            in_flight: Mutex::new(()),
        }
    }

    async fn target_dom(&self) -> Result<CdpDom, TransportError> {
        let host = &self.config.target.host;
        let wait = Duration::from_millis(self.config.browser.connect_timeout_ms);

        let page = self
            .client
            .find_page(host, wait)
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?
            .ok_or_else(|| TransportError::TargetNotFound { host: host.clone() })?;

        let dom = CdpDom::new(
            page,
            Duration::from_millis(self.config.browser.eval_timeout_ms),
        );
        // A tab that cannot evaluate script has no engine to talk to.
        dom.document()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        Ok(dom)
    }
}

#[async_trait]
impl BeamTransport for CdpTransport {
    async fn send(&self, command: BeamCommand) -> Result<AutomationResult, TransportError> {
        let _guard = self.in_flight.lock().await;

        let dom = match self.target_dom().await {
            Ok(dom) => dom,
            Err(e) => {
                warn!("Beam not delivered [{}]: {}", e.code(), e);
                return Err(e);
            }
        };
        info!("Delivering beam to {}", self.config.target.host);

        let gateway = AutomationGateway::new(dom, &self.config);
        let result = gateway.handle(command).await;

        if let Err(e) = gateway.dom().release().await {
            debug!("Failed to release remote objects: {}", e);
        }
        Ok(result)
    }
}
