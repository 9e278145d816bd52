use async_trait::async_trait;
use serde_json::json;
use starbeam_engine::config::StarbeamConfig;
use starbeam_engine::dom::{Dom, DomError};
use starbeam_engine::events::{ACTIVATION_SEQUENCE, SyntheticEvent};
use starbeam_engine::gateway::AutomationGateway;
use starbeam_engine::memory::{MemoryDom, NodeId};
use starbeam_engine::navigation::NavigationPlan;
use starbeam_engine::protocol::{AutomationResult, BeamCommand};
use starbeam_engine::query::locate;
use starbeam_engine::strategy::{Matcher, SelectorStrategy};
use starbeam_engine::transport::{BeamTransport, LocalTransport};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const PAYLOAD: &str = "https://a.example\nhttps://b.example";

/// A notebook page whose controls live in one shadow root.
fn notebook() -> (MemoryDom, NodeId) {
    let dom = MemoryDom::new();
    let body = dom.append_element(dom.root(), "body", &[]);
    let app = dom.append_element(body, "notebook-app", &[]);
    let shadow = dom.attach_shadow(app);
    (dom, shadow)
}

fn add_trigger(dom: &MemoryDom, parent: NodeId) -> NodeId {
    let button = dom.append_element(parent, "button", &[("class", "add-source")]);
    let icon = dom.append_element(button, "span", &[("hidden", "")]);
    dom.append_text(icon, "add");
    dom.append_text(button, " Add source ");
    button
}

fn add_option(dom: &MemoryDom, parent: NodeId) -> NodeId {
    let chip = dom.append_element(parent, "button", &[("class", "chip")]);
    dom.append_text(chip, "Website");
    chip
}

fn add_input(dom: &MemoryDom, parent: NodeId) -> NodeId {
    let host = dom.append_element(parent, "url-form", &[]);
    let shadow = dom.attach_shadow(host);
    dom.append_element(shadow, "textarea", &[("placeholder", "Paste links")])
}

fn gateway(dom: &MemoryDom) -> AutomationGateway<MemoryDom> {
    AutomationGateway::new(dom.clone(), &StarbeamConfig::default())
}

async fn find_input(dom: &MemoryDom) -> NodeId {
    let config = StarbeamConfig::default();
    locate(dom, &config.selectors.target_input)
        .await
        .unwrap()
        .into_node()
        .expect("input should exist")
}

#[tokio::test(start_paused = true)]
async fn test_visible_input_is_filled_directly() {
    let (dom, shadow) = notebook();
    let trigger = add_trigger(&dom, shadow);
    let input = add_input(&dom, shadow);

    let result = gateway(&dom).handle(BeamCommand::activate(PAYLOAD)).await;

    assert_eq!(result, AutomationResult::Success);
    assert_eq!(dom.value(input).as_deref(), Some(PAYLOAD));
    assert!(dom.dispatched_to(trigger).is_empty());
    assert_eq!(dom.dispatched_to(input), vec!["input", "change"]);
}

#[tokio::test(start_paused = true)]
async fn test_navigates_menu_then_fills_input() {
    let (dom, shadow) = notebook();
    let trigger = add_trigger(&dom, shadow);
    dom.on(trigger, "click", move |dom, _| {
        let option = add_option(dom, shadow);
        dom.on(option, "click", move |dom, _| {
            add_input(dom, shadow);
        });
    });

    let result = gateway(&dom).handle(BeamCommand::activate(PAYLOAD)).await;
    assert_eq!(result, AutomationResult::Success);

    let input = find_input(&dom).await;
    assert_eq!(dom.value(input).as_deref(), Some(PAYLOAD));
    assert_eq!(dom.dispatched_to(trigger), ACTIVATION_SEQUENCE);

    let option = dom
        .dispatched()
        .iter()
        .map(|e| e.target)
        .find(|t| *t != trigger && *t != input)
        .expect("option was activated");
    assert_eq!(dom.dispatched_to(option), ACTIVATION_SEQUENCE);
    assert_eq!(dom.dispatched_to(input), vec!["input", "change"]);
    assert_eq!(dom.dispatched().len(), 12);
}

#[tokio::test(start_paused = true)]
async fn test_missing_trigger_fails_without_events() {
    let (dom, _shadow) = notebook();

    let result = gateway(&dom).handle(BeamCommand::activate(PAYLOAD)).await;

    assert_eq!(result, AutomationResult::failure("menu trigger not found"));
    assert!(dom.dispatched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_option_fails_after_trigger() {
    let (dom, shadow) = notebook();
    let trigger = add_trigger(&dom, shadow);

    let result = gateway(&dom).handle(BeamCommand::activate(PAYLOAD)).await;

    assert_eq!(result, AutomationResult::failure("option not found"));
    assert_eq!(dom.dispatched_to(trigger), ACTIVATION_SEQUENCE);
}

#[tokio::test(start_paused = true)]
async fn test_option_rendered_during_settle_delay() {
    let (dom, shadow) = notebook();
    let trigger = add_trigger(&dom, shadow);
    dom.on(trigger, "click", move |dom, _| {
        let dom = dom.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            let option = add_option(&dom, shadow);
            dom.on(option, "click", move |dom, _| {
                add_input(dom, shadow);
            });
        });
    });

    let result = gateway(&dom).handle(BeamCommand::activate(PAYLOAD)).await;

    assert_eq!(result, AutomationResult::Success);
    let input = find_input(&dom).await;
    assert_eq!(dom.value(input).as_deref(), Some(PAYLOAD));
}

#[tokio::test(start_paused = true)]
async fn test_slow_input_is_awaited() {
    let (dom, shadow) = notebook();
    let trigger = add_trigger(&dom, shadow);
    dom.on(trigger, "click", move |dom, _| {
        let option = add_option(dom, shadow);
        dom.on(option, "click", move |dom, _| {
            let dom = dom.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(400)).await;
                add_input(&dom, shadow);
            });
        });
    });

    let start = Instant::now();
    let result = gateway(&dom).handle(BeamCommand::activate(PAYLOAD)).await;
    let elapsed = start.elapsed();

    assert_eq!(result, AutomationResult::Success);
    let input = find_input(&dom).await;
    assert_eq!(dom.value(input).as_deref(), Some(PAYLOAD));
    // settle delay + render delay, picked up within one poll
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1000), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_input_that_never_renders_times_out() {
    let (dom, shadow) = notebook();
    let trigger = add_trigger(&dom, shadow);
    dom.on(trigger, "click", move |dom, _| {
        add_option(dom, shadow);
    });

    let start = Instant::now();
    let result = gateway(&dom).handle(BeamCommand::activate(PAYLOAD)).await;

    assert_eq!(
        result,
        AutomationResult::failure("input did not appear after navigation")
    );
    assert!(start.elapsed() >= Duration::from_millis(5500));
}

#[tokio::test(start_paused = true)]
async fn test_non_editable_target_is_a_dispatch_fault() {
    let (dom, shadow) = notebook();
    dom.append_element(shadow, "div", &[("class", "editor")]);

    let mut plan = NavigationPlan::from_config(&StarbeamConfig::default());
    plan.target = SelectorStrategy::try_from(Matcher::css("div.editor")).unwrap();
    let gateway = AutomationGateway::with_plan(dom.clone(), plan);

    let result = gateway.handle(BeamCommand::activate(PAYLOAD)).await;
    match result {
        AutomationResult::Failure { message } => {
            assert!(message.starts_with("dispatch fault"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

/// Re-renders `doomed` away right after the first shadow-root listing.
struct RerenderingDom {
    inner: MemoryDom,
    doomed: Mutex<Option<NodeId>>,
}

#[async_trait]
impl Dom for RerenderingDom {
    type Node = NodeId;

    async fn document(&self) -> Result<NodeId, DomError> {
        self.inner.document().await
    }

    async fn query_selector(
        &self,
        root: &NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, DomError> {
        self.inner.query_selector(root, selector).await
    }

    async fn query_selector_all(
        &self,
        root: &NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>, DomError> {
        self.inner.query_selector_all(root, selector).await
    }

    async fn shadow_roots(&self, root: &NodeId) -> Result<Vec<NodeId>, DomError> {
        let roots = self.inner.shadow_roots(root).await?;
        if let Some(host) = self.doomed.lock().unwrap().take() {
            self.inner.remove(host);
        }
        Ok(roots)
    }

    async fn inner_text(&self, element: &NodeId) -> Result<String, DomError> {
        self.inner.inner_text(element).await
    }

    async fn dispatch(&self, element: &NodeId, event: &SyntheticEvent) -> Result<(), DomError> {
        self.inner.dispatch(element, event).await
    }

    async fn set_value(&self, element: &NodeId, value: &str) -> Result<(), DomError> {
        self.inner.set_value(element, value).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_rerendered_sibling_does_not_hide_visible_input() {
    let dom = MemoryDom::new();
    let stale = dom.append_element(dom.root(), "side-panel", &[]);
    let stale_root = dom.attach_shadow(stale);
    dom.append_element(stale_root, "div", &[]);
    let live = dom.append_element(dom.root(), "side-panel", &[]);
    let live_root = dom.attach_shadow(live);
    let input = add_input(&dom, live_root);

    let rerendering = RerenderingDom {
        inner: dom.clone(),
        doomed: Mutex::new(Some(stale)),
    };
    let gateway = AutomationGateway::new(rerendering, &StarbeamConfig::default());
    let result = gateway.handle(BeamCommand::activate(PAYLOAD)).await;

    assert_eq!(result, AutomationResult::Success);
    assert_eq!(dom.value(input).as_deref(), Some(PAYLOAD));
    assert_eq!(dom.dispatched_to(input), vec!["input", "change"]);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_page_becomes_failure() {
    let (dom, shadow) = notebook();
    let trigger = add_trigger(&dom, shadow);
    dom.on(trigger, "click", |_, _| panic!("menu exploded"));

    let gateway = gateway(&dom);
    let result = gateway.handle(BeamCommand::activate(PAYLOAD)).await;
    assert_eq!(result, AutomationResult::failure("internal fault: menu exploded"));

    // The gateway stays usable afterwards.
    add_input(&dom, shadow);
    let result = gateway.handle(BeamCommand::activate(PAYLOAD)).await;
    assert_eq!(result, AutomationResult::Success);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_commands_run_one_at_a_time() {
    let (dom, shadow) = notebook();
    let input = add_input(&dom, shadow);
    let gateway = gateway(&dom);

    let (first, second) = tokio::join!(
        gateway.handle(BeamCommand::activate("https://first.example")),
        gateway.handle(BeamCommand::activate("https://second.example")),
    );

    assert!(first.is_success() && second.is_success());
    assert_eq!(
        dom.dispatched_to(input),
        vec!["input", "change", "input", "change"]
    );
    assert_eq!(dom.value(input).as_deref(), Some("https://second.example"));
}

#[tokio::test]
async fn test_messages_for_other_listeners_are_ignored() {
    let (dom, _shadow) = notebook();
    let gateway = gateway(&dom);

    assert_eq!(gateway.handle_message(&json!({"action": "PING"})).await, None);
    assert_eq!(gateway.handle_message(&json!({"payload": "x"})).await, None);
}

#[tokio::test]
async fn test_malformed_beam_message_is_answered() {
    let (dom, _shadow) = notebook();
    let gateway = gateway(&dom);

    let result = gateway
        .handle_message(&json!({"action": "ACTIVATE_BEAM"}))
        .await
        .expect("addressed to the engine");
    match result {
        AutomationResult::Failure { message } => assert!(message.starts_with("malformed")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_local_transport_round_trip() {
    let (dom, shadow) = notebook();
    let input = add_input(&dom, shadow);
    let transport = LocalTransport::new(Arc::new(gateway(&dom)));

    let message = json!({"action": "ACTIVATE_BEAM", "payload": PAYLOAD});
    let command: BeamCommand = serde_json::from_value(message).unwrap();
    let result = transport.send(command).await.unwrap();

    assert!(result.is_success());
    assert_eq!(dom.value(input).as_deref(), Some(PAYLOAD));
}
