//! An in-process document with shadow roots and event listeners.
//!
//! `MemoryDom` implements [`Dom`] over an arena of nodes. It is how the engine
//! is exercised without a browser, and how page behaviour (menus that open on
//! click, inputs that render late) is scripted in tests.

mod selector;

use crate::dom::{Dom, DomError};
use crate::events::SyntheticEvent;
use async_trait::async_trait;
use selector::SelectorList;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An event as observed by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub target: NodeId,
    /// Node whose listener is running. Equal to `target` in the dispatch log.
    pub current_target: NodeId,
    pub event: SyntheticEvent,
}

impl DispatchedEvent {
    pub fn event_type(&self) -> &str {
        &self.event.event_type
    }
}

pub type Listener = Arc<dyn Fn(&MemoryDom, &DispatchedEvent) + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub(crate) tag: String,
    attrs: Vec<(String, String)>,
    value: String,
    shadow_root: Option<NodeId>,
}

impl ElementData {
    pub(crate) fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn is_hidden(&self) -> bool {
        self.attr("hidden").is_some()
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    ShadowRoot { host: NodeId },
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

pub(crate) struct Tree {
    nodes: Vec<NodeData>,
    listeners: HashMap<(NodeId, String), Vec<Listener>>,
    log: Vec<DispatchedEvent>,
}

impl Tree {
    fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            listeners: HashMap::new(),
            log: Vec::new(),
        }
    }

    fn create(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent,
            children: Vec::new(),
            kind,
        });
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p.0)) {
            parent.children.push(id);
        }
        id
    }

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Parent element in the same tree; `None` at a document or shadow root.
    pub(crate) fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id)?.parent?;
        self.element(parent).map(|_| parent)
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = id;
        loop {
            let Some(node) = self.node(cursor) else {
                return false;
            };
            match (&node.kind, node.parent) {
                (NodeKind::Document, _) => return true,
                (NodeKind::ShadowRoot { host }, _) => cursor = *host,
                (_, Some(parent)) => cursor = parent,
                (_, None) => return false,
            }
        }
    }

    fn ensure_connected(&self, id: NodeId) -> Result<(), DomError> {
        if self.is_connected(id) {
            Ok(())
        } else {
            Err(DomError::Detached)
        }
    }

    /// Light-tree descendants of `root` in document order, `root` excluded.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .node(root)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.node(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn text_of(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(element) if element.is_hidden() => {}
            _ => {
                for child in &node.children {
                    self.text_of(*child, out);
                }
            }
        }
    }

    /// Nodes an event visits, target first.
    fn event_path(&self, target: NodeId, event: &SyntheticEvent) -> Vec<NodeId> {
        let mut path = vec![target];
        if !event.bubbles {
            return path;
        }
        let mut cursor = target;
        loop {
            let Some(node) = self.node(cursor) else {
                break;
            };
            let next = match (&node.kind, node.parent) {
                (NodeKind::ShadowRoot { host }, _) if event.composed => *host,
                (NodeKind::ShadowRoot { .. }, _) => break,
                (_, Some(parent)) => parent,
                (_, None) => break,
            };
            path.push(next);
            cursor = next;
        }
        path
    }
}

/// Shared handle to an in-memory document. Clones observe the same tree.
#[derive(Clone)]
pub struct MemoryDom {
    tree: Arc<Mutex<Tree>>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.lock();
        f.debug_struct("MemoryDom")
            .field("nodes", &tree.nodes.len())
            .field("dispatched", &tree.log.len())
            .finish()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        Self {
            tree: Arc::new(Mutex::new(Tree::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        // A panicking listener must not wedge the document.
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn append_element(&self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let element = ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            value: String::new(),
            shadow_root: None,
        };
        self.lock().create(Some(parent), NodeKind::Element(element))
    }

    pub fn append_text(&self, parent: NodeId, text: &str) -> NodeId {
        self.lock()
            .create(Some(parent), NodeKind::Text(text.to_string()))
    }

    /// Attach an open shadow root to `host`, or return the existing one.
    pub fn attach_shadow(&self, host: NodeId) -> NodeId {
        let mut tree = self.lock();
        if let Some(existing) = tree.element(host).and_then(|e| e.shadow_root) {
            return existing;
        }
        let root = tree.create(None, NodeKind::ShadowRoot { host });
        if let Some(element) = tree.element_mut(host) {
            element.shadow_root = Some(root);
        }
        root
    }

    /// Detach `node` from its parent. Handles to it and its subtree go stale.
    pub fn remove(&self, node: NodeId) {
        let mut tree = self.lock();
        let Some(parent) = tree.node(node).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent) = tree.nodes.get_mut(parent.0) {
            parent.children.retain(|c| *c != node);
        }
        if let Some(node) = tree.nodes.get_mut(node.0) {
            node.parent = None;
        }
    }

    pub fn set_attribute(&self, node: NodeId, key: &str, value: &str) {
        let mut tree = self.lock();
        if let Some(element) = tree.element_mut(node) {
            let key = key.to_ascii_lowercase();
            match element.attrs.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value.to_string(),
                None => element.attrs.push((key, value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&self, node: NodeId, key: &str) {
        let mut tree = self.lock();
        if let Some(element) = tree.element_mut(node) {
            element.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        }
    }

    /// Current `value` of a form control.
    pub fn value(&self, node: NodeId) -> Option<String> {
        self.lock().element(node).map(|e| e.value.clone())
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.lock().is_connected(node)
    }

    /// Register a listener for `event_type` on `node`. Listeners run after
    /// the document lock is released and may mutate the document.
    pub fn on<F>(&self, node: NodeId, event_type: &str, listener: F)
    where
        F: Fn(&MemoryDom, &DispatchedEvent) + Send + Sync + 'static,
    {
        self.lock()
            .listeners
            .entry((node, event_type.to_string()))
            .or_default()
            .push(Arc::new(listener));
    }

    /// Every event dispatched so far, in order.
    pub fn dispatched(&self) -> Vec<DispatchedEvent> {
        self.lock().log.clone()
    }

    /// Types of the events dispatched at `node`, in order.
    pub fn dispatched_to(&self, node: NodeId) -> Vec<String> {
        self.lock()
            .log
            .iter()
            .filter(|e| e.target == node)
            .map(|e| e.event.event_type.clone())
            .collect()
    }

    pub fn clear_dispatched(&self) {
        self.lock().log.clear();
    }
}

#[async_trait]
impl Dom for MemoryDom {
    type Node = NodeId;

    async fn document(&self) -> Result<NodeId, DomError> {
        Ok(self.root())
    }

    async fn query_selector(
        &self,
        root: &NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, DomError> {
        Ok(self
            .query_selector_all(root, selector)
            .await?
            .into_iter()
            .next())
    }

    async fn query_selector_all(
        &self,
        root: &NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>, DomError> {
        let list = SelectorList::parse(selector)?;
        let tree = self.lock();
        tree.ensure_connected(*root)?;
        Ok(tree
            .descendants(*root)
            .into_iter()
            .filter(|id| list.matches(&tree, *id))
            .collect())
    }

    async fn shadow_roots(&self, root: &NodeId) -> Result<Vec<NodeId>, DomError> {
        let tree = self.lock();
        tree.ensure_connected(*root)?;
        Ok(tree
            .descendants(*root)
            .into_iter()
            .filter_map(|id| tree.element(id).and_then(|e| e.shadow_root))
            .collect())
    }

    async fn inner_text(&self, element: &NodeId) -> Result<String, DomError> {
        let tree = self.lock();
        tree.ensure_connected(*element)?;
        let mut raw = String::new();
        tree.text_of(*element, &mut raw);
        Ok(raw.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    async fn dispatch(&self, element: &NodeId, event: &SyntheticEvent) -> Result<(), DomError> {
        let invocations: Vec<(Listener, DispatchedEvent)> = {
            let mut tree = self.lock();
            tree.ensure_connected(*element)?;
            let record = DispatchedEvent {
                target: *element,
                current_target: *element,
                event: event.clone(),
            };
            tree.log.push(record);

            let path = tree.event_path(*element, event);
            let mut invocations = Vec::new();
            for node in path {
                let key = (node, event.event_type.clone());
                for listener in tree.listeners.get(&key).into_iter().flatten() {
                    invocations.push((
                        Arc::clone(listener),
                        DispatchedEvent {
                            target: *element,
                            current_target: node,
                            event: event.clone(),
                        },
                    ));
                }
            }
            invocations
        };

        for (listener, dispatched) in invocations {
            listener(self, &dispatched);
        }
        Ok(())
    }

    async fn set_value(&self, element: &NodeId, value: &str) -> Result<(), DomError> {
        let mut tree = self.lock();
        tree.ensure_connected(*element)?;
        let Some(data) = tree.element_mut(*element) else {
            return Err(DomError::NotEditable {
                tag: "#text".to_string(),
            });
        };
        if data.tag != "input" && data.tag != "textarea" {
            return Err(DomError::NotEditable {
                tag: data.tag.clone(),
            });
        }
        data.value = value.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page() -> (MemoryDom, NodeId, NodeId) {
        let dom = MemoryDom::new();
        let body = dom.append_element(dom.root(), "body", &[]);
        let host = dom.append_element(body, "notebook-panel", &[("class", "panel")]);
        let shadow = dom.attach_shadow(host);
        (dom, host, shadow)
    }

    #[tokio::test]
    async fn test_query_does_not_enter_shadow_roots() {
        let (dom, _host, shadow) = page();
        dom.append_element(shadow, "textarea", &[]);

        let root = dom.root();
        assert_eq!(dom.query_selector(&root, "textarea").await.unwrap(), None);
        assert_eq!(dom.query_selector_all(&shadow, "textarea").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_descendant_combinator_stops_at_shadow_boundary() {
        let (dom, _host, shadow) = page();
        dom.append_element(shadow, "textarea", &[]);
        let hits = dom
            .query_selector_all(&shadow, "notebook-panel textarea")
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_attribute_operators() {
        let dom = MemoryDom::new();
        let form = dom.append_element(dom.root(), "form", &[("class", "row dense")]);
        let area = dom.append_element(
            form,
            "textarea",
            &[("placeholder", "Paste link here"), ("lang", "en-US")],
        );
        let root = dom.root();
        for selector in [
            r#"textarea[placeholder*="Paste link"]"#,
            r#"textarea[placeholder^="Paste"]"#,
            r#"[placeholder$="here"]"#,
            r#"[placeholder~="link"]"#,
            r#"[lang|="en"]"#,
            "form.row > textarea",
            ".dense textarea",
        ] {
            assert_eq!(
                dom.query_selector(&root, selector).await.unwrap(),
                Some(area),
                "{selector}"
            );
        }
        assert_eq!(
            dom.query_selector(&root, r#"[placeholder="Paste link"]"#)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_shadow_roots_in_host_order() {
        let dom = MemoryDom::new();
        let a = dom.append_element(dom.root(), "div", &[]);
        let b = dom.append_element(dom.root(), "div", &[]);
        let sb = dom.attach_shadow(b);
        let sa = dom.attach_shadow(a);
        let inner = dom.append_element(sa, "div", &[]);
        dom.attach_shadow(inner);

        let root = dom.root();
        assert_eq!(dom.shadow_roots(&root).await.unwrap(), vec![sa, sb]);
    }

    #[tokio::test]
    async fn test_inner_text_skips_hidden_and_collapses_space() {
        let dom = MemoryDom::new();
        let button = dom.append_element(dom.root(), "button", &[]);
        let icon = dom.append_element(button, "span", &[("hidden", "")]);
        dom.append_text(icon, "add_circle");
        dom.append_text(button, "\n   Add   source \n");
        assert_eq!(dom.inner_text(&button).await.unwrap(), "Add source");
    }

    #[tokio::test]
    async fn test_removed_nodes_are_detached() {
        let (dom, host, shadow) = page();
        let area = dom.append_element(shadow, "textarea", &[]);
        dom.remove(host);

        assert!(!dom.is_connected(area));
        assert_eq!(dom.set_value(&area, "x").await, Err(DomError::Detached));
        assert_eq!(
            dom.dispatch(&area, &SyntheticEvent::pointer("click")).await,
            Err(DomError::Detached)
        );
    }

    #[tokio::test]
    async fn test_set_value_only_on_text_controls() {
        let dom = MemoryDom::new();
        let div = dom.append_element(dom.root(), "div", &[]);
        let input = dom.append_element(dom.root(), "input", &[]);

        assert_eq!(
            dom.set_value(&div, "x").await,
            Err(DomError::NotEditable { tag: "div".into() })
        );
        dom.set_value(&input, "https://a.example").await.unwrap();
        assert_eq!(dom.value(input).as_deref(), Some("https://a.example"));
    }

    #[tokio::test]
    async fn test_composed_events_reach_the_host() {
        let (dom, host, shadow) = page();
        let button = dom.append_element(shadow, "button", &[]);
        let hits = Arc::new(AtomicUsize::new(0));
        for event_type in ["click", "change"] {
            let hits = hits.clone();
            dom.on(host, event_type, move |_, e| {
                assert_eq!(e.current_target, host);
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        dom.dispatch(&button, &SyntheticEvent::pointer("click"))
            .await
            .unwrap();
        // form events are not composed
        dom.dispatch(&button, &SyntheticEvent::form("change"))
            .await
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(dom.dispatched_to(button), vec!["click", "change"]);
    }

    #[tokio::test]
    async fn test_listener_may_mutate_document() {
        let dom = MemoryDom::new();
        let button = dom.append_element(dom.root(), "button", &[]);
        dom.on(button, "click", |dom, _| {
            dom.append_element(dom.root(), "textarea", &[]);
        });

        dom.dispatch(&button, &SyntheticEvent::pointer("click"))
            .await
            .unwrap();
        let root = dom.root();
        assert!(dom.query_selector(&root, "textarea").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_selector_is_reported() {
        let dom = MemoryDom::new();
        let root = dom.root();
        assert!(matches!(
            dom.query_selector(&root, "div[").await,
            Err(DomError::InvalidSelector(_))
        ));
    }
}
