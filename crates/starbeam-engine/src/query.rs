//! DeepQuery and strategy evaluation.
//!
//! Resolution order for one matcher at one root:
//! 1. an ordinary subtree query of `root` (a shallow hit always wins);
//! 2. otherwise each shadow root hosted under `root`, depth-first, in
//!    document order of the hosts.
//!
//! Shadow roots are only ever entered from their host's scope, so no tree is
//! visited twice and traversal terminates on any finite document.

use crate::dom::{Dom, DomError};
use async_recursion::async_recursion;
use starbeam_common::strategy::{Matcher, SelectorStrategy};
use tracing::debug;

/// Result of resolving a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomLocation<N> {
    /// `matcher` is the index of the matcher that produced the hit.
    Found { node: N, matcher: usize },
    NotFound,
}

impl<N> DomLocation<N> {
    pub fn into_node(self) -> Option<N> {
        match self {
            DomLocation::Found { node, .. } => Some(node),
            DomLocation::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, DomLocation::Found { .. })
    }
}

/// Match `matcher` against the light tree of `root` only.
async fn query_scope<D: Dom + ?Sized>(
    dom: &D,
    matcher: &Matcher,
    root: &D::Node,
) -> Result<Option<D::Node>, DomError> {
    if !matcher.needs_text() {
        return dom.query_selector(root, matcher.selector()).await;
    }

    for candidate in dom.query_selector_all(root, matcher.selector()).await? {
        let rendered = match dom.inner_text(&candidate).await {
            Ok(text) => text,
            // Candidate vanished between the query and the read.
            Err(e) if e.is_transient() => continue,
            Err(e) => return Err(e),
        };
        if matcher.accepts_text(&rendered) {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Resolve a single matcher, piercing shadow roots.
#[async_recursion]
pub async fn deep_query<D: Dom + ?Sized>(
    dom: &D,
    matcher: &Matcher,
    root: &D::Node,
) -> Result<Option<D::Node>, DomError> {
    if let Some(found) = query_scope(dom, matcher, root).await? {
        return Ok(Some(found));
    }

    for shadow in dom.shadow_roots(root).await? {
        match deep_query(dom, matcher, &shadow).await {
            Ok(Some(found)) => return Ok(Some(found)),
            Ok(None) => {}
            // Host re-rendered away after listing; its siblings are still live.
            Err(e) if e.is_transient() => {
                debug!("Skipping detached shadow subtree: {}", e);
                continue;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Evaluate matchers in priority order and return the first non-empty result.
pub async fn resolve<D: Dom + ?Sized>(
    dom: &D,
    strategy: &SelectorStrategy,
    root: &D::Node,
) -> Result<DomLocation<D::Node>, DomError> {
    for (index, matcher) in strategy.matchers().iter().enumerate() {
        if let Some(node) = deep_query(dom, matcher, root).await? {
            debug!("Matched {} (matcher #{})", matcher, index);
            return Ok(DomLocation::Found {
                node,
                matcher: index,
            });
        }
    }
    Ok(DomLocation::NotFound)
}

/// [`resolve`] against the document root.
pub async fn locate<D: Dom + ?Sized>(
    dom: &D,
    strategy: &SelectorStrategy,
) -> Result<DomLocation<D::Node>, DomError> {
    let document = dom.document().await?;
    resolve(dom, strategy, &document).await
}
