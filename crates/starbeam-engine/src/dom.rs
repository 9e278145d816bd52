use crate::events::SyntheticEvent;
use async_trait::async_trait;
pub use starbeam_common::error::DomError;
use std::fmt::Debug;

/// The Dom trait is the only way the engine reads or mutates the target page.
///
/// Handles returned by a `Dom` are valid only until the next suspension point:
/// the page keeps re-rendering underneath us, so callers re-resolve by selector
/// instead of holding on to nodes across waits.
#[async_trait]
pub trait Dom: Send + Sync {
    /// Opaque element / shadow-root handle.
    type Node: Clone + Debug + Send + Sync;

    /// The document root.
    async fn document(&self) -> Result<Self::Node, DomError>;

    /// First light-tree descendant of `root` matching `selector`, in document order.
    async fn query_selector(
        &self,
        root: &Self::Node,
        selector: &str,
    ) -> Result<Option<Self::Node>, DomError>;

    /// All light-tree descendants of `root` matching `selector`, in document order.
    async fn query_selector_all(
        &self,
        root: &Self::Node,
        selector: &str,
    ) -> Result<Vec<Self::Node>, DomError>;

    /// Open shadow roots hosted by descendants of `root`, in document order of
    /// their hosts. Nested shadow roots are not included.
    async fn shadow_roots(&self, root: &Self::Node) -> Result<Vec<Self::Node>, DomError>;

    /// Live rendered text of an element.
    async fn inner_text(&self, element: &Self::Node) -> Result<String, DomError>;

    /// Dispatch one constructed event at `element`.
    async fn dispatch(&self, element: &Self::Node, event: &SyntheticEvent)
    -> Result<(), DomError>;

    /// Assign the control's `value` property.
    async fn set_value(&self, element: &Self::Node, value: &str) -> Result<(), DomError>;
}
