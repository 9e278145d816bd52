//! Synthetic input sequences.
//!
//! Rich UI frameworks often listen to low-level pointer events and ignore
//! events that stop at a shadow boundary, so a lone `click()` is not enough.
//! Events are dispatched one by one, in order, each awaited before the next.

use crate::dom::{Dom, DomError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Event sequence produced by a real pointer press on an element.
pub const ACTIVATION_SEQUENCE: [&str; 5] =
    ["pointerdown", "mousedown", "pointerup", "mouseup", "click"];

/// Event sequence produced by keyboard entry into a text control.
pub const COMMIT_SEQUENCE: [&str; 2] = ["input", "change"];

/// DOM constructor used to build an event inside the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventInterface {
    #[serde(rename = "PointerEvent")]
    Pointer,
    #[serde(rename = "MouseEvent")]
    Mouse,
    #[serde(rename = "Event")]
    Basic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub interface: EventInterface,
    pub bubbles: bool,
    pub cancelable: bool,
    pub composed: bool,
}

impl SyntheticEvent {
    /// Bubbling, cancelable, composed pointer/mouse event.
    pub fn pointer(event_type: &str) -> Self {
        let interface = if event_type.starts_with("pointer") {
            EventInterface::Pointer
        } else {
            EventInterface::Mouse
        };
        Self {
            event_type: event_type.to_string(),
            interface,
            bubbles: true,
            cancelable: true,
            composed: true,
        }
    }

    /// Plain bubbling event, as fired by form controls.
    pub fn form(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            interface: EventInterface::Basic,
            bubbles: true,
            cancelable: false,
            composed: false,
        }
    }
}

/// Dispatch `pointerdown, mousedown, pointerup, mouseup, click` at `element`.
pub async fn simulate_activation<D: Dom + ?Sized>(
    dom: &D,
    element: &D::Node,
) -> Result<(), DomError> {
    debug!("Simulating activation on {:?}", element);
    for event_type in ACTIVATION_SEQUENCE {
        dom.dispatch(element, &SyntheticEvent::pointer(event_type)).await?;
    }
    Ok(())
}

/// Set the control's value, then fire `input` followed by `change`.
pub async fn commit_value<D: Dom + ?Sized>(
    dom: &D,
    element: &D::Node,
    text: &str,
) -> Result<(), DomError> {
    debug!("Committing {} bytes into {:?}", text.len(), element);
    dom.set_value(element, text).await?;
    for event_type in COMMIT_SEQUENCE {
        dom.dispatch(element, &SyntheticEvent::form(event_type)).await?;
    }
    Ok(())
}
