//! [`Dom`] over the DevTools protocol.
//!
//! Nodes are `Runtime` remote objects. Every operation is a
//! `Runtime.callFunctionOn` against the node, so a handle that outlived a
//! re-render fails with `Detached` instead of acting on a stale element.

use crate::eval::{
    DETACHED_MARKER, NOT_EDITABLE_MARKER, exception_error, retry_on_context_error, with_timeout,
};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::js_protocol::runtime::{
    CallArgument, CallFunctionOnParams, EvaluateParams, GetPropertiesParams,
    ReleaseObjectGroupParams, RemoteObject, RemoteObjectId,
};
use serde_json::{Value, json};
use starbeam_engine::dom::{Dom, DomError};
use starbeam_engine::events::SyntheticEvent;
use std::time::Duration;

/// Remote objects created by the engine are grouped so they can be released
/// in one call once a beam finishes.
const OBJECT_GROUP: &str = "starbeam";

fn guarded(body: &str) -> String {
    format!(
        "function(arg) {{ if (!this.isConnected) throw new Error('{}'); {} }}",
        DETACHED_MARKER, body
    )
}

fn query_one_fn() -> String {
    guarded("return this.querySelector(arg);")
}

fn query_all_fn() -> String {
    guarded("return Array.from(this.querySelectorAll(arg));")
}

fn shadow_roots_fn() -> String {
    guarded(
        "const out = []; \
         for (const el of this.querySelectorAll('*')) { \
           if (el.shadowRoot) out.push(el.shadowRoot); \
         } \
         return out;",
    )
}

fn inner_text_fn() -> String {
    guarded("return String(this.innerText ?? this.textContent ?? '');")
}

fn dispatch_fn() -> String {
    guarded(
        "const Ctor = typeof window[arg.interface] === 'function' ? window[arg.interface] : Event; \
         const init = { bubbles: arg.bubbles, cancelable: arg.cancelable, composed: arg.composed, \
                        view: window, pointerId: 1, isPrimary: true, button: 0 }; \
         this.dispatchEvent(new Ctor(arg.type, init)); \
         return true;",
    )
}

// The native setter is used so framework value trackers register the change.
fn set_value_fn() -> String {
    guarded(&format!(
        "const tag = this.tagName ? this.tagName.toLowerCase() : '#node'; \
         if (tag !== 'input' && tag !== 'textarea') throw new Error('{}' + tag); \
         const proto = tag === 'input' \
           ? HTMLInputElement.prototype \
           : HTMLTextAreaElement.prototype; \
         Object.getOwnPropertyDescriptor(proto, 'value').set.call(this, arg); \
         return true;",
        NOT_EDITABLE_MARKER
    ))
}

#[derive(Clone)]
pub struct CdpDom {
    page: Page,
    eval_timeout: Duration,
}

impl CdpDom {
    pub fn new(page: Page, eval_timeout: Duration) -> Self {
        Self { page, eval_timeout }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Release every remote object handed out so far.
    pub async fn release(&self) -> Result<(), DomError> {
        with_timeout(
            self.eval_timeout,
            self.page.execute(ReleaseObjectGroupParams::new(OBJECT_GROUP)),
        )
        .await?;
        Ok(())
    }

    async fn call(
        &self,
        target: &RemoteObjectId,
        function: String,
        arg: Value,
        by_value: bool,
    ) -> Result<RemoteObject, DomError> {
        let params = CallFunctionOnParams::builder()
            .function_declaration(function)
            .object_id(target.clone())
            .argument(CallArgument::builder().value(arg).build())
            .object_group(OBJECT_GROUP)
            .return_by_value(by_value)
            .build()
            .map_err(DomError::Protocol)?;

        let returns = with_timeout(self.eval_timeout, self.page.execute(params))
            .await?
            .result;
        if let Some(details) = &returns.exception_details {
            return Err(exception_error(details));
        }
        Ok(returns.result)
    }

    /// Elements of a page-side array, in index order.
    async fn array_items(&self, array: RemoteObject) -> Result<Vec<RemoteObjectId>, DomError> {
        let Some(array_id) = array.object_id else {
            return Ok(Vec::new());
        };
        let params = GetPropertiesParams::builder()
            .object_id(array_id)
            .own_properties(true)
            .build()
            .map_err(DomError::Protocol)?;
        let returns = with_timeout(self.eval_timeout, self.page.execute(params))
            .await?
            .result;

        let mut items: Vec<(usize, RemoteObjectId)> = returns
            .result
            .into_iter()
            .filter_map(|prop| {
                let index = prop.name.parse::<usize>().ok()?;
                let id = prop.value?.object_id?;
                Some((index, id))
            })
            .collect();
        items.sort_by_key(|(index, _)| *index);
        Ok(items.into_iter().map(|(_, id)| id).collect())
    }
}

#[async_trait]
impl Dom for CdpDom {
    type Node = RemoteObjectId;

    async fn document(&self) -> Result<RemoteObjectId, DomError> {
        let this = self;
        retry_on_context_error("Document lookup", move || async move {
            let params = EvaluateParams::builder()
                .expression("document")
                .object_group(OBJECT_GROUP)
                .build()
                .map_err(DomError::Protocol)?;
            let returns = with_timeout(this.eval_timeout, this.page.execute(params))
                .await?
                .result;
            if let Some(details) = &returns.exception_details {
                return Err(exception_error(details));
            }
            returns
                .result
                .object_id
                .ok_or_else(|| DomError::Script("document has no object id".to_string()))
        })
        .await
    }

    async fn query_selector(
        &self,
        root: &RemoteObjectId,
        selector: &str,
    ) -> Result<Option<RemoteObjectId>, DomError> {
        // A null result carries no object id.
        let object = self.call(root, query_one_fn(), json!(selector), false).await?;
        Ok(object.object_id)
    }

    async fn query_selector_all(
        &self,
        root: &RemoteObjectId,
        selector: &str,
    ) -> Result<Vec<RemoteObjectId>, DomError> {
        let array = self.call(root, query_all_fn(), json!(selector), false).await?;
        self.array_items(array).await
    }

    async fn shadow_roots(&self, root: &RemoteObjectId) -> Result<Vec<RemoteObjectId>, DomError> {
        let array = self.call(root, shadow_roots_fn(), Value::Null, false).await?;
        self.array_items(array).await
    }

    async fn inner_text(&self, element: &RemoteObjectId) -> Result<String, DomError> {
        let object = self.call(element, inner_text_fn(), Value::Null, true).await?;
        Ok(object
            .value
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn dispatch(
        &self,
        element: &RemoteObjectId,
        event: &SyntheticEvent,
    ) -> Result<(), DomError> {
        let init = serde_json::to_value(event).map_err(|e| DomError::Protocol(e.to_string()))?;
        self.call(element, dispatch_fn(), init, true).await?;
        Ok(())
    }

    async fn set_value(&self, element: &RemoteObjectId, value: &str) -> Result<(), DomError> {
        self.call(element, set_value_fn(), json!(value), true).await?;
        Ok(())
    }
}
