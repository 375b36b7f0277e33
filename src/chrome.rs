//! `chrome.*` extension APIs: the real `TabHost` and the page-side message listener.

use std::rc::Rc;

use async_trait::async_trait;
use gloo_timers::future::TimeoutFuture;
use js_sys::{Array, Function, Object, Promise, Reflect};
use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use crate::engine::Engine;
use crate::error::RelayError;
use crate::page::Page;
use crate::protocol::{from_js, to_js, Request, Response};
use crate::tabs::{TabHost, TabId};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = query, catch)]
    fn tabs_query(query_info: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = get, catch)]
    fn tabs_get(tab_id: i32) -> Result<Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = create, catch)]
    fn tabs_create(create_properties: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs"], js_name = sendMessage, catch)]
    fn tabs_send_message(tab_id: i32, message: &JsValue) -> Result<Promise, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onRemoved"], js_name = addListener)]
    fn add_tab_removed_listener(callback: &Function);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    fn add_runtime_message_listener(callback: &Function);
}

fn js_message(value: &JsValue) -> String {
    Reflect::get(value, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{:?}", value))
}

fn tab_id_of(tab: &JsValue) -> Option<TabId> {
    Reflect::get(tab, &JsValue::from_str("id")).ok()?.as_f64().map(|id| id as TabId)
}

fn object(entries: &[(&str, JsValue)]) -> Result<JsValue, RelayError> {
    let object = Object::new();
    for (key, value) in entries {
        Reflect::set(&object, &JsValue::from_str(key), value).map_err(|e| RelayError::TabFailed(js_message(&e)))?;
    }
    Ok(object.into())
}

async fn settle(promise: Result<Promise, JsValue>) -> Result<JsValue, JsValue> {
    JsFuture::from(promise?).await
}

/// `TabHost` backed by `chrome.tabs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeTabs;

#[async_trait(?Send)]
impl TabHost for ChromeTabs {
    async fn tab_exists(&self, tab_id: TabId) -> bool {
        settle(tabs_get(tab_id)).await.is_ok()
    }

    async fn find_tab(&self, url_pattern: &str) -> Result<Option<TabId>, RelayError> {
        let query = object(&[("url", JsValue::from_str(url_pattern))])?;
        let tabs = settle(tabs_query(&query))
            .await
            .map_err(|e| RelayError::TabFailed(js_message(&e)))?;
        let tabs: Array = tabs.dyn_into().map_err(|_| RelayError::TabFailed("tabs.query did not return an array".to_string()))?;
        Ok(tabs.iter().find_map(|tab| tab_id_of(&tab)))
    }

    async fn open_tab(&self, url: &str) -> Result<TabId, RelayError> {
        let properties = object(&[("url", JsValue::from_str(url)), ("active", JsValue::FALSE)])?;
        let tab = settle(tabs_create(&properties))
            .await
            .map_err(|e| RelayError::TabFailed(js_message(&e)))?;
        tab_id_of(&tab).ok_or_else(|| RelayError::TabFailed("created tab has no id".to_string()))
    }

    async fn wait_settled(&self, _tab_id: TabId, delay_ms: u32) {
        if delay_ms > 0 {
            TimeoutFuture::new(delay_ms).await;
        }
    }

    async fn send_message(&self, tab_id: TabId, request: &Request) -> Result<Response, RelayError> {
        let message = to_js(request)?;
        let reply = settle(tabs_send_message(tab_id, &message))
            .await
            .map_err(|e| RelayError::ChannelUnavailable(js_message(&e)))?;
        from_js(&reply)
    }
}

/// Subscribes `on_closed` to `chrome.tabs.onRemoved` for the lifetime of the extension.
pub fn listen_tab_removed(on_closed: impl Fn(TabId) + 'static) {
    let callback = Closure::<dyn FnMut(i32, JsValue)>::new(move |tab_id: i32, _info: JsValue| on_closed(tab_id));
    add_tab_removed_listener(callback.as_ref().unchecked_ref());
    callback.forget();
}

/// Answers relay requests arriving through `chrome.runtime.onMessage` with
/// `engine`. The listener returns `true` so the channel stays open while
/// the engine works, then replies through `sendResponse`.
pub fn listen_runtime_messages<P: Page + 'static>(engine: Rc<Engine<P>>) {
    let callback = Closure::<dyn FnMut(JsValue, JsValue, Function) -> bool>::new(
        move |message: JsValue, _sender: JsValue, send_response: Function| {
            let request: Request = match from_js(&message) {
                Ok(request) => request,
                Err(e) => {
                    debug!(error = %e, "ignoring message that is not a relay request");
                    return false;
                }
            };
            let engine = engine.clone();
            spawn_local(async move {
                let response = engine.handle(request).await;
                match to_js(&response) {
                    Ok(value) => {
                        if let Err(e) = send_response.call1(&JsValue::NULL, &value) {
                            warn!(error = %js_message(&e), "sendResponse failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "could not encode response"),
                }
            });
            true
        },
    );
    add_runtime_message_listener(callback.as_ref().unchecked_ref());
    callback.forget();
}
