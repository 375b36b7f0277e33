use std::rc::Rc;

use js_sys::Promise;
use tracing::info;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::chrome::ChromeTabs;
use crate::config::RelayConfig;
use crate::dispatcher::Dispatcher;
use crate::engine::Engine;
use crate::page::DomPage;
use crate::platform::{PlatformDescriptor, PlatformRegistry};
use crate::protocol::{from_js, to_js, CommandMode, Request};

pub mod chrome;
pub mod chunk;
pub mod config;
pub mod dispatcher;
pub mod dom_utils;
pub mod engine;
pub mod error;
pub mod inject;
pub mod locator;
pub mod logging;
pub mod page;
pub mod platform;
pub mod protocol;
pub mod reply;
pub mod tabs;
pub mod trigger;
pub mod wait;
pub mod watcher;

// Expose the page-resident engine to the content script
#[wasm_bindgen]
pub struct PageEngine {
    engine: Rc<Engine<DomPage>>,
}

#[wasm_bindgen]
impl PageEngine {
    /// `config_json` is an optional `RelayConfig` object; `platform_key`
    /// pins the platform instead of detecting it from the page URL.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>, platform_key: Option<String>) -> Result<PageEngine, JsValue> {
        let config = RelayConfig::from_optional_json(config_json)?;
        let mut engine = Engine::new(DomPage, PlatformRegistry::with_defaults(), config);
        if let Some(key) = platform_key {
            engine = engine.pinned(key);
        }
        Ok(PageEngine { engine: Rc::new(engine) })
    }

    /// Key of the platform this page belongs to, if recognized.
    #[wasm_bindgen(getter)]
    pub fn platform(&self) -> Option<String> {
        self.engine.descriptor().map(|d| d.key)
    }

    /// Starts answering relay requests sent to this tab.
    pub fn listen(&self) {
        chrome::listen_runtime_messages(self.engine.clone());
        info!(platform = ?self.platform(), "page engine listening");
    }

    /// Handles one request object directly, without the message channel.
    pub fn handle(&self, message: JsValue) -> Promise {
        let engine = self.engine.clone();
        future_to_promise(async move {
            let request: Request = from_js(&message)?;
            let response = engine.handle(request).await;
            Ok(to_js(&response)?)
        })
    }
}

// Expose the background relay to the extension's service worker
#[wasm_bindgen]
pub struct Relay {
    dispatcher: Rc<Dispatcher<ChromeTabs>>,
}

#[wasm_bindgen]
impl Relay {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<Relay, JsValue> {
        let config = RelayConfig::from_optional_json(config_json)?;
        let dispatcher = Rc::new(Dispatcher::new(ChromeTabs, PlatformRegistry::with_defaults(), config));
        let on_closed = dispatcher.clone();
        chrome::listen_tab_removed(move |tab_id| on_closed.tab_closed(tab_id));
        info!(platforms = ?dispatcher.platform_keys(), "relay ready");
        Ok(Relay { dispatcher })
    }

    pub fn platforms(&self) -> Vec<String> {
        self.dispatcher.platform_keys()
    }

    /// Resolves to the tab id serving `key`, opening one if needed.
    #[wasm_bindgen(js_name = openPlatform)]
    pub fn open_platform(&self, key: String) -> Promise {
        let dispatcher = self.dispatcher.clone();
        future_to_promise(async move {
            let tab_id = dispatcher.open_platform(&key).await?;
            Ok(JsValue::from(tab_id))
        })
    }

    /// `mode` is `"input"`/`"inputOnly"` or `"send"`/`"inputAndSend"`.
    #[wasm_bindgen(js_name = sendToPlatform)]
    pub fn send_to_platform(&self, key: String, text: String, mode: String) -> Promise {
        let dispatcher = self.dispatcher.clone();
        future_to_promise(async move {
            let mode = CommandMode::parse(&mode).ok_or_else(|| JsValue::from_str(&format!("Unknown mode '{}'", mode)))?;
            let result = dispatcher.send_to_platform(&key, &text, mode).await;
            Ok(to_js(&result)?)
        })
    }

    pub fn broadcast(&self, text: String) -> Promise {
        let dispatcher = self.dispatcher.clone();
        future_to_promise(async move {
            let results = dispatcher.broadcast(&text).await;
            Ok(to_js(&results)?)
        })
    }

    #[wasm_bindgen(js_name = getStatus)]
    pub fn get_status(&self) -> Promise {
        let dispatcher = self.dispatcher.clone();
        future_to_promise(async move {
            let status = dispatcher.status().await;
            Ok(to_js(&status)?)
        })
    }

    /// Applies a JSON array of descriptors and forwards it to open tabs.
    /// Resolves to the list of changed platform keys.
    #[wasm_bindgen(js_name = updateDescriptors)]
    pub fn update_descriptors(&self, json: String) -> Promise {
        let dispatcher = self.dispatcher.clone();
        future_to_promise(async move {
            let descriptors: Vec<PlatformDescriptor> =
                serde_json::from_str(&json).map_err(|e| JsValue::from(error::ConfigError::from(e)))?;
            let changed = dispatcher.update_descriptors(descriptors).await?;
            Ok(to_js(&changed)?)
        })
    }
}

// Initialize WASM module and log to console
#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    #[cfg(debug_assertions)]
    console_error_panic_hook::set_once(); // Better panic messages in browser
    logging::init();
    info!("chatcast initialized");
    Ok(())
}
