//! Waits for a platform's send control to become actionable.

use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream;
use gloo_timers::future::{IntervalStream, TimeoutFuture};
use tracing::{debug, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Element, MutationObserver, MutationObserverInit, Node};

use crate::dom_utils;
use crate::error::DomError;
use crate::locator::find_actionable;
use crate::platform::PlatformDescriptor;
use crate::wait;

/// Attributes whose changes can flip a control between disabled and enabled.
const WATCHED_ATTRIBUTES: [&str; 3] = ["disabled", "aria-disabled", "class"];

/// A connected `MutationObserver` that pings a channel on every batch of
/// records. Disconnects when dropped.
struct MutationWatch {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
}

impl MutationWatch {
    fn install(target: &Node, notify: UnboundedSender<()>) -> Result<Self, DomError> {
        let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(move |_records, _observer| {
            // The receiver is gone once the wait is over; late records are dropped.
            let _ = notify.unbounded_send(());
        });
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;

        let filter = js_sys::Array::new();
        for name in WATCHED_ATTRIBUTES {
            filter.push(&name.into());
        }
        let init = MutationObserverInit::new();
        init.set_attributes(true);
        init.set_attribute_filter(&filter);
        init.set_child_list(true);
        init.set_subtree(true);
        observer.observe_with_options(target, &init)?;

        Ok(MutationWatch { observer, _callback: callback })
    }
}

impl Drop for MutationWatch {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Resolves with the first visible, enabled element matching the
/// descriptor's send selectors, or `None` once `timeout_ms` elapses.
///
/// Checks immediately, then re-checks on every DOM mutation under `<body>`
/// and on every `poll_ms` tick, whichever comes first. Resolves at most
/// once; the observer and the interval are gone when this returns.
pub async fn await_actionable(descriptor: &PlatformDescriptor, timeout_ms: u32, poll_ms: u32) -> Option<Element> {
    let selectors = &descriptor.send_selectors;
    if let Some(found) = find_actionable(selectors) {
        debug!(platform = %descriptor.key, "send control actionable immediately");
        return Some(found);
    }

    let (notify, mutations) = mpsc::unbounded::<()>();
    let watch = match dom_utils::get_document().ok().and_then(|d| d.body()) {
        Some(body) => match MutationWatch::install(&body, notify) {
            Ok(watch) => Some(watch),
            Err(e) => {
                warn!(error = %e, "mutation observer unavailable, polling only");
                None
            }
        },
        None => None,
    };

    let wakeups = stream::select(mutations, IntervalStream::new(poll_ms.max(1)));
    let found = wait::until(|| find_actionable(selectors), wakeups, TimeoutFuture::new(timeout_ms)).await;
    drop(watch);

    match &found {
        Some(_) => debug!(platform = %descriptor.key, "send control became actionable"),
        None => debug!(platform = %descriptor.key, timeout_ms, "send control never became actionable"),
    }
    found
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use crate::platform::ComposerKind;
    use wasm_bindgen_test::*;
    use web_sys::HtmlElement;

    wasm_bindgen_test_configure!(run_in_browser);

    fn descriptor(send: &str) -> PlatformDescriptor {
        PlatformDescriptor {
            key: "watch".to_string(),
            display_name: "Watch".to_string(),
            base_url: "http://localhost/".to_string(),
            composer_selectors: vec!["textarea".to_string()],
            send_selectors: vec![send.to_string()],
            message_selectors: Vec::new(),
            chunk_limit: 100,
            composer_kind: ComposerKind::PlainField,
        }
    }

    fn add_button(id: &str, disabled: bool) -> HtmlElement {
        let document = dom_utils::get_document().unwrap();
        let el: HtmlElement = document.create_element("button").unwrap().dyn_into().unwrap();
        el.set_id(id);
        el.set_text_content(Some("Send"));
        if disabled {
            el.set_attribute("disabled", "").unwrap();
        }
        document.body().unwrap().append_child(&el).unwrap();
        el
    }

    #[wasm_bindgen_test]
    async fn test_enabled_control_resolves_immediately() {
        let el = add_button("watch-now", false);
        let found = await_actionable(&descriptor("#watch-now"), 1000, 100).await;
        assert_eq!(found.unwrap().id(), "watch-now");
        el.remove();
    }

    #[wasm_bindgen_test]
    async fn test_resolves_soon_after_control_is_enabled() {
        let el = add_button("watch-later", true);
        let flip = el.clone();
        wasm_bindgen_futures::spawn_local(async move {
            TimeoutFuture::new(200).await;
            flip.remove_attribute("disabled").unwrap();
        });

        let started = js_sys::Date::now();
        let found = await_actionable(&descriptor("#watch-later"), 5000, 100).await;
        let elapsed = js_sys::Date::now() - started;
        assert!(found.is_some());
        assert!(elapsed >= 150.0 && elapsed < 1500.0, "resolved after {}ms", elapsed);
        el.remove();
    }

    #[wasm_bindgen_test]
    async fn test_times_out_when_never_actionable() {
        let el = add_button("watch-never", true);
        let started = js_sys::Date::now();
        let found = await_actionable(&descriptor("#watch-never"), 300, 50).await;
        let elapsed = js_sys::Date::now() - started;
        assert!(found.is_none());
        assert!(elapsed >= 250.0, "timed out after {}ms", elapsed);
        // Mutations after the timeout must not reach a dead waiter.
        el.remove_attribute("disabled").unwrap();
        TimeoutFuture::new(50).await;
        el.remove();
    }
}
