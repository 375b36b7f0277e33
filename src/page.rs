//! The page surface the engine drives.
//!
//! `Page` is the seam between orchestration and the DOM: `DomPage` talks to
//! the real document, tests plug in a scripted page.

use async_trait::async_trait;
use gloo_timers::future::TimeoutFuture;
use web_sys::Element;

use crate::config::RelayConfig;
use crate::locator::{self, ResolvedElement};
use crate::platform::PlatformDescriptor;
use crate::{dom_utils, inject, reply, trigger, watcher};

#[async_trait(?Send)]
pub trait Page {
    type Element;

    fn current_url(&self) -> Option<String>;

    fn locate(&self, descriptor: &PlatformDescriptor) -> Option<ResolvedElement<Self::Element>>;

    async fn inject(&self, target: &ResolvedElement<Self::Element>, text: &str, chunk_limit: usize, config: &RelayConfig) -> bool;

    async fn await_actionable(&self, descriptor: &PlatformDescriptor, config: &RelayConfig) -> Option<Self::Element>;

    fn click(&self, element: &Self::Element);

    fn latest_reply(&self, descriptor: &PlatformDescriptor) -> Option<String>;

    async fn pause(&self, ms: u32);
}

/// The live document of the page this engine is running in.
#[derive(Debug, Default, Clone, Copy)]
pub struct DomPage;

#[async_trait(?Send)]
impl Page for DomPage {
    type Element = Element;

    fn current_url(&self) -> Option<String> {
        dom_utils::get_current_url().ok()
    }

    fn locate(&self, descriptor: &PlatformDescriptor) -> Option<ResolvedElement<Element>> {
        locator::locate(descriptor)
    }

    async fn inject(&self, target: &ResolvedElement<Element>, text: &str, chunk_limit: usize, config: &RelayConfig) -> bool {
        inject::inject(target, text, chunk_limit, config).await
    }

    async fn await_actionable(&self, descriptor: &PlatformDescriptor, config: &RelayConfig) -> Option<Element> {
        watcher::await_actionable(descriptor, config.activation_timeout_ms, config.poll_interval_ms).await
    }

    fn click(&self, element: &Element) {
        trigger::click(element)
    }

    fn latest_reply(&self, descriptor: &PlatformDescriptor) -> Option<String> {
        reply::extract_latest_reply(descriptor)
    }

    async fn pause(&self, ms: u32) {
        TimeoutFuture::new(ms).await;
    }
}
