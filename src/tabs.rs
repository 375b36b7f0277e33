//! Tab bookkeeping for the background relay.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::protocol::{Request, Response};

/// Browser tab identifier.
pub type TabId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabState {
    Closed,
    Opening,
    Open,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabBinding {
    pub platform_key: String,
    pub tab_id: Option<TabId>,
    pub state: TabState,
}

/// One binding per platform key. Owned by the dispatcher; never global.
#[derive(Debug, Default)]
pub struct TabRegistry {
    bindings: HashMap<String, TabBinding>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(&self, platform_key: &str) -> Option<&TabBinding> {
        self.bindings.get(platform_key)
    }

    pub fn state(&self, platform_key: &str) -> TabState {
        self.bindings.get(platform_key).map(|b| b.state).unwrap_or(TabState::Closed)
    }

    /// The bound tab, if the platform is open.
    pub fn tab_for(&self, platform_key: &str) -> Option<TabId> {
        self.bindings
            .get(platform_key)
            .filter(|b| b.state == TabState::Open)
            .and_then(|b| b.tab_id)
    }

    pub fn open_tabs(&self) -> Vec<(String, TabId)> {
        let mut open: Vec<(String, TabId)> = self
            .bindings
            .values()
            .filter(|b| b.state == TabState::Open)
            .filter_map(|b| b.tab_id.map(|tab| (b.platform_key.clone(), tab)))
            .collect();
        open.sort();
        open
    }

    fn set(&mut self, platform_key: &str, tab_id: Option<TabId>, state: TabState) {
        self.bindings.insert(
            platform_key.to_string(),
            TabBinding { platform_key: platform_key.to_string(), tab_id, state },
        );
    }

    pub fn begin_opening(&mut self, platform_key: &str) {
        self.set(platform_key, None, TabState::Opening);
    }

    /// Binds `tab_id` to the platform. A tab can serve one platform only,
    /// so any other binding to the same tab is cleared.
    pub fn bind(&mut self, platform_key: &str, tab_id: TabId) {
        for binding in self.bindings.values_mut() {
            if binding.tab_id == Some(tab_id) && binding.platform_key != platform_key {
                binding.tab_id = None;
                binding.state = TabState::Closed;
            }
        }
        self.set(platform_key, Some(tab_id), TabState::Open);
    }

    pub fn unbind(&mut self, platform_key: &str) {
        self.set(platform_key, None, TabState::Closed);
    }

    /// Handles a tab-closed notification; returns the platform that lost its tab.
    pub fn tab_closed(&mut self, tab_id: TabId) -> Option<String> {
        let binding = self.bindings.values_mut().find(|b| b.tab_id == Some(tab_id))?;
        binding.tab_id = None;
        binding.state = TabState::Closed;
        Some(binding.platform_key.clone())
    }
}

/// The browser surface the relay needs: tab lookup, creation and messaging.
#[async_trait(?Send)]
pub trait TabHost {
    async fn tab_exists(&self, tab_id: TabId) -> bool;

    /// First open tab whose URL matches `url_pattern`.
    async fn find_tab(&self, url_pattern: &str) -> Result<Option<TabId>, RelayError>;

    async fn open_tab(&self, url: &str) -> Result<TabId, RelayError>;

    /// Gives a freshly opened tab time to load its page.
    async fn wait_settled(&self, tab_id: TabId, delay_ms: u32);

    /// Delivers `request` to the engine in `tab_id` and awaits its answer.
    async fn send_message(&self, tab_id: TabId, request: &Request) -> Result<Response, RelayError>;
}
