//! Background command relay.
//!
//! Resolves (or opens) the tab for a platform, forwards commands to the
//! engine living in that tab and collects the results. Runs on the
//! background page's single event loop; `RefCell` borrows never span an
//! `.await`.

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::{ConfigError, ErrorKind, RelayError};
use crate::platform::{PlatformDescriptor, PlatformRegistry};
use crate::protocol::{Action, Command, CommandMode, DeliveryResult, Request};
use crate::tabs::{TabHost, TabId, TabRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStatus {
    pub ready: bool,
}

pub struct Dispatcher<H: TabHost> {
    host: H,
    platforms: RefCell<PlatformRegistry>,
    tabs: RefCell<TabRegistry>,
    config: RelayConfig,
}

impl<H: TabHost> Dispatcher<H> {
    pub fn new(host: H, platforms: PlatformRegistry, config: RelayConfig) -> Self {
        Dispatcher {
            host,
            platforms: RefCell::new(platforms),
            tabs: RefCell::new(TabRegistry::new()),
            config,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn tabs(&self) -> Ref<'_, TabRegistry> {
        self.tabs.borrow()
    }

    pub fn platform_keys(&self) -> Vec<String> {
        self.platforms.borrow().keys()
    }

    fn descriptor(&self, platform_key: &str) -> Result<PlatformDescriptor, RelayError> {
        self.platforms
            .borrow()
            .get(platform_key)
            .cloned()
            .ok_or_else(|| RelayError::UnsupportedPlatform(platform_key.to_string()))
    }

    /// Tab-closed notification from the browser.
    pub fn tab_closed(&self, tab_id: TabId) {
        if let Some(platform) = self.tabs.borrow_mut().tab_closed(tab_id) {
            info!(%platform, tab_id, "bound tab closed");
        }
    }

    /// Bound live tab, else an already open matching tab, else a new tab.
    async fn resolve_tab(&self, descriptor: &PlatformDescriptor) -> Result<TabId, RelayError> {
        let key = descriptor.key.as_str();

        let bound = self.tabs.borrow().tab_for(key);
        if let Some(tab_id) = bound {
            if self.host.tab_exists(tab_id).await {
                return Ok(tab_id);
            }
            debug!(platform = key, tab_id, "bound tab is gone");
            self.tabs.borrow_mut().tab_closed(tab_id);
        }

        if let Some(tab_id) = self.host.find_tab(&descriptor.url_pattern()).await? {
            debug!(platform = key, tab_id, "adopted open tab");
            self.tabs.borrow_mut().bind(key, tab_id);
            return Ok(tab_id);
        }

        self.tabs.borrow_mut().begin_opening(key);
        match self.host.open_tab(&descriptor.base_url).await {
            Ok(tab_id) => {
                info!(platform = key, tab_id, "opened tab");
                self.tabs.borrow_mut().bind(key, tab_id);
                self.host.wait_settled(tab_id, self.config.settle_delay_ms).await;
                Ok(tab_id)
            }
            Err(e) => {
                self.tabs.borrow_mut().unbind(key);
                Err(e)
            }
        }
    }

    pub async fn open_platform(&self, platform_key: &str) -> Result<TabId, RelayError> {
        let descriptor = self.descriptor(platform_key)?;
        self.resolve_tab(&descriptor).await
    }

    /// Delivers one command. Every failure ends up in the result; nothing is retried.
    pub async fn send(&self, command: &Command) -> DeliveryResult {
        let descriptor = match self.descriptor(&command.platform_key) {
            Ok(descriptor) => descriptor,
            Err(e) => return DeliveryResult::failure(command, e.kind()),
        };
        let tab_id = match self.resolve_tab(&descriptor).await {
            Ok(tab_id) => tab_id,
            Err(e) => {
                warn!(platform = %command.platform_key, error = %e, "no tab for command");
                return DeliveryResult::failure(command, e.kind());
            }
        };
        match self.host.send_message(tab_id, &command.to_request()).await {
            Ok(response) => {
                let result = DeliveryResult::from_response(command, response);
                debug!(platform = %command.platform_key, success = result.success, "command delivered");
                result
            }
            Err(e) => {
                warn!(platform = %command.platform_key, tab_id, error = %e, "page did not answer");
                DeliveryResult::failure(command, ErrorKind::ChannelUnavailable)
            }
        }
    }

    pub async fn send_to_platform(&self, platform_key: &str, text: &str, mode: CommandMode) -> DeliveryResult {
        let command = Command::new(platform_key, text, mode);
        self.send(&command).await
    }

    /// Sends `text` to every known platform concurrently. One platform
    /// failing never fails the call; it shows up in its own entry.
    pub async fn broadcast(&self, text: &str) -> BTreeMap<String, DeliveryResult> {
        let commands: Vec<Command> = self
            .platform_keys()
            .into_iter()
            .map(|key| Command::new(key, text, CommandMode::InputAndSend))
            .collect();
        info!(platforms = commands.len(), "broadcasting");
        let results = join_all(commands.iter().map(|command| self.send(command))).await;
        results
            .into_iter()
            .map(|result| (result.platform_key.clone(), result))
            .collect()
    }

    /// Readiness per platform. Platforms without a bound tab report not
    /// ready; no tab is opened for a status query.
    pub async fn status(&self) -> BTreeMap<String, PlatformStatus> {
        let keys = self.platform_keys();
        let probes = keys.iter().map(|key| async move {
            let bound = self.tabs.borrow().tab_for(key);
            let ready = match bound {
                Some(tab_id) => match self.host.send_message(tab_id, &Request::new(Action::Status)).await {
                    Ok(response) => response.success && response.ready.unwrap_or(false),
                    Err(_) => false,
                },
                None => false,
            };
            (key.clone(), PlatformStatus { ready })
        });
        join_all(probes).await.into_iter().collect()
    }

    /// Applies descriptor overrides here and pushes them to every open tab.
    pub async fn update_descriptors(&self, descriptors: Vec<PlatformDescriptor>) -> Result<Vec<String>, ConfigError> {
        let changed = self.platforms.borrow_mut().apply_update(descriptors.clone())?;
        let open = self.tabs.borrow().open_tabs();
        let request = Request::config_update(descriptors);
        for (platform, tab_id) in open {
            if let Err(e) = self.host.send_message(tab_id, &request).await {
                warn!(%platform, tab_id, error = %e, "could not forward descriptor update");
            }
        }
        info!(?changed, "descriptors updated");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Response;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::cell::Cell;

    /// Records every host call; pages always answer with success.
    #[derive(Default)]
    struct RecordingHost {
        live: RefCell<Vec<TabId>>,
        preexisting: RefCell<Vec<(String, TabId)>>,
        next_id: Cell<TabId>,
        opened: RefCell<Vec<String>>,
        settled: RefCell<Vec<(TabId, u32)>>,
        sent: RefCell<Vec<(TabId, Request)>>,
        fail_open: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl TabHost for RecordingHost {
        async fn tab_exists(&self, tab_id: TabId) -> bool {
            self.live.borrow().contains(&tab_id)
        }

        async fn find_tab(&self, url_pattern: &str) -> Result<Option<TabId>, RelayError> {
            Ok(self.preexisting.borrow().iter().find(|(p, _)| p == url_pattern).map(|(_, id)| *id))
        }

        async fn open_tab(&self, url: &str) -> Result<TabId, RelayError> {
            if self.fail_open.get() {
                return Err(RelayError::TabFailed("blocked".to_string()));
            }
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            self.live.borrow_mut().push(id);
            self.opened.borrow_mut().push(url.to_string());
            Ok(id)
        }

        async fn wait_settled(&self, tab_id: TabId, delay_ms: u32) {
            self.settled.borrow_mut().push((tab_id, delay_ms));
        }

        async fn send_message(&self, tab_id: TabId, request: &Request) -> Result<Response, RelayError> {
            self.sent.borrow_mut().push((tab_id, request.clone()));
            let mut response = Response::ok("ignored", request.command_id);
            response.ready = Some(true);
            Ok(response)
        }
    }

    fn dispatcher() -> Dispatcher<RecordingHost> {
        Dispatcher::new(RecordingHost::default(), PlatformRegistry::with_defaults(), RelayConfig::default())
    }

    #[test]
    fn test_first_send_opens_and_settles_then_reuses() {
        let relay = dispatcher();
        let first = block_on(relay.send_to_platform("claude", "hi", CommandMode::InputAndSend));
        assert!(first.success);
        assert_eq!(first.platform_key, "claude");
        assert_eq!(*relay.host().opened.borrow(), vec!["https://claude.ai/new".to_string()]);
        assert_eq!(*relay.host().settled.borrow(), vec![(1, 3000)]);

        block_on(relay.send_to_platform("claude", "again", CommandMode::InputOnly));
        assert_eq!(relay.host().opened.borrow().len(), 1, "bound tab is reused");
        let sent = relay.host().sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1.action, Action::Input);
        assert_eq!(sent[1].1.text.as_deref(), Some("again"));
    }

    #[test]
    fn test_adopts_already_open_tab_without_settling() {
        let relay = dispatcher();
        relay.host().preexisting.borrow_mut().push(("https://gemini.google.com/*".to_string(), 42));
        relay.host().live.borrow_mut().push(42);
        let tab = block_on(relay.open_platform("gemini")).unwrap();
        assert_eq!(tab, 42);
        assert!(relay.host().opened.borrow().is_empty());
        assert!(relay.host().settled.borrow().is_empty());
        assert_eq!(relay.tabs().tab_for("gemini"), Some(42));
    }

    #[test]
    fn test_closed_tab_is_not_reused() {
        let relay = dispatcher();
        block_on(relay.open_platform("chatgpt")).unwrap();
        relay.tab_closed(1);
        assert_eq!(relay.tabs().tab_for("chatgpt"), None);

        let result = block_on(relay.send_to_platform("chatgpt", "ping", CommandMode::InputAndSend));
        assert!(result.success);
        assert_eq!(relay.host().opened.borrow().len(), 2);
        assert_eq!(relay.host().sent.borrow()[0].0, 2, "command went to the new tab");
    }

    #[test]
    fn test_silently_vanished_tab_is_replaced() {
        let relay = dispatcher();
        block_on(relay.open_platform("perplexity")).unwrap();
        // Closed without a notification reaching us.
        relay.host().live.borrow_mut().clear();
        let tab = block_on(relay.open_platform("perplexity")).unwrap();
        assert_eq!(tab, 2);
    }

    #[test]
    fn test_unknown_platform() {
        let relay = dispatcher();
        let result = block_on(relay.send_to_platform("myspace", "hi", CommandMode::InputOnly));
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::UnsupportedPlatform));
        assert!(relay.host().opened.borrow().is_empty());
        assert!(matches!(block_on(relay.open_platform("myspace")), Err(RelayError::UnsupportedPlatform(_))));
    }

    #[test]
    fn test_failed_open_reports_channel_unavailable() {
        let relay = dispatcher();
        relay.host().fail_open.set(true);
        let result = block_on(relay.send_to_platform("deepseek", "hi", CommandMode::InputOnly));
        assert_eq!(result.error_kind, Some(ErrorKind::ChannelUnavailable));
        assert_eq!(relay.tabs().state("deepseek"), crate::tabs::TabState::Closed);
    }

    #[test]
    fn test_status_does_not_open_tabs() {
        let relay = dispatcher();
        block_on(relay.open_platform("claude")).unwrap();
        let status = block_on(relay.status());
        assert_eq!(status.len(), PlatformRegistry::with_defaults().len());
        assert_eq!(status["claude"], PlatformStatus { ready: true });
        assert_eq!(status["chatgpt"], PlatformStatus { ready: false });
        assert_eq!(relay.host().opened.borrow().len(), 1);
    }

    #[test]
    fn test_descriptor_update_is_forwarded_to_open_tabs() {
        let relay = dispatcher();
        block_on(relay.open_platform("claude")).unwrap();
        let mut descriptor = PlatformRegistry::with_defaults().get("claude").unwrap().clone();
        descriptor.chunk_limit = 123;

        let changed = block_on(relay.update_descriptors(vec![descriptor])).unwrap();
        assert_eq!(changed, vec!["claude".to_string()]);
        let sent = relay.host().sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.action, Action::ConfigUpdate);
        assert_eq!(sent[0].1.descriptors.as_ref().unwrap()[0].chunk_limit, 123);
    }
}
