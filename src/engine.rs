//! The page-resident engine: turns relay requests into DOM work.

use std::cell::RefCell;

use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::ErrorKind;
use crate::page::Page;
use crate::platform::{PlatformDescriptor, PlatformRegistry};
use crate::protocol::{Action, Request, Response};

pub struct Engine<P: Page> {
    page: P,
    registry: RefCell<PlatformRegistry>,
    config: RelayConfig,
    /// Set when the host told us which platform this page is; otherwise the
    /// platform is detected from the page URL on every request.
    pinned_key: Option<String>,
}

impl<P: Page> Engine<P> {
    pub fn new(page: P, registry: PlatformRegistry, config: RelayConfig) -> Self {
        Engine { page, registry: RefCell::new(registry), config, pinned_key: None }
    }

    pub fn pinned(mut self, platform_key: impl Into<String>) -> Self {
        self.pinned_key = Some(platform_key.into());
        self
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// The descriptor for this page as of now. Cloned so a config update
    /// arriving mid-command only affects later commands.
    pub fn descriptor(&self) -> Option<PlatformDescriptor> {
        let registry = self.registry.borrow();
        match &self.pinned_key {
            Some(key) => registry.get(key).cloned(),
            None => {
                let url = self.page.current_url()?;
                registry.match_url(&url).cloned()
            }
        }
    }

    fn label(&self) -> String {
        self.pinned_key
            .clone()
            .or_else(|| self.descriptor().map(|d| d.key))
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub async fn handle(&self, request: Request) -> Response {
        debug!(action = ?request.action, command_id = ?request.command_id, "request received");
        if request.action == Action::ConfigUpdate {
            return self.apply_config(request);
        }
        let Some(descriptor) = self.descriptor() else {
            warn!(url = ?self.page.current_url(), "no adapter for this page");
            return Response::failed(self.label(), request.command_id, ErrorKind::UnsupportedPlatform);
        };

        if request.action == Action::Status {
            let mut response = Response::ok(&descriptor.key, request.command_id);
            response.ready = Some(self.page.locate(&descriptor).is_some());
            return response;
        }

        match self.run(&descriptor, &request).await {
            Ok(reply) => {
                info!(platform = %descriptor.key, action = ?request.action, "request completed");
                Response { reply, ..Response::ok(&descriptor.key, request.command_id) }
            }
            Err(kind) => {
                warn!(platform = %descriptor.key, action = ?request.action, error = %kind, "request failed");
                Response::failed(&descriptor.key, request.command_id, kind)
            }
        }
    }

    async fn run(&self, descriptor: &PlatformDescriptor, request: &Request) -> Result<Option<String>, ErrorKind> {
        let text = request.text.as_deref().unwrap_or_default();
        match request.action {
            Action::Input => {
                self.input(descriptor, text).await?;
                Ok(None)
            }
            Action::Send => {
                self.send(descriptor).await?;
                Ok(None)
            }
            Action::InputAndSend => {
                self.input(descriptor, text).await?;
                self.send(descriptor).await?;
                if self.config.reply_delay_ms == 0 {
                    return Ok(None);
                }
                self.page.pause(self.config.reply_delay_ms).await;
                Ok(self.page.latest_reply(descriptor))
            }
            Action::GetReply => Ok(self.page.latest_reply(descriptor)),
            Action::Status | Action::ConfigUpdate => Ok(None),
        }
    }

    async fn input(&self, descriptor: &PlatformDescriptor, text: &str) -> Result<(), ErrorKind> {
        let composer = self.page.locate(descriptor).ok_or(ErrorKind::ComposerNotFound)?;
        if self.page.inject(&composer, text, descriptor.chunk_limit, &self.config).await {
            Ok(())
        } else {
            Err(ErrorKind::InjectionFailed)
        }
    }

    async fn send(&self, descriptor: &PlatformDescriptor) -> Result<(), ErrorKind> {
        let control = self
            .page
            .await_actionable(descriptor, &self.config)
            .await
            .ok_or(ErrorKind::ActivationTimeout)?;
        self.page.click(&control);
        Ok(())
    }

    fn apply_config(&self, request: Request) -> Response {
        let descriptors = request.descriptors.unwrap_or_default();
        let applied = self.registry.borrow_mut().apply_update(descriptors);
        match applied {
            Ok(keys) => {
                info!(?keys, "descriptors updated");
                Response::ok(self.label(), request.command_id)
            }
            Err(e) => {
                warn!(error = %e, "rejected descriptor update");
                Response { success: false, ..Response::ok(self.label(), request.command_id) }
            }
        }
    }
}
