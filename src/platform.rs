//! Platform adapter registry.
//!
//! Every supported chat UI is described by data only: ordered selector
//! lists, a chunk limit and the flavor of its composer control. Adding a
//! platform means adding a `PlatformDescriptor`, not new control flow.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// How the composer control stores its text, which decides the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComposerKind {
    /// A `<textarea>`/`<input>` whose value can be assigned directly.
    PlainField,
    /// A `contenteditable` editor that expects block-level markup.
    RichTextEditor,
    /// A `<textarea>`/`<input>` whose `value` property is wrapped by a
    /// reactive framework; writes must go through the native setter.
    FrameworkControlledField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformDescriptor {
    pub key: String,
    pub display_name: String,
    pub base_url: String,
    /// Most specific first.
    pub composer_selectors: Vec<String>,
    pub send_selectors: Vec<String>,
    #[serde(default)]
    pub message_selectors: Vec<String>,
    pub chunk_limit: usize,
    pub composer_kind: ComposerKind,
}

impl PlatformDescriptor {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidDescriptor {
            key: self.key.clone(),
            reason: reason.to_string(),
        };
        if self.key.trim().is_empty() {
            return Err(invalid("empty key"));
        }
        if self.composer_selectors.is_empty() {
            return Err(invalid("no composer selectors"));
        }
        if self.send_selectors.is_empty() {
            return Err(invalid("no send selectors"));
        }
        if self.chunk_limit == 0 {
            return Err(invalid("chunk limit must be positive"));
        }
        Url::parse(&self.base_url).map_err(|e| invalid(&format!("bad base url: {}", e)))?;
        Ok(())
    }

    /// Tab query pattern covering every page of the platform's origin,
    /// e.g. `https://chatgpt.com/*`.
    pub fn url_pattern(&self) -> String {
        match Url::parse(&self.base_url) {
            Ok(url) => match url.host_str() {
                Some(host) => format!("{}://{}/*", url.scheme(), host),
                None => self.base_url.clone(),
            },
            Err(_) => self.base_url.clone(),
        }
    }

    /// True when `page_url` is served from this platform's host.
    pub fn matches_url(&self, page_url: &str) -> bool {
        let (Ok(base), Ok(page)) = (Url::parse(&self.base_url), Url::parse(page_url)) else {
            return false;
        };
        base.host_str().is_some() && base.host_str() == page.host_str()
    }
}

fn selectors(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// The built-in adapter table.
pub fn default_descriptors() -> Vec<PlatformDescriptor> {
    vec![
        PlatformDescriptor {
            key: "chatgpt".to_string(),
            display_name: "ChatGPT".to_string(),
            base_url: "https://chatgpt.com/".to_string(),
            composer_selectors: selectors(&[
                "#prompt-textarea[contenteditable=\"true\"]",
                "div.ProseMirror[contenteditable=\"true\"]",
                "form [contenteditable=\"true\"]",
            ]),
            send_selectors: selectors(&[
                "button[data-testid=\"send-button\"]",
                "#composer-submit-button",
                "form button[type=\"submit\"]",
                "button[aria-label*=\"Send\"]",
            ]),
            message_selectors: selectors(&[
                "[data-message-author-role=\"assistant\"] .markdown",
                "[data-message-author-role=\"assistant\"]",
            ]),
            chunk_limit: 4000,
            composer_kind: ComposerKind::RichTextEditor,
        },
        PlatformDescriptor {
            key: "claude".to_string(),
            display_name: "Claude".to_string(),
            base_url: "https://claude.ai/new".to_string(),
            composer_selectors: selectors(&[
                "div.ProseMirror[contenteditable=\"true\"]",
                "[contenteditable=\"true\"][role=\"textbox\"]",
                "fieldset [contenteditable=\"true\"]",
            ]),
            send_selectors: selectors(&[
                "button[aria-label=\"Send message\"]",
                "button[aria-label*=\"Send\"]",
                "fieldset button[type=\"button\"]:last-of-type",
            ]),
            message_selectors: selectors(&[
                ".font-claude-message",
                "[data-is-streaming] .font-claude-message",
            ]),
            chunk_limit: 5000,
            composer_kind: ComposerKind::RichTextEditor,
        },
        PlatformDescriptor {
            key: "gemini".to_string(),
            display_name: "Gemini".to_string(),
            base_url: "https://gemini.google.com/app".to_string(),
            composer_selectors: selectors(&[
                ".ql-editor[contenteditable=\"true\"]",
                "rich-textarea [contenteditable=\"true\"]",
                "xpath://div[@role='textbox' and @contenteditable='true']",
            ]),
            send_selectors: selectors(&[
                "button[aria-label*=\"Send\"]",
                "button.send-button",
                "button[mattooltip*=\"Send\"]",
            ]),
            message_selectors: selectors(&["message-content .markdown", "model-response"]),
            chunk_limit: 3000,
            composer_kind: ComposerKind::RichTextEditor,
        },
        PlatformDescriptor {
            key: "deepseek".to_string(),
            display_name: "DeepSeek".to_string(),
            base_url: "https://chat.deepseek.com/".to_string(),
            composer_selectors: selectors(&[
                "textarea#chat-input",
                "textarea[placeholder*=\"DeepSeek\"]",
                "textarea",
            ]),
            send_selectors: selectors(&[
                "div[role=\"button\"][aria-disabled]",
                "button[type=\"submit\"]",
            ]),
            message_selectors: selectors(&[".ds-markdown"]),
            chunk_limit: 4000,
            composer_kind: ComposerKind::FrameworkControlledField,
        },
        PlatformDescriptor {
            key: "perplexity".to_string(),
            display_name: "Perplexity".to_string(),
            base_url: "https://www.perplexity.ai/".to_string(),
            composer_selectors: selectors(&[
                "textarea[placeholder*=\"Ask\"]",
                "textarea[autofocus]",
                "textarea",
            ]),
            send_selectors: selectors(&[
                "button[aria-label=\"Submit\"]",
                "button[aria-label*=\"Submit\"]",
            ]),
            message_selectors: selectors(&[".prose"]),
            chunk_limit: 2000,
            composer_kind: ComposerKind::FrameworkControlledField,
        },
        PlatformDescriptor {
            key: "huggingchat".to_string(),
            display_name: "HuggingChat".to_string(),
            base_url: "https://huggingface.co/chat/".to_string(),
            composer_selectors: selectors(&[
                "form textarea[enterkeyhint=\"send\"]",
                "form textarea",
            ]),
            send_selectors: selectors(&[
                "form button[type=\"submit\"]",
                "button[aria-label*=\"Send\"]",
            ]),
            message_selectors: selectors(&["[data-message-role=\"assistant\"] .prose", ".prose"]),
            chunk_limit: 2000,
            composer_kind: ComposerKind::PlainField,
        },
    ]
}

/// Ordered set of descriptors keyed by `PlatformDescriptor::key`.
#[derive(Debug, Clone, Default)]
pub struct PlatformRegistry {
    descriptors: Vec<PlatformDescriptor>,
}

impl PlatformRegistry {
    pub fn new(descriptors: Vec<PlatformDescriptor>) -> Self {
        let mut registry = PlatformRegistry::default();
        for descriptor in descriptors {
            registry.upsert(descriptor);
        }
        registry
    }

    pub fn with_defaults() -> Self {
        Self::new(default_descriptors())
    }

    pub fn get(&self, key: &str) -> Option<&PlatformDescriptor> {
        self.descriptors.iter().find(|d| d.key == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.key.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Platform serving `page_url`, if any.
    pub fn match_url(&self, page_url: &str) -> Option<&PlatformDescriptor> {
        self.descriptors.iter().find(|d| d.matches_url(page_url))
    }

    fn upsert(&mut self, descriptor: PlatformDescriptor) {
        match self.descriptors.iter_mut().find(|d| d.key == descriptor.key) {
            Some(existing) => *existing = descriptor,
            None => self.descriptors.push(descriptor),
        }
    }

    /// Replaces or adds descriptors by key. The whole update is validated
    /// first; an invalid entry rejects the update and leaves the registry
    /// untouched. Returns the keys that changed.
    pub fn apply_update(&mut self, update: Vec<PlatformDescriptor>) -> Result<Vec<String>, ConfigError> {
        for descriptor in &update {
            descriptor.validate()?;
        }
        let mut changed = Vec::with_capacity(update.len());
        for descriptor in update {
            changed.push(descriptor.key.clone());
            self.upsert(descriptor);
        }
        Ok(changed)
    }

    pub fn apply_update_json(&mut self, json: &str) -> Result<Vec<String>, ConfigError> {
        let update: Vec<PlatformDescriptor> = serde_json::from_str(json)?;
        self.apply_update(update)
    }
}
