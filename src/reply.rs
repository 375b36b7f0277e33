//! Best-effort extraction of the latest rendered reply.
//!
//! Nothing on the host page ties a rendered message to the turn we sent, so
//! "the last node matching the message selector" is a heuristic: it can be a
//! reply that was already on screen.

use crate::dom_utils;
use crate::platform::PlatformDescriptor;

/// Picks the last text that is not blank, trimmed. Blank entries are skipped.
pub fn last_non_blank<I: IntoIterator<Item = Option<String>>>(texts: I) -> Option<String> {
    texts
        .into_iter()
        .flatten()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .last()
}

/// Trimmed text of the last non-blank element matched by the first message
/// selector that yields any non-blank text.
pub fn extract_latest_reply(descriptor: &PlatformDescriptor) -> Option<String> {
    let document = dom_utils::get_document().ok()?;
    descriptor.message_selectors.iter().find_map(|selector| {
        let elements = dom_utils::query_lenient(&document, selector);
        if elements.is_empty() {
            return None;
        }
        last_non_blank(elements.iter().map(|el| el.text_content()))
    })
}
