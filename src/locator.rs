//! Composer lookup with ordered selector fallback.

use tracing::debug;
use web_sys::Element;

use crate::dom_utils;
use crate::platform::{ComposerKind, PlatformDescriptor};

/// A live handle to a page element plus the composer flavor it was found for.
///
/// Only valid for the page that produced it; callers re-locate instead of
/// keeping one across navigations.
#[derive(Debug, Clone)]
pub struct ResolvedElement<E> {
    pub element: E,
    pub kind: ComposerKind,
    /// The selector that matched, for diagnostics.
    pub selector: String,
}

/// Walks `selectors` in declared order and returns the first element, from
/// the first selector that has one, accepted by `accept`.
///
/// Later selectors are only queried when every match of the earlier ones
/// was rejected, so declaration order always beats document order.
pub fn first_qualifying<'s, E>(
    selectors: &'s [String],
    mut query: impl FnMut(&str) -> Vec<E>,
    mut accept: impl FnMut(&E) -> bool,
) -> Option<(&'s str, E)> {
    selectors.iter().find_map(|selector| {
        query(selector)
            .into_iter()
            .find(|candidate| accept(candidate))
            .map(|found| (selector.as_str(), found))
    })
}

/// Finds the visible, editable composer of `descriptor` on the current page.
pub fn locate(descriptor: &PlatformDescriptor) -> Option<ResolvedElement<Element>> {
    let document = dom_utils::get_document().ok()?;
    let found = first_qualifying(
        &descriptor.composer_selectors,
        |selector| dom_utils::query_lenient(&document, selector),
        |element| dom_utils::is_visible(element) && dom_utils::is_editable(element),
    );
    match found {
        Some((selector, element)) => {
            debug!(platform = %descriptor.key, selector, "composer located");
            Some(ResolvedElement {
                element,
                kind: descriptor.composer_kind,
                selector: selector.to_string(),
            })
        }
        None => {
            debug!(platform = %descriptor.key, "no composer candidate qualified");
            None
        }
    }
}

/// First visible and enabled element matching any of `selectors`.
pub fn find_actionable(selectors: &[String]) -> Option<Element> {
    let document = dom_utils::get_document().ok()?;
    first_qualifying(
        selectors,
        |selector| dom_utils::query_lenient(&document, selector),
        |element| dom_utils::is_visible(element) && dom_utils::is_enabled(element),
    )
    .map(|(_, element)| element)
}


#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_test::*;
    use web_sys::HtmlElement;

    wasm_bindgen_test_configure!(run_in_browser);

    fn add(tag: &str, id: &str, attrs: &[(&str, &str)]) -> HtmlElement {
        let document = dom_utils::get_document().unwrap();
        let el = document.create_element(tag).unwrap();
        el.set_id(id);
        for (k, v) in attrs {
            el.set_attribute(k, v).unwrap();
        }
        let el: HtmlElement = el.dyn_into().unwrap();
        el.style().set_property("width", "200px").unwrap();
        el.style().set_property("height", "40px").unwrap();
        document.body().unwrap().append_child(&el).unwrap();
        el
    }

    fn descriptor(composers: &[&str]) -> PlatformDescriptor {
        PlatformDescriptor {
            key: "test".to_string(),
            display_name: "Test".to_string(),
            base_url: "http://localhost/".to_string(),
            composer_selectors: composers.iter().map(|s| s.to_string()).collect(),
            send_selectors: vec!["#never".to_string()],
            message_selectors: Vec::new(),
            chunk_limit: 100,
            composer_kind: ComposerKind::PlainField,
        }
    }

    #[wasm_bindgen_test]
    fn test_locate_prefers_declared_order() {
        let second_in_dom = add("textarea", "loc-b", &[("class", "loc-any")]);
        let first_in_dom_hidden = add("textarea", "loc-hidden", &[("class", "loc-any"), ("style", "display:none")]);
        let preferred = add("textarea", "loc-a", &[("class", "loc-any")]);

        let found = locate(&descriptor(&["#loc-a", ".loc-any"])).unwrap();
        assert_eq!(found.element.id(), "loc-a");
        assert_eq!(found.selector, "#loc-a");

        // Hidden candidates are skipped even when they come first.
        let found = locate(&descriptor(&["#loc-hidden", "#loc-b"])).unwrap();
        assert_eq!(found.element.id(), "loc-b");

        for el in [second_in_dom, first_in_dom_hidden, preferred] {
            el.remove();
        }
    }

    #[wasm_bindgen_test]
    fn test_locate_skips_readonly_and_invalid_selectors() {
        let ro = add("textarea", "loc-ro", &[("readonly", "")]);
        assert!(locate(&descriptor(&["[[[bad", "#loc-ro"])).is_none());
        ro.remove();
    }
}
