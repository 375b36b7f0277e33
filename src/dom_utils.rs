use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, NodeList, Window};

use crate::error::DomError;

// Helper function to get window and document
pub fn get_window_document() -> Result<(Window, Document), DomError> {
    let window = web_sys::window().ok_or_else(|| DomError::JsError { message: "Failed to get window object".to_string() })?;
    let document = window.document().ok_or_else(|| DomError::JsError { message: "Failed to get document object".to_string() })?;
    Ok((window, document))
}

pub fn get_document() -> Result<Document, DomError> {
    get_window_document().map(|(_, document)| document)
}

/// How a selector string is interpreted.
#[derive(Debug, PartialEq)]
pub enum SelectorSyntax<'a> {
    Css(&'a str),
    XPath(&'a str),
}

/// `xpath:` selects XPath, `css:` or no prefix selects CSS.
pub fn parse_selector(selector: &str) -> SelectorSyntax<'_> {
    if let Some(xpath) = selector.strip_prefix("xpath:") {
        SelectorSyntax::XPath(xpath)
    } else {
        SelectorSyntax::Css(selector.strip_prefix("css:").unwrap_or(selector))
    }
}

// Helper function to get multiple elements using XPath
fn get_elements_by_xpath_logic(document: &Document, xpath: &str, original_selector: &str) -> Result<Vec<Element>, DomError> {
    let result = document
        .evaluate(xpath, document)
        .map_err(|e| DomError::InvalidSelector {
            selector: original_selector.to_string(),
            error: e.as_string().unwrap_or_else(|| "Unknown XPath error".to_string()),
        })?;

    let mut elements = Vec::new();
    while let Ok(Some(node)) = result.iterate_next() {
        if let Some(element) = node.dyn_ref::<Element>() {
            elements.push(element.clone());
        } else {
            warn!(selector = original_selector, "XPath selector returned a Node that is not an Element");
        }
    }
    Ok(elements)
}

/// All elements matching `selector`, in document order.
pub fn get_all_elements(document: &Document, selector: &str) -> Result<Vec<Element>, DomError> {
    match parse_selector(selector) {
        SelectorSyntax::XPath(xpath) => get_elements_by_xpath_logic(document, xpath, selector),
        SelectorSyntax::Css(css) => {
            let node_list: NodeList = document
                .query_selector_all(css)
                .map_err(|e| DomError::InvalidSelector {
                    selector: selector.to_string(),
                    error: e.as_string().unwrap_or_else(|| "Unknown querySelectorAll error".to_string()),
                })?;

            let mut elements = Vec::new();
            for i in 0..node_list.length() {
                if let Some(node) = node_list.item(i) {
                    if let Some(element) = node.dyn_ref::<Element>() {
                        elements.push(element.clone());
                    }
                }
            }
            Ok(elements)
        }
    }
}

/// Like `get_all_elements`, but an invalid selector is logged and treated
/// as matching nothing so a fallback list can move on to the next entry.
pub fn query_lenient(document: &Document, selector: &str) -> Vec<Element> {
    match get_all_elements(document, selector) {
        Ok(elements) => {
            debug!(selector, matches = elements.len(), "queried selector");
            elements
        }
        Err(e) => {
            warn!(selector, error = %e, "skipping selector");
            Vec::new()
        }
    }
}

/// Attached to the document and rendered with a non-empty box.
pub fn is_visible(element: &Element) -> bool {
    if !element.is_connected() {
        return false;
    }
    let rect = element.get_bounding_client_rect();
    rect.width() > 0.0 && rect.height() > 0.0
}

fn attr_is_true(element: &Element, name: &str) -> bool {
    element
        .get_attribute(name)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// No `disabled` attribute and not `aria-disabled="true"`.
pub fn is_enabled(element: &Element) -> bool {
    !element.has_attribute("disabled") && !attr_is_true(element, "aria-disabled")
}

/// Enabled and accepting text.
pub fn is_editable(element: &Element) -> bool {
    if !is_enabled(element) || element.has_attribute("readonly") || attr_is_true(element, "aria-readonly") {
        return false;
    }
    !matches!(element.get_attribute("contenteditable").as_deref(), Some("false"))
}

pub fn to_html_element(element: &Element) -> Result<HtmlElement, DomError> {
    element
        .clone()
        .dyn_into::<HtmlElement>()
        .map_err(|_| DomError::ElementTypeError { expected_type: "HtmlElement".to_string() })
}

pub fn get_current_url() -> Result<String, DomError> {
    let (window, _) = get_window_document()?;
    window.location().href().map_err(DomError::from)
}
