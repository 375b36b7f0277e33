//! Text injection pipeline.
//!
//! Writes a message into a located composer chunk by chunk, using the write
//! path its `ComposerKind` requires, and fires the input event sequence
//! after every chunk so the host page's framework notices the change (most
//! importantly, so the send control gets enabled).

use gloo_timers::future::TimeoutFuture;
use js_sys::{Function, Object, Reflect};
use tracing::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, Element, Event, EventInit, FocusEvent, FocusEventInit, HtmlElement, HtmlInputElement,
    HtmlTextAreaElement, InputEvent, InputEventInit,
};

use crate::chunk::split_chunks;
use crate::config::RelayConfig;
use crate::error::DomError;
use crate::locator::ResolvedElement;
use crate::platform::ComposerKind;

enum Field {
    TextArea(HtmlTextAreaElement),
    Input(HtmlInputElement),
}

impl Field {
    fn from_element(element: &Element) -> Result<Field, DomError> {
        if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
            Ok(Field::TextArea(area.clone()))
        } else if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            Ok(Field::Input(input.clone()))
        } else {
            Err(DomError::ElementTypeError { expected_type: "HtmlTextAreaElement or HtmlInputElement".to_string() })
        }
    }

    fn set_value(&self, value: &str) {
        match self {
            Field::TextArea(area) => area.set_value(value),
            Field::Input(input) => input.set_value(value),
        }
    }

    fn as_js(&self) -> &JsValue {
        match self {
            Field::TextArea(area) => area.as_ref(),
            Field::Input(input) => input.as_ref(),
        }
    }

    fn prototype_name(&self) -> &'static str {
        match self {
            Field::TextArea(_) => "HTMLTextAreaElement",
            Field::Input(_) => "HTMLInputElement",
        }
    }
}

/// The `value` setter defined on the element's built-in prototype, which
/// bypasses any wrapper a framework installed on the instance.
fn native_value_setter(field: &Field) -> Result<Function, DomError> {
    let window = web_sys::window().ok_or_else(|| DomError::JsError { message: "Failed to get window object".to_string() })?;
    let constructor = Reflect::get(&window, &JsValue::from_str(field.prototype_name()))?;
    let prototype: Object = Reflect::get(&constructor, &JsValue::from_str("prototype"))?.unchecked_into();
    let descriptor = Object::get_own_property_descriptor(&prototype, &JsValue::from_str("value"));
    if descriptor.is_undefined() {
        return Err(DomError::JsError { message: format!("{} has no value property", field.prototype_name()) });
    }
    Reflect::get(&descriptor, &JsValue::from_str("set"))?
        .dyn_into::<Function>()
        .map_err(|_| DomError::JsError { message: "native value setter is not a function".to_string() })
}

/// One write strategy per composer kind.
enum TextWriter {
    Plain(Field),
    Framework { field: Field, setter: Function },
    Rich { editor: HtmlElement, document: Document },
}

impl TextWriter {
    fn new(kind: ComposerKind, element: &HtmlElement) -> Result<TextWriter, DomError> {
        match kind {
            ComposerKind::PlainField => Ok(TextWriter::Plain(Field::from_element(element)?)),
            ComposerKind::FrameworkControlledField => {
                let field = Field::from_element(element)?;
                let setter = native_value_setter(&field)?;
                Ok(TextWriter::Framework { field, setter })
            }
            ComposerKind::RichTextEditor => {
                let document = element
                    .owner_document()
                    .ok_or_else(|| DomError::JsError { message: "editor is not in a document".to_string() })?;
                Ok(TextWriter::Rich { editor: element.clone(), document })
            }
        }
    }

    /// Replaces the whole composer content with `text`.
    fn write(&self, text: &str) -> Result<(), DomError> {
        match self {
            TextWriter::Plain(field) => field.set_value(text),
            TextWriter::Framework { field, setter } => {
                setter.call1(field.as_js(), &JsValue::from_str(text))?;
            }
            TextWriter::Rich { editor, document } => {
                editor.set_inner_html("");
                if text.is_empty() {
                    return Ok(());
                }
                for line in text.split('\n') {
                    let paragraph = document.create_element("p")?;
                    if line.is_empty() {
                        let line_break = document.create_element("br")?;
                        paragraph.append_child(&line_break)?;
                    } else {
                        paragraph.set_text_content(Some(line));
                    }
                    editor.append_child(&paragraph)?;
                }
            }
        }
        Ok(())
    }
}

/// Dispatches `beforeinput`, `input` and `change`, plus a `blur`/`focus`
/// cycle for rich editors. Every event bubbles.
fn fire_input_events(element: &HtmlElement, data: &str, kind: ComposerKind) -> Result<(), DomError> {
    let before_init = InputEventInit::new();
    before_init.set_bubbles(true);
    before_init.set_cancelable(true);
    before_init.set_input_type("insertText");
    before_init.set_data(Some(data));
    let before_input = InputEvent::new_with_event_init_dict("beforeinput", &before_init)?;
    element.dispatch_event(&before_input)?;

    let input_init = InputEventInit::new();
    input_init.set_bubbles(true);
    input_init.set_input_type("insertText");
    input_init.set_data(Some(data));
    let input = InputEvent::new_with_event_init_dict("input", &input_init)?;
    element.dispatch_event(&input)?;

    let change_init = EventInit::new();
    change_init.set_bubbles(true);
    let change = Event::new_with_event_init_dict("change", &change_init)?;
    element.dispatch_event(&change)?;

    if kind == ComposerKind::RichTextEditor {
        let focus_init = FocusEventInit::new();
        focus_init.set_bubbles(true);
        let blur = FocusEvent::new_with_focus_event_init_dict("blur", &focus_init)?;
        element.dispatch_event(&blur)?;
        let focus = FocusEvent::new_with_focus_event_init_dict("focus", &focus_init)?;
        element.dispatch_event(&focus)?;
        element.focus()?;
    }
    Ok(())
}

async fn try_inject(target: &ResolvedElement<Element>, text: &str, chunk_limit: usize, config: &RelayConfig) -> Result<(), DomError> {
    let element: HtmlElement = target
        .element
        .clone()
        .dyn_into()
        .map_err(|_| DomError::ElementTypeError { expected_type: "HtmlElement".to_string() })?;
    let writer = TextWriter::new(target.kind, &element)?;

    element.focus()?;
    writer.write("")?;

    let chunks = split_chunks(text, chunk_limit);
    let total = chunks.len();
    let mut written = String::with_capacity(text.len());
    for (index, chunk) in chunks.iter().enumerate() {
        written.push_str(chunk);
        writer.write(&written)?;
        fire_input_events(&element, chunk, target.kind)?;
        debug!(chunk = index + 1, total, len = chunk.len(), "chunk written");
        if index + 1 < total {
            TimeoutFuture::new(config.chunk_pause_ms(chunk.chars().count())).await;
        }
    }
    Ok(())
}

/// Clears the composer and writes `text` into it. Returns `false` when the
/// element does not fit its composer kind or any DOM call throws.
pub async fn inject(target: &ResolvedElement<Element>, text: &str, chunk_limit: usize, config: &RelayConfig) -> bool {
    match try_inject(target, text, chunk_limit, config).await {
        Ok(()) => true,
        Err(e) => {
            warn!(selector = %target.selector, kind = ?target.kind, error = %e, "injection failed");
            false
        }
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use crate::dom_utils;
    use std::cell::Cell;
    use std::rc::Rc;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn add(tag: &str, id: &str) -> HtmlElement {
        let document = dom_utils::get_document().unwrap();
        let el: HtmlElement = document.create_element(tag).unwrap().dyn_into().unwrap();
        el.set_id(id);
        document.body().unwrap().append_child(&el).unwrap();
        el
    }

    fn resolved(el: &HtmlElement, kind: ComposerKind) -> ResolvedElement<Element> {
        ResolvedElement { element: el.clone().into(), kind, selector: format!("#{}", el.id()) }
    }

    fn count_events(el: &HtmlElement, name: &str) -> (Rc<Cell<u32>>, Closure<dyn FnMut(Event)>) {
        let counter = Rc::new(Cell::new(0));
        let inner = counter.clone();
        let closure = Closure::<dyn FnMut(Event)>::new(move |_e: Event| inner.set(inner.get() + 1));
        el.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref()).unwrap();
        (counter, closure)
    }

    #[wasm_bindgen_test]
    async fn test_plain_field_receives_long_text_in_chunks() {
        let el = add("textarea", "inj-plain");
        el.clone().unchecked_into::<HtmlTextAreaElement>().set_value("stale draft");
        let (inputs, _keep) = count_events(&el, "input");
        let text = "word ".repeat(30);

        assert!(inject(&resolved(&el, ComposerKind::PlainField), &text, 40, &RelayConfig::default()).await);
        assert_eq!(el.clone().unchecked_into::<HtmlTextAreaElement>().value(), text);
        assert_eq!(inputs.get() as usize, split_chunks(&text, 40).len());
        el.remove();
    }

    #[wasm_bindgen_test]
    async fn test_event_cycle_fires_once_per_chunk() {
        let el = add("textarea", "inj-cycle");
        let (before, _keep_before) = count_events(&el, "beforeinput");
        let (inputs, _keep_inputs) = count_events(&el, "input");
        let (changes, _keep_changes) = count_events(&el, "change");

        // The trailing space sits at the limit; it belongs to the only chunk.
        assert!(inject(&resolved(&el, ComposerKind::PlainField), "abcdefghij ", 10, &RelayConfig::default()).await);
        assert_eq!(el.clone().unchecked_into::<HtmlTextAreaElement>().value(), "abcdefghij ");
        assert_eq!((before.get(), inputs.get(), changes.get()), (1, 1, 1));
        el.remove();
    }

    #[wasm_bindgen_test]
    async fn test_framework_field_uses_native_setter() {
        let el = add("textarea", "inj-framework");
        // Shadow `value` on the instance the way reactive wrappers do; writes through it are dropped.
        let js = js_sys::Function::new_no_args(
            "Object.defineProperty(document.getElementById('inj-framework'), 'value', { get() { return 'shadow'; }, set(v) {}, configurable: true });",
        );
        js.call0(&JsValue::NULL).unwrap();

        assert!(inject(&resolved(&el, ComposerKind::FrameworkControlledField), "hello", 100, &RelayConfig::default()).await);
        let real = js_sys::Function::new_no_args(
            "return Object.getOwnPropertyDescriptor(HTMLTextAreaElement.prototype, 'value').get.call(document.getElementById('inj-framework'));",
        )
        .call0(&JsValue::NULL)
        .unwrap();
        assert_eq!(real.as_string().unwrap(), "hello");
        el.remove();
    }

    #[wasm_bindgen_test]
    async fn test_rich_editor_gets_paragraphs() {
        let el = add("div", "inj-rich");
        el.set_attribute("contenteditable", "true").unwrap();
        el.set_inner_html("<p>old</p>");
        let (blurs, _keep) = count_events(&el, "blur");

        assert!(inject(&resolved(&el, ComposerKind::RichTextEditor), "first\n\nthird", 100, &RelayConfig::default()).await);
        assert_eq!(el.inner_html(), "<p>first</p><p><br></p><p>third</p>");
        assert!(blurs.get() >= 1);
        el.remove();
    }

    #[wasm_bindgen_test]
    async fn test_wrong_element_for_kind_returns_false() {
        let el = add("div", "inj-wrong");
        assert!(!inject(&resolved(&el, ComposerKind::PlainField), "x", 10, &RelayConfig::default()).await);
        el.remove();
    }
}
