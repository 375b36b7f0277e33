use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlElement, MouseEvent, MouseEventInit, PointerEvent, PointerEventInit};

use crate::error::DomError;

fn pointer_event(kind: &str, buttons: u16) -> Result<PointerEvent, DomError> {
    let init = PointerEventInit::new();
    init.set_bubbles(true);
    init.set_cancelable(true);
    init.set_composed(true);
    init.set_pointer_type("mouse");
    init.set_is_primary(true);
    init.set_button(0);
    init.set_buttons(buttons);
    Ok(PointerEvent::new_with_event_init_dict(kind, &init)?)
}

fn mouse_event(kind: &str, buttons: u16) -> Result<MouseEvent, DomError> {
    let init = MouseEventInit::new();
    init.set_bubbles(true);
    init.set_cancelable(true);
    init.set_composed(true);
    init.set_button(0);
    init.set_buttons(buttons);
    Ok(MouseEvent::new_with_mouse_event_init_dict(kind, &init)?)
}

fn dispatch_sequence(element: &Element) -> Result<(), DomError> {
    let pointer_down = pointer_event("pointerdown", 1)?;
    element.dispatch_event(&pointer_down)?;
    let mouse_down = mouse_event("mousedown", 1)?;
    element.dispatch_event(&mouse_down)?;
    let pointer_up = pointer_event("pointerup", 0)?;
    element.dispatch_event(&pointer_up)?;
    let mouse_up = mouse_event("mouseup", 0)?;
    element.dispatch_event(&mouse_up)?;
    let click = mouse_event("click", 0)?;
    element.dispatch_event(&click)?;
    Ok(())
}

/// Presses `element` the way a user would: pointer and mouse down/up, a
/// synthetic `click`, then a programmatic `click()` for handlers that only
/// react to the native one. Fire-and-forget; failures are logged.
pub fn click(element: &Element) {
    if let Err(e) = dispatch_sequence(element) {
        warn!(error = %e, "synthetic click sequence failed");
    }
    match element.dyn_ref::<HtmlElement>() {
        Some(html) => html.click(),
        None => debug!("send control is not an HtmlElement, skipped programmatic click"),
    }
}
