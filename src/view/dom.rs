use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, Document, HtmlAnchorElement, HtmlElement, Url, Window};

use crate::controller::scheduler::{FrameCallback, FrameControl, FrameScheduler};
use crate::logging::Logger;
use crate::view::platform::{Presentation, Viewport};

pub fn js_error<E: Into<String>>(msg: E) -> JsValue {
    JsValue::from_str(&msg.into())
}

/// `requestAnimationFrame` driven frames.
pub struct AnimationFrameScheduler {
    window: Window,
}

impl AnimationFrameScheduler {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl FrameScheduler for AnimationFrameScheduler {
    fn schedule(&mut self, mut callback: FrameCallback) {
        let window = self.window.clone();

        let slot = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
        let slot_clone = slot.clone();

        *slot.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            let control = callback();
            if control == FrameControl::Halt {
                tracing::info!("animation frames stopped");
                return;
            }

            // Recursively schedule next frame
            let next = slot_clone.borrow();
            if let Some(closure) = next.as_ref() {
                if let Err(err) = window.request_animation_frame(closure.as_ref().unchecked_ref()) {
                    tracing::error!(?err, "requestAnimationFrame failed");
                }
            }
        }) as Box<dyn FnMut()>));

        if let Some(closure) = slot.borrow().as_ref() {
            if let Err(err) = self.window.request_animation_frame(closure.as_ref().unchecked_ref()) {
                tracing::error!(?err, "requestAnimationFrame failed on start");
            }
        }

        // Leak the closure to keep it alive for the page lifetime
        std::mem::forget(slot);
    }
}

/// `window.innerWidth` x `window.innerHeight`
pub struct WindowViewport {
    window: Window,
}

impl WindowViewport {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl Viewport for WindowViewport {
    fn size(&self) -> (u32, u32) {
        let dim = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).map_or(0, |v| v.max(0.0) as u32);
        (dim(self.window.inner_width()), dim(self.window.inner_height()))
    }
}

/// Hides the loading screen element.
pub struct DomPresentation {
    loading_screen: Option<HtmlElement>,
}

impl DomPresentation {
    pub fn new(document: &Document, loading_screen_id: &str) -> Self {
        let loading_screen = document
            .get_element_by_id(loading_screen_id)
            .and_then(|el| el.dyn_into::<HtmlElement>().ok());
        if loading_screen.is_none() {
            tracing::warn!(id = loading_screen_id, "loading screen element not found");
        }
        Self { loading_screen }
    }
}

impl Presentation for DomPresentation {
    fn dismiss_loading_screen(&mut self) {
        if let Some(el) = &self.loading_screen {
            if let Err(err) = el.style().set_property("display", "none") {
                tracing::warn!(?err, "could not hide loading screen");
            }
        }
    }
}

/// Offer the session log as a text file download.
pub fn download_log(document: &Document, logger: &dyn Logger, file_name: &str) -> Result<(), JsValue> {
    let bytes = logger.export_buffer();
    let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes.as_slice()));
    let options = BlobPropertyBag::new();
    options.set_type("text/plain");
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;

    let url = Url::create_object_url_with_blob(&blob)?;
    let anchor = document
        .create_element("a")?
        .dyn_into::<HtmlAnchorElement>()
        .map_err(|_| js_error("failed to create download link"))?;
    anchor.set_href(&url);
    anchor.set_download(file_name);
    anchor.click();
    Url::revoke_object_url(&url)?;

    tracing::debug!(bytes = bytes.len(), file_name, "session log exported");
    Ok(())
}
