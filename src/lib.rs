// Re-export all public modules so they can be used from main.rs
pub mod config;
pub mod error;
pub mod logging;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

#[cfg(test)]
mod testing;

pub use config::RuntimeConfig;
pub use controller::{LoopState, RuntimeLoop};
pub use error::{BackendError, FrameError, InitError, LifecycleError};
pub use logging::{LogBuffer, Logger};

#[cfg(target_arch = "wasm32")]
mod web {
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
    use web_sys::{Document, Event, HtmlCanvasElement, HtmlElement, KeyboardEvent, MouseEvent, Window};

    use crate::config::{DomIds, RuntimeConfig};
    use crate::controller::{
        FirstPersonPlayer, HauntedHouseLevel, InputEvent, InputProcessor, InputState, Platform, PlayerSettings,
        RuntimeLoop, SharedInput, WanderingGhost,
    };
    use crate::logging::{self, LogBuffer, Logger};
    use crate::model::clock::PerformanceTime;
    use crate::model::TimeSource;
    use crate::view::dom::{download_log, js_error, AnimationFrameScheduler, DomPresentation, WindowViewport};
    use crate::view::WgpuBackend;

    type WebLoop = RuntimeLoop<WgpuBackend, FirstPersonPlayer, WanderingGhost, HauntedHouseLevel>;

    #[wasm_bindgen(start)]
    pub fn start() -> Result<(), JsValue> {
        logging::init();

        let window = web_sys::window().ok_or(js_error("no global `window`"))?;
        let document = window.document().ok_or(js_error("no document on window"))?;
        let time: Rc<dyn TimeSource> =
            Rc::new(PerformanceTime::new(&window).ok_or(js_error("performance timer unavailable"))?);
        let logger = Rc::new(LogBuffer::new(time.clone()));
        let config = RuntimeConfig::default();
        let input = InputState::shared();

        setup_input_listeners(&document, &window, &config.dom.canvas, input.clone())?;
        setup_download_button(&document, logger.clone(), &config)?;

        let launch = {
            let window = window.clone();
            let document = document.clone();
            move || {
                wasm_bindgen_futures::spawn_local(run(window, document, config, logger, time, input));
            }
        };

        // the module may finish loading after the page did
        if document.ready_state() == "complete" {
            launch();
        } else {
            let on_load = Closure::once(launch);
            window.add_event_listener_with_callback("load", on_load.as_ref().unchecked_ref())?;
            on_load.forget();
        }
        Ok(())
    }

    async fn run(
        window: Window,
        document: Document,
        config: RuntimeConfig,
        logger: Rc<LogBuffer>,
        time: Rc<dyn TimeSource>,
        input: SharedInput,
    ) {
        let backend = match WgpuBackend::connect_canvas(&document, &config.dom.canvas).await {
            Ok(backend) => backend,
            Err(err) => {
                logger.record_error(&err);
                return;
            }
        };

        let platform = Platform {
            scheduler: Box::new(AnimationFrameScheduler::new(window.clone())),
            viewport: Box::new(WindowViewport::new(window.clone())),
            presentation: Box::new(DomPresentation::new(&document, &config.dom.loading_screen)),
            logger,
            time,
        };
        let dom = config.dom.clone();
        let player = FirstPersonPlayer::new(input, PlayerSettings::default());
        let runtime: Rc<WebLoop> = Rc::new(RuntimeLoop::new(
            config,
            backend,
            player,
            WanderingGhost::default(),
            HauntedHouseLevel::default(),
            platform,
        ));

        if let Err(err) = setup_runtime_listeners(&window, &document, &dom, runtime.clone()) {
            tracing::error!(?err, "failed to install page listeners");
        }

        // failures are already in the session log
        if let Err(err) = runtime.initialize().await {
            tracing::error!(%err, "initialization did not complete");
        }
    }

    fn setup_runtime_listeners(window: &Window, document: &Document, dom: &DomIds, runtime: Rc<WebLoop>) -> Result<(), JsValue> {
        // Loading screen click starts the game
        if let Some(screen) = document.get_element_by_id(&dom.loading_screen) {
            let runtime = runtime.clone();
            let click = Closure::wrap(Box::new(move |_e: MouseEvent| {
                if let Err(err) = runtime.start() {
                    tracing::debug!(%err, "start ignored");
                }
            }) as Box<dyn FnMut(MouseEvent)>);
            screen.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
            click.forget();
        }

        // Window resize
        {
            let window_for_size = window.clone();
            let document = document.clone();
            let canvas_id = dom.canvas.clone();
            let resize = Closure::wrap(Box::new(move |_e: Event| {
                let dim = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).map_or(0, |v| v as u32);
                let width = dim(window_for_size.inner_width());
                let height = dim(window_for_size.inner_height());
                if let Some(canvas) = document
                    .get_element_by_id(&canvas_id)
                    .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
                {
                    canvas.set_width(width.max(1));
                    canvas.set_height(height.max(1));
                }
                // errors are recorded by the runtime
                let _ = runtime.on_resize(width, height);
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref())?;
            resize.forget();
        }

        Ok(())
    }

    fn setup_download_button(document: &Document, logger: Rc<LogBuffer>, config: &RuntimeConfig) -> Result<(), JsValue> {
        let Some(button) = document.get_element_by_id(&config.dom.download_log) else {
            tracing::warn!(id = %config.dom.download_log, "download button not found");
            return Ok(());
        };
        let document = document.clone();
        let file_name = config.dom.log_file_name.clone();
        let click = Closure::wrap(Box::new(move |_e: MouseEvent| {
            if let Err(err) = download_log(&document, &*logger, &file_name) {
                tracing::error!(?err, "log download failed");
            }
        }) as Box<dyn FnMut(MouseEvent)>);
        button.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
        click.forget();
        Ok(())
    }

    /// Keyboard, mouse-look and pointer lock listeners feeding the shared input
    fn setup_input_listeners(
        document: &Document,
        window: &Window,
        canvas_id: &str,
        input: SharedInput,
    ) -> Result<(), JsValue> {
        let processor = InputProcessor::default();

        // Keyboard down
        {
            let input = input.clone();
            let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                let key = e.key();
                if processor.is_movement_key(&key) {
                    e.prevent_default();
                }
                input.borrow_mut().process_event(&InputEvent::from_keyboard(&e, true));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
            keydown.forget();
        }

        // Keyboard up
        {
            let input = input.clone();
            let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                input.borrow_mut().process_event(&InputEvent::from_keyboard(&e, false));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
            keyup.forget();
        }

        // Focus loss - clear all keys
        {
            let input = input.clone();
            let blur = Closure::wrap(Box::new(move |_e: Event| {
                input.borrow_mut().process_event(&InputEvent::FocusLost);
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
            blur.forget();
        }

        // Pointer lock change
        {
            let input = input.clone();
            let doc = document.clone();
            let plc = Closure::wrap(Box::new(move |_e: Event| {
                let locked = doc.pointer_lock_element().is_some();
                input.borrow_mut().process_event(&InputEvent::PointerLockChanged { locked });
            }) as Box<dyn FnMut(Event)>);
            document.add_event_listener_with_callback("pointerlockchange", plc.as_ref().unchecked_ref())?;
            plc.forget();
        }

        // Canvas click to enter pointer lock
        if let Some(canvas) = document.get_element_by_id(canvas_id) {
            let target = canvas.clone();
            let click = Closure::wrap(Box::new(move |_e: MouseEvent| {
                if let Ok(el) = target.clone().dyn_into::<HtmlElement>() {
                    el.request_pointer_lock();
                }
            }) as Box<dyn FnMut(MouseEvent)>);
            canvas.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
            click.forget();
        }

        // Mouse move
        {
            let mm = Closure::wrap(Box::new(move |e: MouseEvent| {
                input.borrow_mut().process_event(&InputEvent::from_mouse_move(&e));
            }) as Box<dyn FnMut(MouseEvent)>);
            document.add_event_listener_with_callback("mousemove", mm.as_ref().unchecked_ref())?;
            mm.forget();
        }

        Ok(())
    }
}
