use std::rc::Rc;
use std::sync::Arc;

use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{Key, NamedKey},
    window::{CursorGrabMode, Window},
};

// Import from the library crate
use whispers::{
    controller::{
        FirstPersonPlayer, HauntedHouseLevel, InputEvent, InputProcessor, InputState, Platform, PlayerSettings,
        PumpScheduler, SharedInput, WanderingGhost,
    },
    logging,
    model::clock::InstantTime,
    model::TimeSource,
    view::{LogOnlyPresentation, SharedViewport, WgpuBackend},
    LogBuffer, Logger, LoopState, RuntimeConfig, RuntimeLoop,
};

type NativeLoop = RuntimeLoop<WgpuBackend, FirstPersonPlayer, WanderingGhost, HauntedHouseLevel>;

/// Browser-style key names so the same bindings work in both front-ends.
fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Character(s) => Some(s.to_string()),
        Key::Named(named) => match named {
            NamedKey::Enter => Some("Enter".into()),
            NamedKey::Shift => Some("Shift".into()),
            NamedKey::Escape => Some("Escape".into()),
            NamedKey::Space => Some(" ".into()),
            NamedKey::ArrowUp => Some("ArrowUp".into()),
            NamedKey::ArrowDown => Some("ArrowDown".into()),
            NamedKey::ArrowLeft => Some("ArrowLeft".into()),
            NamedKey::ArrowRight => Some("ArrowRight".into()),
            _ => None,
        },
        _ => None,
    }
}

fn set_pointer_lock(window: &Window, input: &SharedInput, locked: bool) {
    let grab = if locked {
        window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
    } else {
        window.set_cursor_grab(CursorGrabMode::None)
    };
    if let Err(err) = grab {
        tracing::warn!(%err, locked, "cursor grab change failed");
        return;
    }
    window.set_cursor_visible(!locked);
    input.borrow_mut().process_event(&InputEvent::PointerLockChanged { locked });
}

fn start_game(runtime: &NativeLoop, window: &Window, input: &SharedInput) {
    // clicking back into a running game only re-grabs the cursor
    if runtime.state() == LoopState::Running {
        set_pointer_lock(window, input, true);
        return;
    }
    match runtime.start() {
        Ok(()) => set_pointer_lock(window, input, true),
        Err(err) => tracing::debug!(%err, "start ignored"),
    }
}

fn main() -> anyhow::Result<()> {
    logging::init();

    let config = RuntimeConfig::default();
    let event_loop = EventLoop::new()?;
    let window_attributes = Window::default_attributes()
        .with_title("Whispers in Dane County")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
    #[allow(deprecated)]
    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let time: Rc<dyn TimeSource> = Rc::new(InstantTime::new());
    let logger = Rc::new(LogBuffer::new(time.clone()));
    let size = window.inner_size();
    let viewport = SharedViewport::new(size.width, size.height);
    let scheduler = PumpScheduler::new();
    let input = InputState::shared();
    let processor = InputProcessor::default();

    let backend = match pollster::block_on(WgpuBackend::connect_window(window.clone(), &config.dom.canvas)) {
        Ok(backend) => backend,
        Err(err) => {
            logger.record_error(&err);
            return Err(err.into());
        }
    };

    let platform = Platform {
        scheduler: Box::new(scheduler.clone()),
        viewport: Box::new(viewport.clone()),
        presentation: Box::new(LogOnlyPresentation),
        logger: logger.clone(),
        time,
    };
    let log_file_name = config.dom.log_file_name.clone();
    let player = FirstPersonPlayer::new(input.clone(), PlayerSettings::default());
    let runtime: NativeLoop = RuntimeLoop::new(
        config,
        backend,
        player,
        WanderingGhost::default(),
        HauntedHouseLevel::default(),
        platform,
    );

    // failures are already in the session log
    if let Err(err) = pollster::block_on(runtime.initialize()) {
        tracing::error!(%err, "initialization did not complete");
    }
    tracing::info!("press Enter or click to begin, L saves the session log");

    #[allow(deprecated)]
    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { ref event, window_id } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(physical_size) => {
                viewport.set(physical_size.width, physical_size.height);
                // errors are recorded by the runtime
                let _ = runtime.on_resize(physical_size.width, physical_size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let Some(key) = key_name(&event.logical_key) else {
                    return;
                };
                if event.state == ElementState::Released {
                    input.borrow_mut().process_event(&InputEvent::KeyUp(key));
                    return;
                }
                if processor.wants_to_start(&key) {
                    start_game(&runtime, &window, &input);
                } else if processor.wants_log_export(&key) {
                    match std::fs::write(&log_file_name, logger.export_buffer()) {
                        Ok(()) => tracing::info!(file = %log_file_name, "session log written"),
                        Err(err) => tracing::error!(%err, "could not write session log"),
                    }
                } else if key == "Escape" {
                    set_pointer_lock(&window, &input, false);
                }
                input.borrow_mut().process_event(&InputEvent::KeyDown(key));
            }
            WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => {
                start_game(&runtime, &window, &input);
            }
            WindowEvent::Focused(false) => {
                input.borrow_mut().process_event(&InputEvent::FocusLost);
            }
            WindowEvent::RedrawRequested => {
                scheduler.pump();
            }
            _ => {}
        },
        Event::DeviceEvent { event: DeviceEvent::MouseMotion { delta }, .. } => {
            input
                .borrow_mut()
                .process_event(&InputEvent::MouseMove { dx: delta.0 as f32, dy: delta.1 as f32 });
        }
        Event::AboutToWait => {
            window.request_redraw();
        }
        _ => {}
    })?;

    Ok(())
}
