//! Keyboard and mouse-look state shared by both front-ends.
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use glam::Vec2;

#[derive(Debug, Clone)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    MouseMove { dx: f32, dy: f32 },
    FocusLost,
    VisibilityChanged { visible: bool },
    PointerLockChanged { locked: bool },
}

/// Input shared between the event listeners and the player.
pub type SharedInput = Rc<RefCell<InputState>>;

#[derive(Debug, Default)]
pub struct InputState {
    pub pressed_keys: HashSet<String>,
    pub look_delta: (f32, f32),
    pub pointer_locked: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedInput {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.pressed_keys.insert(normalize_key(key));
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(normalize_key(key).as_str());
            }
            InputEvent::MouseMove { dx, dy } => {
                if self.pointer_locked {
                    self.look_delta.0 += dx;
                    self.look_delta.1 += dy;
                }
            }
            InputEvent::FocusLost | InputEvent::VisibilityChanged { .. } => {
                self.clear_keys();
            }
            InputEvent::PointerLockChanged { locked } => {
                self.pointer_locked = *locked;
                if !locked {
                    self.look_delta = (0.0, 0.0);
                }
            }
        }
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }

    pub fn clear_keys(&mut self) {
        self.pressed_keys.clear();
    }

    pub fn consume_look(&mut self) -> (f32, f32) {
        std::mem::take(&mut self.look_delta)
    }
}

/// Single letters are stored lowercase so Shift+W still walks forward.
fn normalize_key(key: &str) -> String {
    if key.chars().count() == 1 {
        key.to_lowercase()
    } else {
        key.to_string()
    }
}

/// Key mapping configuration
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub forward: String,
    pub backward: String,
    pub left: String,
    pub right: String,
    pub sprint: String,
    pub start: String,
    pub export_log: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: "w".to_string(),
            backward: "s".to_string(),
            left: "a".to_string(),
            right: "d".to_string(),
            sprint: "Shift".to_string(),
            start: "Enter".to_string(),
            export_log: "l".to_string(),
        }
    }
}

/// High-level input queries over an `InputState`
#[derive(Debug, Clone, Default)]
pub struct InputProcessor {
    bindings: KeyBindings,
}

impl InputProcessor {
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    /// A direction is held through its binding or the matching arrow key.
    fn held(input: &InputState, binding: &str, arrow: &str) -> bool {
        input.is_key_pressed(binding) || input.is_key_pressed(arrow)
    }

    pub fn is_sprinting(&self, input: &InputState) -> bool {
        input.is_key_pressed(&self.bindings.sprint)
    }

    /// Movement intent in camera-local axes: x = strafe right, y = forward.
    /// Opposing keys cancel; the result is unit length or zero.
    pub fn wish_direction(&self, input: &InputState) -> Vec2 {
        let axis = |positive: bool, negative: bool| (positive as i8 - negative as i8) as f32;
        let b = &self.bindings;
        Vec2::new(
            axis(Self::held(input, &b.right, "ArrowRight"), Self::held(input, &b.left, "ArrowLeft")),
            axis(Self::held(input, &b.forward, "ArrowUp"), Self::held(input, &b.backward, "ArrowDown")),
        )
        .normalize_or_zero()
    }

    /// Keys whose browser default (scrolling) should be suppressed.
    pub fn is_movement_key(&self, key: &str) -> bool {
        let key = normalize_key(key);
        [&self.bindings.forward, &self.bindings.backward, &self.bindings.left, &self.bindings.right]
            .iter()
            .any(|bound| **bound == key)
            || matches!(key.as_str(), "ArrowUp" | "ArrowDown" | "ArrowLeft" | "ArrowRight" | " ")
    }

    pub fn wants_to_start(&self, key: &str) -> bool {
        key == self.bindings.start
    }

    pub fn wants_log_export(&self, key: &str) -> bool {
        key.eq_ignore_ascii_case(&self.bindings.export_log)
    }
}

#[cfg(target_arch = "wasm32")]
impl InputEvent {
    pub fn from_keyboard(e: &web_sys::KeyboardEvent, pressed: bool) -> Self {
        if pressed {
            InputEvent::KeyDown(e.key())
        } else {
            InputEvent::KeyUp(e.key())
        }
    }

    /// Uses `movementX/Y`, which only reports deltas while the pointer is locked.
    pub fn from_mouse_move(e: &web_sys::MouseEvent) -> Self {
        InputEvent::MouseMove { dx: e.movement_x() as f32, dy: e.movement_y() as f32 }
    }
}
