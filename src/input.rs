use std::collections::HashSet;

use glam::Vec3;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Per-frame source of camera input.
///
/// The frame pipeline reads the mouse once per frame and then the key set. A source
/// whose keyboard is unavailable returns `None` from [`read_keys`](Self::read_keys), in
/// which case keyboard movement is skipped for that frame.
pub trait InputSource {
    /// Mouse movement since the last read: `x`/`y` in pixels, `z` in wheel lines.
    fn read_mouse(&mut self) -> Vec3;

    /// Keys currently held down.
    fn read_keys(&mut self) -> Option<&HashSet<KeyCode>>;

    /// Keys pressed since the last frame (edge-triggered). Used by the overlay.
    fn pressed_keys(&self) -> &HashSet<KeyCode>;

    /// Clears the per-frame state. Called at the end of every frame.
    fn end_frame(&mut self) {}
}

/// Tracks keyboard and mouse state from winit window events.
pub struct Input {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    mouse_position: Option<(f32, f32)>,
    mouse_delta: Vec3,
    /// When false, the mouse only rotates while the left button is held.
    free_look: bool,
    dragging: bool,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            keys_down: HashSet::new(),
            keys_pressed: HashSet::new(),
            mouse_position: None,
            mouse_delta: Vec3::ZERO,
            free_look: false,
            dragging: false,
        }
    }
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every cursor movement, not just drags.
    pub fn free_look(mut self, enabled: bool) -> Self {
        self.free_look = enabled;
        self
    }

    /// Process a window event and update input state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => {
                            if self.keys_down.insert(key) {
                                self.keys_pressed.insert(key);
                            }
                        }
                        ElementState::Released => {
                            self.keys_down.remove(&key);
                        }
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if *button == winit::event::MouseButton::Left {
                    self.dragging = *state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let new_pos = (position.x as f32, position.y as f32);
                if let Some((x, y)) = self.mouse_position {
                    if self.free_look || self.dragging {
                        self.mouse_delta.x += new_pos.0 - x;
                        self.mouse_delta.y += new_pos.1 - y;
                    }
                }
                self.mouse_position = Some(new_pos);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.mouse_delta.z += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
            }
            WindowEvent::Focused(false) => {
                self.keys_down.clear();
                self.dragging = false;
            }
            _ => {}
        }
    }

    /// Returns true if the key is currently held down.
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }
}

impl InputSource for Input {
    fn read_mouse(&mut self) -> Vec3 {
        std::mem::take(&mut self.mouse_delta)
    }

    fn read_keys(&mut self) -> Option<&HashSet<KeyCode>> {
        Some(&self.keys_down)
    }

    fn pressed_keys(&self) -> &HashSet<KeyCode> {
        &self.keys_pressed
    }

    fn end_frame(&mut self) {
        self.keys_pressed.clear();
    }
}

/// Input source with no devices attached: no movement, no keyboard.
#[derive(Default)]
pub struct NoInput {
    none: HashSet<KeyCode>,
}

impl InputSource for NoInput {
    fn read_mouse(&mut self) -> Vec3 {
        Vec3::ZERO
    }

    fn read_keys(&mut self) -> Option<&HashSet<KeyCode>> {
        None
    }

    fn pressed_keys(&self) -> &HashSet<KeyCode> {
        &self.none
    }
}

/// Camera movement requested by a key set: `(strafe, forward, vertical)`.
///
/// Each held key contributes a fixed `step`; opposing keys cancel out.
pub fn movement_from_keys(keys: &HashSet<KeyCode>, step: f32) -> Vec3 {
    let held = |a: KeyCode, b: Option<KeyCode>| keys.contains(&a) || b.is_some_and(|b| keys.contains(&b));
    let mut movement = Vec3::ZERO;

    if held(KeyCode::ArrowUp, Some(KeyCode::KeyW)) {
        movement.y += step;
    }
    if held(KeyCode::ArrowDown, Some(KeyCode::KeyS)) {
        movement.y -= step;
    }
    if held(KeyCode::ArrowLeft, Some(KeyCode::KeyA)) {
        movement.x += step;
    }
    if held(KeyCode::ArrowRight, Some(KeyCode::KeyD)) {
        movement.x -= step;
    }
    if held(KeyCode::ControlLeft, None) {
        movement.z -= step;
    }
    if held(KeyCode::ShiftLeft, None) {
        movement.z += step;
    }

    movement
}
