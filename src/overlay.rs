//! The UI overlay: an explicit per-frame UI state and the panel that edits it.
//!
//! Every frame the renderer hands the overlay a [`UiState`] seeded from the scene, lets
//! it react to the keys pressed this frame, and applies the result back to the scene.
//! Nothing here touches the device; the overlay only produces [`OverlayQuad`]s that the
//! overlay pass draws on top of the frame.

use std::collections::HashSet;

use glam::Vec4;
use winit::keyboard::KeyCode;

use crate::device::{Extent, OverlayQuad};
use crate::scene::{Light, LightSet};

/// UI-controlled settings, rebuilt every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct UiState {
    pub use_normal_maps: bool,
    pub show_normals: bool,
    /// Draw the red translucent quad before the blue one.
    pub red_first: bool,
    /// Editable copy of the scene's lights.
    pub lights: Vec<Light>,
    /// Light currently targeted by edits.
    pub selected: usize,
    /// Push a default light this frame.
    pub add_light: bool,
    /// Pop the most recent light this frame.
    pub remove_light: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            use_normal_maps: true,
            show_normals: false,
            red_first: true,
            lights: Vec::new(),
            selected: 0,
            add_light: false,
            remove_light: false,
        }
    }
}

impl UiState {
    /// Clears one-shot requests after they have been applied.
    pub fn clear_requests(&mut self) {
        self.add_light = false;
        self.remove_light = false;
    }
}

/// Input visible to the overlay for one frame.
#[derive(Clone, Copy, Debug)]
pub struct InputSnapshot<'a> {
    /// Keys that went down since the last frame.
    pub pressed: &'a HashSet<KeyCode>,
    /// Whether an Alt key is held.
    pub alt: bool,
    pub extent: Extent,
}

/// Something that edits the UI state and draws itself as flat quads.
pub trait Overlay {
    /// Reacts to this frame's input, mutating `state`.
    fn build(&mut self, state: &mut UiState, input: &InputSnapshot<'_>);

    /// Quads to draw for the state seen by the last [`build`](Self::build).
    fn quads(&self) -> Vec<OverlayQuad>;
}

/// An overlay that draws nothing and leaves the state alone.
#[derive(Default)]
pub struct NoOverlay;

impl Overlay for NoOverlay {
    fn build(&mut self, _state: &mut UiState, _input: &InputSnapshot<'_>) {}

    fn quads(&self) -> Vec<OverlayQuad> {
        Vec::new()
    }
}

/// RGBA color for overlay quads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const PANEL_BG: Color = Color::rgba(0.1, 0.1, 0.1, 0.85);
    pub const BORDER: Color = Color::rgba(0.4, 0.4, 0.4, 1.0);
    pub const HIGHLIGHT: Color = Color::rgba(1.0, 0.85, 0.3, 1.0);
    pub const ON: Color = Color::rgba(0.3, 0.8, 0.4, 1.0);
    pub const OFF: Color = Color::rgba(0.3, 0.3, 0.3, 1.0);

    fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

const MARGIN: f32 = 12.0;
const PADDING: f32 = 8.0;
const SWATCH: f32 = 18.0;
const ROW: f32 = SWATCH + 6.0;
const PANEL_WIDTH: f32 = 3.0 * ROW + 2.0 * PADDING;

/// Position step for one key press, in world units.
const MOVE_STEP: f32 = 0.25;
/// Color step for one key press. Channels wrap back to 0 past 1.
const COLOR_STEP: f32 = 0.25;

/// Keyboard-driven settings panel in the top-right corner.
///
/// | Key                      | Effect                                  |
/// |--------------------------|-----------------------------------------|
/// | `N`                      | toggle normal maps                      |
/// | `V`                      | toggle normal visualisation             |
/// | `T`                      | toggle red-first translucent order      |
/// | `+` / `-`                | add / remove a light                    |
/// | `1`-`9`, `0`             | select light 1-10                       |
/// | `Alt` + arrows           | move the selected light in X / Y        |
/// | `Alt` + PageUp/PageDown  | move the selected light in Z            |
/// | `R` / `G` / `B`          | cycle a color channel of the light      |
#[derive(Default)]
pub struct ControlPanel {
    quads: Vec<OverlayQuad>,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_keys(state: &mut UiState, input: &InputSnapshot<'_>) {
        let pressed = |key| input.pressed.contains(&key);

        if pressed(KeyCode::KeyN) {
            state.use_normal_maps = !state.use_normal_maps;
        }
        if pressed(KeyCode::KeyV) {
            state.show_normals = !state.show_normals;
        }
        if pressed(KeyCode::KeyT) {
            state.red_first = !state.red_first;
        }
        if pressed(KeyCode::Equal) || pressed(KeyCode::NumpadAdd) {
            state.add_light = true;
        }
        if pressed(KeyCode::Minus) || pressed(KeyCode::NumpadSubtract) {
            state.remove_light = true;
        }

        const DIGITS: [KeyCode; 10] = [
            KeyCode::Digit1,
            KeyCode::Digit2,
            KeyCode::Digit3,
            KeyCode::Digit4,
            KeyCode::Digit5,
            KeyCode::Digit6,
            KeyCode::Digit7,
            KeyCode::Digit8,
            KeyCode::Digit9,
            KeyCode::Digit0,
        ];
        if let Some(index) = DIGITS.iter().position(|key| pressed(*key)) {
            state.selected = index;
        }

        let Some(light) = state.lights.get_mut(state.selected) else {
            return;
        };

        if input.alt {
            let mut delta = Vec4::ZERO;
            if pressed(KeyCode::ArrowLeft) {
                delta.x -= MOVE_STEP;
            }
            if pressed(KeyCode::ArrowRight) {
                delta.x += MOVE_STEP;
            }
            if pressed(KeyCode::ArrowUp) {
                delta.y += MOVE_STEP;
            }
            if pressed(KeyCode::ArrowDown) {
                delta.y -= MOVE_STEP;
            }
            if pressed(KeyCode::PageUp) {
                delta.z += MOVE_STEP;
            }
            if pressed(KeyCode::PageDown) {
                delta.z -= MOVE_STEP;
            }
            light.position += delta;
        }

        for (key, channel) in [(KeyCode::KeyR, 0), (KeyCode::KeyG, 1), (KeyCode::KeyB, 2)] {
            if pressed(key) {
                let value = light.color[channel] + COLOR_STEP;
                light.color[channel] = if value > 1.0 + f32::EPSILON { 0.0 } else { value };
            }
        }

        *light = light.clamped();
    }

    fn layout(state: &UiState, extent: Extent) -> Vec<OverlayQuad> {
        let rows = 1 + state.lights.len().min(LightSet::CAPACITY);
        let height = rows as f32 * ROW + 2.0 * PADDING;
        let x = (extent.width as f32 - PANEL_WIDTH - MARGIN).max(0.0);
        let y = MARGIN;

        let mut quads = Vec::with_capacity(2 + 3 + rows * 2);
        let quad = |x, y, width, height, color: Color| OverlayQuad {
            x,
            y,
            width,
            height,
            color: color.to_array(),
        };

        // border, then background inset by one pixel
        quads.push(quad(x - 1.0, y - 1.0, PANEL_WIDTH + 2.0, height + 2.0, Color::BORDER));
        quads.push(quad(x, y, PANEL_WIDTH, height, Color::PANEL_BG));

        let flags = [state.use_normal_maps, state.show_normals, state.red_first];
        for (i, on) in flags.into_iter().enumerate() {
            let color = if on { Color::ON } else { Color::OFF };
            quads.push(quad(x + PADDING + i as f32 * ROW, y + PADDING, SWATCH, SWATCH, color));
        }

        for (i, light) in state.lights.iter().take(LightSet::CAPACITY).enumerate() {
            let row_y = y + PADDING + (i + 1) as f32 * ROW;
            if i == state.selected {
                quads.push(quad(
                    x + PADDING - 2.0,
                    row_y - 2.0,
                    SWATCH + 4.0,
                    SWATCH + 4.0,
                    Color::HIGHLIGHT,
                ));
            }
            let c = light.color;
            quads.push(quad(
                x + PADDING,
                row_y,
                SWATCH,
                SWATCH,
                Color::rgba(c.x, c.y, c.z, 1.0),
            ));
        }

        quads
    }
}

impl Overlay for ControlPanel {
    fn build(&mut self, state: &mut UiState, input: &InputSnapshot<'_>) {
        Self::handle_keys(state, input);
        self.quads = Self::layout(state, input.extent);
    }

    fn quads(&self) -> Vec<OverlayQuad> {
        self.quads.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(keys: &[KeyCode], alt: bool) -> (HashSet<KeyCode>, bool) {
        (keys.iter().copied().collect(), alt)
    }

    fn build(panel: &mut ControlPanel, state: &mut UiState, keys: &[KeyCode], alt: bool) {
        let (pressed, alt) = snapshot(keys, alt);
        let input = InputSnapshot {
            pressed: &pressed,
            alt,
            extent: Extent {
                width: 800,
                height: 600,
            },
        };
        panel.build(state, &input);
    }

    #[test]
    fn default_state_matches_startup_settings() {
        let state = UiState::default();
        assert!(state.use_normal_maps);
        assert!(!state.show_normals);
        assert!(state.red_first);
        assert!(state.lights.is_empty());
    }

    #[test]
    fn toggles_flip_once_per_press() {
        let mut panel = ControlPanel::new();
        let mut state = UiState::default();
        build(&mut panel, &mut state, &[KeyCode::KeyN, KeyCode::KeyT], false);
        assert!(!state.use_normal_maps);
        assert!(!state.red_first);
        assert!(!state.show_normals);
    }

    #[test]
    fn plus_and_minus_request_light_changes() {
        let mut panel = ControlPanel::new();
        let mut state = UiState::default();
        build(&mut panel, &mut state, &[KeyCode::Equal], false);
        assert!(state.add_light);
        state.clear_requests();
        build(&mut panel, &mut state, &[KeyCode::Minus], false);
        assert!(state.remove_light && !state.add_light);
    }

    #[test]
    fn edits_are_clamped() {
        let mut panel = ControlPanel::new();
        let mut state = UiState {
            lights: vec![Light {
                position: Vec4::new(3.9, 0.0, 0.0, 1.0),
                color: Vec4::new(1.0, 0.5, 0.0, 1.0),
            }],
            ..UiState::default()
        };

        build(&mut panel, &mut state, &[KeyCode::ArrowRight, KeyCode::KeyR, KeyCode::KeyG], true);
        let light = state.lights[0];
        assert_eq!(light.position.x, 4.0);
        assert_eq!(light.color.x, 0.0, "red wraps past 1");
        assert_eq!(light.color.y, 0.75);
    }

    #[test]
    fn arrows_without_alt_leave_lights_alone() {
        let mut panel = ControlPanel::new();
        let light = Light::default();
        let mut state = UiState {
            lights: vec![light],
            ..UiState::default()
        };
        build(&mut panel, &mut state, &[KeyCode::ArrowUp], false);
        assert_eq!(state.lights[0], light);
    }

    #[test]
    fn panel_grows_with_lights_and_highlights_selection() {
        let mut panel = ControlPanel::new();
        let mut state = UiState::default();
        build(&mut panel, &mut state, &[], false);
        let empty = panel.quads().len();

        state.lights = vec![Light::default(); 2];
        build(&mut panel, &mut state, &[KeyCode::Digit2], false);
        assert_eq!(state.selected, 1);
        // one swatch per light plus the selection highlight
        assert_eq!(panel.quads().len(), empty + 3);
        assert!(panel.quads().iter().all(|q| q.x + q.width <= 800.0));
    }
}
