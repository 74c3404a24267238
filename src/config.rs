use std::path::PathBuf;

use glam::Vec4;

/// Environment variable naming an asset directory to load shaders and textures from.
pub const ASSETS_ENV: &str = "STRATUM_ASSETS";

/// Configuration for the window, camera projection and input mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub clear_color: [f32; 4],
    pub ambient: Vec4,
    /// Pixels of mouse movement per radian of camera rotation.
    pub mouse_sensitivity: f32,
    /// Wheel lines per unit of zoom.
    pub zoom_sensitivity: f32,
    /// Camera movement per frame while a movement key is held.
    pub move_step: f32,
    /// Directory to load assets from. Falls back to the embedded assets when unset.
    pub asset_dir: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "Stratum".to_string(),
            width: 1280,
            height: 720,
            fov: std::f32::consts::FRAC_PI_3,
            near: 0.01,
            far: 100.0,
            clear_color: [0.4, 0.2, 0.4, 1.0],
            ambient: Vec4::new(0.4, 0.4, 0.4, 1.0),
            mouse_sensitivity: 200.0,
            zoom_sensitivity: 100.0,
            move_step: 0.05,
            asset_dir: None,
        }
    }
}

impl RendererConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the asset directory taken from [`ASSETS_ENV`] if set.
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var_os(ASSETS_ENV) {
            Some(dir) if !dir.is_empty() => config.asset_dir(dir),
            _ => config,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the projection's field of view and clip planes.
    pub fn projection(mut self, fov: f32, near: f32, far: f32) -> Self {
        self.fov = fov;
        self.near = near;
        self.far = far;
        self
    }

    pub fn clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn ambient(mut self, ambient: Vec4) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn sensitivity(mut self, mouse: f32, zoom: f32, move_step: f32) -> Self {
        self.mouse_sensitivity = mouse;
        self.zoom_sensitivity = zoom;
        self.move_step = move_step;
        self
    }

    pub fn asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo() {
        let config = RendererConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.clear_color, [0.4, 0.2, 0.4, 1.0]);
        assert_eq!(config.ambient, Vec4::new(0.4, 0.4, 0.4, 1.0));
        assert!(config.asset_dir.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = RendererConfig::new()
            .title("test")
            .size(640, 480)
            .projection(1.0, 0.1, 50.0)
            .asset_dir("assets");
        assert_eq!(config.title, "test");
        assert_eq!(config.width, 640);
        assert_eq!(config.near, 0.1);
        assert_eq!(config.asset_dir, Some(PathBuf::from("assets")));
    }
}
