//! The frame pipeline: renderer lifecycle and the per-frame draw sequence.
//!
//! A [`Renderer`] walks through a small state machine:
//!
//! ```text
//! Uninitialized --init--> DeviceReady --scene built--> SceneReady --first frame--> Running
//!        \___________________\________________________\____________________\__ shutdown --> Shutdown
//! ```
//!
//! Every frame runs the same fixed sequence: input and UI, animation, object updates,
//! frame constants, then the opaque, sky, translucent and overlay passes, and finally
//! present. Depth is reversed (cleared to 0, nearer is greater), which is why the sky
//! can sit at depth 0 and still lose to every opaque fragment.

use std::time::Instant;

use winit::keyboard::KeyCode;

use crate::assets::{AssetSource, DirectoryAssets, EmbeddedAssets};
use crate::camera::{Camera, reversed_perspective};
use crate::config::RendererConfig;
use crate::device::{BufferId, Device, Extent, PassKind};
use crate::drawable::Drawable;
use crate::error::{FrameError, RenderError};
use crate::input::{InputSource, movement_from_keys};
use crate::overlay::{ControlPanel, InputSnapshot, Overlay, UiState};
use crate::scene::{FrameConstants, Scene};
use crate::sky::{SkyBackdrop, sky_radius};

/// Lifecycle state of a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    DeviceReady,
    SceneReady,
    Running,
    /// Terminal. Nothing can be done with the renderer after this.
    Shutdown,
}

/// Owns the device, the scene and everything needed to draw a frame.
pub struct Renderer<D: Device, I: InputSource> {
    config: RendererConfig,
    state: PipelineState,
    device: Option<D>,
    frame_constants: Option<BufferId>,
    scene: Scene,
    sky: SkyBackdrop,
    camera: Camera,
    ui: UiState,
    assets: Box<dyn AssetSource>,
    input: I,
    overlay: Box<dyn Overlay>,
    start_time: Instant,
}

impl<D: Device, I: InputSource> Renderer<D, I> {
    /// A renderer for the demo scene, reading input from `input`.
    ///
    /// Assets come from `config.asset_dir` when set, otherwise from the binary.
    pub fn new(config: RendererConfig, input: I) -> Self {
        let assets: Box<dyn AssetSource> = match &config.asset_dir {
            Some(dir) => Box::new(DirectoryAssets::new(dir)),
            None => Box::new(EmbeddedAssets),
        };
        let radius = sky_radius(config.near, config.fov, config.width, config.height);

        Self {
            scene: Scene::demo(config.ambient),
            sky: SkyBackdrop::new(radius),
            camera: Camera::new(),
            ui: UiState::default(),
            assets,
            input,
            overlay: Box::new(ControlPanel::new()),
            state: PipelineState::Uninitialized,
            device: None,
            frame_constants: None,
            start_time: Instant::now(),
            config,
        }
    }

    /// Replace the scene. Only meaningful before [`init`](Self::init).
    pub fn with_scene(mut self, scene: Scene) -> Self {
        self.scene = scene;
        self
    }

    pub fn with_assets(mut self, assets: impl AssetSource + 'static) -> Self {
        self.assets = Box::new(assets);
        self
    }

    pub fn with_overlay(mut self, overlay: impl Overlay + 'static) -> Self {
        self.overlay = Box::new(overlay);
        self
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> Option<&mut D> {
        self.device.as_mut()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn sky(&self) -> &SkyBackdrop {
        &self.sky
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    /// The frame constants buffer, once the device is ready.
    pub fn frame_constants_buffer(&self) -> Option<BufferId> {
        self.frame_constants
    }

    /// Takes ownership of `device`, creates the frame resources and builds the scene.
    ///
    /// If the frame resources cannot be created the device is dropped and the renderer
    /// stays `Uninitialized`. If the scene fails to build, everything it created is
    /// released and the renderer stays `DeviceReady`; [`build_scene`](Self::build_scene)
    /// may be retried. The frame resources are kept alive for that retry and are only
    /// released by [`shutdown`](Self::shutdown) or drop.
    pub fn init(&mut self, mut device: D) -> Result<(), RenderError> {
        if self.state != PipelineState::Uninitialized {
            return Err(invalid("init", self.state));
        }

        let constants_size = std::mem::size_of::<FrameConstants>() as u64;
        let frame_constants = device.create_frame_resources(constants_size).map_err(|e| {
            log::error!("Failed to create frame resources: {e}");
            e
        })?;

        self.frame_constants = Some(frame_constants);
        self.device = Some(device);
        self.state = PipelineState::DeviceReady;
        log::info!("Device ready");

        self.build_scene()
    }

    /// Creates every scene object and the sky, in order.
    pub fn build_scene(&mut self) -> Result<(), RenderError> {
        let state = self.state;
        if state != PipelineState::DeviceReady {
            return Err(invalid("build_scene", state));
        }
        let Some(device) = self.device.as_mut() else {
            return Err(invalid("build_scene", state));
        };
        let device: &mut dyn Device = device;

        let extent = device.extent();
        self.sky
            .set_radius(sky_radius(self.config.near, self.config.fov, extent.width, extent.height));

        let assets = &*self.assets;
        let built = self
            .scene
            .create(device, assets)
            .and_then(|()| self.sky.create(device, assets));

        if let Err(e) = built {
            log::error!("Scene initialization failed: {e}");
            self.sky.release(device);
            self.scene.release(device);
            return Err(e.into());
        }

        self.state = PipelineState::SceneReady;
        log::info!(
            "Scene ready: {} objects, sky radius {:.4}",
            self.scene.objects().len(),
            self.sky.radius()
        );
        Ok(())
    }

    /// Renders one frame at the wall-clock time since the renderer was created.
    pub fn render(&mut self) -> Result<(), RenderError> {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        self.render_at(elapsed)
    }

    /// Renders one frame with the scene animated to `elapsed` seconds.
    ///
    /// A failed frame is logged and skipped; the renderer stays in its current state
    /// and the next call tries again.
    pub fn render_at(&mut self, elapsed: f32) -> Result<(), RenderError> {
        let state = self.state;
        if !matches!(state, PipelineState::SceneReady | PipelineState::Running) {
            return Err(invalid("render", state));
        }
        let (Some(device), Some(frame_constants)) = (self.device.as_mut(), self.frame_constants)
        else {
            return Err(invalid("render", state));
        };
        let device: &mut dyn Device = device;

        // 1. Input, camera and UI
        let mouse = self.input.read_mouse();
        self.camera.rotate(
            mouse.x / self.config.mouse_sensitivity,
            mouse.y / self.config.mouse_sensitivity,
        );
        self.camera.zoom(-mouse.z / self.config.zoom_sensitivity);

        let mut alt = false;
        if let Some(keys) = self.input.read_keys() {
            alt = keys.contains(&KeyCode::AltLeft) || keys.contains(&KeyCode::AltRight);
            // Alt + arrows edit lights instead of moving the camera
            if !alt {
                let movement = movement_from_keys(keys, self.config.move_step);
                self.camera.move_by(movement.x, movement.y, movement.z);
            }
        }

        self.scene.sync_ui(&mut self.ui);
        let snapshot = InputSnapshot {
            pressed: self.input.pressed_keys(),
            alt,
            extent: device.extent(),
        };
        self.overlay.build(&mut self.ui, &snapshot);
        self.scene.apply_ui(&self.ui);
        self.ui.clear_requests();
        self.input.end_frame();

        // 2. Animation
        self.scene.animate(elapsed);
        let eye = self.camera.position();
        self.sky.follow(eye);

        // 3. Per-object constants
        for object in self.scene.objects_mut() {
            object.update(device).map_err(|source| {
                skip_frame(FrameError::ObjectUpdate {
                    object: object.name().to_string(),
                    source,
                })
            })?;
        }
        self.sky.update(device).map_err(|source| {
            skip_frame(FrameError::ObjectUpdate {
                object: self.sky.name().to_string(),
                source,
            })
        })?;

        // 4. Frame constants
        let extent = device.extent();
        let proj = reversed_perspective(
            self.config.fov,
            extent.aspect(),
            self.config.near,
            self.config.far,
        );
        let constants = self
            .scene
            .frame_constants(proj * self.camera.view_matrix(), eye);
        device
            .write_buffer(frame_constants, 0, bytemuck::bytes_of(&constants))
            .map_err(|e| skip_frame(FrameError::Constants(e)))?;

        // 5. Clear color and depth
        device
            .begin_frame(self.config.clear_color)
            .map_err(|e| skip_frame(FrameError::Begin(e)))?;

        // 6. Opaque objects, in scene order
        device.set_pass(PassKind::Opaque);
        for index in self.scene.in_pass(PassKind::Opaque) {
            self.scene.objects()[index].draw(device);
        }

        // 7. Sky, behind everything opaque
        device.set_pass(PassKind::Sky);
        self.sky.draw(device);

        // 8. Translucent objects, in the manual order
        device.set_pass(PassKind::Translucent);
        for index in self.scene.translucent_order(self.scene.red_first()) {
            self.scene.objects()[index].draw(device);
        }

        // 9. UI
        device.set_pass(PassKind::Overlay);
        device.draw_overlay(&self.overlay.quads());

        // 10. Present
        device
            .present()
            .map_err(|e| skip_frame(FrameError::Present(e)))?;

        if self.state == PipelineState::SceneReady {
            self.state = PipelineState::Running;
            log::info!("Running");
        }
        Ok(())
    }

    /// Resizes the render target, clamping each edge to at least
    /// [`Extent::MIN_EDGE`] pixels, and refits the sky.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let state = self.state;
        let Some(device) = self.device.as_mut() else {
            return Err(invalid("resize", state));
        };

        let extent = Extent::clamped(width, height);
        device.resize(extent).map_err(RenderError::Resize)?;
        self.sky.set_radius(sky_radius(
            self.config.near,
            self.config.fov,
            extent.width,
            extent.height,
        ));
        log::info!("Resized to {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Releases the scene, the sky and the frame resources, then drops the device.
    ///
    /// Calling this more than once is harmless.
    pub fn shutdown(&mut self) -> Result<(), RenderError> {
        if self.state == PipelineState::Shutdown {
            return Ok(());
        }

        if let Some(mut device) = self.device.take() {
            self.sky.release(&mut device);
            self.scene.release(&mut device);
            device.release_frame_resources();
        }
        self.frame_constants = None;
        self.state = PipelineState::Shutdown;
        log::info!("Shut down");
        Ok(())
    }
}

impl<D: Device, I: InputSource> Drop for Renderer<D, I> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Shutdown failed: {e}");
        }
    }
}

fn invalid(operation: &'static str, state: PipelineState) -> RenderError {
    RenderError::State { operation, state }
}

fn skip_frame(err: FrameError) -> RenderError {
    log::warn!("Skipping frame: {err}");
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;
    use crate::input::NoInput;

    fn renderer() -> Renderer<HeadlessDevice, NoInput> {
        Renderer::new(RendererConfig::default(), NoInput::default())
    }

    #[test]
    fn render_before_init_is_rejected() {
        let mut renderer = renderer();
        assert!(matches!(
            renderer.render_at(0.0),
            Err(RenderError::State {
                state: PipelineState::Uninitialized,
                ..
            })
        ));
    }

    #[test]
    fn init_walks_to_scene_ready() {
        let mut renderer = renderer();
        renderer.init(HeadlessDevice::new()).unwrap();
        assert_eq!(renderer.state(), PipelineState::SceneReady);

        renderer.render_at(0.0).unwrap();
        assert_eq!(renderer.state(), PipelineState::Running);
    }

    #[test]
    fn init_twice_is_rejected() {
        let mut renderer = renderer();
        renderer.init(HeadlessDevice::new()).unwrap();
        assert!(renderer.init(HeadlessDevice::new()).is_err());
        assert_eq!(renderer.state(), PipelineState::SceneReady);
    }

    #[test]
    fn frame_resource_failure_stays_uninitialized() {
        let mut renderer = renderer();
        let mut device = HeadlessDevice::new();
        device.fail_frame_resources(true);
        assert!(matches!(
            renderer.init(device),
            Err(RenderError::Device(_))
        ));
        assert_eq!(renderer.state(), PipelineState::Uninitialized);
        assert!(renderer.device().is_none());
    }

    #[test]
    fn shutdown_is_terminal_and_idempotent() {
        let mut renderer = renderer();
        renderer.init(HeadlessDevice::new()).unwrap();
        renderer.shutdown().unwrap();
        renderer.shutdown().unwrap();
        assert_eq!(renderer.state(), PipelineState::Shutdown);
        assert!(renderer.render_at(0.0).is_err());
        assert!(renderer.resize(100, 100).is_err());
    }

    #[test]
    fn failed_resize_keeps_the_sky_radius() {
        let mut renderer = renderer();
        renderer.init(HeadlessDevice::new()).unwrap();
        let radius = renderer.sky().radius();

        renderer.device_mut().unwrap().fail_resize(true);
        let err = renderer.resize(0, 0).unwrap_err();
        assert!(matches!(err, RenderError::Resize(_)));
        assert_eq!(err.to_string(), "resizing the render target failed");
        assert_eq!(renderer.sky().radius(), radius);
        assert_eq!(renderer.state(), PipelineState::SceneReady);
    }

    #[test]
    fn the_camera_orbits_the_default_focus() {
        let renderer = renderer();
        assert_eq!(renderer.camera().focus, glam::Vec3::new(4.0, 0.0, 0.0));
    }
}
