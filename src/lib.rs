//! # Stratum
//!
//! **A layered real-time scene renderer on wgpu.**
//!
//! Every frame is drawn as four fixed layers over a reversed depth buffer:
//! lit, normal-mapped opaque geometry, a textured sky sphere that follows the camera,
//! alpha-blended translucent quads in a controllable order, and a screen-space control
//! panel on top.
//!
//! ## Quick Start
//!
//! ```no_run
//! use stratum::{RendererConfig, run};
//!
//! fn main() {
//!     run(RendererConfig::new().title("Stratum").size(1280, 720)).unwrap();
//! }
//! ```
//!
//! ## Without a window
//!
//! The frame pipeline only talks to the [`Device`] trait. [`HeadlessDevice`] records
//! every call, so a whole frame can be driven and inspected in tests:
//!
//! ```
//! use stratum::{HeadlessDevice, NoInput, PipelineState, Renderer, RendererConfig};
//!
//! let mut renderer = Renderer::new(RendererConfig::default(), NoInput::default());
//! renderer.init(HeadlessDevice::new()).unwrap();
//! renderer.render_at(0.0).unwrap();
//! assert_eq!(renderer.state(), PipelineState::Running);
//! ```
//!
//! ## Controls
//!
//! - Left-drag rotates the camera around its focus, the wheel zooms.
//! - WASD / arrows move, Shift and Ctrl raise and lower.
//! - `N` toggles normal mapping, `V` shows normals, `T` swaps the translucent order.
//! - `+` / `-` add and remove lights, `1`-`0` select one, Alt + arrows and
//!   PageUp / PageDown move it, `R` `G` `B` cycle its color.

mod app;
mod assets;
mod camera;
mod config;
mod device;
mod drawable;
mod error;
mod gpu;
mod headless;
mod input;
pub mod mesh;
mod overlay;
mod overlay_pass;
mod pipeline;
pub mod scene;
mod sky;
mod texture;
mod transform;

pub use app::run;
pub use assets::{
    AssetSource, BRICK_NORMAL_TEXTURE, BRICK_TEXTURE, DirectoryAssets, EmbeddedAssets,
    LIT_SHADER, SKY_SHADER, SKY_TEXTURE, TRANSLUCENT_SHADER,
};
pub use camera::{Camera, reversed_perspective};
pub use config::{ASSETS_ENV, RendererConfig};
pub use device::{
    BufferDesc, BufferId, BufferUsage, CullMode, DepthCompare, DepthState, Device, DrawCall,
    Extent, OverlayQuad, OwnedResources, PassKind, ProgramDesc, ProgramId, Resource, TextureId,
    TextureKind, VertexLayout,
};
pub use drawable::{Cube, Drawable, ObjectConstants, TranslucentRect};
pub use error::{AssetError, CreateError, DeviceError, FrameError, RenderError, ResourceError};
pub use gpu::GpuContext;
pub use headless::{Command, HeadlessDevice};
pub use input::{Input, InputSource, NoInput, movement_from_keys};
pub use overlay::{Color, ControlPanel, InputSnapshot, NoOverlay, Overlay, UiState};
pub use pipeline::{PipelineState, Renderer};
pub use scene::{Animation, Light, LightSet, Orbit, OrbitPlane, Scene};
pub use sky::{SkyBackdrop, sky_radius};
pub use texture::TextureData;
pub use transform::Transform;

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::keyboard::KeyCode;
