//! The device contract the renderer draws through.
//!
//! [`Device`] is the seam between the frame pipeline and the graphics API. Resources are
//! owned by the device and referred to by small typed handles ([`BufferId`],
//! [`ProgramId`], [`TextureId`]), so drawables never hold API objects directly and the
//! whole pipeline can be driven against [`HeadlessDevice`](crate::HeadlessDevice) in tests.
//!
//! Two implementations ship with the crate:
//!
//! - [`GpuContext`](crate::GpuContext) renders to a window through wgpu.
//! - [`HeadlessDevice`](crate::HeadlessDevice) records every call without a GPU.
//!
//! # Pass state
//!
//! wgpu bakes depth, cull and blend state into pipelines, so a [`ProgramDesc`] names the
//! [`PassKind`] it will be drawn in. [`Device::set_pass`] then switches the active state
//! between the opaque, sky, translucent and overlay layers. The table of states lives
//! on [`PassKind`] so every backend agrees on it.

use crate::error::DeviceError;
use crate::texture::TextureData;

/// Handle to a GPU buffer owned by a [`Device`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub(crate) usize);

/// Handle to a compiled shader program (shader modules + pipeline state).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub(crate) usize);

/// Handle to a sampled texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// What a buffer is bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
}

/// Description of a buffer to create.
#[derive(Clone, Copy, Debug)]
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub usage: BufferUsage,
    /// Initial contents. The buffer size is the length of this slice.
    pub contents: &'a [u8],
    /// Whether the buffer may be rewritten after creation.
    pub writable: bool,
}

/// Vertex formats understood by every backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexLayout {
    /// [`LitVertex`](crate::mesh::LitVertex): position, uv, normal, tangent.
    Lit,
    /// [`ColorVertex`](crate::mesh::ColorVertex): position and packed RGBA8 color.
    Colored,
    /// [`SkyVertex`](crate::mesh::SkyVertex): position only.
    Position,
}

/// Dimensionality of a texture binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    D2,
    Cube,
}

/// Depth comparison used with the reversed-depth convention (0 = far, 1 = near).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthCompare {
    Greater,
    GreaterEqual,
}

/// Depth-stencil state of a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthState {
    pub write: bool,
    pub compare: DepthCompare,
}

/// Face culling of a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CullMode {
    Back,
    None,
}

/// The layers of a frame, in the order they are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Depth write on, back-face culling.
    Opaque,
    /// Depth read-only with `GreaterEqual`, no culling.
    Sky,
    /// Depth read-only, no culling, alpha blending.
    Translucent,
    /// Screen-space quads, no depth.
    Overlay,
}

impl PassKind {
    /// Depth state for this pass, or `None` if the pass ignores depth.
    pub fn depth(self) -> Option<DepthState> {
        match self {
            PassKind::Opaque => Some(DepthState {
                write: true,
                compare: DepthCompare::Greater,
            }),
            PassKind::Sky | PassKind::Translucent => Some(DepthState {
                write: false,
                compare: DepthCompare::GreaterEqual,
            }),
            PassKind::Overlay => None,
        }
    }

    pub fn cull(self) -> CullMode {
        match self {
            PassKind::Opaque => CullMode::Back,
            PassKind::Sky | PassKind::Translucent | PassKind::Overlay => CullMode::None,
        }
    }

    /// Whether color output is alpha blended (`src_alpha`, `1 - src_alpha`).
    pub fn blends(self) -> bool {
        matches!(self, PassKind::Translucent | PassKind::Overlay)
    }
}

/// Description of a shader program to compile.
#[derive(Clone, Copy, Debug)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    /// WGSL source with `vs` and `fs` entry points.
    pub source: &'a str,
    pub vertex_layout: VertexLayout,
    pub pass: PassKind,
    /// Textures bound at group 1, bindings 1.., in order.
    pub textures: &'a [TextureKind],
}

/// One indexed draw of a drawable.
#[derive(Clone, Copy, Debug)]
pub struct DrawCall<'a> {
    pub program: ProgramId,
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub index_count: u32,
    /// Per-object constants, bound at group 1 binding 0.
    pub constants: BufferId,
    pub textures: &'a [TextureId],
}

/// A flat-colored rectangle in window pixel coordinates, drawn by the overlay pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayQuad {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: [f32; 4],
}

/// Width and height of the render target in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    /// Smallest edge the swap chain and depth buffer are allowed to shrink to.
    pub const MIN_EDGE: u32 = 8;

    /// Creates an extent with both edges clamped to [`Extent::MIN_EDGE`].
    pub fn clamped(width: u32, height: u32) -> Self {
        Self {
            width: width.max(Self::MIN_EDGE),
            height: height.max(Self::MIN_EDGE),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// The graphics device the frame pipeline renders through.
///
/// Implementations own all resources. Every `release_*` call must be idempotent and
/// accept handles that were already released or never existed.
pub trait Device {
    /// Current render target size.
    fn extent(&self) -> Extent;

    /// Creates the shared frame resources: depth buffer, sampler and the frame
    /// constants buffer bound at group 0. Returns the constants buffer.
    fn create_frame_resources(&mut self, constants_size: u64) -> Result<BufferId, DeviceError>;

    /// Releases what [`create_frame_resources`](Self::create_frame_resources) created.
    fn release_frame_resources(&mut self);

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, DeviceError>;

    /// Overwrites part of a writable buffer.
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8])
    -> Result<(), DeviceError>;

    fn release_buffer(&mut self, buffer: BufferId);

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, DeviceError>;

    fn release_program(&mut self, program: ProgramId);

    fn create_texture(&mut self, label: &str, data: &TextureData)
    -> Result<TextureId, DeviceError>;

    fn release_texture(&mut self, texture: TextureId);

    /// Recreates the swap-chain buffers and depth buffer at `extent`.
    fn resize(&mut self, extent: Extent) -> Result<(), DeviceError>;

    /// Starts a frame, clearing color to `clear` and depth to 0 (far).
    fn begin_frame(&mut self, clear: [f32; 4]) -> Result<(), DeviceError>;

    /// Switches the active pipeline state.
    fn set_pass(&mut self, pass: PassKind);

    fn draw_indexed(&mut self, call: &DrawCall<'_>);

    fn draw_overlay(&mut self, quads: &[OverlayQuad]);

    /// Submits the frame and presents it.
    fn present(&mut self) -> Result<(), DeviceError>;
}

/// Lets a renderer borrow a device, so the caller can inspect it after the renderer
/// is dropped.
impl<D: Device + ?Sized> Device for &mut D {
    fn extent(&self) -> Extent {
        (**self).extent()
    }

    fn create_frame_resources(&mut self, constants_size: u64) -> Result<BufferId, DeviceError> {
        (**self).create_frame_resources(constants_size)
    }

    fn release_frame_resources(&mut self) {
        (**self).release_frame_resources()
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, DeviceError> {
        (**self).create_buffer(desc)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        (**self).write_buffer(buffer, offset, data)
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        (**self).release_buffer(buffer)
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, DeviceError> {
        (**self).create_program(desc)
    }

    fn release_program(&mut self, program: ProgramId) {
        (**self).release_program(program)
    }

    fn create_texture(
        &mut self,
        label: &str,
        data: &TextureData,
    ) -> Result<TextureId, DeviceError> {
        (**self).create_texture(label, data)
    }

    fn release_texture(&mut self, texture: TextureId) {
        (**self).release_texture(texture)
    }

    fn resize(&mut self, extent: Extent) -> Result<(), DeviceError> {
        (**self).resize(extent)
    }

    fn begin_frame(&mut self, clear: [f32; 4]) -> Result<(), DeviceError> {
        (**self).begin_frame(clear)
    }

    fn set_pass(&mut self, pass: PassKind) {
        (**self).set_pass(pass)
    }

    fn draw_indexed(&mut self, call: &DrawCall<'_>) {
        (**self).draw_indexed(call)
    }

    fn draw_overlay(&mut self, quads: &[OverlayQuad]) {
        (**self).draw_overlay(quads)
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        (**self).present()
    }
}

/// A resource handle tracked for release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Buffer(BufferId),
    Program(ProgramId),
    Texture(TextureId),
}

/// Handles owned by one object, released in reverse acquisition order.
///
/// Releasing drains the stack, so calling [`release`](Self::release) twice is harmless.
#[derive(Debug, Default)]
pub struct OwnedResources {
    stack: Vec<Resource>,
}

impl OwnedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&mut self, id: BufferId) -> BufferId {
        self.stack.push(Resource::Buffer(id));
        id
    }

    pub fn program(&mut self, id: ProgramId) -> ProgramId {
        self.stack.push(Resource::Program(id));
        id
    }

    pub fn texture(&mut self, id: TextureId) -> TextureId {
        self.stack.push(Resource::Texture(id));
        id
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn release(&mut self, device: &mut dyn Device) {
        while let Some(resource) = self.stack.pop() {
            match resource {
                Resource::Buffer(id) => device.release_buffer(id),
                Resource::Program(id) => device.release_program(id),
                Resource::Texture(id) => device.release_texture(id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_clamps_to_minimum_edge() {
        assert_eq!(Extent::clamped(0, 0), Extent { width: 8, height: 8 });
        assert_eq!(Extent::clamped(3, 600), Extent { width: 8, height: 600 });
        assert_eq!(
            Extent::clamped(1280, 720),
            Extent {
                width: 1280,
                height: 720
            }
        );
    }

    #[test]
    fn opaque_pass_writes_depth_and_culls() {
        let depth = PassKind::Opaque.depth().unwrap();
        assert!(depth.write);
        assert_eq!(depth.compare, DepthCompare::Greater);
        assert_eq!(PassKind::Opaque.cull(), CullMode::Back);
        assert!(!PassKind::Opaque.blends());
    }

    #[test]
    fn sky_pass_is_depth_read_only_and_two_sided() {
        let depth = PassKind::Sky.depth().unwrap();
        assert!(!depth.write);
        assert_eq!(depth.compare, DepthCompare::GreaterEqual);
        assert_eq!(PassKind::Sky.cull(), CullMode::None);
    }

    #[test]
    fn translucent_pass_blends_without_writing_depth() {
        assert!(PassKind::Translucent.blends());
        assert!(!PassKind::Translucent.depth().unwrap().write);
        assert!(PassKind::Overlay.depth().is_none());
    }
}
