//! Error taxonomy for the renderer.
//!
//! Errors fall into three groups:
//!
//! - **Fatal initialization errors** ([`DeviceError`] during device setup, [`CreateError`]
//!   while building the scene). These abort [`Renderer::init`](crate::Renderer::init).
//! - **Per-frame transient errors** ([`FrameError`]). The frame is skipped and the next
//!   one is attempted normally.
//! - **Resource exhaustion** (a full light set). This is not an error at all: the
//!   request is silently ignored.

use thiserror::Error;

use crate::device::TextureKind;
use crate::pipeline::PipelineState;

/// Failures reported by a [`Device`](crate::Device) implementation.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No hardware adapter compatible with the surface was found.
    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),
    /// The adapter refused to create a logical device.
    #[error("device request failed: {0}")]
    DeviceRequest(String),
    /// The window surface could not be created, configured or acquired.
    #[error("surface error: {0}")]
    Surface(String),
    /// A GPU resource failed to create (validation error, out of memory, ...).
    #[error("failed to create {what}: {reason}")]
    Creation { what: &'static str, reason: String },
    /// A handle does not refer to a live resource.
    #[error("stale or unknown {0} handle")]
    InvalidHandle(&'static str),
    /// A buffer write would run past the end of the buffer.
    #[error("write of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfRange { offset: u64, len: u64, size: u64 },
    /// A buffer that was not created writable was written to.
    #[error("buffer '{0}' is not writable")]
    ReadOnly(String),
    /// A draw or present was issued outside of `begin_frame`/`present`.
    #[error("no frame in progress")]
    NoFrame,
}

/// Failures while loading shader sources or texture data.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset '{0}' not found")]
    NotFound(String),
    #[error("failed to read asset: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("texture '{name}' has {got} bytes, expected {expected}")]
    BadTextureData {
        name: String,
        got: usize,
        expected: usize,
    },
    #[error("texture '{name}' is {got:?}, expected {expected:?}")]
    WrongKind {
        name: String,
        expected: TextureKind,
        got: TextureKind,
    },
}

/// Either side of a shader/texture creation failure.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// A drawable failed one of its creation stages.
///
/// Each stage fails with its own variant so the caller can tell which step broke.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error("{object}: geometry creation failed")]
    Geometry {
        object: String,
        #[source]
        source: DeviceError,
    },
    #[error("{object}: shader creation failed")]
    Shaders {
        object: String,
        #[source]
        source: ResourceError,
    },
    #[error("{object}: texture creation failed")]
    Textures {
        object: String,
        #[source]
        source: ResourceError,
    },
}

/// A frame could not be rendered. The pipeline stays in its current state.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("updating '{object}' failed")]
    ObjectUpdate {
        object: String,
        #[source]
        source: DeviceError,
    },
    #[error("uploading frame constants failed")]
    Constants(#[source] DeviceError),
    #[error("beginning the frame failed")]
    Begin(#[source] DeviceError),
    #[error("presenting the frame failed")]
    Present(#[source] DeviceError),
}

/// Top-level error returned by [`Renderer`](crate::Renderer) operations.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("device initialization failed")]
    Device(#[from] DeviceError),
    #[error("scene initialization failed")]
    Scene(#[from] CreateError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("resizing the render target failed")]
    Resize(#[source] DeviceError),
    #[error("'{operation}' is not valid in state {state:?}")]
    State {
        operation: &'static str,
        state: PipelineState,
    },
}

impl RenderError {
    /// Returns true for errors that only cost the current frame.
    pub fn is_transient(&self) -> bool {
        matches!(self, RenderError::Frame(_))
    }
}
