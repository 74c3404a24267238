use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::device::TextureKind;
use crate::error::AssetError;
use crate::texture::TextureData;

pub const LIT_SHADER: &str = "lit";
pub const TRANSLUCENT_SHADER: &str = "translucent";
pub const SKY_SHADER: &str = "sky";

pub const BRICK_TEXTURE: &str = "bricks";
pub const BRICK_NORMAL_TEXTURE: &str = "bricks_normal";
pub const SKY_TEXTURE: &str = "sky";

const TEXTURE_SIZE: u32 = 256;
const SKY_FACE_SIZE: u32 = 128;
const SEED: u32 = 42;

/// Where drawables get their shader sources and texture data.
pub trait AssetSource {
    /// WGSL source of the named shader.
    fn shader(&self, name: &str) -> Result<Cow<'static, str>, AssetError>;

    /// Decoded texture data of the named texture.
    fn texture(&self, name: &str) -> Result<TextureData, AssetError>;
}

/// Shaders compiled into the binary and procedurally generated textures.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedAssets;

impl AssetSource for EmbeddedAssets {
    fn shader(&self, name: &str) -> Result<Cow<'static, str>, AssetError> {
        let source = match name {
            LIT_SHADER => include_str!("shaders/lit.wgsl"),
            TRANSLUCENT_SHADER => include_str!("shaders/translucent.wgsl"),
            SKY_SHADER => include_str!("shaders/sky.wgsl"),
            _ => return Err(AssetError::NotFound(name.to_string())),
        };
        Ok(Cow::Borrowed(source))
    }

    fn texture(&self, name: &str) -> Result<TextureData, AssetError> {
        match name {
            BRICK_TEXTURE => Ok(TextureData::bricks(TEXTURE_SIZE, SEED)),
            BRICK_NORMAL_TEXTURE => Ok(TextureData::brick_normals(TEXTURE_SIZE)),
            SKY_TEXTURE => Ok(TextureData::sky_gradient(SKY_FACE_SIZE, SEED)),
            _ => Err(AssetError::NotFound(name.to_string())),
        }
    }
}

/// Assets loaded from a directory on disk, falling back to [`EmbeddedAssets`] for
/// anything the directory does not provide.
///
/// Layout:
///
/// ```text
/// <root>/shaders/<name>.wgsl
/// <root>/textures/<name>.png
/// ```
///
/// A texture whose height is six times its width is loaded as a cube map, with the
/// faces stacked top to bottom in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Clone, Debug)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shader_path(&self, name: &str) -> PathBuf {
        self.root.join("shaders").join(format!("{name}.wgsl"))
    }

    fn texture_path(&self, name: &str) -> PathBuf {
        self.root.join("textures").join(format!("{name}.png"))
    }
}

impl AssetSource for DirectoryAssets {
    fn shader(&self, name: &str) -> Result<Cow<'static, str>, AssetError> {
        let path = self.shader_path(name);
        if !path.exists() {
            return EmbeddedAssets.shader(name);
        }
        log::debug!("Loading shader {}", path.display());
        Ok(Cow::Owned(fs::read_to_string(&path)?))
    }

    fn texture(&self, name: &str) -> Result<TextureData, AssetError> {
        let path = self.texture_path(name);
        if !path.exists() {
            return EmbeddedAssets.texture(name);
        }
        log::debug!("Loading texture {}", path.display());

        let bytes = fs::read(&path)?;
        // normal maps hold vectors, not colors
        let srgb = name != BRICK_NORMAL_TEXTURE;
        let mut data = TextureData::from_image_bytes(&bytes, srgb)?;
        if data.height == data.width * 6 {
            data = TextureData::new(
                name,
                TextureKind::Cube,
                data.width,
                data.width,
                srgb,
                data.pixels,
            )?;
        }
        Ok(data)
    }
}
