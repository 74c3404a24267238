//! Objects the frame pipeline draws.
//!
//! A [`Drawable`] is created in three stages (geometry, shaders, textures), updated
//! once per frame and drawn in the pass named by [`Drawable::pass`]. Every handle it
//! acquires is tracked in an [`OwnedResources`] stack so [`Drawable::release`] can free
//! them in reverse order, including after a creation stage failed half way.

use bytemuck::Zeroable;
use glam::{Mat4, Quat, Vec3};

use crate::assets::{
    AssetSource, BRICK_NORMAL_TEXTURE, BRICK_TEXTURE, LIT_SHADER, TRANSLUCENT_SHADER,
};
use crate::device::{
    BufferDesc, BufferId, BufferUsage, Device, DrawCall, OwnedResources, PassKind, ProgramDesc,
    ProgramId, TextureId, TextureKind, VertexLayout,
};
use crate::error::{AssetError, CreateError, DeviceError, ResourceError};
use crate::mesh::{self, Geometry, Rgba8};
use crate::transform::Transform;

/// Per-object constants, bound at group 1 binding 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectConstants {
    pub world: [[f32; 4]; 4],
    /// Inverse-transpose of `world`, for transforming normals.
    pub normal_matrix: [[f32; 4]; 4],
    /// `x` is the specular exponent for lit objects and the radius for the sky.
    pub params: [f32; 4],
}

impl ObjectConstants {
    pub fn new(world: Mat4, params: [f32; 4]) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            normal_matrix: world.inverse().transpose().to_cols_array_2d(),
            params,
        }
    }
}

/// A renderable object.
pub trait Drawable {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// The pass this object is drawn in.
    fn pass(&self) -> PassKind;

    /// Uploads vertex, index and constant buffers.
    fn create_geometry(&mut self, device: &mut dyn Device) -> Result<(), CreateError>;

    /// Compiles the object's shader program.
    fn create_shaders(
        &mut self,
        device: &mut dyn Device,
        assets: &dyn AssetSource,
    ) -> Result<(), CreateError>;

    /// Uploads the object's textures.
    fn create_textures(
        &mut self,
        device: &mut dyn Device,
        assets: &dyn AssetSource,
    ) -> Result<(), CreateError>;

    /// Recomposes the world matrix and writes the constant buffer.
    fn update(&mut self, device: &mut dyn Device) -> Result<(), DeviceError>;

    /// Issues one indexed draw. Does nothing if the object was never created.
    fn draw(&self, device: &mut dyn Device);

    /// Releases every handle in reverse acquisition order. Safe to call repeatedly.
    fn release(&mut self, device: &mut dyn Device);

    fn transform(&self) -> &Transform;

    fn transform_mut(&mut self) -> &mut Transform;

    /// The per-object constants buffer, once geometry exists.
    fn constants_buffer(&self) -> Option<BufferId>;

    /// Recolors a vertex-colored object. Objects without vertex colors ignore this.
    fn set_color(&mut self, _device: &mut dyn Device, _color: Rgba8) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Runs all three creation stages in order, stopping at the first failure.
    fn create(
        &mut self,
        device: &mut dyn Device,
        assets: &dyn AssetSource,
    ) -> Result<(), CreateError> {
        self.create_geometry(device)?;
        self.create_shaders(device, assets)?;
        self.create_textures(device, assets)?;
        log::debug!("Created {}", self.name());
        Ok(())
    }

    fn translate(&mut self, offset: Vec3) {
        self.transform_mut().translate(offset);
    }

    fn scale(&mut self, factors: Vec3) {
        self.transform_mut().scale(factors);
    }

    fn rotate(&mut self, rotation: Quat) {
        self.transform_mut().rotate(rotation);
    }
}

/// Handles shared by every drawable implementation.
#[derive(Debug, Default)]
pub(crate) struct DrawResources {
    pub owned: OwnedResources,
    pub vertex_buffer: Option<BufferId>,
    pub index_buffer: Option<BufferId>,
    pub index_count: u32,
    pub constants: Option<BufferId>,
    pub program: Option<ProgramId>,
    pub textures: Vec<TextureId>,
}

impl DrawResources {
    /// Uploads `geometry` plus a zeroed constants buffer.
    pub fn upload<V: bytemuck::Pod>(
        &mut self,
        device: &mut dyn Device,
        name: &str,
        geometry: &Geometry<V>,
        writable_vertices: bool,
    ) -> Result<(), DeviceError> {
        let vertex_buffer = device.create_buffer(&BufferDesc {
            label: name,
            usage: BufferUsage::Vertex,
            contents: geometry.vertex_bytes(),
            writable: writable_vertices,
        })?;
        self.vertex_buffer = Some(self.owned.buffer(vertex_buffer));

        let index_buffer = device.create_buffer(&BufferDesc {
            label: name,
            usage: BufferUsage::Index,
            contents: geometry.index_bytes(),
            writable: false,
        })?;
        self.index_buffer = Some(self.owned.buffer(index_buffer));
        self.index_count = geometry.index_count();

        let constants = device.create_buffer(&BufferDesc {
            label: name,
            usage: BufferUsage::Uniform,
            contents: bytemuck::bytes_of(&ObjectConstants::zeroed()),
            writable: true,
        })?;
        self.constants = Some(self.owned.buffer(constants));

        Ok(())
    }

    pub fn compile(
        &mut self,
        device: &mut dyn Device,
        desc: &ProgramDesc<'_>,
    ) -> Result<(), DeviceError> {
        let program = device.create_program(desc)?;
        self.program = Some(self.owned.program(program));
        Ok(())
    }

    /// Loads and uploads each named texture, which must be of the paired kind.
    pub fn load_textures(
        &mut self,
        device: &mut dyn Device,
        assets: &dyn AssetSource,
        textures: &[(&str, TextureKind)],
    ) -> Result<(), ResourceError> {
        for &(name, expected) in textures {
            let data = assets.texture(name)?;
            if data.kind != expected {
                return Err(AssetError::WrongKind {
                    name: name.to_string(),
                    expected,
                    got: data.kind,
                }
                .into());
            }
            let texture = device.create_texture(name, &data)?;
            self.textures.push(self.owned.texture(texture));
        }
        Ok(())
    }

    pub fn write_constants(
        &self,
        device: &mut dyn Device,
        constants: &ObjectConstants,
    ) -> Result<(), DeviceError> {
        let buffer = self.constants.ok_or(DeviceError::InvalidHandle("constants buffer"))?;
        device.write_buffer(buffer, 0, bytemuck::bytes_of(constants))
    }

    pub fn draw(&self, device: &mut dyn Device) {
        let (Some(program), Some(vertex_buffer), Some(index_buffer), Some(constants)) = (
            self.program,
            self.vertex_buffer,
            self.index_buffer,
            self.constants,
        ) else {
            return;
        };
        device.draw_indexed(&DrawCall {
            program,
            vertex_buffer,
            index_buffer,
            index_count: self.index_count,
            constants,
            textures: &self.textures,
        });
    }

    pub fn release(&mut self, device: &mut dyn Device) {
        self.owned.release(device);
        *self = Self::default();
    }
}

const CUBE_SHININESS: f32 = 32.0;

/// An opaque, normal-mapped, brick-textured unit cube.
pub struct Cube {
    name: String,
    transform: Transform,
    resources: DrawResources,
}

impl Cube {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::new(),
            resources: DrawResources::default(),
        }
    }
}

impl Drawable for Cube {
    fn name(&self) -> &str {
        &self.name
    }

    fn pass(&self) -> PassKind {
        PassKind::Opaque
    }

    fn create_geometry(&mut self, device: &mut dyn Device) -> Result<(), CreateError> {
        self.resources
            .upload(device, &self.name, &mesh::cube(), false)
            .map_err(|source| CreateError::Geometry {
                object: self.name.clone(),
                source,
            })
    }

    fn create_shaders(
        &mut self,
        device: &mut dyn Device,
        assets: &dyn AssetSource,
    ) -> Result<(), CreateError> {
        let shaders = |source: ResourceError| CreateError::Shaders {
            object: self.name.clone(),
            source,
        };
        let source = assets.shader(LIT_SHADER).map_err(|e| shaders(e.into()))?;
        self.resources
            .compile(
                device,
                &ProgramDesc {
                    label: LIT_SHADER,
                    source: &source,
                    vertex_layout: VertexLayout::Lit,
                    pass: PassKind::Opaque,
                    textures: &[TextureKind::D2, TextureKind::D2],
                },
            )
            .map_err(|e| shaders(e.into()))
    }

    fn create_textures(
        &mut self,
        device: &mut dyn Device,
        assets: &dyn AssetSource,
    ) -> Result<(), CreateError> {
        self.resources
            .load_textures(
                device,
                assets,
                &[
                    (BRICK_TEXTURE, TextureKind::D2),
                    (BRICK_NORMAL_TEXTURE, TextureKind::D2),
                ],
            )
            .map_err(|source| CreateError::Textures {
                object: self.name.clone(),
                source,
            })
    }

    fn update(&mut self, device: &mut dyn Device) -> Result<(), DeviceError> {
        let world = self.transform.recompose();
        let constants = ObjectConstants::new(world, [CUBE_SHININESS, 0.0, 0.0, 0.0]);
        self.resources.write_constants(device, &constants)
    }

    fn draw(&self, device: &mut dyn Device) {
        self.resources.draw(device);
    }

    fn release(&mut self, device: &mut dyn Device) {
        self.resources.release(device);
    }

    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    fn constants_buffer(&self) -> Option<BufferId> {
        self.resources.constants
    }
}

/// A flat, vertex-colored, alpha-blended quad.
pub struct TranslucentRect {
    name: String,
    color: Rgba8,
    transform: Transform,
    resources: DrawResources,
}

impl TranslucentRect {
    /// A red quad at half opacity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: Rgba8::RED,
            transform: Transform::new(),
            resources: DrawResources::default(),
        }
    }

    pub fn color(&self) -> Rgba8 {
        self.color
    }
}

impl Drawable for TranslucentRect {
    fn name(&self) -> &str {
        &self.name
    }

    fn pass(&self) -> PassKind {
        PassKind::Translucent
    }

    fn create_geometry(&mut self, device: &mut dyn Device) -> Result<(), CreateError> {
        self.resources
            .upload(device, &self.name, &mesh::rect(self.color), true)
            .map_err(|source| CreateError::Geometry {
                object: self.name.clone(),
                source,
            })
    }

    fn create_shaders(
        &mut self,
        device: &mut dyn Device,
        assets: &dyn AssetSource,
    ) -> Result<(), CreateError> {
        let shaders = |source: ResourceError| CreateError::Shaders {
            object: self.name.clone(),
            source,
        };
        let source = assets.shader(TRANSLUCENT_SHADER).map_err(|e| shaders(e.into()))?;
        self.resources
            .compile(
                device,
                &ProgramDesc {
                    label: TRANSLUCENT_SHADER,
                    source: &source,
                    vertex_layout: VertexLayout::Colored,
                    pass: PassKind::Translucent,
                    textures: &[],
                },
            )
            .map_err(|e| shaders(e.into()))
    }

    fn create_textures(
        &mut self,
        _device: &mut dyn Device,
        _assets: &dyn AssetSource,
    ) -> Result<(), CreateError> {
        Ok(())
    }

    fn update(&mut self, device: &mut dyn Device) -> Result<(), DeviceError> {
        let world = self.transform.recompose();
        self.resources
            .write_constants(device, &ObjectConstants::new(world, [0.0; 4]))
    }

    fn draw(&self, device: &mut dyn Device) {
        self.resources.draw(device);
    }

    fn release(&mut self, device: &mut dyn Device) {
        self.resources.release(device);
    }

    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    fn constants_buffer(&self) -> Option<BufferId> {
        self.resources.constants
    }

    /// Recolors every vertex, rewriting the vertex buffer if it already exists.
    fn set_color(&mut self, device: &mut dyn Device, color: Rgba8) -> Result<(), DeviceError> {
        self.color = color;
        match self.resources.vertex_buffer {
            Some(buffer) => device.write_buffer(buffer, 0, mesh::rect(color).vertex_bytes()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{DirectoryAssets, EmbeddedAssets};
    use crate::headless::{Command, HeadlessDevice};

    #[test]
    fn object_constants_layout() {
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 144);
        let c = ObjectConstants::new(Mat4::from_scale(Vec3::splat(2.0)), [32.0, 0.0, 0.0, 0.0]);
        assert_eq!(c.normal_matrix[0][0], 0.5);
    }

    #[test]
    fn cube_creates_buffers_program_and_textures() {
        let mut device = HeadlessDevice::new();
        let mut cube = Cube::new("cube");
        cube.create(&mut device, &EmbeddedAssets).unwrap();
        assert_eq!(device.live_buffers(), 3);
        assert_eq!(device.live_programs(), 1);
        assert_eq!(device.live_textures(), 2);

        cube.release(&mut device);
        cube.release(&mut device);
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn release_goes_in_reverse_order() {
        let mut device = HeadlessDevice::new();
        let mut cube = Cube::new("cube");
        cube.create(&mut device, &EmbeddedAssets).unwrap();
        let created = device.created();
        cube.release(&mut device);

        let mut released = device.released();
        released.reverse();
        assert_eq!(created, released);
    }

    #[test]
    fn each_stage_fails_with_its_own_variant() {
        let mut device = HeadlessDevice::new();
        device.fail_program_creation(true);
        let mut cube = Cube::new("cube");
        let err = cube.create(&mut device, &EmbeddedAssets).unwrap_err();
        assert!(matches!(err, CreateError::Shaders { ref object, .. } if object == "cube"));

        // geometry created before the failure is still owned and releasable
        assert_eq!(device.live_buffers(), 3);
        cube.release(&mut device);
        assert_eq!(device.live_resources(), 0);

        device.fail_program_creation(false);
        device.fail_texture_creation(true);
        let err = cube.create(&mut device, &EmbeddedAssets).unwrap_err();
        assert!(matches!(err, CreateError::Textures { .. }));
    }

    #[test]
    fn a_cube_map_cannot_stand_in_for_bricks() {
        let root = std::env::temp_dir().join(format!("stratum-tall-bricks-{}", std::process::id()));
        std::fs::create_dir_all(root.join("textures")).unwrap();
        image::RgbaImage::from_pixel(4, 24, image::Rgba([160, 60, 40, 255]))
            .save(root.join("textures").join("bricks.png"))
            .unwrap();

        let mut device = HeadlessDevice::new();
        let mut cube = Cube::new("cube");
        let err = cube
            .create(&mut device, &DirectoryAssets::new(&root))
            .unwrap_err();
        assert!(matches!(
            err,
            CreateError::Textures {
                source: ResourceError::Asset(AssetError::WrongKind {
                    expected: TextureKind::D2,
                    got: TextureKind::Cube,
                    ..
                }),
                ..
            }
        ));

        cube.release(&mut device);
        assert_eq!(device.live_resources(), 0);
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn update_writes_the_recomposed_world() {
        let mut device = HeadlessDevice::new();
        let mut cube = Cube::new("cube");
        cube.create(&mut device, &EmbeddedAssets).unwrap();
        cube.translate(Vec3::new(4.0, 0.0, 0.0));
        cube.update(&mut device).unwrap();

        let buffer = cube.constants_buffer().unwrap();
        let bytes = device.buffer_contents(buffer).unwrap();
        let constants: ObjectConstants = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(constants.world[3], [4.0, 0.0, 0.0, 1.0]);
        assert_eq!(constants.params[0], 32.0);
    }

    #[test]
    fn update_before_create_fails() {
        let mut device = HeadlessDevice::new();
        let mut cube = Cube::new("cube");
        assert!(cube.update(&mut device).is_err());
    }

    #[test]
    fn set_color_rewrites_vertex_colors() {
        let mut device = HeadlessDevice::new();
        let mut rect = TranslucentRect::new("rect");
        rect.create(&mut device, &EmbeddedAssets).unwrap();
        rect.set_color(&mut device, Rgba8::BLUE).unwrap();
        assert_eq!(rect.color(), Rgba8::BLUE);

        let vertex_buffer = rect.resources.vertex_buffer.unwrap();
        let bytes = device.buffer_contents(vertex_buffer).unwrap();
        let vertices: &[mesh::ColorVertex] = bytemuck::cast_slice(bytes);
        assert!(vertices.iter().all(|v| v.color == Rgba8::BLUE.packed()));
    }

    #[test]
    fn draw_issues_one_indexed_call() {
        let mut device = HeadlessDevice::new();
        let mut rect = TranslucentRect::new("rect");
        rect.draw(&mut device);
        assert!(device.commands().is_empty(), "nothing to draw before creation");

        rect.create(&mut device, &EmbeddedAssets).unwrap();
        rect.draw(&mut device);
        assert!(matches!(
            device.commands(),
            [Command::Draw { index_count: 6, .. }]
        ));
    }
}
