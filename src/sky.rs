use glam::Vec3;

use crate::assets::{AssetSource, SKY_SHADER, SKY_TEXTURE};
use crate::device::{BufferId, Device, PassKind, ProgramDesc, TextureKind, VertexLayout};
use crate::drawable::{DrawResources, Drawable, ObjectConstants};
use crate::error::{CreateError, DeviceError, ResourceError};
use crate::mesh;
use crate::transform::Transform;

const SEGMENTS: u32 = 32;
const RINGS: u32 = 16;

/// Radius of a sky sphere that fully encloses the near plane of the view frustum.
///
/// The radius is the distance from the eye to a corner of the near plane, plus 10%.
pub fn sky_radius(near: f32, fov_y: f32, width: u32, height: u32) -> f32 {
    let half_width = (fov_y / 2.0).tan() * near;
    let half_height = (height as f32 / width as f32) * half_width;
    (near * near + half_height * half_height + half_width * half_width).sqrt() * 1.1
}

/// A cube-mapped sphere drawn behind everything else.
///
/// The sphere is re-centered on the camera every frame and the sky shader pins its
/// depth to the far plane, so the radius only has to keep the geometry outside the
/// near plane. It is drawn two-sided because the camera is always inside it.
pub struct SkyBackdrop {
    radius: f32,
    transform: Transform,
    resources: DrawResources,
}

impl SkyBackdrop {
    pub fn new(radius: f32) -> Self {
        let mut sky = Self {
            radius,
            transform: Transform::new(),
            resources: DrawResources::default(),
        };
        sky.set_radius(radius);
        sky
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Rescales the sphere. Takes effect on the next [`update`](Drawable::update).
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
        self.transform.scale(Vec3::splat(radius));
    }

    /// Centers the sphere on the eye.
    pub fn follow(&mut self, eye: Vec3) {
        self.transform.translate(eye);
    }
}

impl Drawable for SkyBackdrop {
    fn name(&self) -> &str {
        "sky"
    }

    fn pass(&self) -> PassKind {
        PassKind::Sky
    }

    fn create_geometry(&mut self, device: &mut dyn Device) -> Result<(), CreateError> {
        self.resources
            .upload(device, "sky", &mesh::sphere(SEGMENTS, RINGS), false)
            .map_err(|source| CreateError::Geometry {
                object: "sky".to_string(),
                source,
            })
    }

    fn create_shaders(
        &mut self,
        device: &mut dyn Device,
        assets: &dyn AssetSource,
    ) -> Result<(), CreateError> {
        let shaders = |source: ResourceError| CreateError::Shaders {
            object: "sky".to_string(),
            source,
        };
        let source = assets.shader(SKY_SHADER).map_err(|e| shaders(e.into()))?;
        self.resources
            .compile(
                device,
                &ProgramDesc {
                    label: SKY_SHADER,
                    source: &source,
                    vertex_layout: VertexLayout::Position,
                    pass: PassKind::Sky,
                    textures: &[TextureKind::Cube],
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
            .load_textures(device, assets, &[(SKY_TEXTURE, TextureKind::Cube)])
            .map_err(|source| CreateError::Textures {
                object: "sky".to_string(),
                source,
            })
    }

    fn update(&mut self, device: &mut dyn Device) -> Result<(), DeviceError> {
        let world = self.transform.recompose();
        self.resources
            .write_constants(device, &ObjectConstants::new(world, [self.radius, 0.0, 0.0, 0.0]))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{DirectoryAssets, EmbeddedAssets};
    use crate::error::AssetError;
    use crate::headless::HeadlessDevice;

    #[test]
    fn radius_matches_frustum_corner() {
        let n = 0.01f32;
        let fov = std::f32::consts::FRAC_PI_3;
        let half_w = (fov / 2.0).tan() * n;
        let half_h = (720.0 / 1280.0) * half_w;
        let expected = (n * n + half_h * half_h + half_w * half_w).sqrt() * 1.1;
        assert_eq!(sky_radius(n, fov, 1280, 720), expected);
    }

    #[test]
    fn radius_grows_with_aspect_height() {
        let wide = sky_radius(0.01, 1.0, 1600, 400);
        let tall = sky_radius(0.01, 1.0, 400, 1600);
        assert!(tall > wide);
    }

    #[test]
    fn set_radius_rescales_geometry() {
        let mut sky = SkyBackdrop::new(1.0);
        sky.set_radius(3.0);
        sky.follow(Vec3::new(1.0, 2.0, 3.0));
        let world = sky.transform_mut().recompose();
        assert_eq!(
            world.transform_point3(Vec3::X),
            Vec3::new(4.0, 2.0, 3.0)
        );
        assert_eq!(sky.radius(), 3.0);
    }

    #[test]
    fn sky_uses_a_cube_map() {
        let mut device = HeadlessDevice::new();
        let mut sky = SkyBackdrop::new(1.0);
        sky.create(&mut device, &EmbeddedAssets).unwrap();
        assert_eq!(sky.pass(), PassKind::Sky);
        assert_eq!(device.live_textures(), 1);
        sky.update(&mut device).unwrap();
        sky.release(&mut device);
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn a_flat_sky_image_is_rejected() {
        let root = std::env::temp_dir().join(format!("stratum-flat-sky-{}", std::process::id()));
        std::fs::create_dir_all(root.join("textures")).unwrap();
        image::RgbaImage::from_pixel(4, 4, image::Rgba([90, 140, 220, 255]))
            .save(root.join("textures").join("sky.png"))
            .unwrap();

        let mut device = HeadlessDevice::new();
        let mut sky = SkyBackdrop::new(1.0);
        let err = sky
            .create(&mut device, &DirectoryAssets::new(&root))
            .unwrap_err();
        assert!(matches!(
            err,
            CreateError::Textures {
                source: ResourceError::Asset(AssetError::WrongKind {
                    expected: TextureKind::Cube,
                    got: TextureKind::D2,
                    ..
                }),
                ..
            }
        ));
        assert_eq!(device.live_textures(), 0);

        sky.release(&mut device);
        assert_eq!(device.live_resources(), 0);
        std::fs::remove_dir_all(&root).unwrap();
    }
}
