//! The demo scene: drawables, lights, animation and the per-frame constants.

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::assets::AssetSource;
use crate::device::{Device, PassKind};
use crate::drawable::{Cube, Drawable, TranslucentRect};
use crate::error::CreateError;
use crate::mesh::Rgba8;
use crate::overlay::UiState;

/// A point light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    /// World position, `w = 1`.
    pub position: Vec4,
    pub color: Vec4,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vec4::new(2.0, 2.0, 0.0, 1.0),
            color: Vec4::ONE,
        }
    }
}

impl Light {
    /// Largest distance from the origin a light may be moved to, per axis.
    pub const POSITION_LIMIT: f32 = 4.0;

    /// Clamps position to the editable box and color to `[0, 1]`.
    pub fn clamped(self) -> Self {
        let limit = Vec4::splat(Self::POSITION_LIMIT);
        let mut position = self.position.clamp(-limit, limit);
        position.w = 1.0;
        Self {
            position,
            color: self.color.clamp(Vec4::ZERO, Vec4::ONE),
        }
    }
}

/// Up to [`LightSet::CAPACITY`] lights with stack semantics.
///
/// Pushing onto a full set and popping an empty one are silent no-ops.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightSet {
    lights: Vec<Light>,
}

impl LightSet {
    pub const CAPACITY: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a light. Returns false if the set was full.
    pub fn push(&mut self, light: Light) -> bool {
        if self.lights.len() >= Self::CAPACITY {
            return false;
        }
        self.lights.push(light.clamped());
        true
    }

    /// Removes the most recently added light.
    pub fn pop(&mut self) -> Option<Light> {
        self.lights.pop()
    }

    /// Replaces the light at `index`, clamped. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, light: Light) {
        if let Some(slot) = self.lights.get_mut(index) {
            *slot = light.clamped();
        }
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn as_slice(&self) -> &[Light] {
        &self.lights
    }
}

/// Plane a circular orbit lies in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrbitPlane {
    XZ,
    YZ,
}

/// A circular path around `center`. A negative radius runs half a turn out of phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orbit {
    pub center: Vec3,
    pub radius: f32,
    pub plane: OrbitPlane,
}

impl Orbit {
    pub fn new(center: Vec3, radius: f32, plane: OrbitPlane) -> Self {
        Self {
            center,
            radius,
            plane,
        }
    }

    /// Position after `t` radians.
    pub fn position(&self, t: f32) -> Vec3 {
        let r = self.radius;
        let offset = match self.plane {
            OrbitPlane::XZ => Vec3::new(t.sin() * r, 0.0, t.cos() * r),
            OrbitPlane::YZ => Vec3::new(0.0, t.sin() * r, t.cos() * r),
        };
        offset + self.center
    }
}

/// How one object moves over time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Animation {
    pub orbit: Option<Orbit>,
    /// Rotate about +Y by the elapsed time.
    pub spin: bool,
}

/// GPU layout of one light slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightData {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

/// Constants shared by every draw in a frame, bound at group 0 binding 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameConstants {
    pub view_proj: [[f32; 4]; 4],
    /// Eye position, `w = 1`.
    pub camera_pos: [f32; 4],
    /// `(light count, use normal maps, show normals, 0)`.
    pub light_params: [i32; 4],
    pub lights: [LightData; LightSet::CAPACITY],
    pub ambient: [f32; 4],
}

/// Ordered drawables, lights and the settings the UI controls.
///
/// Object order is the opaque draw order. Translucent objects are drawn in the manual
/// order returned by [`Scene::translucent_order`].
pub struct Scene {
    objects: Vec<Box<dyn Drawable>>,
    animations: Vec<Animation>,
    red: Option<usize>,
    blue: Option<usize>,
    lights: LightSet,
    ambient: Vec4,
    use_normal_maps: bool,
    show_normals: bool,
    red_first: bool,
}

impl Scene {
    pub fn new(ambient: Vec4) -> Self {
        let ui = UiState::default();
        Self {
            objects: Vec::new(),
            animations: Vec::new(),
            red: None,
            blue: None,
            lights: LightSet::new(),
            ambient,
            use_normal_maps: ui.use_normal_maps,
            show_normals: ui.show_normals,
            red_first: ui.red_first,
        }
    }

    /// Four brick cubes and two translucent quads, with no lights.
    ///
    /// | Index | Object     | Layout                          | Motion                         |
    /// |-------|------------|---------------------------------|--------------------------------|
    /// | 0     | cube       |                                 | orbits (4,0,0), r = 4, spins   |
    /// | 1     | cube       | at (4,0,0)                      | spins                          |
    /// | 2     | cube       |                                 | orbits (4,0,0), r = -4, spins  |
    /// | 3     | cube       | scale 2                         | orbits origin in YZ, r = 12    |
    /// | 4     | blue quad  | at (10,0,0), scale (1,3,2)      |                                |
    /// | 5     | red quad   | at (6,0,0), scale (1,3,2)       |                                |
    pub fn demo(ambient: Vec4) -> Self {
        let mut scene = Self::new(ambient);
        let pivot = Vec3::new(4.0, 0.0, 0.0);

        scene.push(
            Box::new(Cube::new("cube 0")),
            Animation {
                orbit: Some(Orbit::new(pivot, 4.0, OrbitPlane::XZ)),
                spin: true,
            },
        );

        let mut cube = Cube::new("cube 1");
        cube.translate(pivot);
        scene.push(Box::new(cube), Animation { orbit: None, spin: true });

        scene.push(
            Box::new(Cube::new("cube 2")),
            Animation {
                orbit: Some(Orbit::new(pivot, -4.0, OrbitPlane::XZ)),
                spin: true,
            },
        );

        let mut cube = Cube::new("cube 3");
        cube.scale(Vec3::splat(2.0));
        scene.push(
            Box::new(cube),
            Animation {
                orbit: Some(Orbit::new(Vec3::ZERO, 12.0, OrbitPlane::YZ)),
                spin: false,
            },
        );

        let quad_scale = Vec3::new(1.0, 3.0, 2.0);

        // recolored once created
        let mut blue = TranslucentRect::new("blue quad");
        blue.translate(Vec3::new(10.0, 0.0, 0.0));
        blue.scale(quad_scale);
        scene.blue = Some(scene.push(Box::new(blue), Animation::default()));

        let mut red = TranslucentRect::new("red quad");
        red.translate(Vec3::new(6.0, 0.0, 0.0));
        red.scale(quad_scale);
        scene.red = Some(scene.push(Box::new(red), Animation::default()));

        scene
    }

    /// Appends an object and returns its index.
    pub fn push(&mut self, object: Box<dyn Drawable>, animation: Animation) -> usize {
        self.objects.push(object);
        self.animations.push(animation);
        self.objects.len() - 1
    }

    pub fn objects(&self) -> &[Box<dyn Drawable>] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [Box<dyn Drawable>] {
        &mut self.objects
    }

    /// Indices of the objects drawn in `pass`, in scene order.
    pub fn in_pass(&self, pass: PassKind) -> impl Iterator<Item = usize> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(move |(_, object)| object.pass() == pass)
            .map(|(i, _)| i)
    }

    /// The manual translucent draw order: red then blue, or blue then red.
    ///
    /// Any other translucent objects follow in scene order.
    pub fn translucent_order(&self, red_first: bool) -> Vec<usize> {
        let pair = if red_first {
            [self.red, self.blue]
        } else {
            [self.blue, self.red]
        };
        let mut order: Vec<usize> = pair.into_iter().flatten().collect();
        let rest: Vec<usize> = self
            .in_pass(PassKind::Translucent)
            .filter(|i| !order.contains(i))
            .collect();
        order.extend(rest);
        order
    }

    pub fn red_first(&self) -> bool {
        self.red_first
    }

    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut LightSet {
        &mut self.lights
    }

    /// Moves every animated object to where it is after `t` seconds.
    pub fn animate(&mut self, t: f32) {
        for (object, animation) in self.objects.iter_mut().zip(&self.animations) {
            if let Some(orbit) = animation.orbit {
                object.translate(orbit.position(t));
            }
            if animation.spin {
                object.rotate(Quat::from_rotation_y(t));
            }
        }
    }

    /// Seeds the UI state with the scene's current lights.
    pub fn sync_ui(&self, ui: &mut UiState) {
        ui.lights = self.lights.as_slice().to_vec();
        ui.use_normal_maps = self.use_normal_maps;
        ui.show_normals = self.show_normals;
        ui.red_first = self.red_first;
    }

    /// Applies the UI's flags, light edits and add/remove requests.
    pub fn apply_ui(&mut self, ui: &UiState) {
        self.use_normal_maps = ui.use_normal_maps;
        self.show_normals = ui.show_normals;
        self.red_first = ui.red_first;

        for (i, light) in ui.lights.iter().enumerate() {
            self.lights.set(i, *light);
        }
        if ui.add_light && self.lights.push(Light::default()) {
            log::debug!("Added light {}", self.lights.len());
        }
        if ui.remove_light && self.lights.pop().is_some() {
            log::debug!("Removed light, {} left", self.lights.len());
        }
    }

    /// Snapshot of the lights and flags for the frame constants buffer.
    pub fn frame_constants(&self, view_proj: Mat4, camera_pos: Vec3) -> FrameConstants {
        let mut lights = [LightData::default(); LightSet::CAPACITY];
        for (slot, light) in lights.iter_mut().zip(self.lights.as_slice()) {
            *slot = LightData {
                position: light.position.to_array(),
                color: light.color.to_array(),
            };
        }

        FrameConstants {
            view_proj: view_proj.to_cols_array_2d(),
            camera_pos: camera_pos.extend(1.0).to_array(),
            light_params: [
                self.lights.len() as i32,
                self.use_normal_maps as i32,
                self.show_normals as i32,
                0,
            ],
            lights,
            ambient: self.ambient.to_array(),
        }
    }

    /// Creates every object in order, stopping at the first failure, then turns the
    /// blue quad blue.
    ///
    /// Objects created before the failure keep their resources; call
    /// [`release`](Self::release) to free them.
    pub fn create(
        &mut self,
        device: &mut dyn Device,
        assets: &dyn AssetSource,
    ) -> Result<(), CreateError> {
        for object in &mut self.objects {
            object.create(device, assets)?;
        }
        if let Some(blue) = self.blue {
            let object = &mut self.objects[blue];
            object
                .set_color(device, Rgba8::BLUE)
                .map_err(|source| CreateError::Geometry {
                    object: object.name().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Releases every object, last created first.
    pub fn release(&mut self, device: &mut dyn Device) {
        for object in self.objects.iter_mut().rev() {
            object.release(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::EmbeddedAssets;
    use crate::device::BufferUsage;
    use crate::headless::HeadlessDevice;
    use crate::mesh::ColorVertex;

    #[test]
    fn frame_constants_are_432_bytes() {
        assert_eq!(std::mem::size_of::<FrameConstants>(), 432);
        assert_eq!(std::mem::size_of::<LightData>(), 32);
    }

    #[test]
    fn light_set_is_capped_at_ten() {
        let mut lights = LightSet::new();
        for _ in 0..LightSet::CAPACITY {
            assert!(lights.push(Light::default()));
        }
        let full = lights.clone();
        let extra = Light {
            color: Vec4::new(0.0, 1.0, 0.0, 1.0),
            ..Light::default()
        };
        assert!(!lights.push(extra));
        assert_eq!(lights.len(), 10);
        assert_eq!(lights, full);
    }

    #[test]
    fn popping_an_empty_set_is_a_no_op() {
        let mut lights = LightSet::new();
        assert!(lights.pop().is_none());
        assert!(lights.is_empty());
    }

    #[test]
    fn lights_pop_in_stack_order() {
        let mut lights = LightSet::new();
        let first = Light::default();
        let second = Light {
            color: Vec4::new(1.0, 0.0, 0.0, 1.0),
            ..first
        };
        lights.push(first);
        lights.push(second);
        assert_eq!(lights.pop(), Some(second));
        assert_eq!(lights.pop(), Some(first));
    }

    #[test]
    fn set_clamps_position_and_color() {
        let mut lights = LightSet::new();
        lights.push(Light::default());
        lights.set(
            0,
            Light {
                position: Vec4::new(-9.0, 9.0, 1.0, 3.0),
                color: Vec4::new(2.0, -1.0, 0.5, 1.0),
            },
        );
        let light = lights.as_slice()[0];
        assert_eq!(light.position, Vec4::new(-4.0, 4.0, 1.0, 1.0));
        assert_eq!(light.color, Vec4::new(1.0, 0.0, 0.5, 1.0));
    }

    #[test]
    fn orbit_about_origin_is_exact() {
        for &t in &[0.0f32, 0.37, 1.0, 2.5, 10.0] {
            let r = 12.0;
            let orbit = Orbit::new(Vec3::ZERO, r, OrbitPlane::XZ);
            let p = orbit.position(t);
            assert_eq!(p.x.to_bits(), (t.sin() * r).to_bits());
            assert_eq!(p.y.to_bits(), 0.0f32.to_bits());
            assert_eq!(p.z.to_bits(), (t.cos() * r).to_bits());
        }
    }

    #[test]
    fn negative_radius_is_opposite() {
        let pivot = Vec3::new(4.0, 0.0, 0.0);
        let a = Orbit::new(pivot, 4.0, OrbitPlane::XZ).position(1.0);
        let b = Orbit::new(pivot, -4.0, OrbitPlane::XZ).position(1.0);
        assert!(((a + b) / 2.0 - pivot).length() < 1e-6);
    }

    #[test]
    fn demo_has_four_cubes_then_two_quads() {
        let scene = Scene::demo(Vec4::splat(0.4));
        assert_eq!(scene.objects().len(), 6);
        assert_eq!(scene.in_pass(PassKind::Opaque).collect::<Vec<_>>(), [0, 1, 2, 3]);
        assert_eq!(scene.translucent_order(true), [5, 4]);
        assert_eq!(scene.translucent_order(false), [4, 5]);
        assert!(scene.lights().is_empty());
    }

    #[test]
    fn demo_quads_are_built_red_and_the_blue_one_recolored() {
        let mut device = HeadlessDevice::new();
        let mut scene = Scene::demo(Vec4::splat(0.4));
        scene.create(&mut device, &EmbeddedAssets).unwrap();

        let colors = |label: &str| -> Vec<u32> {
            let buffer = device.find_buffer(label, BufferUsage::Vertex).unwrap();
            let bytes = device.buffer_contents(buffer).unwrap();
            bytemuck::pod_collect_to_vec::<u8, ColorVertex>(bytes)
                .iter()
                .map(|v| v.color)
                .collect()
        };
        assert!(colors("blue quad").iter().all(|&c| c == Rgba8::BLUE.packed()));
        assert!(colors("red quad").iter().all(|&c| c == Rgba8::RED.packed()));

        let blue = device.find_buffer("blue quad", BufferUsage::Vertex).unwrap();
        assert_eq!(device.write_count(blue), 1);
        scene.release(&mut device);
    }

    #[test]
    fn animate_sets_components_without_accumulating() {
        let mut scene = Scene::demo(Vec4::splat(0.4));
        scene.animate(1.0);
        scene.animate(1.0);
        let cube = &mut scene.objects_mut()[0];
        let world = cube.transform_mut().recompose();

        let orbit = Orbit::new(Vec3::new(4.0, 0.0, 0.0), 4.0, OrbitPlane::XZ);
        let expected =
            Mat4::from_translation(orbit.position(1.0)) * Mat4::from_quat(Quat::from_rotation_y(1.0));
        assert_eq!(world, expected);

        // cube 3 keeps its static scale while orbiting
        let big = scene.objects()[3].transform();
        assert_eq!(big.scaling(), Mat4::from_scale(Vec3::splat(2.0)));
        assert_eq!(big.position(), Vec3::new(0.0, 1.0f32.sin() * 12.0, 1.0f32.cos() * 12.0));
    }

    #[test]
    fn ui_requests_add_and_remove_lights() {
        let mut scene = Scene::demo(Vec4::splat(0.4));
        let mut ui = UiState::default();

        ui.add_light = true;
        scene.apply_ui(&ui);
        assert_eq!(scene.lights().len(), 1);

        scene.sync_ui(&mut ui);
        ui.clear_requests();
        ui.lights[0].position.x = 3.0;
        ui.show_normals = true;
        scene.apply_ui(&ui);
        assert_eq!(scene.lights().as_slice()[0].position.x, 3.0);

        let constants = scene.frame_constants(Mat4::IDENTITY, Vec3::ZERO);
        assert_eq!(constants.light_params, [1, 1, 1, 0]);
        assert_eq!(constants.lights[0].position, [3.0, 2.0, 0.0, 1.0]);
        assert_eq!(constants.ambient, [0.4; 4]);

        ui.remove_light = true;
        scene.apply_ui(&ui);
        ui.remove_light = true;
        scene.apply_ui(&ui);
        assert!(scene.lights().is_empty());
    }
}
