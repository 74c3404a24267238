//! Per-object transforms built from three independent components.
//!
//! A [`Transform`] keeps its translation, rotation and scale as separate matrices.
//! The setters *replace* a component instead of accumulating onto it, and the world
//! matrix is only recomposed when [`Transform::recompose`] runs (once per frame, from
//! the owning drawable's `update`).
//!
//! # Composition order
//!
//! The world matrix applies scale first, then rotation, then translation. With glam's
//! column vectors that is `T * R * S`.
//!
//! ```
//! use stratum::{Transform, Vec3, Quat, Mat4};
//!
//! let mut transform = Transform::new();
//! transform.translate(Vec3::new(4.0, 0.0, 0.0));
//! transform.translate(Vec3::new(1.0, 2.0, 3.0)); // replaces, does not add
//! transform.scale(Vec3::splat(2.0));
//!
//! let world = transform.recompose();
//! assert_eq!(world, Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)) * Mat4::from_scale(Vec3::splat(2.0)));
//! ```

use glam::{Mat4, Quat, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    translation: Mat4,
    rotation: Mat4,
    scaling: Mat4,
    world: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Mat4::IDENTITY,
            rotation: Mat4::IDENTITY,
            scaling: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the translation component.
    pub fn translate(&mut self, offset: Vec3) {
        self.translation = Mat4::from_translation(offset);
    }

    /// Replaces the scale component.
    pub fn scale(&mut self, factors: Vec3) {
        self.scaling = Mat4::from_scale(factors);
    }

    /// Replaces the rotation component.
    pub fn rotate(&mut self, rotation: Quat) {
        self.rotation = Mat4::from_quat(rotation);
    }

    pub fn translation(&self) -> Mat4 {
        self.translation
    }

    pub fn rotation(&self) -> Mat4 {
        self.rotation
    }

    pub fn scaling(&self) -> Mat4 {
        self.scaling
    }

    /// Position encoded by the translation component.
    pub fn position(&self) -> Vec3 {
        self.translation.w_axis.truncate()
    }

    /// The world matrix as of the last [`recompose`](Self::recompose).
    pub fn world(&self) -> Mat4 {
        self.world
    }

    /// Rebuilds the world matrix from the current components and returns it.
    pub fn recompose(&mut self) -> Mat4 {
        self.world = self.translation * self.rotation * self.scaling;
        self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_do_not_touch_world_until_recompose() {
        let mut transform = Transform::new();
        transform.translate(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(transform.world(), Mat4::IDENTITY);

        transform.recompose();
        assert_eq!(transform.world(), Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn only_the_latest_component_values_count() {
        let mut transform = Transform::new();
        transform.translate(Vec3::new(9.0, 9.0, 9.0));
        transform.rotate(Quat::from_rotation_x(1.0));
        transform.scale(Vec3::splat(5.0));
        transform.translate(Vec3::new(1.0, 2.0, 3.0));
        transform.rotate(Quat::from_rotation_y(0.5));
        transform.scale(Vec3::new(1.0, 3.0, 2.0));
        transform.recompose();
        transform.translate(Vec3::new(1.0, 2.0, 3.0));
        transform.recompose();

        let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_quat(Quat::from_rotation_y(0.5))
            * Mat4::from_scale(Vec3::new(1.0, 3.0, 2.0));
        assert_eq!(transform.world(), expected);
    }

    #[test]
    fn scale_applies_before_translation() {
        let mut transform = Transform::new();
        transform.translate(Vec3::new(10.0, 0.0, 0.0));
        transform.scale(Vec3::splat(2.0));
        let world = transform.recompose();

        let p = world.transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(p, Vec3::new(12.0, 0.0, 0.0));
    }

    #[test]
    fn position_reads_back_translation() {
        let mut transform = Transform::new();
        transform.translate(Vec3::new(6.0, -1.0, 2.5));
        assert_eq!(transform.position(), Vec3::new(6.0, -1.0, 2.5));
    }
}
