use glam::{Mat4, Vec3};

/// A camera that orbits a focus point.
///
/// The camera accumulates rotate / zoom / move deltas and exposes the resulting view
/// matrix and eye position. Angles are in radians.
///
/// # Example
/// ```
/// use stratum::{Camera, Vec3};
///
/// let mut camera = Camera::new().focus(Vec3::ZERO).distance(5.0);
/// camera.rotate(0.1, 0.0);
/// camera.zoom(-1.0);
/// assert!((camera.position().length() - 4.0).abs() < 1e-5);
/// ```
#[derive(Clone, Debug)]
pub struct Camera {
    /// Point the camera looks at and orbits around.
    pub focus: Vec3,
    /// Distance from the focus point.
    pub distance: f32,
    /// Horizontal angle (yaw). 0 places the eye on +Z of the focus.
    pub azimuth: f32,
    /// Vertical angle (pitch), clamped short of the poles.
    pub elevation: f32,
    /// Minimum distance from the focus point.
    pub min_distance: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            focus: Vec3::new(4.0, 0.0, 0.0),
            distance: 18.0,
            azimuth: 0.0,
            elevation: 0.3,
            min_distance: 1.0,
        }
    }
}

const ELEVATION_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the focus point.
    pub fn focus(mut self, focus: impl Into<Vec3>) -> Self {
        self.focus = focus.into();
        self
    }

    /// Set the distance from the focus point.
    pub fn distance(mut self, distance: f32) -> Self {
        self.distance = distance.max(self.min_distance);
        self
    }

    /// Orbit by `dx` radians of azimuth and `dy` radians of elevation.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.azimuth -= dx;
        self.elevation = (self.elevation + dy).clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
    }

    /// Move toward (negative) or away from (positive) the focus point.
    pub fn zoom(&mut self, dz: f32) {
        self.distance = (self.distance + dz).max(self.min_distance);
    }

    /// Shift the focus point relative to the view: positive `dx` strafes left,
    /// positive `dy` moves forward along the ground, positive `dz` moves up.
    pub fn move_by(&mut self, dx: f32, dy: f32, dz: f32) {
        let forward = Vec3::new(-self.azimuth.sin(), 0.0, -self.azimuth.cos());
        let left = Vec3::new(forward.z, 0.0, -forward.x);
        self.focus += left * dx + forward * dy + Vec3::Y * dz;
    }

    /// Eye position in world space.
    pub fn position(&self) -> Vec3 {
        let offset = Vec3::new(
            self.distance * self.elevation.cos() * self.azimuth.sin(),
            self.distance * self.elevation.sin(),
            self.distance * self.elevation.cos() * self.azimuth.cos(),
        );
        self.focus + offset
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.focus, Vec3::Y)
    }
}

/// Reversed-depth perspective projection: the near plane maps to depth 1 and the far
/// plane to depth 0.
pub fn reversed_perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh(fov_y, aspect, far, near)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_never_passes_minimum_distance() {
        let mut camera = Camera::new().distance(2.0);
        camera.zoom(-10.0);
        assert_eq!(camera.distance, camera.min_distance);
    }

    #[test]
    fn elevation_is_clamped() {
        let mut camera = Camera::new();
        camera.rotate(0.0, 10.0);
        assert!(camera.elevation < std::f32::consts::FRAC_PI_2);
        camera.rotate(0.0, -20.0);
        assert!(camera.elevation > -std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn forward_moves_toward_the_focus_direction() {
        let mut camera = Camera::new().focus(Vec3::ZERO);
        camera.azimuth = 0.0;
        camera.move_by(0.0, 1.0, 0.0);
        // eye is on +Z, so forward is -Z
        assert!((camera.focus - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);

        camera.move_by(1.0, 0.0, 0.0);
        assert!((camera.focus - Vec3::new(-1.0, 0.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn view_maps_focus_onto_negative_z() {
        let camera = Camera::new();
        let focus_in_view = camera.view_matrix().transform_point3(camera.focus);
        assert!(focus_in_view.x.abs() < 1e-4);
        assert!(focus_in_view.y.abs() < 1e-4);
        assert!((focus_in_view.z + camera.distance).abs() < 1e-3);
    }

    #[test]
    fn projection_reverses_depth() {
        let proj = reversed_perspective(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.01, 100.0);
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -0.01));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!((near.z - 1.0).abs() < 1e-4);
        assert!(far.z.abs() < 1e-4);
    }
}
